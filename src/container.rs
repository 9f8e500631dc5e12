//! Name-based dependency injection container
//!
//! The `Container` is the user-facing façade: it stores registrations,
//! resolves object graphs by name, spawns child containers whose
//! registrations shadow it, and owns the tracking graph that makes
//! disposal deterministic.

use crate::error::{DiError, Result};
use crate::provider::{Instance, Lifecycle, Provider};
use crate::registry::{Registration, Registry, Source};
use crate::resolver::{self, ResolveCtx};
use crate::tracking::{DisposeHook, TrackedNode, TrackedRef};
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// The reserved service name that always resolves to the owning container.
///
/// It is a resolver sentinel, not a registration: it wins over user
/// registrations and per-call overrides, and the produced instance is never
/// tracked for disposal.
pub const CONTAINER_NAME: &str = "container";

/// Configuration accepted by [`create`](crate::create) and
/// [`Container::with_options`].
///
/// # Examples
///
/// ```rust
/// use drip::Options;
///
/// let options = Options::new().on_dispose(|_instance, name| {
///     eprintln!("releasing {name}");
/// });
/// # let _ = options;
/// ```
#[derive(Default)]
pub struct Options {
    on_dispose: Option<DisposeHook>,
}

impl Options {
    /// Empty options: no dispose hook.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the disposal callback, invoked once per tracked instance
    /// with the instance and the service name it was resolved under.
    pub fn on_dispose<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Instance, &str) + Send + Sync + 'static,
    {
        self.on_dispose = Some(Arc::new(hook));
        self
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("on_dispose", &self.on_dispose.is_some())
            .finish()
    }
}

/// A scope holding registrations, singleton instances, and a tracking graph.
///
/// Cheap to clone; clones share the same underlying scope.
///
/// # Examples
///
/// ```rust
/// use drip::{Container, Lifecycle, Provider};
/// use std::sync::Arc;
///
/// struct Logger { tag: String }
/// struct App { logger: Arc<Logger> }
///
/// let container = Container::new();
/// container.register_value("logger", Logger { tag: "L".into() }).unwrap();
/// container
///     .register(
///         "app",
///         Provider::ctor(&["logger"], |args| Ok(App { logger: args.get::<Logger>(0)? })),
///         Lifecycle::PerRequest,
///     )
///     .unwrap();
///
/// let app = container.get_as::<App>("app").unwrap();
/// assert_eq!(app.logger.tag, "L");
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

struct ContainerInner {
    /// Name-keyed registrations local to this scope
    registry: Registry,
    /// Parent scope; lookups fall through when a name is not local
    parent: Option<Weak<ContainerInner>>,
    /// One instance per singleton name registered *here*
    singletons: DashMap<String, Instance, RandomState>,
    /// Root of this scope's tracking tree
    root: TrackedRef,
    /// Child scopes still to be disposed when this one is
    children: Mutex<Vec<Weak<ContainerInner>>>,
    /// Disposal callback, inherited by children
    on_dispose: Option<DisposeHook>,
    /// Disposed scopes refuse all further operations
    disposed: RwLock<bool>,
    /// Scope depth for debugging
    depth: u32,
}

fn singleton_cache() -> DashMap<String, Instance, RandomState> {
    DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8)
}

impl Container {
    /// Create a new root container with no dispose hook.
    #[inline]
    pub fn new() -> Self {
        Self::with_options(Options::new())
    }

    /// Create a new root container with the given options.
    pub fn with_options(options: Options) -> Self {
        #[cfg(feature = "logging")]
        debug!("Creating root container");

        Self {
            inner: Arc::new(ContainerInner {
                registry: Registry::new(),
                parent: None,
                singletons: singleton_cache(),
                root: TrackedNode::synthetic("<root>"),
                children: Mutex::new(Vec::new()),
                on_dispose: options.on_dispose,
                disposed: RwLock::new(false),
                depth: 0,
            }),
        }
    }

    /// Create a root container with pre-allocated registry capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                registry: Registry::with_capacity(capacity),
                parent: None,
                singletons: singleton_cache(),
                root: TrackedNode::synthetic("<root>"),
                children: Mutex::new(Vec::new()),
                on_dispose: None,
                disposed: RwLock::new(false),
                depth: 0,
            }),
        }
    }

    /// Create a child container.
    ///
    /// The child starts with an empty registry; names it does not register
    /// fall through to this container, while names it does register shadow
    /// it for resolves that begin in the child. The child inherits the
    /// dispose hook, and is disposed along with this container if still
    /// alive then.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use drip::Container;
    ///
    /// let parent = Container::new();
    /// parent.register_value("svc", "from-parent".to_string()).unwrap();
    ///
    /// let child = parent.create().unwrap();
    /// child.register_value("svc", "from-child".to_string()).unwrap();
    ///
    /// assert_eq!(*child.get_as::<String>("svc").unwrap(), "from-child");
    /// assert_eq!(*parent.get_as::<String>("svc").unwrap(), "from-parent");
    /// ```
    pub fn create(&self) -> Result<Container> {
        self.ensure_live()?;

        #[cfg(feature = "logging")]
        debug!(depth = self.inner.depth + 1, "Creating child container");

        let child = Self {
            inner: Arc::new(ContainerInner {
                registry: Registry::new(),
                parent: Some(Arc::downgrade(&self.inner)),
                singletons: singleton_cache(),
                root: TrackedNode::synthetic("<root>"),
                children: Mutex::new(Vec::new()),
                on_dispose: self.inner.on_dispose.clone(),
                disposed: RwLock::new(false),
                depth: self.inner.depth + 1,
            }),
        };
        self.inner.children.lock().push(Arc::downgrade(&child.inner));
        Ok(child)
    }

    /// Alias for [`Container::create`] - creates a child scope.
    #[inline]
    pub fn scope(&self) -> Result<Container> {
        self.create()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Store a registration for `name`. Re-registering overwrites: last wins.
    ///
    /// Dependency strings inside a [`Provider::Ctor`] are validated here, so
    /// malformed descriptors fail at registration rather than mid-resolve.
    pub fn register(
        &self,
        name: impl Into<String>,
        provider: Provider,
        lifecycle: Lifecycle,
    ) -> Result<()> {
        self.ensure_live()?;

        let name = name.into();
        if name.is_empty() {
            return Err(DiError::InvalidName { name });
        }

        #[cfg(feature = "logging")]
        trace!(service = %name, lifecycle = %lifecycle, "Registering");

        let source = Source::from_provider(provider)?;
        self.inner.registry.insert(name, Registration { source, lifecycle });
        Ok(())
    }

    /// Register an eager value with the default (`perRequest`) lifecycle.
    #[inline]
    pub fn register_value<T: Send + Sync + 'static>(
        &self,
        name: impl Into<String>,
        value: T,
    ) -> Result<()> {
        self.register(name, Provider::value(value), Lifecycle::PerRequest)
    }

    /// Register with the `perRequest` lifecycle: one instance per top-level
    /// resolve.
    #[inline]
    pub fn per_request(&self, name: impl Into<String>, provider: Provider) -> Result<()> {
        self.register(name, provider, Lifecycle::PerRequest)
    }

    /// Register with the `unique` lifecycle: a fresh instance on every
    /// resolution.
    #[inline]
    pub fn unique(&self, name: impl Into<String>, provider: Provider) -> Result<()> {
        self.register(name, provider, Lifecycle::Unique)
    }

    /// Register with the `singleton` lifecycle: one instance per registering
    /// container.
    #[inline]
    pub fn singleton(&self, name: impl Into<String>, provider: Provider) -> Result<()> {
        self.register(name, provider, Lifecycle::Singleton)
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Resolve `name` into a fully constructed instance graph.
    ///
    /// No suffix sigils here: the name is looked up literally.
    #[inline]
    pub fn get(&self, name: &str) -> Result<Instance> {
        self.get_with(name, Vec::new())
    }

    /// Like [`Container::get`], appending `extras` to the constructor
    /// arguments of the top-level instance only.
    pub fn get_with(&self, name: &str, extras: Vec<Instance>) -> Result<Instance> {
        self.ensure_live()?;

        #[cfg(feature = "logging")]
        trace!(service = name, "Resolving");

        let mut ctx = ResolveCtx::new(self.clone(), self.inner.root.clone());
        resolver::resolve_root(&mut ctx, name, extras)
    }

    /// Resolve and downcast in one step.
    pub fn get_as<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        self.get(name)?
            .downcast::<T>()
            .map_err(|_| DiError::type_mismatch::<T>(name))
    }

    /// Alias for `get` - resolve a service.
    #[inline]
    pub fn resolve(&self, name: &str) -> Result<Instance> {
        self.get(name)
    }

    /// Alias for `get_with`.
    #[inline]
    pub fn resolve_with(&self, name: &str, extras: Vec<Instance>) -> Result<Instance> {
        self.get_with(name, extras)
    }

    /// Try to resolve, returning `None` on any failure.
    #[inline]
    pub fn try_get(&self, name: &str) -> Option<Instance> {
        self.get(name).ok()
    }

    /// Alias for `try_get`.
    #[inline]
    pub fn try_resolve(&self, name: &str) -> Option<Instance> {
        self.try_get(name)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Check if `name` would resolve: registered here, on a live parent, or
    /// the reserved container name.
    pub fn contains(&self, name: &str) -> bool {
        if name == CONTAINER_NAME || self.inner.registry.contains(name) {
            return true;
        }
        matches!(self.lookup(name), Ok(Some(_)))
    }

    /// Alias for `contains`.
    #[inline]
    pub fn has(&self, name: &str) -> bool {
        self.contains(name)
    }

    /// Number of registrations in this scope (not including parents).
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.registry.len()
    }

    /// Check if this scope has no registrations.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.registry.is_empty()
    }

    /// Names registered in this scope (not including parents).
    pub fn registered_names(&self) -> Vec<String> {
        self.inner.registry.names()
    }

    /// Scope depth (0 = root).
    #[inline]
    pub fn depth(&self) -> u32 {
        self.inner.depth
    }

    // =========================================================================
    // Disposal
    // =========================================================================

    /// Dispose this container: child containers first, then every tracked
    /// root in reverse insertion order (children before parents within each
    /// subtree), firing the dispose hook once per instance. Afterwards the
    /// registry and singleton cache are cleared and all further operations
    /// fail with [`DiError::Disposed`]. Idempotent.
    pub fn dispose(&self) {
        {
            let mut disposed = self.inner.disposed.write();
            if *disposed {
                return;
            }
            *disposed = true;
        }

        #[cfg(feature = "logging")]
        debug!(depth = self.inner.depth, "Disposing container");

        let children: Vec<Weak<ContainerInner>> = {
            let mut guard = self.inner.children.lock();
            guard.drain(..).collect()
        };
        for weak in children {
            if let Some(inner) = weak.upgrade() {
                Container { inner }.dispose();
            }
        }

        self.inner.root.dispose(self.inner.on_dispose.as_ref());
        self.inner.singletons.clear();
        self.inner.registry.clear();
    }

    /// Check if this container has been disposed.
    #[inline]
    pub fn is_disposed(&self) -> bool {
        *self.inner.disposed.read()
    }

    #[inline]
    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            Err(DiError::Disposed)
        } else {
            Ok(())
        }
    }

    // =========================================================================
    // Resolver support
    // =========================================================================

    /// Find the registration for `name` on this container or the closest
    /// live ancestor, together with the container that registered it.
    pub(crate) fn lookup(&self, name: &str) -> Result<Option<(Registration, Container)>> {
        if let Some(registration) = self.inner.registry.get(name) {
            return Ok(Some((registration, self.clone())));
        }

        let mut parent = self.inner.parent.clone();
        while let Some(weak) = parent {
            let Some(inner) = weak.upgrade() else {
                return Err(DiError::ParentDropped);
            };
            let ancestor = Container { inner };
            if let Some(registration) = ancestor.inner.registry.get(name) {
                return Ok(Some((registration, ancestor)));
            }
            parent = ancestor.inner.parent.clone();
        }
        Ok(None)
    }

    pub(crate) fn cached_singleton(&self, name: &str) -> Option<Instance> {
        self.inner.singletons.get(name).map(|e| e.value().clone())
    }

    pub(crate) fn cache_singleton(&self, name: &str, instance: Instance) {
        self.inner.singletons.insert(name.to_string(), instance);
    }

    pub(crate) fn tracking_root(&self) -> TrackedRef {
        self.inner.root.clone()
    }

    pub(crate) fn dispose_hook(&self) -> Option<DisposeHook> {
        self.inner.on_dispose.clone()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("service_count", &self.len())
            .field("depth", &self.inner.depth)
            .field("has_parent", &self.inner.parent.is_some())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
