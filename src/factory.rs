//! Factory proxies for on-demand service creation
//!
//! A dependency declared as `"widget!"` (or `"widgetFactory"`) resolves to a
//! [`Factory`] bound to `widget` instead of a widget itself. The consumer
//! calls [`Factory::get`] whenever it needs a fresh graph, optionally
//! stacking per-call overrides with [`Factory::with`] first. Everything a
//! factory manufactures is tracked under the consumer that owns the factory,
//! so disposing the consumer releases the manufactured transients too.

use crate::container::Container;
use crate::error::{DiError, Result};
use crate::provider::{Instance, Provider};
use crate::resolver::{self, ResolveCtx};
use crate::tracking::TrackedRef;
use ahash::AHashMap;
use parking_lot::Mutex;
use std::fmt;

#[cfg(feature = "logging")]
use tracing::trace;

/// A proxy that re-enters the resolver on demand for one bound service.
///
/// # Examples
///
/// ```rust
/// use drip::{Container, Lifecycle, Factory, Provider};
///
/// struct Job { id: u32 }
///
/// let container = Container::new();
/// container
///     .register("job", Provider::ctor(&[], |_| Ok(Job { id: 1 })), Lifecycle::Unique)
///     .unwrap();
/// container
///     .register(
///         "runner",
///         Provider::ctor(&["job!"], |args| Ok(args.factory(0)?)),
///         Lifecycle::PerRequest,
///     )
///     .unwrap();
///
/// let runner = container.get_as::<std::sync::Arc<Factory>>("runner").unwrap();
/// let a = runner.get().unwrap();
/// let b = runner.get().unwrap();
/// assert!(!std::sync::Arc::ptr_eq(&a, &b));
/// ```
pub struct Factory {
    service_name: String,
    container: Container,
    /// Tracking node of the consumer that received this proxy; manufactured
    /// instances attach here
    parent: TrackedRef,
    /// Override frame accumulated by `with`, consumed by the next `get`
    overrides: Mutex<AHashMap<String, Provider>>,
}

impl Factory {
    pub(crate) fn new(service_name: &str, container: Container, parent: TrackedRef) -> Self {
        Self {
            service_name: service_name.into(),
            container,
            parent,
            overrides: Mutex::new(AHashMap::new()),
        }
    }

    /// The service name this factory is bound to.
    #[inline]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Push a per-call override: the next `get` resolves `name` from
    /// `provider` instead of its registration. Chainable; later calls for
    /// the same name win; overrides never cache.
    pub fn with(&self, name: impl Into<String>, provider: Provider) -> &Self {
        self.overrides.lock().insert(name.into(), provider);
        self
    }

    /// Shorthand for [`Factory::with`] with an eager value.
    pub fn with_value<T: Send + Sync + 'static>(&self, name: impl Into<String>, value: T) -> &Self {
        self.with(name, Provider::value(value))
    }

    /// Manufacture a fresh instance of the bound service.
    ///
    /// Consumes (and clears) the accumulated override frame. The produced
    /// instance and its non-singleton dependencies are tracked under this
    /// factory's owner.
    #[inline]
    pub fn get(&self) -> Result<Instance> {
        self.get_with(Vec::new())
    }

    /// Like [`Factory::get`], appending `extras` to the constructor
    /// arguments of the manufactured instance.
    pub fn get_with(&self, extras: Vec<Instance>) -> Result<Instance> {
        if self.container.is_disposed() {
            return Err(DiError::Disposed);
        }

        #[cfg(feature = "logging")]
        trace!(service = %self.service_name, "Factory resolving");

        let frame = std::mem::take(&mut *self.overrides.lock());
        let mut ctx =
            ResolveCtx::with_overrides(self.container.clone(), frame, self.parent.clone());
        resolver::resolve_root(&mut ctx, &self.service_name, extras)
    }

    /// Manufacture and downcast in one step.
    pub fn get_as<T: Send + Sync + 'static>(&self) -> Result<std::sync::Arc<T>> {
        self.get()?
            .downcast::<T>()
            .map_err(|_| DiError::type_mismatch::<T>(self.service_name.clone()))
    }

    /// Release one manufactured instance and everything tracked under it.
    ///
    /// The instance's node is detached from the owner's subtree and disposed
    /// post-order through the owning container's dispose hook. Passing an
    /// instance this factory's owner does not track is an error.
    pub fn dispose(&self, instance: &Instance) -> Result<()> {
        let node = self.parent.detach(instance).ok_or(DiError::NotTracked)?;

        #[cfg(feature = "logging")]
        trace!(service = %self.service_name, "Factory disposing instance");

        node.dispose(self.container.dispose_hook().as_ref());
        Ok(())
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("service", &self.service_name)
            .field("pending_overrides", &self.overrides.lock().len())
            .finish()
    }
}
