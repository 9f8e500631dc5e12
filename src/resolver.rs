//! The resolution engine
//!
//! A [`ResolveCtx`] lives for exactly one top-level `get` (or one
//! `Factory::get`): it carries the per-request cache, the stack of
//! currently-resolving names, any per-call overrides, and the tracking sink
//! that call-rooted instances attach to.

use crate::container::{CONTAINER_NAME, Container};
use crate::error::{DiError, Result};
use crate::factory::Factory;
use crate::provider::{Args, CtorFn, DepSpec, Instance, Lifecycle, Provider};
use crate::registry::Source;
use crate::tracking::{TrackedNode, TrackedRef};
use ahash::AHashMap;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Per-call bookkeeping for one top-level resolution.
pub(crate) struct ResolveCtx {
    /// Container the call started on; lookup and shadowing begin here
    owner: Container,
    /// Overrides installed by a factory's accumulated `with` frame
    overrides: AHashMap<String, Provider>,
    /// One instance per name within this call
    per_request: AHashMap<String, Instance>,
    /// Currently-resolving names, outermost first
    stack: Vec<Frame>,
    /// Where call-rooted instances are tracked: the owner's root, or a
    /// factory's parent node
    sink: TrackedRef,
}

struct Frame {
    name: String,
    /// Tracking node for this frame; `None` for singleton frames, which are
    /// transparent when searching for a tracking parent
    node: Option<TrackedRef>,
}

impl ResolveCtx {
    pub fn new(owner: Container, sink: TrackedRef) -> Self {
        Self::with_overrides(owner, AHashMap::new(), sink)
    }

    pub fn with_overrides(
        owner: Container,
        overrides: AHashMap<String, Provider>,
        sink: TrackedRef,
    ) -> Self {
        Self {
            owner,
            overrides,
            per_request: AHashMap::new(),
            stack: Vec::new(),
            sink,
        }
    }

    /// The resolution path down to (and including) `name`.
    fn path_to(&self, name: &str) -> Vec<String> {
        let mut path: Vec<String> = self.stack.iter().map(|f| f.name.clone()).collect();
        path.push(name.to_string());
        path
    }

    /// Nearest non-singleton ancestor on the stack, else the call sink.
    fn tracking_parent(&self) -> TrackedRef {
        self.stack
            .iter()
            .rev()
            .find_map(|frame| frame.node.clone())
            .unwrap_or_else(|| self.sink.clone())
    }
}

/// Resolve `name` as the top level of `ctx`'s call.
///
/// `extras` are appended to the constructor arguments of the top-level
/// instance only; they never propagate to dependencies.
pub(crate) fn resolve_root(
    ctx: &mut ResolveCtx,
    name: &str,
    extras: Vec<Instance>,
) -> Result<Instance> {
    let spec = DepSpec::plain(name);
    resolve(ctx, &spec, Some(extras))?
        .ok_or_else(|| DiError::not_registered(name, vec![name.to_string()]))
}

/// Resolve one dependency descriptor within `ctx`.
///
/// Returns `Ok(None)` only for optional descriptors whose base name has no
/// registration (and no override).
fn resolve(
    ctx: &mut ResolveCtx,
    spec: &DepSpec,
    extras: Option<Vec<Instance>>,
) -> Result<Option<Instance>> {
    let name = spec.name.as_str();

    // The reserved name always resolves to the owning container. Identity is
    // stable within one call, and container instances are never tracked.
    if name == CONTAINER_NAME {
        if let Some(hit) = ctx.per_request.get(name) {
            return Ok(Some(hit.clone()));
        }
        let instance: Instance = Arc::new(ctx.owner.clone());
        ctx.per_request.insert(name.to_string(), instance.clone());
        return Ok(Some(instance));
    }

    let override_source = match ctx.overrides.get(name) {
        Some(provider) => Some(Source::from_provider(provider.clone())?),
        None => None,
    };

    // Factory-suffixed descriptors manufacture a proxy bound to the base
    // name instead of resolving it now. Proxies are never cached; each
    // occurrence in a dependency list gets its own.
    if spec.factory {
        let known = override_source.is_some() || ctx.owner.lookup(name)?.is_some();
        if !known {
            return if spec.optional {
                Ok(None)
            } else {
                Err(DiError::not_registered(name, ctx.path_to(name)))
            };
        }

        #[cfg(feature = "logging")]
        trace!(service = name, "Manufacturing factory proxy");

        let parent = ctx.tracking_parent();
        // The proxy hangs under its caller so its manufactured transients
        // (which track under the same parent) share the caller's fate. The
        // node is synthetic: the dispose hook never sees the proxy itself.
        parent.attach(TrackedNode::synthetic(&format!("{name}!")));
        let factory = Factory::new(name, ctx.owner.clone(), parent);
        return Ok(Some(Arc::new(factory) as Instance));
    }

    // Overrides beat registrations, and never cache: they resolve as unique.
    let (source, lifecycle, registering) = match override_source {
        Some(source) => (source, Lifecycle::Unique, ctx.owner.clone()),
        None => match ctx.owner.lookup(name)? {
            Some((registration, registering)) => {
                (registration.source, registration.lifecycle, registering)
            }
            None if spec.optional => return Ok(None),
            None => return Err(DiError::not_registered(name, ctx.path_to(name))),
        },
    };

    // Cycle detection fires before caching and before optional fallback: a
    // registered name that loops is an error even when marked optional.
    if ctx.stack.iter().any(|frame| frame.name == name) {
        return Err(DiError::CyclicDependency {
            chain: ctx.path_to(name),
        });
    }

    match lifecycle {
        Lifecycle::Singleton => {
            if let Some(hit) = registering.cached_singleton(name) {
                #[cfg(feature = "logging")]
                trace!(service = name, "Singleton cache hit");
                return Ok(Some(hit));
            }
        }
        Lifecycle::PerRequest => {
            if let Some(hit) = ctx.per_request.get(name) {
                #[cfg(feature = "logging")]
                trace!(service = name, "Per-request cache hit");
                return Ok(Some(hit.clone()));
            }
        }
        Lifecycle::Unique => {}
    }

    match source {
        Source::Value(value) => {
            // Eager values resolve as-is: no construction, no
            // sub-resolution. One returned as the call result still joins
            // the tracking graph so a container-level dispose shows it to
            // the hook, which decides what releasing it means.
            if ctx.stack.is_empty() {
                let node = TrackedNode::new(name, lifecycle);
                node.set_instance(value.clone());
                ctx.sink.attach(node);
            }
            if lifecycle == Lifecycle::PerRequest {
                ctx.per_request.insert(name.to_string(), value.clone());
            }
            Ok(Some(value))
        }
        Source::Ctor { deps, ctor } => {
            construct(ctx, name, lifecycle, &registering, &deps, &ctor, extras).map(Some)
        }
    }
}

/// Run a constructor: resolve its dependency list, apply top-level extras,
/// invoke it, then cache and track the instance per its lifecycle.
#[allow(clippy::too_many_arguments)]
fn construct(
    ctx: &mut ResolveCtx,
    name: &str,
    lifecycle: Lifecycle,
    registering: &Container,
    deps: &[DepSpec],
    ctor: &CtorFn,
    extras: Option<Vec<Instance>>,
) -> Result<Instance> {
    let is_top = ctx.stack.is_empty();

    #[cfg(feature = "logging")]
    trace!(service = name, lifecycle = %lifecycle, deps = deps.len(), "Constructing");

    // The tracking node is attached before construction: sub-instances built
    // for a constructor that later fails stay reachable from a root, so a
    // container-level dispose can reclaim a partial graph.
    let node = TrackedNode::new(name, lifecycle);
    let frame_node = if lifecycle == Lifecycle::Singleton {
        registering.tracking_root().attach(node.clone());
        None
    } else {
        ctx.tracking_parent().attach(node.clone());
        Some(node.clone())
    };

    ctx.stack.push(Frame {
        name: name.to_string(),
        node: frame_node,
    });
    let built = construct_in_frame(ctx, name, deps, ctor, extras, is_top);
    ctx.stack.pop();

    let instance = built?;
    node.set_instance(instance.clone());

    match lifecycle {
        Lifecycle::Singleton => registering.cache_singleton(name, instance.clone()),
        Lifecycle::PerRequest => {
            ctx.per_request.insert(name.to_string(), instance.clone());
        }
        Lifecycle::Unique => {}
    }

    Ok(instance)
}

fn construct_in_frame(
    ctx: &mut ResolveCtx,
    name: &str,
    deps: &[DepSpec],
    ctor: &CtorFn,
    extras: Option<Vec<Instance>>,
    is_top: bool,
) -> Result<Instance> {
    let mut values = Vec::with_capacity(deps.len());
    for dep in deps {
        values.push(resolve(ctx, dep, None)?);
    }
    if is_top && let Some(extras) = extras {
        values.extend(extras.into_iter().map(Some));
    }

    let args = Args::new(values);
    (ctor.as_ref())(&args).map_err(|source| DiError::ConstructionFailed {
        name: name.to_string(),
        source,
    })
}
