//! Instance tracking and cascading disposal
//!
//! Parallel to the resolved object graph, the container keeps a tree of
//! [`TrackedNode`]s: every non-singleton instance hangs under the instance
//! that caused its construction (or under a container/call root), so
//! disposing the outer instance cascades to everything it owns.
//!
//! The tree is append-only while resolving; nodes are detached only by an
//! explicit `Factory::dispose`. Disposal is post-order, children in reverse
//! insertion order, and idempotent per node.

use crate::provider::{Instance, Lifecycle};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "logging")]
use tracing::trace;

/// Callback invoked once per tracked instance during disposal.
///
/// Receives the instance and the service name it was resolved under.
pub type DisposeHook = Arc<dyn Fn(&Instance, &str) + Send + Sync>;

/// Shared handle to a tracking node.
pub(crate) type TrackedRef = Arc<TrackedNode>;

/// One node of the tracking tree.
///
/// `instance` stays empty for synthetic nodes (container roots, factory
/// proxies) and for nodes whose constructor failed; disposal skips the hook
/// for those but still walks their children.
pub(crate) struct TrackedNode {
    service_name: String,
    lifecycle: Lifecycle,
    synthetic: bool,
    instance: Mutex<Option<Instance>>,
    children: Mutex<Vec<TrackedRef>>,
    disposed: AtomicBool,
}

impl TrackedNode {
    /// A node for a resolver-produced instance of `name`.
    pub fn new(name: &str, lifecycle: Lifecycle) -> TrackedRef {
        Arc::new(Self {
            service_name: name.into(),
            lifecycle,
            synthetic: false,
            instance: Mutex::new(None),
            children: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        })
    }

    /// A synthetic node: participates in the tree but never fires the hook.
    pub fn synthetic(label: &str) -> TrackedRef {
        Arc::new(Self {
            service_name: label.into(),
            lifecycle: Lifecycle::Unique,
            synthetic: true,
            instance: Mutex::new(None),
            children: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        })
    }

    /// Append a child. Insertion order is disposal order, reversed.
    #[inline]
    pub fn attach(&self, child: TrackedRef) {
        self.children.lock().push(child);
    }

    /// Record the constructed instance once construction succeeds.
    #[inline]
    pub fn set_instance(&self, instance: Instance) {
        *self.instance.lock() = Some(instance);
    }

    /// Whether this node holds exactly `instance` (by `Arc` identity).
    pub fn matches(&self, instance: &Instance) -> bool {
        self.instance
            .lock()
            .as_ref()
            .is_some_and(|held| Arc::ptr_eq(held, instance))
    }

    /// Number of direct children (used by tests and `Debug` output).
    #[inline]
    pub fn child_count(&self) -> usize {
        self.children.lock().len()
    }

    /// Dispose this subtree: children in reverse insertion order first,
    /// then this node's own instance through `hook`.
    ///
    /// Idempotent; a node disposes at most once.
    pub fn dispose(&self, hook: Option<&DisposeHook>) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let children: Vec<TrackedRef> = {
            let mut guard = self.children.lock();
            guard.drain(..).collect()
        };
        for child in children.iter().rev() {
            child.dispose(hook);
        }

        if self.synthetic {
            return;
        }
        if let Some(instance) = self.instance.lock().take() {
            #[cfg(feature = "logging")]
            trace!(service = %self.service_name, "Disposing tracked instance");

            if let Some(hook) = hook {
                hook(&instance, &self.service_name);
            }
        }
    }

    /// Find the node holding `instance` anywhere under `self`, detach it
    /// from its parent, and return it. Direct children are checked before
    /// descending.
    pub fn detach(&self, instance: &Instance) -> Option<TrackedRef> {
        let snapshot: Vec<TrackedRef> = {
            let mut guard = self.children.lock();
            if let Some(pos) = guard.iter().position(|c| c.matches(instance)) {
                return Some(guard.remove(pos));
            }
            guard.clone()
        };

        for child in snapshot {
            if let Some(found) = child.detach(instance) {
                return Some(found);
            }
        }
        None
    }
}

impl std::fmt::Debug for TrackedNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedNode")
            .field("service", &self.service_name)
            .field("lifecycle", &self.lifecycle)
            .field("synthetic", &self.synthetic)
            .field("children", &self.child_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recording_hook(log: Arc<Mutex<Vec<String>>>) -> DisposeHook {
        Arc::new(move |_instance, name| log.lock().push(name.to_string()))
    }

    fn node_with_instance(name: &str) -> TrackedRef {
        let node = TrackedNode::new(name, Lifecycle::Unique);
        node.set_instance(Arc::new(name.to_string()) as Instance);
        node
    }

    #[test]
    fn test_dispose_children_before_parent_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hook = recording_hook(log.clone());

        let parent = node_with_instance("parent");
        for name in ["c1", "c2", "c3"] {
            parent.attach(node_with_instance(name));
        }

        parent.dispose(Some(&hook));
        assert_eq!(*log.lock(), vec!["c3", "c2", "c1", "parent"]);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hook = recording_hook(log.clone());

        let node = node_with_instance("svc");
        node.dispose(Some(&hook));
        node.dispose(Some(&hook));

        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_synthetic_node_skips_hook_but_walks_children() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hook = recording_hook(log.clone());

        let root = TrackedNode::synthetic("<root>");
        root.attach(node_with_instance("svc"));

        root.dispose(Some(&hook));
        assert_eq!(*log.lock(), vec!["svc"]);
    }

    #[test]
    fn test_failed_construction_node_skips_hook() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hook = recording_hook(log.clone());

        // instance never set: constructor failed mid-resolve
        let failed = TrackedNode::new("broken", Lifecycle::PerRequest);
        failed.attach(node_with_instance("sub"));

        failed.dispose(Some(&hook));
        assert_eq!(*log.lock(), vec!["sub"]);
    }

    #[test]
    fn test_detach_finds_nested_instance() {
        let root = TrackedNode::synthetic("<root>");
        let outer = node_with_instance("outer");
        let inner = node_with_instance("inner");
        let target: Instance = Arc::new(42u32);
        inner.set_instance(target.clone());
        outer.attach(inner);
        root.attach(outer);

        let detached = root.detach(&target).expect("node should be found");
        assert!(detached.matches(&target));
        // detached subtree is gone from the tree
        assert!(root.detach(&target).is_none());
    }

    #[test]
    fn test_detach_unknown_instance_is_none() {
        let root = TrackedNode::synthetic("<root>");
        root.attach(node_with_instance("svc"));

        let stranger: Instance = Arc::new(1u8);
        assert!(root.detach(&stranger).is_none());
    }
}
