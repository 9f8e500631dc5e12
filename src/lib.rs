//! # Drip - Name-Based Dependency Injection for Rust
//!
//! A small, dynamic inversion-of-control container that resolves object
//! graphs from named registrations.
//!
//! ## Features
//!
//! - 🏷️ **Name-based** - services are registered and resolved by string name
//! - 🔄 **Three lifecycles** - `perRequest` (one per resolve call), `unique`
//!   (always fresh), `singleton` (one per registering container)
//! - 🪆 **Child containers** - hierarchical scopes whose registrations
//!   shadow their parents'
//! - 🏭 **Factory proxies** - `"name!"` dependencies resolve to a factory
//!   that manufactures fresh graphs on demand, with per-call overrides
//! - 🧹 **Deterministic disposal** - every transient is tracked under the
//!   instance that caused it; disposing the owner cascades, children first
//! - 📊 **Observable** - optional tracing integration with JSON or pretty
//!   output
//!
//! ## Quick Start
//!
//! ```rust
//! use drip::{Container, Lifecycle, Provider};
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let container = Container::new();
//!
//! // Eager value: used as-is on every resolve
//! container
//!     .register_value("database", Database { url: "postgres://localhost".into() })
//!     .unwrap();
//!
//! // Constructor: dependencies resolve in declaration order
//! container
//!     .register(
//!         "users",
//!         Provider::ctor(&["database"], |args| {
//!             Ok(UserService { db: args.get::<Database>(0)? })
//!         }),
//!         Lifecycle::Singleton,
//!     )
//!     .unwrap();
//!
//! let users = container.get_as::<UserService>("users").unwrap();
//! assert_eq!(users.db.url, "postgres://localhost");
//! ```
//!
//! ## Dependency descriptors
//!
//! Entries in a constructor's dependency list are plain names, optionally
//! suffixed:
//!
//! - `"cache?"` — optional: an unregistered name yields an empty argument
//!   slot instead of an error
//! - `"widget!"` or `"widgetFactory"` — a [`Factory`] bound to `widget`
//! - `"container"` — reserved, always the owning [`Container`]
//!
//! Suffixes compose in any order (`"widget!?"` is an optional factory) and
//! are recognized only inside dependency lists, never by `register` or
//! `get`.
//!
//! ## Disposal
//!
//! ```rust
//! use drip::{Lifecycle, Options, Provider, create};
//!
//! struct Conn;
//!
//! let container = create(Options::new().on_dispose(|_instance, name| {
//!     // close handles, return connections to the pool, ...
//!     assert_eq!(name, "conn");
//! }));
//! container
//!     .register("conn", Provider::ctor(&[], |_| Ok(Conn)), Lifecycle::PerRequest)
//!     .unwrap();
//!
//! let _conn = container.get("conn").unwrap();
//! container.dispose(); // hook runs once per tracked instance
//! ```

mod container;
mod error;
mod factory;
#[cfg(feature = "logging")]
pub mod logging;
mod provider;
mod registry;
mod resolver;
mod tracking;

pub use container::{CONTAINER_NAME, Container, Options};
pub use error::{BoxError, DiError, Result};
pub use factory::Factory;
pub use provider::{Args, CtorFn, DepSpec, Instance, Lifecycle, Provider};
pub use tracking::DisposeHook;

// Re-export tracing macros for convenience when logging is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

// Re-export for convenience
pub use std::sync::Arc;

/// Create a container configured with `options`.
///
/// The module-level entry point; [`Container::new`] is the shorthand when no
/// options are needed.
#[inline]
pub fn create(options: Options) -> Container {
    Container::with_options(options)
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Args, Container, DepSpec, DiError, Factory, Instance, Lifecycle, Options, Provider,
        Result, create,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Logger {
        tag: String,
    }

    struct App {
        logger: Arc<Logger>,
    }

    #[test]
    fn test_basic_resolve() {
        let container = Container::new();
        container
            .register_value("logger", Logger { tag: "L".into() })
            .unwrap();
        container
            .per_request(
                "app",
                Provider::ctor(&["logger"], |args| {
                    Ok(App {
                        logger: args.get::<Logger>(0)?,
                    })
                }),
            )
            .unwrap();

        let app = container.get_as::<App>("app").unwrap();
        assert_eq!(app.logger.tag, "L");
    }

    struct A;
    struct B {
        a: Arc<A>,
    }
    struct C {
        a: Arc<A>,
    }
    struct Root {
        b: Arc<B>,
        c: Arc<C>,
    }

    fn diamond_container() -> Container {
        let container = Container::new();
        container
            .per_request("a", Provider::ctor(&[], |_| Ok(A)))
            .unwrap();
        container
            .per_request(
                "b",
                Provider::ctor(&["a"], |args| Ok(B { a: args.get::<A>(0)? })),
            )
            .unwrap();
        container
            .per_request(
                "c",
                Provider::ctor(&["a"], |args| Ok(C { a: args.get::<A>(0)? })),
            )
            .unwrap();
        container
            .per_request(
                "root",
                Provider::ctor(&["b", "c"], |args| {
                    Ok(Root {
                        b: args.get::<B>(0)?,
                        c: args.get::<C>(1)?,
                    })
                }),
            )
            .unwrap();
        container
    }

    #[test]
    fn test_per_request_shared_within_call_fresh_across_calls() {
        let container = diamond_container();

        let first = container.get_as::<Root>("root").unwrap();
        assert!(Arc::ptr_eq(&first.b.a, &first.c.a));

        let second = container.get_as::<Root>("root").unwrap();
        assert!(!Arc::ptr_eq(&second.b.a, &first.b.a));
    }

    #[test]
    fn test_singleton_shared_across_calls() {
        static BUILT: AtomicU32 = AtomicU32::new(0);

        let container = Container::new();
        container
            .singleton(
                "counter",
                Provider::ctor(&[], |_| {
                    Ok(BUILT.fetch_add(1, Ordering::SeqCst) + 1)
                }),
            )
            .unwrap();

        let first = container.get("counter").unwrap();
        let second = container.get("counter").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(BUILT.load(Ordering::SeqCst), 1);
    }

    struct Foo;
    struct Widget {
        foo: Instance,
    }
    struct Host {
        widgets: Arc<Factory>,
    }

    fn widget_world(log: Arc<Mutex<Vec<String>>>) -> Container {
        let container = create(Options::new().on_dispose(move |_instance, name| {
            log.lock().push(name.to_string());
        }));
        container
            .per_request("foo", Provider::ctor(&[], |_| Ok(Foo)))
            .unwrap();
        container
            .unique(
                "widget",
                Provider::ctor(&["foo"], |args| {
                    Ok(Widget {
                        foo: args.required(0)?,
                    })
                }),
            )
            .unwrap();
        container
            .per_request(
                "host",
                Provider::ctor(&["widget!"], |args| {
                    Ok(Host {
                        widgets: args.factory(0)?,
                    })
                }),
            )
            .unwrap();
        container
    }

    #[test]
    fn test_factory_scoping_and_cascading_disposal() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let container = widget_world(log.clone());

        let host = container.get_as::<Host>("host").unwrap();
        let w1 = host.widgets.get().unwrap();
        let w2 = host.widgets.get().unwrap();

        // two distinct widgets, each with its own per-request foo
        assert!(!Arc::ptr_eq(&w1, &w2));
        let w1 = w1.downcast::<Widget>().unwrap();
        let w2 = w2.downcast::<Widget>().unwrap();
        assert!(!Arc::ptr_eq(&w1.foo, &w2.foo));

        container.dispose();

        // five instances released, children before parents, reverse creation
        // order between the widgets; the factory proxy itself is not one of them
        assert_eq!(
            *log.lock(),
            vec!["foo", "widget", "foo", "widget", "host"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_factory_override_applies_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let container = widget_world(log);

        let host = container.get_as::<Host>("host").unwrap();

        let overridden = host
            .widgets
            .with_value("foo", "X".to_string())
            .get()
            .unwrap()
            .downcast::<Widget>()
            .unwrap();
        assert_eq!(
            overridden.foo.downcast_ref::<String>().map(String::as_str),
            Some("X")
        );

        // the frame was consumed: a plain get resolves the registration
        let plain = host
            .widgets
            .get()
            .unwrap()
            .downcast::<Widget>()
            .unwrap();
        assert!(plain.foo.downcast_ref::<Foo>().is_some());
    }

    #[test]
    fn test_cycle_detected_with_full_path() {
        let container = Container::new();
        container
            .per_request("a", Provider::ctor(&["b"], |_| Ok(())))
            .unwrap();
        container
            .per_request("b", Provider::ctor(&["a"], |_| Ok(())))
            .unwrap();

        match container.get("a").unwrap_err() {
            DiError::CyclicDependency { chain } => {
                assert_eq!(chain, vec!["a".to_string(), "b".into(), "a".into()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cycle_beats_optional_fallback() {
        let container = Container::new();
        container
            .per_request("a", Provider::ctor(&["b"], |_| Ok(())))
            .unwrap();
        container
            .per_request("b", Provider::ctor(&["a?"], |_| Ok(())))
            .unwrap();

        assert!(matches!(
            container.get("a").unwrap_err(),
            DiError::CyclicDependency { .. }
        ));
    }

    struct Svc {
        tag: &'static str,
    }

    #[test]
    fn test_nested_container_shadowing_and_isolated_disposal() {
        let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let hook_log = log.clone();

        let parent = create(Options::new().on_dispose(move |instance, _name| {
            if let Some(svc) = instance.downcast_ref::<Svc>() {
                hook_log.lock().push(svc.tag);
            }
        }));
        parent
            .per_request("svc", Provider::ctor(&[], |_| Ok(Svc { tag: "P" })))
            .unwrap();

        let child = parent.create().unwrap();
        child
            .per_request("svc", Provider::ctor(&[], |_| Ok(Svc { tag: "Q" })))
            .unwrap();

        assert_eq!(child.get_as::<Svc>("svc").unwrap().tag, "Q");
        assert_eq!(parent.get_as::<Svc>("svc").unwrap().tag, "P");

        // the child only ever touched its own graph
        child.dispose();
        assert_eq!(*log.lock(), vec!["Q"]);

        parent.dispose();
        assert_eq!(*log.lock(), vec!["Q", "P"]);
    }

    #[test]
    fn test_singleton_survives_transient_disposal() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hook_log = log.clone();
        let container = create(Options::new().on_dispose(move |_instance, name| {
            hook_log.lock().push(name.to_string());
        }));

        container
            .singleton("config", Provider::ctor(&[], |_| Ok("cfg".to_string())))
            .unwrap();
        container
            .unique(
                "worker",
                Provider::ctor(&["config"], |args| Ok(args.get::<String>(0)?)),
            )
            .unwrap();
        container
            .per_request(
                "pool",
                Provider::ctor(&["worker!"], |args| Ok(args.factory(0)?)),
            )
            .unwrap();

        let pool = container.get_as::<Arc<Factory>>("pool").unwrap();
        let worker = pool.get().unwrap();
        pool.dispose(&worker).unwrap();

        // only the worker went; the singleton waits for its container
        assert_eq!(*log.lock(), vec!["worker".to_string()]);

        container.dispose();
        let disposed = log.lock();
        assert_eq!(
            disposed.iter().filter(|n| n.as_str() == "config").count(),
            1
        );
    }

    #[test]
    fn test_failed_constructor_leaves_partial_graph_reclaimable() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hook_log = log.clone();
        let container = create(Options::new().on_dispose(move |_instance, name| {
            hook_log.lock().push(name.to_string());
        }));

        container
            .per_request("dep", Provider::ctor(&[], |_| Ok("dep".to_string())))
            .unwrap();
        container
            .per_request(
                "broken",
                Provider::ctor(&["dep"], |_| -> std::result::Result<(), BoxError> {
                    Err("boom".into())
                }),
            )
            .unwrap();

        let err = container.get("broken").unwrap_err();
        assert!(matches!(err, DiError::ConstructionFailed { .. }));

        // the dependency that was built before the failure is still tracked
        container.dispose();
        assert_eq!(*log.lock(), vec!["dep".to_string()]);
    }

    #[test]
    fn test_eager_value_root_reaches_hook() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hook_log = log.clone();
        let container = create(Options::new().on_dispose(move |_instance, name| {
            hook_log.lock().push(name.to_string());
        }));

        container.register_value("logger", Logger { tag: "L".into() }).unwrap();

        // resolved as a dependency only: not tracked
        container
            .per_request(
                "app",
                Provider::ctor(&["logger"], |args| {
                    Ok(App {
                        logger: args.get::<Logger>(0)?,
                    })
                }),
            )
            .unwrap();
        container.get("app").unwrap();

        // returned from a top-level get: tracked, the hook decides
        container.get("logger").unwrap();

        container.dispose();
        assert_eq!(*log.lock(), vec!["logger".to_string(), "app".to_string()]);
    }

    #[test]
    fn test_prelude_compiles() {
        use crate::prelude::*;

        let container: Container = create(Options::new());
        let _: &dyn std::fmt::Debug = &container;
    }
}
