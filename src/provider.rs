//! Registration sources, lifecycles, and dependency descriptors
//!
//! A [`Provider`] is what you hand to [`Container::register`](crate::Container::register):
//! either an eager value used as-is on every resolve, or a constructor paired
//! with an ordered dependency list. Constructors receive their resolved
//! dependencies through [`Args`].

use crate::error::{BoxError, DiError, Result};
use crate::factory::Factory;
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// An erased, shared service instance.
///
/// Every value that flows through the container is an `Arc<dyn Any>`, so
/// instances of different services can live in the same caches and tracking
/// graph. Use [`Args::get`] or [`Container::get_as`](crate::Container::get_as)
/// to recover the concrete type.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// An erased constructor: resolved dependency list in, instance out.
pub type CtorFn = Arc<dyn Fn(&Args) -> std::result::Result<Instance, BoxError> + Send + Sync>;

/// Service lifetime specification
///
/// # Examples
///
/// ```rust
/// use drip::Lifecycle;
///
/// assert_eq!("singleton".parse::<Lifecycle>().unwrap(), Lifecycle::Singleton);
/// assert!("forever".parse::<Lifecycle>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifecycle {
    /// One instance per top-level resolve; shared within the graph of one
    /// `get` call, fresh across calls
    #[default]
    PerRequest,

    /// New instance on every resolution, never cached
    Unique,

    /// One instance per registering container, shared across all resolves
    Singleton,
}

impl Lifecycle {
    /// The textual tag for this lifecycle
    #[inline]
    pub fn tag(&self) -> &'static str {
        match self {
            Lifecycle::PerRequest => "perRequest",
            Lifecycle::Unique => "unique",
            Lifecycle::Singleton => "singleton",
        }
    }

    /// Whether resolutions of this lifecycle are cached anywhere
    #[inline]
    pub fn caches(&self) -> bool {
        !matches!(self, Lifecycle::Unique)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Lifecycle {
    type Err = DiError;

    fn from_str(tag: &str) -> Result<Self> {
        match tag {
            "perRequest" => Ok(Lifecycle::PerRequest),
            "unique" => Ok(Lifecycle::Unique),
            "singleton" => Ok(Lifecycle::Singleton),
            other => Err(DiError::BadLifecycle { tag: other.into() }),
        }
    }
}

/// A parsed dependency descriptor.
///
/// Dependency lists are plain strings; two suffix sigils modify the request:
///
/// - `?` — optional: absence resolves to nothing instead of failing
/// - `!` or a literal trailing `Factory` — resolve to a [`Factory`] proxy
///   bound to the base name
///
/// Suffixes compose in any order: `"foo!?"`, `"foo?!"`, and `"fooFactory?"`
/// all denote an optional factory. Suffixes are recognized only inside
/// dependency lists, never by `register` or `get`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepSpec {
    /// Base service name with all sigils stripped
    pub name: String,
    /// Absence yields no argument instead of an error
    pub optional: bool,
    /// Resolve to a factory proxy instead of an instance
    pub factory: bool,
}

impl DepSpec {
    /// Parse a raw dependency string into its base name and flags
    ///
    /// # Examples
    ///
    /// ```rust
    /// use drip::DepSpec;
    ///
    /// let spec = DepSpec::parse("widgetFactory?").unwrap();
    /// assert_eq!(spec.name, "widget");
    /// assert!(spec.optional && spec.factory);
    /// ```
    pub fn parse(raw: &str) -> Result<Self> {
        let mut rest = raw;
        let mut optional = false;
        let mut factory = false;

        loop {
            if let Some(stripped) = rest.strip_suffix('?') {
                optional = true;
                rest = stripped;
            } else if let Some(stripped) = rest.strip_suffix('!') {
                factory = true;
                rest = stripped;
            } else {
                break;
            }
        }

        // The literal suffix form: "widgetFactory" binds a factory for
        // "widget". A service named just "Factory" stays a plain name.
        if !factory
            && rest.len() > "Factory".len()
            && let Some(stripped) = rest.strip_suffix("Factory")
        {
            factory = true;
            rest = stripped;
        }

        if rest.is_empty() {
            return Err(DiError::InvalidName { name: raw.into() });
        }

        Ok(Self {
            name: rest.into(),
            optional,
            factory,
        })
    }

    /// A descriptor with no sigils, as used for top-level `get` names
    #[inline]
    pub(crate) fn plain(name: &str) -> Self {
        Self {
            name: name.into(),
            optional: false,
            factory: false,
        }
    }
}

/// Resolved dependency values handed to a constructor, in descriptor order.
///
/// Extra arguments passed to the top-level `get` (or to `Factory::get_with`)
/// are appended after the declared dependencies.
pub struct Args {
    values: Vec<Option<Instance>>,
}

impl Args {
    #[inline]
    pub(crate) fn new(values: Vec<Option<Instance>>) -> Self {
        Self { values }
    }

    /// Number of argument slots (declared dependencies plus extras)
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if there are no arguments
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrow the erased instance at `index`, if present.
    ///
    /// Returns `None` both for out-of-range indexes and for optional
    /// dependencies that were absent.
    #[inline]
    pub fn raw(&self, index: usize) -> Option<&Instance> {
        self.values.get(index).and_then(|slot| slot.as_ref())
    }

    /// The erased instance at `index`, or an error if the slot is empty
    #[inline]
    pub fn required(&self, index: usize) -> Result<Instance> {
        self.raw(index)
            .cloned()
            .ok_or(DiError::MissingArgument { index })
    }

    /// Downcast the instance at `index` to `T`
    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>> {
        self.required(index)?
            .downcast::<T>()
            .map_err(|_| DiError::type_mismatch::<T>(format!("constructor argument {index}")))
    }

    /// Downcast the instance at `index` to `T`, treating absence or a type
    /// mismatch as `None`.
    ///
    /// This is the accessor for optional (`"name?"`) dependencies.
    pub fn opt<T: Send + Sync + 'static>(&self, index: usize) -> Option<Arc<T>> {
        self.raw(index)?.clone().downcast::<T>().ok()
    }

    /// The factory proxy at `index`, for `"name!"` / `"nameFactory"` deps
    #[inline]
    pub fn factory(&self, index: usize) -> Result<Arc<Factory>> {
        self.get::<Factory>(index)
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args").field("len", &self.len()).finish()
    }
}

/// What a name resolves from: an eager value, or a constructor plus its
/// dependency list.
///
/// # Examples
///
/// ```rust
/// use drip::{Args, Provider};
/// use std::sync::Arc;
///
/// struct Logger;
/// struct App { logger: Arc<Logger> }
///
/// // Eager value: resolved as-is, never constructed
/// let eager = Provider::value(Logger);
///
/// // Constructor: dependencies resolve in order before it runs
/// let ctor = Provider::ctor(&["logger"], |args: &Args| {
///     Ok(App { logger: args.get::<Logger>(0)? })
/// });
/// # let _ = (eager, ctor);
/// ```
#[derive(Clone)]
pub enum Provider {
    /// Eager value used as-is on resolve
    Value(Instance),
    /// Constructor invoked with its resolved dependency list
    Ctor {
        /// Raw dependency strings, parsed with [`DepSpec::parse`] at
        /// registration time
        deps: Vec<String>,
        /// The erased constructor
        ctor: CtorFn,
    },
}

impl Provider {
    /// An eager value provider
    #[inline]
    pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
        Provider::Value(Arc::new(value))
    }

    /// An eager provider from an already-erased instance
    #[inline]
    pub fn instance(value: Instance) -> Self {
        Provider::Value(value)
    }

    /// A constructor provider with an ordered dependency list.
    ///
    /// The constructed value is erased into an [`Instance`]; the closure's
    /// error type is any boxable error.
    pub fn ctor<T, F>(deps: &[&str], ctor: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Args) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        Provider::Ctor {
            deps: deps.iter().map(|d| (*d).to_string()).collect(),
            ctor: Arc::new(move |args| ctor(args).map(|value| Arc::new(value) as Instance)),
        }
    }

    /// A constructor provider that produces an already-erased instance
    pub fn ctor_raw(deps: &[&str], ctor: CtorFn) -> Self {
        Provider::Ctor {
            deps: deps.iter().map(|d| (*d).to_string()).collect(),
            ctor,
        }
    }

    /// Whether this provider is an eager value
    #[inline]
    pub fn is_value(&self) -> bool {
        matches!(self, Provider::Value(_))
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Value(_) => f.write_str("Provider::Value"),
            Provider::Ctor { deps, .. } => {
                f.debug_struct("Provider::Ctor").field("deps", deps).finish()
            }
        }
    }
}
