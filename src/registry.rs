//! Name-keyed registration storage
//!
//! Each container owns one [`Registry`]: a map from service name to its
//! [`Registration`] record. Lookup across nested containers happens in
//! `Container`, which walks the parent chain registry by registry.

use crate::error::Result;
use crate::provider::{CtorFn, DepSpec, Instance, Lifecycle, Provider};
use ahash::RandomState;
use dashmap::DashMap;

/// What a registration resolves from, with the dependency list parsed.
#[derive(Clone)]
pub(crate) enum Source {
    /// Eager value, used as-is
    Value(Instance),
    /// Constructor plus parsed dependency descriptors
    Ctor { deps: Vec<DepSpec>, ctor: CtorFn },
}

impl Source {
    /// Parse a public [`Provider`] into a resolvable source.
    ///
    /// Dependency strings are validated here so malformed descriptors fail
    /// at registration (or at the `Factory::get` that installed them as an
    /// override), not deep inside a resolve.
    pub fn from_provider(provider: Provider) -> Result<Self> {
        match provider {
            Provider::Value(value) => Ok(Source::Value(value)),
            Provider::Ctor { deps, ctor } => {
                let deps = deps
                    .iter()
                    .map(|raw| DepSpec::parse(raw))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Source::Ctor { deps, ctor })
            }
        }
    }
}

/// A single service registration: source plus lifecycle tag.
#[derive(Clone)]
pub(crate) struct Registration {
    pub source: Source,
    pub lifecycle: Lifecycle,
}

/// Registration storage for one container.
///
/// Uses `DashMap` with `ahash`, shard count tuned down like a typical DI
/// registry holds well under a hundred names.
pub(crate) struct Registry {
    records: DashMap<String, Registration, RandomState>,
}

impl Registry {
    /// Create an empty registry.
    #[inline]
    pub fn new() -> Self {
        Self {
            records: DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8),
        }
    }

    /// Create with pre-allocated capacity.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        let shard_amount = if capacity <= 16 { 8 } else { 16 };
        Self {
            records: DashMap::with_capacity_and_hasher_and_shard_amount(
                capacity,
                RandomState::new(),
                shard_amount,
            ),
        }
    }

    /// Insert a registration. Re-registering a name overwrites: last wins.
    #[inline]
    pub fn insert(&self, name: String, registration: Registration) {
        self.records.insert(name, registration);
    }

    /// Clone the record for `name` out of the map.
    ///
    /// Cloning (cheap, `Arc`-backed) instead of returning a guard keeps
    /// resolution free to re-enter the registry for sub-dependencies.
    #[inline]
    pub fn get(&self, name: &str) -> Option<Registration> {
        self.records.get(name).map(|r| r.value().clone())
    }

    /// Check if a name is registered locally.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Number of local registrations.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the registry is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop all registrations.
    #[inline]
    pub fn clear(&self) {
        self.records.clear();
    }

    /// All locally registered names.
    pub fn names(&self) -> Vec<String> {
        self.records.iter().map(|r| r.key().clone()).collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("count", &self.len()).finish()
    }
}
