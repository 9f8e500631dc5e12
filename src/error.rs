//! Error types for container operations

use thiserror::Error;

/// Boxed error type produced by user constructors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur during registration, resolution, or disposal
#[derive(Error, Debug)]
pub enum DiError {
    /// A required service has no registration on the container chain.
    ///
    /// `path` is the resolution path that led to the missing name,
    /// ending with the name itself.
    #[error("service not registered: {name} (resolution path: {})", path.join(" -> "))]
    NotRegistered { name: String, path: Vec<String> },

    /// A service name reappeared on the resolution stack
    #[error("cyclic dependency: {}", chain.join(" -> "))]
    CyclicDependency { chain: Vec<String> },

    /// Unknown lifecycle tag handed to `Lifecycle::from_str`
    #[error("unknown lifecycle tag: {tag:?} (expected perRequest, unique, or singleton)")]
    BadLifecycle { tag: String },

    /// Operation attempted on a disposed container
    #[error("container has been disposed")]
    Disposed,

    /// `Factory::dispose` was handed an instance outside its owner's tracking subtree
    #[error("instance is not tracked by this factory's owner")]
    NotTracked,

    /// Empty or otherwise unusable service name
    #[error("invalid service name: {name:?}")]
    InvalidName { name: String },

    /// A constructor returned an error during resolution
    #[error("failed to construct {name}: {source}")]
    ConstructionFailed {
        name: String,
        #[source]
        source: BoxError,
    },

    /// Parent container was dropped while a child still resolves through it
    #[error("parent container has been dropped")]
    ParentDropped,

    /// A typed accessor found a value of a different concrete type
    #[error("type mismatch for {name}: expected {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
    },

    /// Constructor asked for an argument index that was never resolved
    #[error("missing constructor argument at index {index}")]
    MissingArgument { index: usize },
}

impl DiError {
    /// Create a NotRegistered error with the given resolution path
    #[inline]
    pub(crate) fn not_registered(name: impl Into<String>, path: Vec<String>) -> Self {
        Self::NotRegistered {
            name: name.into(),
            path,
        }
    }

    /// Create a TypeMismatch error for type `T`
    #[inline]
    pub(crate) fn type_mismatch<T>(name: impl Into<String>) -> Self {
        Self::TypeMismatch {
            name: name.into(),
            expected: std::any::type_name::<T>(),
        }
    }
}

/// Result type alias for container operations
pub type Result<T> = std::result::Result<T, DiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_registered_message_contains_path() {
        let err = DiError::not_registered("db", vec!["app".into(), "repo".into(), "db".into()]);
        let msg = err.to_string();
        assert!(msg.contains("db"));
        assert!(msg.contains("app -> repo -> db"));
    }

    #[test]
    fn test_cyclic_message_contains_chain() {
        let err = DiError::CyclicDependency {
            chain: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cyclic dependency: a -> b -> a");
    }

    #[test]
    fn test_errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DiError>();
    }
}
