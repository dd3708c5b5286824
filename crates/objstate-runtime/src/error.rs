//! Error types for store operations.

use thiserror::Error;

/// Error a fallible listener may return. Boxed so listeners can surface any
/// error type, including a [`StoreError`] from a nested mutation.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by `Store` mutations and constructors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Untyped input had the wrong JSON kind.
    #[error(transparent)]
    InvalidArgument(#[from] objstate_core::Error),

    /// A listener failed while being notified. The state change it was
    /// notified about stays committed; listeners after it were skipped.
    #[error("listener #{index} failed during mutation {version}: {source}")]
    Listener {
        /// Position of the failing listener in the committed snapshot.
        index: usize,
        /// Store version produced by the mutation being notified.
        version: u64,
        /// Label passed to the mutation, if any.
        label: Option<String>,
        /// Error returned by the listener.
        #[source]
        source: ListenerError,
    },

    /// Too many mutations were active at once through listener re-entry.
    /// Nothing was changed.
    #[error("mutation nesting depth {depth} exceeds limit {limit}")]
    NestingTooDeep {
        /// Depth the rejected mutation would have run at.
        depth: usize,
        /// Configured limit.
        limit: usize,
    },
}

/// Convenience alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
