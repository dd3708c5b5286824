//! Errors raised at the dynamic JSON boundary.

use thiserror::Error;

/// Errors from converting untyped JSON into state or patches.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A value had the wrong JSON kind (e.g. an array where a mapping was
    /// required).
    #[error("invalid argument: expected {expected}, found {found}")]
    InvalidArgument {
        /// Kind that was required.
        expected: &'static str,
        /// Kind that was supplied.
        found: &'static str,
    },
}

/// Convenience alias for core results.
pub type Result<T> = std::result::Result<T, Error>;
