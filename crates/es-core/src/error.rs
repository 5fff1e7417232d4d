//! Core error type.
//!
//! `es-sim` wraps `CoreError` as one variant of its own `SimError`, so
//! configuration problems surface through the same `?` chain as scheduler
//! misuse.

use thiserror::Error;

/// Errors raised by `es-core` itself.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),
}

/// Shorthand result type for `es-core`.
pub type CoreResult<T> = Result<T, CoreError>;
