//! Loader Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A loader error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for loader operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Library names must be non-empty.
    #[display("library name must not be empty")]
    InvalidName,
    /// No library was registered under this key.
    #[display("unknown library: {_0}")]
    UnknownLibrary(#[error(not(source))] String),
    /// The script resource could not be fetched or executed. Every caller
    /// waiting on the same load receives this; the next request retries.
    #[display("failed to load library `{library}` from {location}: {reason}")]
    LoadFailed { library: String, location: String, reason: String },
    /// Script resource does not exist.
    #[display("script not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Script path contains invalid characters or escapes the web root.
    #[display("invalid script path: {_0}")]
    InvalidPath(#[error(not(source))] String),
    /// The backend cannot fetch this kind of source (e.g. a cross-origin URL
    /// handed to a filesystem backend).
    #[display("unsupported script source: {_0}")]
    UnsupportedSource(#[error(not(source))] String),
    /// The script was fetched but evaluating it failed.
    #[display("script evaluation failed: {_0}")]
    Evaluation(#[error(not(source))] String),
    /// Network-related failure reported by a backend.
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    #[display("I/O error: {_0}")]
    Io(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LoadFailed { .. } | Self::Network(_) | Self::Io(_))
    }
}
