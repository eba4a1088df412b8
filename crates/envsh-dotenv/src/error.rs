//! Loader error types.

use std::path::PathBuf;

use envsh_kernel::ExpandError;
use thiserror::Error;

/// Errors surfaced while discovering, reading, or applying dot-env files.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A directory listing or an explicitly requested file failed to read.
    /// Optional platform files that fail to read are logged and skipped
    /// instead.
    #[error("failed to read {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A `KEY = VALUE` line whose key is not a valid identifier.
    #[error("invalid key {key:?} in line: {line}")]
    InvalidKey { key: String, line: String },

    /// A filter value did not compile to a matcher.
    #[error("invalid filter value {value:?}")]
    Pattern {
        value: String,
        #[source]
        source: regex::Error,
    },

    /// A value failed to expand.
    #[error(transparent)]
    Expand(#[from] ExpandError),
}

pub type LoadResult<T> = Result<T, LoadError>;
