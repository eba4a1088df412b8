//! Error types for the expansion engine.
//!
//! Every failure a caller can distinguish is its own variant; the engine
//! propagates them up to the originating `expand` call without swallowing.

use std::time::Duration;

use thiserror::Error;

/// Errors produced while parsing or expanding a value.
#[derive(Debug, Error)]
pub enum ExpandError {
    /// A quoted region never closed.
    #[error("unterminated quoted string: {input}")]
    UnterminatedQuote { input: String },

    /// An escape character at end of input, or a truncated `\xHH`-style
    /// sequence.
    #[error("dangling escape at position {pos} in: {input}")]
    DanglingEscape { input: String, pos: usize },

    /// `${NAME?msg}` / `${NAME:?msg}` tripped on an unset or null variable.
    #[error("{name}: {message}")]
    MissingVariable { name: String, message: String },

    /// Malformed `${...}` syntax.
    #[error("bad substitution: {text}")]
    BadSubstitution { text: String },

    /// Nested expansion exceeded the depth limit.
    #[error("expansion recursion limit of {limit} exceeded")]
    RecursionLimitExceeded { limit: usize },

    /// A command substitution exited non-zero.
    #[error("command failed with exit code {code}: {stderr}")]
    SubprocessFailed { code: i32, stderr: String },

    /// A command substitution outlived its deadline and was killed.
    #[error("command timed out after {limit:?}")]
    SubprocessTimeout { limit: Duration },

    /// Command substitution was requested but no runner is available.
    #[error("no command runner available for substitution")]
    NoRunner,

    /// The child process could not be spawned or awaited.
    #[error("failed to run command")]
    Spawn {
        #[source]
        source: std::io::Error,
    },
}

/// Result alias used throughout the kernel.
pub type ExpandResult<T> = Result<T, ExpandError>;
