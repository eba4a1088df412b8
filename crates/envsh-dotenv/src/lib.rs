//! envsh-dotenv: layered, platform-aware dot-env loading.
//!
//! This crate provides:
//!
//! - **Platform classifier**: a platform identity string becomes an
//!   ordered broad-to-narrow tag stack (`posix`, `linux`, ...)
//! - **Filter engine**: filename token-set matching with wildcard values
//! - **File discoverer**: deterministic selection and ordering of
//!   `.env.<tags>` files, with a process-wide already-loaded accumulator
//! - **Loader**: per-line dialect detection, comment stripping, quote
//!   handling, expansion through `envsh-kernel`, and application to an
//!   injected [`envsh_kernel::Vars`] store
//!
//! The loader never touches the process environment itself; callers pass
//! the mapping to mutate. Later files override earlier ones because the
//! apply order mirrors the deterministic read order.

pub mod discover;
pub mod error;
pub mod filter;
pub mod loader;
pub mod platform;

pub use discover::{discover, reset_accumulator};
pub use error::{LoadError, LoadResult};
pub use filter::{decompose, EnvFilter};
pub use loader::{LineOutcome, Loader};
pub use platform::{platform_stack, ALL_PLATFORM_TAGS};

// The kernel types a loader caller needs.
pub use envsh_kernel::{ExpandFlags, ExpandOptions, FileFlags, PlatformFlags, Vars};
