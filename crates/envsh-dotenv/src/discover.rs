//! Dot-env file discovery.
//!
//! Scans one directory, keeps the filenames whose token sets satisfy
//! every filter and whose tokens all belong to some filter's vocabulary,
//! and orders the survivors deterministically: the bare `.env` first,
//! then broader platforms before narrower, fewer tags before more, the
//! dotted form before the undotted, the caller's custom file last.
//!
//! A process-wide accumulator remembers what was already loaded so that
//! repeated loads (plugins, re-entrant initialization) do not re-apply
//! the same files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use envsh_kernel::{FileFlags, PlatformFlags};
use tracing::debug;

use crate::error::{LoadError, LoadResult};
use crate::filter::{decompose, EnvFilter};
use crate::platform::{platform_stack, ALL_PLATFORM_TAGS};

static LOADED: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();

fn loaded() -> &'static Mutex<HashSet<PathBuf>> {
    LOADED.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Forget every file recorded as loaded in this process.
pub fn reset_accumulator() {
    loaded().lock().expect("accumulator poisoned").clear();
}

/// Record `path` as loaded. Returns false when it already was.
pub(crate) fn mark_loaded(path: &Path) -> bool {
    loaded()
        .lock()
        .expect("accumulator poisoned")
        .insert(absolute(path))
}

fn is_loaded(path: &Path) -> bool {
    loaded()
        .lock()
        .expect("accumulator poisoned")
        .contains(&absolute(path))
}

fn absolute(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Discover eligible dot-env files under `dir`.
///
/// `filters` are the caller's dimensions; a platform filter derived from
/// `platform_id` joins them under `file_flags.add_platforms`. The custom
/// file, when given, goes last whether or not it matches any filter.
pub fn discover(
    dir: &Path,
    indicator: &str,
    platform_id: &str,
    file_flags: FileFlags,
    filters: &[EnvFilter],
    custom: Option<&Path>,
) -> LoadResult<Vec<PathBuf>> {
    if file_flags.reset_accumulated {
        reset_accumulator();
    }

    let stack = platform_stack(platform_id, PlatformFlags { add_empty: false });

    let platform_filter = if file_flags.add_platforms {
        let mut all: Vec<String> = ALL_PLATFORM_TAGS.iter().map(|t| t.to_string()).collect();
        for tag in &stack {
            if !all.contains(tag) {
                all.push(tag.clone());
            }
        }
        Some(EnvFilter::new(indicator, &stack, &all)?)
    } else {
        None
    };

    let mut effective: Vec<&EnvFilter> = filters.iter().collect();
    if let Some(filter) = &platform_filter {
        effective.push(filter);
    }
    let fallback;
    if effective.is_empty() {
        fallback = EnvFilter::indicator_only(indicator);
        effective.push(&fallback);
    }

    let bare_name = format!(".{indicator}");

    let entries = std::fs::read_dir(dir).map_err(|source| LoadError::FileRead {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut found: Vec<(FileRank, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                debug!(dir = %dir.display(), %error, "skipping unreadable entry");
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        // The canonical `.env` always applies to the current run.
        let accepted = if name.eq_ignore_ascii_case(&bare_name) {
            true
        } else {
            let tokens = decompose(&name);
            effective.iter().all(|f| f.matches_tokens(&tokens))
                && tokens
                    .iter()
                    .all(|t| effective.iter().any(|f| f.knows(t)))
        };
        if !accepted {
            continue;
        }

        if is_loaded(&path) {
            debug!(path = %path.display(), "already loaded, skipping");
            continue;
        }

        let rank = FileRank::of(&name, &bare_name, &stack);
        found.push((rank, path));
    }

    found.sort();
    let mut result: Vec<PathBuf> = found.into_iter().map(|(_, path)| path).collect();

    if let Some(custom) = custom {
        let path = custom.to_path_buf();
        if !is_loaded(&path) && !result.contains(&path) {
            result.push(path);
        }
    }

    Ok(result)
}

/// Sort key: bare file, then platform breadth, then tag count, dotted
/// before undotted, name as the final tiebreak.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct FileRank {
    bare: u8,
    platform: i64,
    tags: usize,
    undotted: u8,
    name: String,
}

impl FileRank {
    fn of(name: &str, bare_name: &str, stack: &[String]) -> FileRank {
        let tokens = decompose(name);
        let platform = tokens
            .iter()
            .filter_map(|t| {
                stack
                    .iter()
                    .position(|tag| tag.eq_ignore_ascii_case(t))
                    .map(|i| i as i64)
            })
            .max()
            .unwrap_or(-1);
        FileRank {
            bare: u8::from(!name.eq_ignore_ascii_case(bare_name)),
            platform,
            tags: tokens.len(),
            undotted: u8::from(!name.starts_with('.')),
            name: name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rank(name: &str) -> FileRank {
        let stack = vec!["posix".to_string(), "linux".to_string()];
        FileRank::of(name, ".env", &stack)
    }

    #[test]
    fn bare_env_ranks_first() {
        assert!(rank(".env") < rank(".env.linux"));
        assert!(rank(".env") < rank(".env.posix"));
    }

    #[test]
    fn broader_platform_ranks_earlier() {
        assert!(rank(".env.posix") < rank(".env.linux"));
        assert!(rank(".env.prod") < rank(".env.posix"));
    }

    #[test]
    fn fewer_tags_rank_earlier() {
        assert!(rank(".env.linux") < rank(".env.prod.linux"));
    }

    #[test]
    fn dotted_form_ranks_before_undotted() {
        assert!(rank(".linux.env") < rank("linux.env"));
        assert_eq!(rank(".linux.env").platform, rank("linux.env").platform);
    }
}
