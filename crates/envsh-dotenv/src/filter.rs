//! The filename filter engine.
//!
//! A filter is one dimension of file selection: runtime environment
//! (`dev`/`test`/`prod`), language, platform. Filenames decompose into
//! dot/underscore/dash separated tokens and each filter answers: does this
//! token set belong to the current run?
//!
//! Filter values may carry `*`/`?` limited-glob wildcards (`prod*`
//! accepts `prod` and `production`); they compile once into
//! case-insensitive anchored regex sets.

use regex::{Regex, RegexSet};

use crate::error::{LoadError, LoadResult};

/// Separators between tokens in a dot-env filename.
const SEPARATORS: &[char] = &['.', '_', '-'];

/// One dimension of filename acceptance.
///
/// `indicator` must appear among the tokens (default `"env"`). Then either
/// no token belongs to `all_values` (the file does not talk about this
/// dimension at all), or at least one token matches `cur_values`.
#[derive(Debug)]
pub struct EnvFilter {
    indicator: String,
    cur_values: RegexSet,
    all_values: RegexSet,
}

impl EnvFilter {
    /// Default filter: just the `env` indicator, no value dimension.
    pub fn indicator_only(indicator: &str) -> Self {
        EnvFilter {
            indicator: indicator.to_string(),
            cur_values: RegexSet::empty(),
            all_values: RegexSet::empty(),
        }
    }

    /// Build a filter from its current and known values.
    pub fn new<S: AsRef<str>>(
        indicator: &str,
        cur_values: &[S],
        all_values: &[S],
    ) -> LoadResult<Self> {
        Ok(EnvFilter {
            indicator: indicator.to_string(),
            cur_values: compile(cur_values)?,
            all_values: compile(all_values)?,
        })
    }

    /// Check a filename's token set against this filter.
    pub fn matches(&self, filename: &str) -> bool {
        let tokens = decompose(filename);
        self.matches_tokens(&tokens)
    }

    pub(crate) fn matches_tokens(&self, tokens: &[String]) -> bool {
        if !self.indicator.is_empty()
            && !tokens.iter().any(|t| t.eq_ignore_ascii_case(&self.indicator))
        {
            return false;
        }
        if tokens.iter().any(|t| self.cur_values.is_match(t)) {
            return true;
        }
        // Wildcard: the filename does not mention this dimension.
        !tokens.iter().any(|t| self.all_values.is_match(t))
    }

    /// Whether `token` belongs to this filter's vocabulary.
    pub(crate) fn knows(&self, token: &str) -> bool {
        token.eq_ignore_ascii_case(&self.indicator) || self.all_values.is_match(token)
    }
}

/// Break a filename into its separator-delimited tokens.
pub fn decompose(filename: &str) -> Vec<String> {
    filename
        .split(SEPARATORS)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Compile limited-glob values into an anchored, case-insensitive set.
fn compile<S: AsRef<str>>(values: &[S]) -> LoadResult<RegexSet> {
    let patterns: Vec<String> = values
        .iter()
        .map(|v| limited_glob_to_regex(v.as_ref().trim()))
        .collect();
    // Validate individually for a precise error before building the set.
    for (pattern, value) in patterns.iter().zip(values) {
        Regex::new(pattern).map_err(|source| LoadError::Pattern {
            value: value.as_ref().to_string(),
            source,
        })?;
    }
    RegexSet::new(&patterns).map_err(|source| LoadError::Pattern {
        value: values
            .iter()
            .map(|v| v.as_ref())
            .collect::<Vec<_>>()
            .join(","),
        source,
    })
}

/// Convert one limited-glob value into an anchored regex pattern:
/// `*` spans, `?` is one character, `{a,b}` groups alternatives,
/// everything else is literal.
fn limited_glob_to_regex(value: &str) -> String {
    let escaped = regex::escape(value)
        .replace(r"\*", ".*")
        .replace(r"\?", ".")
        .replace(r"\{", "(?:")
        .replace(r"\}", ")")
        .replace(',', "|");
    format!("(?i)^(?:{escaped})$")
}
