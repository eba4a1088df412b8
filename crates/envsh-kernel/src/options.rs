//! Tunable parser characters and limits.

use std::time::Duration;

/// Candidate metacharacters and knobs for parsing a value.
///
/// The defaults understand both dialects at once: a value may announce
/// itself as POSIX (`$`/`\`), PowerShell-escaped (`$`/`` ` ``), or
/// symmetric (`%`/`^`); whichever candidate occurs first wins, see
/// [`crate::dialect::detect`].
#[derive(Debug, Clone)]
pub struct ExpandOptions {
    /// Candidate escape characters; the first unescaped, unquoted
    /// occurrence selects the line's escape character.
    pub escape_chars: String,
    /// Candidate expansion markers; first occurrence wins.
    pub expand_chars: String,
    /// Candidate line-comment markers; first unquoted occurrence wins.
    pub cutter_chars: String,
    /// Quote characters whose escape sequences stay honored inside the
    /// matching quote, so the quote itself can be embedded by escaping it.
    pub hard_quotes: String,
    /// Trim outer whitespace before quote detection.
    pub strip_spaces: bool,
    /// Deadline for command substitutions. `None` means unbounded.
    pub subprocess_timeout: Option<Duration>,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        ExpandOptions {
            escape_chars: "\\`^".to_string(),
            expand_chars: "$%".to_string(),
            cutter_chars: "#;".to_string(),
            hard_quotes: "'".to_string(),
            strip_spaces: true,
            subprocess_timeout: None,
        }
    }
}
