//! The loader: read discovered files, process `KEY = VALUE` lines, apply
//! them to an injected variable store.
//!
//! Each line detects its own dialect, so one file may mix POSIX and
//! symmetric syntax. Malformed lines are skipped with a debug log;
//! expansion failures abort the call and leave earlier lines applied.

use std::path::{Path, PathBuf};

use envsh_kernel::{
    detect, CommandRunner, Dialect, ExpandFlags, ExpandOptions, Expander, FileFlags,
    SystemRunner, Vars,
};
use tracing::{debug, warn};

use crate::discover::{discover, mark_loaded};
use crate::error::{LoadError, LoadResult};
use crate::filter::EnvFilter;

/// What processing one line did to the variable store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Blank, comment-only, or not an assignment.
    Skipped,
    /// `KEY=VALUE` applied.
    Set { key: String, value: String },
    /// `KEY=` with an empty raw value unsets the key.
    Removed { key: String },
}

/// Loads layered dot-env files into a variable store.
pub struct Loader<R: CommandRunner = SystemRunner> {
    indicator: String,
    platform_id: String,
    pid: u32,
    args: Vec<String>,
    file_flags: FileFlags,
    expand_flags: ExpandFlags,
    options: ExpandOptions,
    filters: Vec<EnvFilter>,
    custom: Option<PathBuf>,
    runner: R,
}

impl Loader<SystemRunner> {
    pub fn new() -> Self {
        Loader {
            indicator: "env".to_string(),
            platform_id: std::env::consts::OS.to_string(),
            pid: std::process::id(),
            args: Vec::new(),
            file_flags: FileFlags::default(),
            expand_flags: ExpandFlags::default(),
            options: ExpandOptions::default(),
            filters: Vec::new(),
            custom: None,
            runner: SystemRunner,
        }
    }
}

impl Default for Loader<SystemRunner> {
    fn default() -> Self {
        Loader::new()
    }
}

impl<R: CommandRunner> Loader<R> {
    /// Required filename token, default `env`.
    pub fn indicator(mut self, indicator: &str) -> Self {
        self.indicator = indicator.to_string();
        self
    }

    /// Platform identity used for file selection, default the compile-time
    /// OS name.
    pub fn platform_id(mut self, platform_id: &str) -> Self {
        self.platform_id = platform_id.to_string();
        self
    }

    /// Positional arguments available to `$1` and `%1`.
    pub fn args<S: Into<String>>(mut self, args: impl IntoIterator<Item = S>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Pid reported by `$$`, default the current process.
    pub fn pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    pub fn file_flags(mut self, flags: FileFlags) -> Self {
        self.file_flags = flags;
        self
    }

    pub fn expand_flags(mut self, flags: ExpandFlags) -> Self {
        self.expand_flags = flags;
        self
    }

    pub fn options(mut self, options: ExpandOptions) -> Self {
        self.options = options;
        self
    }

    /// Add a selection dimension.
    pub fn filter(mut self, filter: EnvFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// A file loaded last whether or not it matches any filter. Read
    /// errors on this file propagate instead of being skipped.
    pub fn custom(mut self, path: impl Into<PathBuf>) -> Self {
        self.custom = Some(path.into());
        self
    }

    /// Swap the command runner used for `$(...)` substitutions.
    pub fn runner<R2: CommandRunner>(self, runner: R2) -> Loader<R2> {
        Loader {
            indicator: self.indicator,
            platform_id: self.platform_id,
            pid: self.pid,
            args: self.args,
            file_flags: self.file_flags,
            expand_flags: self.expand_flags,
            options: self.options,
            filters: self.filters,
            custom: self.custom,
            runner,
        }
    }

    /// Discover, read, and apply every eligible file under `dir`.
    /// Returns the concatenated text that was processed.
    pub fn load<V: Vars>(&self, dir: &Path, vars: &mut V) -> LoadResult<String> {
        let files = discover(
            dir,
            &self.indicator,
            &self.platform_id,
            self.file_flags,
            &self.filters,
            self.custom.as_deref(),
        )?;
        let text = self.read_concat(&files)?;
        self.load_from_str(&text, vars)?;
        Ok(text)
    }

    /// Read every file into one buffer, newline separated. Files already
    /// in the accumulator are skipped; unreadable optional files are
    /// logged and skipped; the custom file's errors propagate.
    pub fn read_concat(&self, files: &[PathBuf]) -> LoadResult<String> {
        let mut parts: Vec<String> = Vec::with_capacity(files.len());
        for file in files {
            if !mark_loaded(file) {
                debug!(path = %file.display(), "already loaded, skipping");
                continue;
            }
            match std::fs::read_to_string(file) {
                Ok(text) => parts.push(strip_bom(&text).to_string()),
                Err(source) => {
                    if self.custom.as_deref() == Some(file.as_path()) {
                        return Err(LoadError::FileRead {
                            path: file.clone(),
                            source,
                        });
                    }
                    warn!(path = %file.display(), error = %source, "skipping unreadable dot-env file");
                }
            }
        }
        Ok(parts.join("\n"))
    }

    /// Apply `KEY = VALUE` lines from a string.
    pub fn load_from_str<V: Vars>(&self, text: &str, vars: &mut V) -> LoadResult<()> {
        let text = strip_bom(text);
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        for line in normalized.split('\n') {
            match self.apply_line(line, vars) {
                Ok(LineOutcome::Skipped) => {}
                Ok(LineOutcome::Set { key, .. }) => debug!(%key, "set"),
                Ok(LineOutcome::Removed { key }) => debug!(%key, "removed"),
                Err(LoadError::InvalidKey { key, line }) => {
                    debug!(%key, %line, "skipping line with invalid key");
                }
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }

    /// Process exactly one line. Strict: a bad key is an error here; the
    /// multi-line loader downgrades it to a logged skip.
    pub fn apply_line<V: Vars>(&self, line: &str, vars: &mut V) -> LoadResult<LineOutcome> {
        let dialect = detect(line, &self.options);

        let cut;
        let line = if self.expand_flags.remove_line_comment {
            cut = cut_comment(line, dialect, &self.options);
            cut.as_str()
        } else {
            line
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(LineOutcome::Skipped);
        }

        let Some((key_raw, value_raw)) = split_assignment(trimmed, dialect) else {
            debug!(%trimmed, "no assignment on line, skipping");
            return Ok(LineOutcome::Skipped);
        };

        let key = key_raw.trim();
        if !is_valid_key(key) {
            return Err(LoadError::InvalidKey {
                key: key.to_string(),
                line: trimmed.to_string(),
            });
        }

        if value_raw.trim().is_empty() {
            vars.remove(key);
            return Ok(LineOutcome::Removed {
                key: key.to_string(),
            });
        }

        let mut expander = Expander::new(vars, &self.runner)
            .args(&self.args)
            .pid(self.pid)
            .flags(self.expand_flags)
            .options(self.options.clone());
        let (value, _info) = expander.expand_value(value_raw, dialect)?;

        vars.set(key, &value);
        Ok(LineOutcome::Set {
            key: key.to_string(),
            value,
        })
    }
}

fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

/// `[A-Za-z_][A-Za-z0-9_]*`.
fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Truncate at the first unquoted, unescaped comment marker. Whitespace
/// before the marker is preserved; the line processor trims afterwards.
fn cut_comment(line: &str, dialect: Dialect, options: &ExpandOptions) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut quote: Option<char> = None;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if quote != Some('\'') && c == dialect.escape_char {
            i += 2;
            continue;
        }
        match quote {
            Some(q) if c == q => quote = None,
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == dialect.cutter_char || options.cutter_chars.contains(c) => {
                return chars[..i].iter().collect();
            }
            _ => {}
        }
        i += 1;
    }
    line.to_string()
}

/// Split on the first `=` outside quotes. Returns `(key, value)` slices.
fn split_assignment(line: &str, dialect: Dialect) -> Option<(&str, &str)> {
    let mut quote: Option<char> = None;
    let mut skip_next = false;
    for (pos, c) in line.char_indices() {
        if skip_next {
            skip_next = false;
            continue;
        }
        if quote != Some('\'') && c == dialect.escape_char {
            skip_next = true;
            continue;
        }
        match quote {
            Some(q) if c == q => quote = None,
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '=' => {
                return Some((&line[..pos], &line[pos + c.len_utf8()..]));
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn loader() -> Loader {
        Loader::new().expand_flags(ExpandFlags {
            allow_shell: false,
            remove_line_comment: true,
            ..ExpandFlags::default()
        })
    }

    fn apply(text: &str) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        loader().load_from_str(text, &mut vars).unwrap();
        vars
    }

    #[test]
    fn simple_assignments() {
        let vars = apply("A=1\nB = two \nC=\"three three\"\n");
        assert_eq!(vars["A"], "1");
        assert_eq!(vars["B"], "two");
        assert_eq!(vars["C"], "three three");
    }

    #[test]
    fn later_lines_override() {
        let vars = apply("A=1\nA=2\n");
        assert_eq!(vars["A"], "2");
    }

    #[test]
    fn values_reference_earlier_keys() {
        let vars = apply("ROOT=/srv\nDATA=${ROOT}/data\n");
        assert_eq!(vars["DATA"], "/srv/data");
    }

    #[test]
    fn comments_and_blanks_are_skipped() {
        let vars = apply("# heading\n\nA=1 # trailing note\n   \n");
        assert_eq!(vars.len(), 1);
        assert_eq!(vars["A"], "1");
    }

    #[test]
    fn comment_marker_inside_quotes_stays() {
        let vars = apply("A=\"x # y\"\nB='p # q'\n");
        assert_eq!(vars["A"], "x # y");
        assert_eq!(vars["B"], "p # q");
    }

    #[test]
    fn empty_raw_value_removes_the_key() {
        let mut vars = HashMap::new();
        vars.insert("A".to_string(), "old".to_string());
        loader().load_from_str("A=\n", &mut vars).unwrap();
        assert!(!vars.contains_key("A"));
        // An empty quoted value is a set, not a removal.
        loader().load_from_str("A=\"\"\n", &mut vars).unwrap();
        assert_eq!(vars["A"], "");
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let vars = apply("not an assignment\n9BAD=1\n=nokey\nGOOD=yes\n");
        assert_eq!(vars.len(), 1);
        assert_eq!(vars["GOOD"], "yes");
    }

    #[test]
    fn invalid_key_is_strict_in_apply_line() {
        let mut vars: HashMap<String, String> = HashMap::new();
        let err = loader().apply_line("9BAD=1", &mut vars).unwrap_err();
        assert!(matches!(err, LoadError::InvalidKey { .. }));
    }

    #[test]
    fn single_quoted_values_stay_opaque() {
        let vars = apply("HOME=/u/a\nRAW='$HOME'\nREF=\"$HOME\"\n");
        assert_eq!(vars["RAW"], "$HOME");
        assert_eq!(vars["REF"], "/u/a");
    }

    #[test]
    fn dialects_mix_per_line() {
        let vars = apply("USER=root\nPOSIX=$USER\nSYM=%USER%-x\n");
        assert_eq!(vars["POSIX"], "root");
        assert_eq!(vars["SYM"], "root-x");
    }

    #[test]
    fn symmetric_lines_use_semicolon_comments() {
        let vars = apply("A=%B% ; note\n");
        // B is unset so the reference stays, but the comment is gone.
        assert_eq!(vars["A"], "%B%");
    }

    #[test]
    fn crlf_and_bom_are_handled() {
        let vars = apply("\u{feff}A=1\r\nB=2\r\n");
        assert_eq!(vars["A"], "1");
        assert_eq!(vars["B"], "2");
    }

    #[test]
    fn expansion_failure_keeps_earlier_lines() {
        let mut vars = HashMap::new();
        let err = loader()
            .load_from_str("A=1\nB=${MISSING:?stop}\nC=3\n", &mut vars)
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::Expand(envsh_kernel::ExpandError::MissingVariable { .. })
        ));
        assert_eq!(vars["A"], "1");
        assert!(!vars.contains_key("C"));
    }

    #[test]
    fn escaped_equals_in_key_position() {
        // No unescaped '=' anywhere: the line is skipped.
        let vars = apply(r"A\=1");
        assert!(vars.is_empty());
    }

    #[test]
    fn positional_args_reach_values() {
        let mut vars = HashMap::new();
        let loader = loader().args(["app"]);
        loader.load_from_str("FIRST=$1\n", &mut vars).unwrap();
        assert_eq!(vars["FIRST"], "app");
    }
}
