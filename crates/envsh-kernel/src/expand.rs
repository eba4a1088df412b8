//! The expansion engine.
//!
//! [`Expander`] owns one parse: it unquotes the value, picks the dialect
//! the value announces, and walks the content left to right emitting an
//! output buffer. The POSIX walk lives here; the `%NAME%` grammar is in
//! [`crate::symmetric`].
//!
//! Everything is position-based recursive descent over characters. Regex
//! cannot express the interactions between brace nesting, quoting, and
//! escapes that `${...}` requires.

use envsh_glob as glob;

use crate::dialect::Dialect;
use crate::error::{ExpandError, ExpandResult};
use crate::escape;
use crate::exec::{CommandRunner, ExecMode};
use crate::flags::ExpandFlags;
use crate::options::ExpandOptions;
use crate::quote::{self, ParseInfo, QuoteType};
use crate::symmetric;
use crate::vars::Vars;

/// Depth bound for nested expansion (words, command substitutions, quoted
/// regions). Pathological `${A:-${A:-...}}` inputs fail instead of
/// recursing without end.
pub const MAX_DEPTH: usize = 64;

/// A parameter reference inside `${...}`: a name or a 1-based argument.
enum Param {
    Named(String),
    Positional(usize),
}

/// The string expander.
///
/// Holds borrowed collaborators for a batch of `expand` calls: the
/// variable store, positional arguments, the caller pid for `$$`, and the
/// command runner for `$(...)`.
pub struct Expander<'a, V: Vars, R: CommandRunner> {
    vars: &'a mut V,
    runner: &'a R,
    args: &'a [String],
    pid: u32,
    flags: ExpandFlags,
    options: ExpandOptions,
}

impl<'a, V: Vars, R: CommandRunner> Expander<'a, V, R> {
    pub fn new(vars: &'a mut V, runner: &'a R) -> Self {
        Expander {
            vars,
            runner,
            args: &[],
            pid: 0,
            flags: ExpandFlags::default(),
            options: ExpandOptions::default(),
        }
    }

    /// Positional arguments for `$1`, `%1`, `%*`.
    pub fn args(mut self, args: &'a [String]) -> Self {
        self.args = args;
        self
    }

    /// The pid reported by `$$`.
    pub fn pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    pub fn flags(mut self, flags: ExpandFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn options(mut self, options: ExpandOptions) -> Self {
        self.options = options;
        self
    }

    /// Expand one value: unquote, detect the dialect from the evidence the
    /// scan collected, expand, and re-wrap quotes when they are kept.
    pub fn expand(&mut self, input: &str) -> ExpandResult<(String, ParseInfo)> {
        let cutters = if self.flags.remove_line_comment {
            self.options.cutter_chars.clone()
        } else {
            String::new()
        };
        let (_, mut info) = quote::unquote_with(input, &self.options, &cutters)?;
        let dialect = dialect_from_info(&info);
        let result = self.finish(&info, dialect)?;
        info.result = result.clone();
        Ok((result, info))
    }

    /// Expand one value under an externally detected dialect. The line
    /// processor detects per line and forces the result here.
    pub fn expand_value(
        &mut self,
        value: &str,
        dialect: Dialect,
    ) -> ExpandResult<(String, ParseInfo)> {
        let cutters = if self.flags.remove_line_comment {
            dialect.cutter_char.to_string()
        } else {
            String::new()
        };
        let (_, mut info) = quote::unquote_with(value, &self.options, &cutters)?;
        let result = self.finish(&info, dialect)?;
        info.result = result.clone();
        Ok((result, info))
    }

    fn finish(&mut self, info: &ParseInfo, dialect: Dialect) -> ExpandResult<String> {
        // Opaque single-quoted content uses the collapsed form; everything
        // going through an engine uses the raw span so escapes are
        // processed exactly once.
        let expanded = if info.quote_type == QuoteType::Single && self.flags.skip_single_quoted {
            info.result.clone()
        } else if dialect.is_symmetric() {
            symmetric::expand(
                &info.raw,
                dialect,
                &*self.vars,
                self.args,
                self.flags.skip_env_vars,
            )?
        } else {
            self.posix(&info.raw, dialect, info.quote_type == QuoteType::Double, 0)?
        };

        Ok(match (self.flags.remove_quotes, info.quote_type.symbol()) {
            (false, Some(q)) => format!("{q}{expanded}{q}"),
            _ => expanded,
        })
    }

    // ── POSIX walk ─────────────────────────────────────────────────────

    fn posix(
        &mut self,
        input: &str,
        dialect: Dialect,
        in_dquote: bool,
        depth: usize,
    ) -> ExpandResult<String> {
        if depth > MAX_DEPTH {
            return Err(ExpandError::RecursionLimitExceeded { limit: MAX_DEPTH });
        }

        let chars: Vec<char> = input.chars().collect();
        let mut out = String::with_capacity(chars.len());
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];

            if c == dialect.escape_char {
                i += self.escaped(&chars, i, dialect, &mut out)?;
                continue;
            }

            if c == '\'' && !in_dquote {
                i += self.single_region(&chars, i, input, dialect, depth, &mut out)?;
                continue;
            }

            if c == '"' && !in_dquote {
                let close = find_dquote_close(&chars, i + 1, dialect.escape_char)
                    .ok_or_else(|| ExpandError::UnterminatedQuote {
                        input: input.to_string(),
                    })?;
                let inner: String = chars[i + 1..close].iter().collect();
                out.push('"');
                out.push_str(&self.posix(&inner, dialect, true, depth + 1)?);
                out.push('"');
                i = close + 1;
                continue;
            }

            if c == dialect.expand_char {
                i += self.dollar(&chars, i, dialect, depth, &mut out)?;
                continue;
            }

            if c == '`' {
                let close = find_backtick_close(&chars, i + 1, dialect.escape_char)
                    .ok_or_else(|| ExpandError::BadSubstitution {
                        text: input[char_byte(input, i)..].to_string(),
                    })?;
                let inner: String = chars[i + 1..close].iter().collect();
                let original: String = chars[i..=close].iter().collect();
                out.push_str(&self.command_substitution(&inner, &original, dialect, depth)?);
                i = close + 1;
                continue;
            }

            out.push(c);
            i += 1;
        }

        Ok(out)
    }

    /// Escape character at `i`: metacharacters collapse to their literal
    /// selves, everything else goes through the codec or passes verbatim.
    fn escaped(
        &self,
        chars: &[char],
        i: usize,
        dialect: Dialect,
        out: &mut String,
    ) -> ExpandResult<usize> {
        let next = match chars.get(i + 1) {
            Some(&n) => n,
            None => {
                return Err(ExpandError::DanglingEscape {
                    input: chars.iter().collect(),
                    pos: i,
                })
            }
        };

        let meta = next == dialect.expand_char
            || next == dialect.escape_char
            || next == '`'
            || next == '\''
            || next == '"';
        if meta {
            out.push(next);
            return Ok(2);
        }

        if self.flags.unescape {
            let (decoded, consumed) = escape::decode_at(chars, i)?;
            out.push(decoded);
            Ok(consumed)
        } else {
            out.push(chars[i]);
            out.push(next);
            Ok(2)
        }
    }

    /// Single-quote region starting at `i`. Opaque under
    /// `skip_single_quoted`, otherwise expanded like ordinary text.
    fn single_region(
        &mut self,
        chars: &[char],
        i: usize,
        input: &str,
        dialect: Dialect,
        depth: usize,
        out: &mut String,
    ) -> ExpandResult<usize> {
        let hard = self.options.hard_quotes.contains('\'');
        let close = find_single_close(chars, i + 1, dialect.escape_char, hard).ok_or_else(|| {
            ExpandError::UnterminatedQuote {
                input: input.to_string(),
            }
        })?;
        let inner: String = chars[i + 1..close].iter().collect();

        out.push('\'');
        if self.flags.skip_single_quoted {
            out.push_str(&inner);
        } else {
            out.push_str(&self.posix(&inner, dialect, false, depth + 1)?);
        }
        out.push('\'');
        Ok(close + 1 - i)
    }

    /// One `$`-introduced form at `i`. Returns the consumed length.
    fn dollar(
        &mut self,
        chars: &[char],
        i: usize,
        dialect: Dialect,
        depth: usize,
        out: &mut String,
    ) -> ExpandResult<usize> {
        let next = match chars.get(i + 1) {
            Some(&n) => n,
            None => {
                out.push(dialect.expand_char);
                return Ok(1);
            }
        };

        match next {
            // $$ - the caller's pid.
            c if c == dialect.expand_char => {
                out.push_str(&self.pid.to_string());
                Ok(2)
            }

            '(' => {
                let close = find_paren_close(chars, i + 2, dialect.escape_char).ok_or_else(
                    || ExpandError::BadSubstitution {
                        text: chars[i..].iter().collect(),
                    },
                )?;
                let inner: String = chars[i + 2..close].iter().collect();
                let original: String = chars[i..=close].iter().collect();
                out.push_str(&self.command_substitution(&inner, &original, dialect, depth)?);
                Ok(close + 1 - i)
            }

            '{' => {
                let close = find_brace_close(chars, i + 2, dialect.escape_char).ok_or_else(
                    || ExpandError::BadSubstitution {
                        text: chars[i..].iter().collect(),
                    },
                )?;
                let body: String = chars[i + 2..close].iter().collect();
                let original: String = chars[i..=close].iter().collect();
                if self.flags.skip_env_vars {
                    out.push_str(&original);
                } else {
                    out.push_str(&self.parameter(&body, &original, dialect, depth)?);
                }
                Ok(close + 1 - i)
            }

            c if c.is_ascii_digit() => {
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_ascii_digit() {
                    j += 1;
                }
                let digits: String = chars[i + 1..j].iter().collect();
                match digits.parse::<usize>() {
                    Ok(n) if n >= 1 && n <= self.args.len() => out.push_str(&self.args[n - 1]),
                    // Out of range: the reference stays as written.
                    _ => {
                        out.push(dialect.expand_char);
                        out.push_str(&digits);
                    }
                }
                Ok(j - i)
            }

            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut j = i + 1;
                while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                    j += 1;
                }
                let name: String = chars[i + 1..j].iter().collect();
                if self.flags.skip_env_vars {
                    out.push(dialect.expand_char);
                    out.push_str(&name);
                } else {
                    match self.vars.get(&name) {
                        Some(value) => out.push_str(&value),
                        // Unknown bare references stay as written; only the
                        // braced form expands to empty.
                        None => {
                            out.push(dialect.expand_char);
                            out.push_str(&name);
                        }
                    }
                }
                Ok(j - i)
            }

            _ => {
                out.push(dialect.expand_char);
                Ok(1)
            }
        }
    }

    fn command_substitution(
        &mut self,
        raw_inner: &str,
        original: &str,
        dialect: Dialect,
        depth: usize,
    ) -> ExpandResult<String> {
        if !self.flags.substitution_enabled() {
            return Ok(original.to_string());
        }

        let command = self.posix(raw_inner, dialect, false, depth + 1)?;
        let mode = if self.flags.allow_shell {
            ExecMode::Shell
        } else {
            ExecMode::Argv
        };
        let captured = self
            .runner
            .execute(&command, mode, self.options.subprocess_timeout)?;
        if captured.code != 0 {
            return Err(ExpandError::SubprocessFailed {
                code: captured.code,
                stderr: captured.stderr,
            });
        }

        let mut output = captured.stdout;
        while output.ends_with('\n') || output.ends_with('\r') {
            output.pop();
        }
        Ok(output)
    }

    // ── ${...} parameter expansion ─────────────────────────────────────

    fn parameter(
        &mut self,
        body: &str,
        original: &str,
        dialect: Dialect,
        depth: usize,
    ) -> ExpandResult<String> {
        let chars: Vec<char> = body.chars().collect();
        if chars.is_empty() {
            return Err(bad(original));
        }

        // ${#NAME} - character length.
        if chars[0] == '#' {
            let param = parse_param(&chars[1..]).ok_or_else(|| bad(original))?;
            if param.1 != chars.len() - 1 {
                return Err(bad(original));
            }
            let len = self
                .resolve(&param.0)
                .map(|v| v.chars().count())
                .unwrap_or(0);
            return Ok(len.to_string());
        }

        let (param, name_len) = parse_param(&chars).ok_or_else(|| bad(original))?;
        let rest = &chars[name_len..];

        if rest.is_empty() {
            return Ok(match &param {
                Param::Named(_) => self.resolve(&param).unwrap_or_default(),
                Param::Positional(_) => self
                    .resolve(&param)
                    .unwrap_or_else(|| original.to_string()),
            });
        }

        match rest[0] {
            ':' => match rest.get(1).copied() {
                Some('-') => self.defaulted(&param, &rest[2..], true, dialect, depth),
                Some('=') => self.assigned(&param, &rest[2..], true, original, dialect, depth),
                Some('+') => self.alternated(&param, &rest[2..], true, dialect, depth),
                Some('?') => self.required(&param, &rest[2..], true, dialect, depth),
                Some(_) => self.substring_op(&param, &rest[1..], original),
                None => Err(bad(original)),
            },
            '-' => self.defaulted(&param, &rest[1..], false, dialect, depth),
            '=' => self.assigned(&param, &rest[1..], false, original, dialect, depth),
            '+' => self.alternated(&param, &rest[1..], false, dialect, depth),
            '?' => self.required(&param, &rest[1..], false, dialect, depth),
            '#' => {
                let (longest, pattern) = doubled(rest, '#');
                let value = self.resolve(&param).unwrap_or_default();
                let matched = if longest {
                    glob::prefix_longest(&pattern, &value)
                } else {
                    glob::prefix_shortest(&pattern, &value)
                };
                Ok(match matched {
                    Some(k) => value.chars().skip(k).collect(),
                    None => value,
                })
            }
            '%' => {
                let (longest, pattern) = doubled(rest, '%');
                let value = self.resolve(&param).unwrap_or_default();
                let matched = if longest {
                    glob::suffix_longest(&pattern, &value)
                } else {
                    glob::suffix_shortest(&pattern, &value)
                };
                Ok(match matched {
                    Some(k) => {
                        let keep = value.chars().count() - k;
                        value.chars().take(keep).collect()
                    }
                    None => value,
                })
            }
            '/' => self.substituted(&param, &rest[1..], dialect, depth),
            _ => Err(bad(original)),
        }
    }

    fn resolve(&self, param: &Param) -> Option<String> {
        match param {
            Param::Named(name) => self.vars.get(name),
            Param::Positional(n) => self.args.get(n - 1).cloned(),
        }
    }

    fn word(&mut self, word: &[char], dialect: Dialect, depth: usize) -> ExpandResult<String> {
        let text: String = word.iter().collect();
        self.posix(&text, dialect, false, depth + 1)
    }

    /// `${NAME:-W}` / `${NAME-W}`.
    fn defaulted(
        &mut self,
        param: &Param,
        word: &[char],
        null_sensitive: bool,
        dialect: Dialect,
        depth: usize,
    ) -> ExpandResult<String> {
        match self.resolve(param) {
            Some(value) if !(null_sensitive && value.is_empty()) => Ok(value),
            _ => self.word(word, dialect, depth),
        }
    }

    /// `${NAME:+W}` / `${NAME+W}`.
    fn alternated(
        &mut self,
        param: &Param,
        word: &[char],
        null_sensitive: bool,
        dialect: Dialect,
        depth: usize,
    ) -> ExpandResult<String> {
        match self.resolve(param) {
            Some(value) if !(null_sensitive && value.is_empty()) => {
                self.word(word, dialect, depth)
            }
            _ => Ok(String::new()),
        }
    }

    /// `${NAME:?M}` / `${NAME?M}`.
    fn required(
        &mut self,
        param: &Param,
        word: &[char],
        null_sensitive: bool,
        dialect: Dialect,
        depth: usize,
    ) -> ExpandResult<String> {
        match self.resolve(param) {
            Some(value) if !(null_sensitive && value.is_empty()) => Ok(value),
            state => {
                let message = if word.is_empty() {
                    if state.is_some() {
                        "parameter null".to_string()
                    } else {
                        "parameter not set".to_string()
                    }
                } else {
                    self.word(word, dialect, depth)?
                };
                Err(ExpandError::MissingVariable {
                    name: param_name(param),
                    message,
                })
            }
        }
    }

    /// `${NAME:=W}` / `${NAME=W}`.
    fn assigned(
        &mut self,
        param: &Param,
        word: &[char],
        null_sensitive: bool,
        original: &str,
        dialect: Dialect,
        depth: usize,
    ) -> ExpandResult<String> {
        match self.resolve(param) {
            Some(value) if !(null_sensitive && value.is_empty()) => Ok(value),
            _ => {
                let name = match param {
                    Param::Named(name) => name.clone(),
                    Param::Positional(_) => return Err(bad(original)),
                };
                let value = self.word(word, dialect, depth)?;
                self.vars.set(&name, &value);
                Ok(value)
            }
        }
    }

    /// `${NAME:off[:len]}`.
    fn substring_op(
        &mut self,
        param: &Param,
        spec: &[char],
        original: &str,
    ) -> ExpandResult<String> {
        let (off, len) = parse_substring_spec(spec).ok_or_else(|| bad(original))?;
        let value = self.resolve(param).unwrap_or_default();
        Ok(substring(&value, off, len))
    }

    /// The `${NAME/...}` family. `spec` starts after the first `/`.
    fn substituted(
        &mut self,
        param: &Param,
        spec: &[char],
        dialect: Dialect,
        depth: usize,
    ) -> ExpandResult<String> {
        let mut idx = 0;
        let global = spec.first() == Some(&'/');
        if global {
            idx += 1;
        }
        let anchor = match spec.get(idx).copied() {
            Some('#') => {
                idx += 1;
                Some(Anchor::Prefix)
            }
            Some('%') => {
                idx += 1;
                Some(Anchor::Suffix)
            }
            _ => None,
        };

        let (pattern_raw, replacement_raw) =
            split_pattern(&spec[idx..], dialect.escape_char);
        let pattern = literalize_pattern(&pattern_raw, dialect.escape_char);
        let replacement = self.word(&replacement_raw, dialect, depth)?;
        let value = self.resolve(param).unwrap_or_default();

        Ok(match (global, anchor) {
            (false, None) => replace_first(&value, &pattern, &replacement),
            (true, None) => replace_all(&value, &pattern, &replacement),
            (false, Some(Anchor::Prefix)) => anchored_prefix(&value, &pattern, &replacement),
            (false, Some(Anchor::Suffix)) => anchored_suffix(&value, &pattern, &replacement),
            (true, Some(anchor)) => iterate_anchored(&value, &pattern, &replacement, anchor),
        })
    }
}

// ── free helpers ───────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq)]
enum Anchor {
    Prefix,
    Suffix,
}

fn bad(original: &str) -> ExpandError {
    ExpandError::BadSubstitution {
        text: original.to_string(),
    }
}

fn param_name(param: &Param) -> String {
    match param {
        Param::Named(name) => name.clone(),
        Param::Positional(n) => n.to_string(),
    }
}

fn dialect_from_info(info: &ParseInfo) -> Dialect {
    let expand_char = info.expand_char.unwrap_or('$');
    Dialect {
        expand_char,
        escape_char: info
            .escape_char
            .unwrap_or(if expand_char == '%' { '^' } else { '\\' }),
        cutter_char: info
            .cutter_char
            .unwrap_or(if expand_char == '%' { ';' } else { '#' }),
    }
}

/// Parse a parameter reference at the front of `chars`: an identifier or a
/// run of digits. Returns the reference and its length.
fn parse_param(chars: &[char]) -> Option<(Param, usize)> {
    let first = *chars.first()?;
    if first.is_ascii_digit() {
        let mut j = 1;
        while j < chars.len() && chars[j].is_ascii_digit() {
            j += 1;
        }
        let digits: String = chars[..j].iter().collect();
        let n = digits.parse::<usize>().ok()?;
        if n == 0 {
            return None;
        }
        return Some((Param::Positional(n), j));
    }
    if first.is_ascii_alphabetic() || first == '_' {
        let mut j = 1;
        while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
            j += 1;
        }
        let name: String = chars[..j].iter().collect();
        return Some((Param::Named(name), j));
    }
    None
}

/// Detect `##`/`%%` doubling; returns (longest, pattern text).
fn doubled(rest: &[char], op: char) -> (bool, String) {
    if rest.get(1) == Some(&op) {
        (true, rest[2..].iter().collect())
    } else {
        (false, rest[1..].iter().collect())
    }
}

/// Split `P/R` on the first unescaped `/`. Missing `/R` means an empty
/// replacement.
fn split_pattern(spec: &[char], escape: char) -> (Vec<char>, Vec<char>) {
    let mut i = 0;
    while i < spec.len() {
        if spec[i] == escape {
            i += 2;
            continue;
        }
        if spec[i] == '/' {
            return (spec[..i].to_vec(), spec[i + 1..].to_vec());
        }
        i += 1;
    }
    (spec.to_vec(), Vec::new())
}

/// Collapse escapes in pattern text. The glob grammar has no escapes, so
/// an escaped metacharacter becomes a single-member class and everything
/// else becomes the plain character.
fn literalize_pattern(pattern: &[char], escape: char) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut i = 0;
    while i < pattern.len() {
        if pattern[i] == escape {
            match pattern.get(i + 1) {
                Some(&c) if matches!(c, '*' | '?' | '[') => {
                    out.push('[');
                    out.push(c);
                    out.push(']');
                    i += 2;
                }
                Some(&c) => {
                    out.push(c);
                    i += 2;
                }
                None => {
                    out.push(escape);
                    i += 1;
                }
            }
        } else {
            out.push(pattern[i]);
            i += 1;
        }
    }
    out
}

/// Parse `off[:len]` with optional blanks and signs.
fn parse_substring_spec(spec: &[char]) -> Option<(i64, Option<i64>)> {
    let text: String = spec.iter().collect();
    let mut parts = text.splitn(2, ':');
    let off = parts.next()?.trim().parse::<i64>().ok()?;
    let len = match parts.next() {
        Some(len) => Some(len.trim().parse::<i64>().ok()?),
        None => None,
    };
    Some((off, len))
}

/// Character-based substring with negative offsets counting from the end
/// and negative lengths stopping short of the end. Out of range clamps.
pub(crate) fn substring(value: &str, off: i64, len: Option<i64>) -> String {
    let n = value.chars().count() as i64;
    let start = if off < 0 {
        (n + off).max(0)
    } else {
        off.min(n)
    };
    let end = match len {
        None => n,
        Some(l) if l >= 0 => (start + l).min(n),
        Some(l) => (n + l).max(start),
    };
    value
        .chars()
        .skip(start as usize)
        .take((end - start) as usize)
        .collect()
}

/// `${V/P/R}`: earliest position, longest match there.
fn replace_first(value: &str, pattern: &str, replacement: &str) -> String {
    if pattern.is_empty() {
        return format!("{replacement}{value}");
    }
    let chars: Vec<char> = value.chars().collect();
    for i in 0..=chars.len() {
        let tail: String = chars[i..].iter().collect();
        if let Some(k) = glob::prefix_longest(pattern, &tail) {
            let head: String = chars[..i].iter().collect();
            let rest: String = chars[i + k..].iter().collect();
            return format!("{head}{replacement}{rest}");
        }
    }
    value.to_string()
}

/// `${V//P/R}`. The empty pattern inserts the replacement between every
/// character position and at both ends.
fn replace_all(value: &str, pattern: &str, replacement: &str) -> String {
    if pattern.is_empty() {
        let mut out = String::from(replacement);
        for c in value.chars() {
            out.push(c);
            out.push_str(replacement);
        }
        return out;
    }

    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());
    let mut i = 0;
    while i < chars.len() {
        let tail: String = chars[i..].iter().collect();
        match glob::prefix_longest(pattern, &tail) {
            Some(k) if k > 0 => {
                out.push_str(replacement);
                i += k;
            }
            _ => {
                out.push(chars[i]);
                i += 1;
            }
        }
    }
    out
}

/// `${V/#P/R}`. The anchored match is the shortest one, so a greedy
/// pattern like `a*` replaces only what it must. An empty pattern
/// prepends the replacement.
fn anchored_prefix(value: &str, pattern: &str, replacement: &str) -> String {
    match glob::prefix_shortest(pattern, value) {
        Some(k) => {
            let rest: String = value.chars().skip(k).collect();
            format!("{replacement}{rest}")
        }
        None => value.to_string(),
    }
}

/// `${V/%P/R}`. Shortest anchored match, symmetric to [`anchored_prefix`].
/// An empty pattern appends the replacement.
fn anchored_suffix(value: &str, pattern: &str, replacement: &str) -> String {
    match glob::suffix_shortest(pattern, value) {
        Some(k) => {
            let keep = value.chars().count() - k;
            let head: String = value.chars().take(keep).collect();
            format!("{head}{replacement}")
        }
        None => value.to_string(),
    }
}

/// `${V//#P/R}` / `${V//%P/R}`: apply the anchored form until the pattern
/// stops matching or the value stops changing. The empty pattern is a
/// no-op. Iterations are capped by the starting length so a replacement
/// that regrows the pattern cannot loop forever.
fn iterate_anchored(value: &str, pattern: &str, replacement: &str, anchor: Anchor) -> String {
    if pattern.is_empty() {
        return value.to_string();
    }

    let mut current = value.to_string();
    let max_rounds = value.chars().count() + 1;
    for _ in 0..max_rounds {
        let matched = match anchor {
            Anchor::Prefix => glob::prefix_shortest(pattern, &current),
            Anchor::Suffix => glob::suffix_shortest(pattern, &current),
        };
        let k = match matched {
            Some(k) if k > 0 => k,
            _ => break,
        };
        let next = match anchor {
            Anchor::Prefix => {
                let rest: String = current.chars().skip(k).collect();
                format!("{replacement}{rest}")
            }
            Anchor::Suffix => {
                let keep = current.chars().count() - k;
                let head: String = current.chars().take(keep).collect();
                format!("{head}{replacement}")
            }
        };
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Byte offset of character index `i` in `s`.
fn char_byte(s: &str, i: usize) -> usize {
    s.char_indices()
        .nth(i)
        .map(|(pos, _)| pos)
        .unwrap_or(s.len())
}

/// Find the matching `}` from `start` (right after `${`), honoring nested
/// braces, quoted regions, and escapes.
fn find_brace_close(chars: &[char], start: usize, escape: char) -> Option<usize> {
    let mut depth = 1;
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        if c == escape {
            i += 2;
            continue;
        }
        match c {
            '\'' => {
                i = 1 + find_from(chars, i + 1, '\'')?;
                continue;
            }
            '"' => {
                i = 1 + find_dquote_close(chars, i + 1, escape)?;
                continue;
            }
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Find the matching `)` from `start` (right after `$(`).
fn find_paren_close(chars: &[char], start: usize, escape: char) -> Option<usize> {
    let mut depth = 1;
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        if c == escape {
            i += 2;
            continue;
        }
        match c {
            '\'' => {
                i = 1 + find_from(chars, i + 1, '\'')?;
                continue;
            }
            '"' => {
                i = 1 + find_dquote_close(chars, i + 1, escape)?;
                continue;
            }
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn find_dquote_close(chars: &[char], start: usize, escape: char) -> Option<usize> {
    let mut i = start;
    while i < chars.len() {
        if chars[i] == escape {
            i += 2;
            continue;
        }
        if chars[i] == '"' {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn find_single_close(chars: &[char], start: usize, escape: char, hard: bool) -> Option<usize> {
    let mut i = start;
    while i < chars.len() {
        if hard && chars[i] == escape {
            i += 2;
            continue;
        }
        if chars[i] == '\'' {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn find_backtick_close(chars: &[char], start: usize, escape: char) -> Option<usize> {
    let mut i = start;
    while i < chars.len() {
        if chars[i] == escape {
            i += 2;
            continue;
        }
        if chars[i] == '`' {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn find_from(chars: &[char], start: usize, needle: char) -> Option<usize> {
    chars[start..]
        .iter()
        .position(|&c| c == needle)
        .map(|off| start + off)
}
