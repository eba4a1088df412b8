//! Quote removal and addition.
//!
//! `unquote` is the front door of every value parse: it strips the outer
//! quotes, records which metacharacters the value actually uses (the
//! dialect evidence), and optionally cuts a trailing line comment. The
//! content it returns still carries its escape sequences; only the escapes
//! that protect quoting structure (`\"`, `\'`, `\\`, escaped escape
//! candidates) are collapsed, so that `unquote(quote(s, t)) == (s, t)`.

use crate::error::{ExpandError, ExpandResult};
use crate::options::ExpandOptions;

/// Escape candidates that [`quote`] protects, mirroring
/// [`ExpandOptions::default`].
const DEFAULT_ESCAPE_CHARS: &str = "\\`^";

/// Kind of enclosing quotes found on a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteType {
    /// No leading quote.
    #[default]
    None = 0,
    /// Single-quoted.
    Single = 1,
    /// Double-quoted.
    Double = 2,
}

impl QuoteType {
    /// The quote character itself, if any.
    pub fn symbol(&self) -> Option<char> {
        match self {
            QuoteType::None => None,
            QuoteType::Single => Some('\''),
            QuoteType::Double => Some('"'),
        }
    }
}

/// What one parse of a value found.
#[derive(Debug, Clone, Default)]
pub struct ParseInfo {
    /// The string that was analyzed.
    pub input: String,
    /// The processed text: unquoted content, later overwritten with the
    /// expansion result.
    pub result: String,
    /// Content between the quotes before the quoting escapes (`\"`, `\'`,
    /// escaped escape characters) were collapsed. This is what the
    /// expansion engine consumes, so escapes are processed exactly once.
    pub raw: String,
    /// First active expansion marker encountered (`$` or `%`).
    pub expand_char: Option<char>,
    /// First active escape character encountered (`\`, `` ` `` or `^`).
    pub escape_char: Option<char>,
    /// First unquoted comment marker encountered (`#` or `;`).
    pub cutter_char: Option<char>,
    /// Type of enclosing quotes.
    pub quote_type: QuoteType,
    /// True when a comment marker truncated the content. Trailing
    /// whitespace before the marker is preserved in `result`.
    pub cut: bool,
}

/// Remove enclosing quotes, ignoring everything beyond the closing quote.
///
/// See [`unquote_with`]; this variant never cuts line comments.
pub fn unquote(input: &str, options: &ExpandOptions) -> ExpandResult<(String, ParseInfo)> {
    unquote_with(input, options, "")
}

/// Remove enclosing quotes and record parse evidence.
///
/// - A leading `'` or `"` (after the optional space strip) opens a quoted
///   region; content runs to the matching close and the rest is discarded.
/// - Escapes are honored while looking for the closing quote; for single
///   quotes only when `'` is listed in `options.hard_quotes`.
/// - With no enclosing quote the whole input is content; interior quoted
///   regions are still tracked so that metacharacter evidence and comment
///   markers inside them are classified correctly.
/// - `cutters` is the set of comment markers to cut at; pass `""` to keep
///   comments.
pub fn unquote_with(
    input: &str,
    options: &ExpandOptions,
    cutters: &str,
) -> ExpandResult<(String, ParseInfo)> {
    let mut info = ParseInfo {
        input: input.to_string(),
        ..ParseInfo::default()
    };

    let work = if options.strip_spaces {
        input.trim_start()
    } else {
        input
    };
    let chars: Vec<char> = work.chars().collect();
    if chars.is_empty() {
        return Ok((String::new(), info));
    }

    info.quote_type = match chars[0] {
        '"' => QuoteType::Double,
        '\'' => QuoteType::Single,
        _ => QuoteType::None,
    };
    let outer = info.quote_type.symbol();

    // Whether escape characters mean anything in the outer quoted region.
    let outer_escapes = match info.quote_type {
        QuoteType::None | QuoteType::Double => true,
        QuoteType::Single => options.hard_quotes.contains('\''),
    };

    let mut out = String::with_capacity(chars.len());
    let mut raw = String::with_capacity(chars.len());
    // First escape candidate wins; later candidates are plain content.
    let mut active_escape: Option<char> = None;
    let mut escaped = false;
    let mut escape_at = 0usize;
    // Interior quote region, only meaningful when the outer kind is None.
    let mut interior: Option<char> = None;
    let mut closed = outer.is_none();

    let start = if outer.is_some() { 1 } else { 0 };
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        let in_single =
            outer == Some('\'') || interior == Some('\'');

        if escaped {
            raw.push(c);
            // Inside the outer quotes the escapes protecting quoting
            // structure collapse; everything else stays verbatim for the
            // expansion engine.
            if outer.is_some() {
                if Some(c) == outer || options.escape_chars.contains(c) {
                    out.push(c);
                } else {
                    out.push(active_escape.unwrap_or('\\'));
                    out.push(c);
                }
            } else {
                // The marker itself is already in `out`.
                out.push(c);
            }
            escaped = false;
            i += 1;
            continue;
        }

        let escapes_here = if interior == Some('\'') {
            options.hard_quotes.contains('\'')
        } else if interior == Some('"') {
            true
        } else {
            outer_escapes
        };
        let is_marker = escapes_here
            && !in_single_opaque(in_single, &options.hard_quotes)
            && (active_escape == Some(c)
                || (active_escape.is_none() && options.escape_chars.contains(c)));
        if is_marker {
            if active_escape.is_none() {
                active_escape = Some(c);
                info.escape_char = Some(c);
            }
            escaped = true;
            escape_at = i;
            raw.push(c);
            if outer.is_none() {
                out.push(c);
            }
            i += 1;
            continue;
        }

        // Closing quote of the outer region ends the scan.
        if outer == Some(c) {
            closed = true;
            break;
        }

        // Interior regions only exist when there is no outer quote.
        if outer.is_none() && (c == '\'' || c == '"') {
            interior = match interior {
                None => Some(c),
                Some(q) if q == c => None,
                other => other,
            };
            out.push(c);
            raw.push(c);
            i += 1;
            continue;
        }

        if !in_single && info.expand_char.is_none() && options.expand_chars.contains(c) {
            info.expand_char = Some(c);
        }

        if outer.is_none() && interior.is_none() && cutters.contains(c) {
            info.cutter_char = Some(c);
            info.cut = true;
            break;
        }

        out.push(c);
        raw.push(c);
        i += 1;
    }

    if escaped {
        return Err(ExpandError::DanglingEscape {
            input: input.to_string(),
            pos: escape_at,
        });
    }
    if !closed {
        return Err(ExpandError::UnterminatedQuote {
            input: input.to_string(),
        });
    }

    // Unquoted input loses its trailing spaces too, unless a comment cut
    // already decided where the content ends.
    if info.quote_type == QuoteType::None && options.strip_spaces && !info.cut {
        out.truncate(out.trim_end().len());
        raw = out.clone();
    }

    info.result = out.clone();
    info.raw = raw;
    Ok((out, info))
}

/// A single-quoted region with `'` outside `hard_quotes` is fully opaque:
/// nothing inside it is a marker of any kind.
fn in_single_opaque(in_single: bool, hard_quotes: &str) -> bool {
    in_single && !hard_quotes.contains('\'')
}

/// Enclose `input` in quotes, escaping interior occurrences of the quote,
/// the escape character, and the default escape candidates so that
/// [`unquote`] restores the input exactly.
pub fn quote(input: &str, quote_type: QuoteType, escape: char) -> String {
    let q = match quote_type.symbol() {
        Some(q) => q,
        None => return input.to_string(),
    };

    let mut out = String::with_capacity(input.len() + 2);
    out.push(q);
    for c in input.chars() {
        if c == q || c == escape || DEFAULT_ESCAPE_CHARS.contains(c) {
            out.push(escape);
        }
        out.push(c);
    }
    out.push(q);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn opts() -> ExpandOptions {
        ExpandOptions::default()
    }

    #[test]
    fn bare_text_passes_through() {
        let (content, info) = unquote("plain value", &opts()).unwrap();
        assert_eq!(content, "plain value");
        assert_eq!(info.quote_type, QuoteType::None);
        assert!(info.expand_char.is_none());
    }

    #[test]
    fn outer_spaces_are_stripped() {
        let (content, info) = unquote("  abc  ", &opts()).unwrap();
        assert_eq!(content, "abc");
        assert_eq!(info.quote_type, QuoteType::None);
    }

    #[test]
    fn double_quotes_are_removed() {
        let (content, info) = unquote("  \"a b\"  tail", &opts()).unwrap();
        assert_eq!(content, "a b");
        assert_eq!(info.quote_type, QuoteType::Double);
    }

    #[test]
    fn single_quotes_are_removed() {
        let (content, info) = unquote("'$HOME'", &opts()).unwrap();
        assert_eq!(content, "$HOME");
        assert_eq!(info.quote_type, QuoteType::Single);
        // Content of a single-quoted value yields no dialect evidence.
        assert!(info.expand_char.is_none());
    }

    #[test]
    fn escaped_quote_does_not_close() {
        let (content, _) = unquote(r#""a \" b""#, &opts()).unwrap();
        assert_eq!(content, "a \" b");
    }

    #[test]
    fn unterminated_quote_fails() {
        assert!(matches!(
            unquote("\"abc", &opts()),
            Err(ExpandError::UnterminatedQuote { .. })
        ));
        assert!(matches!(
            unquote("'abc", &opts()),
            Err(ExpandError::UnterminatedQuote { .. })
        ));
    }

    #[test]
    fn dangling_escape_fails() {
        assert!(matches!(
            unquote("abc\\", &opts()),
            Err(ExpandError::DanglingEscape { .. })
        ));
    }

    #[test]
    fn expand_char_detection() {
        let (_, info) = unquote("a $HOME b", &opts()).unwrap();
        assert_eq!(info.expand_char, Some('$'));

        let (_, info) = unquote("a %PATH% b", &opts()).unwrap();
        assert_eq!(info.expand_char, Some('%'));

        // Escaped markers are not evidence.
        let (_, info) = unquote(r"a \$HOME", &opts()).unwrap();
        assert_eq!(info.expand_char, None);
        assert_eq!(info.escape_char, Some('\\'));
    }

    #[test]
    fn cutter_cut_preserves_preceding_whitespace() {
        let (content, info) = unquote_with("A=1 # comment", &opts(), "#;").unwrap();
        assert_eq!(content, "A=1 ");
        assert_eq!(info.cutter_char, Some('#'));
        assert!(info.cut);
    }

    #[test]
    fn cutter_inside_quotes_is_content() {
        let (content, info) = unquote_with("1 'x # y' z", &opts(), "#;").unwrap();
        assert_eq!(content, "1 'x # y' z");
        assert!(info.cutter_char.is_none());

        let (content, _) = unquote_with("\"a # b\"", &opts(), "#;").unwrap();
        assert_eq!(content, "a # b");
    }

    #[test]
    fn text_after_closing_quote_is_discarded() {
        let (content, _) = unquote("'kept' dropped", &opts()).unwrap();
        assert_eq!(content, "kept");
    }

    #[rstest]
    #[case("plain", QuoteType::Single)]
    #[case("plain", QuoteType::Double)]
    #[case("don't", QuoteType::Single)]
    #[case("say \"hi\"", QuoteType::Double)]
    #[case("say \"hi\"", QuoteType::Single)]
    #[case("back\\slash", QuoteType::Double)]
    #[case("two\\\\slashes", QuoteType::Single)]
    #[case("mix `tick` ^caret", QuoteType::Double)]
    #[case("", QuoteType::Double)]
    #[case("trailing\\", QuoteType::Single)]
    fn quote_unquote_roundtrip(#[case] s: &str, #[case] t: QuoteType) {
        let quoted = quote(s, t, '\\');
        let (content, info) = unquote(&quoted, &opts()).unwrap();
        assert_eq!(content, s);
        assert_eq!(info.quote_type, t);
    }

    #[test]
    fn quote_none_is_identity() {
        assert_eq!(quote("a b", QuoteType::None, '\\'), "a b");
    }

    #[test]
    fn opaque_single_region_when_not_hard() {
        // With `'` removed from hard_quotes the region closes at the first
        // quote, escapes notwithstanding.
        let mut options = opts();
        options.hard_quotes.clear();
        let (content, _) = unquote(r"'a\'", &options).unwrap();
        assert_eq!(content, r"a\");
    }
}
