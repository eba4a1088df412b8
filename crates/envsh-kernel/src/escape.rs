//! Escape-sequence codec.
//!
//! Decoding understands the classic single-letter sequences plus hex
//! scalars of three widths. Unknown sequences degrade to the literal
//! following character; a truncated sequence is an error, never a guess.

use crate::error::{ExpandError, ExpandResult};

/// Decode one escape sequence.
///
/// `chars[pos]` must be the active escape character. Returns the decoded
/// character and how many characters were consumed, escape included.
pub(crate) fn decode_at(chars: &[char], pos: usize) -> ExpandResult<(char, usize)> {
    let next = match chars.get(pos + 1) {
        Some(&c) => c,
        None => return Err(dangling(chars, pos)),
    };

    let decoded = match next {
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'b' => '\u{0008}',
        'f' => '\u{000c}',
        'a' => '\u{0007}',
        'v' => '\u{000b}',
        '0' => '\0',
        'x' => return hex_scalar(chars, pos, 2),
        'u' => return hex_scalar(chars, pos, 4),
        'U' => return hex_scalar(chars, pos, 8),
        // Unknown escapes pass the following character through untouched.
        other => other,
    };

    Ok((decoded, 2))
}

/// Parse `width` hex digits after `\x`/`\u`/`\U` into a scalar.
fn hex_scalar(chars: &[char], pos: usize, width: usize) -> ExpandResult<(char, usize)> {
    let start = pos + 2;
    let end = start + width;
    if end > chars.len() {
        return Err(dangling(chars, pos));
    }

    let mut code: u32 = 0;
    for &c in &chars[start..end] {
        let digit = c.to_digit(16).ok_or_else(|| dangling(chars, pos))?;
        code = code * 16 + digit;
    }

    match char::from_u32(code) {
        Some(decoded) => Ok((decoded, 2 + width)),
        None => Err(dangling(chars, pos)),
    }
}

fn dangling(chars: &[char], pos: usize) -> ExpandError {
    ExpandError::DanglingEscape {
        input: chars.iter().collect(),
        pos,
    }
}

/// Decode every escape sequence in `input` using `escape` as the marker.
pub fn unescape(input: &str, escape: char) -> ExpandResult<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == escape {
            let (decoded, consumed) = decode_at(&chars, i)?;
            out.push(decoded);
            i += consumed;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }

    Ok(out)
}

/// Encode control characters and the escape character itself, inverting
/// [`unescape`].
pub fn escape(input: &str, escape: char) -> String {
    let mut out = String::with_capacity(input.len());

    for c in input.chars() {
        match c {
            '\n' => push_seq(&mut out, escape, 'n'),
            '\r' => push_seq(&mut out, escape, 'r'),
            '\t' => push_seq(&mut out, escape, 't'),
            '\u{0008}' => push_seq(&mut out, escape, 'b'),
            '\u{000c}' => push_seq(&mut out, escape, 'f'),
            '\u{0007}' => push_seq(&mut out, escape, 'a'),
            '\u{000b}' => push_seq(&mut out, escape, 'v'),
            '\0' => push_seq(&mut out, escape, '0'),
            c if c == escape => {
                out.push(escape);
                out.push(escape);
            }
            c if (c as u32) < 0x20 => {
                out.push(escape);
                out.push_str(&format!("x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }

    out
}

fn push_seq(out: &mut String, escape: char, letter: char) {
    out.push(escape);
    out.push(letter);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("A b c", "A b c")]
    #[case("A\\tb\\tc", "A\tb\tc")]
    #[case("line\\n", "line\n")]
    #[case("\\x41", "A")]
    #[case("\\u0042", "B")]
    #[case("\\U00000043", "C")]
    #[case("\\u00e9", "é")]
    #[case("\\\\", "\\")]
    #[case("\\\"x\\'", "\"x'")]
    #[case("\\`", "`")]
    #[case("A\\ \\N\\+b", "A N+b")]
    #[case("\\0end", "\0end")]
    fn unescape_cases(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(unescape(input, '\\').unwrap(), expected);
    }

    #[rstest]
    #[case("trailing\\")]
    #[case("\\x4")]
    #[case("\\xzz")]
    #[case("\\u004")]
    #[case("\\U0000")]
    fn unescape_failures(#[case] input: &str) {
        assert!(matches!(
            unescape(input, '\\'),
            Err(crate::error::ExpandError::DanglingEscape { .. })
        ));
    }

    #[test]
    fn caret_dialect() {
        assert_eq!(unescape("a^tb", '^').unwrap(), "a\tb");
        assert_eq!(unescape("100^%", '^').unwrap(), "100%");
    }

    #[rstest]
    #[case("plain")]
    #[case("tab\there")]
    #[case("multi\nline\r\n")]
    #[case("back\\slash")]
    #[case("bell\u{0007}null\0")]
    #[case("ünïcode é")]
    fn escape_roundtrip(#[case] input: &str) {
        assert_eq!(unescape(&escape(input, '\\'), '\\').unwrap(), input);
    }

    #[test]
    fn invalid_scalar_is_rejected() {
        // 0xD800 is a surrogate, not a scalar value.
        assert!(unescape("\\ud800", '\\').is_err());
    }
}
