//! Per-line dialect detection.
//!
//! A line announces its dialect through the first metacharacters it uses
//! outside quoted regions: `$` vs `%` selects the expansion grammar, `\`,
//! `` ` `` or `^` the escape character, `#` or `;` the comment marker.
//! Lines with no evidence default to POSIX. Detection is per line; one
//! file may mix dialects freely.

use crate::options::ExpandOptions;

/// A coherent set of metacharacters used to interpret one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub expand_char: char,
    pub escape_char: char,
    pub cutter_char: char,
}

impl Dialect {
    /// `$`-expansion with backslash escapes and `#` comments.
    pub const POSIX: Dialect = Dialect {
        expand_char: '$',
        escape_char: '\\',
        cutter_char: '#',
    };

    /// `$`-expansion with backtick escapes, PowerShell style.
    pub const PWSH: Dialect = Dialect {
        expand_char: '$',
        escape_char: '`',
        cutter_char: '#',
    };

    /// `%NAME%`-expansion with caret escapes and `;` comments.
    pub const SYMMETRIC: Dialect = Dialect {
        expand_char: '%',
        escape_char: '^',
        cutter_char: ';',
    };

    /// True when the line uses the symmetric `%NAME%` grammar.
    pub fn is_symmetric(&self) -> bool {
        self.expand_char == '%'
    }
}

/// Detect the dialect of one line.
///
/// Single-quoted regions are opaque; double-quoted content still provides
/// expansion and escape evidence because it is expandable; comment markers
/// count only outside any quotes. An escape candidate protects the
/// character after it from being taken as evidence.
pub fn detect(line: &str, options: &ExpandOptions) -> Dialect {
    let chars: Vec<char> = line.chars().collect();

    let mut expand: Option<char> = None;
    let mut escape: Option<char> = None;
    let mut cutter: Option<char> = None;
    let mut quote: Option<char> = None;

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let in_single = quote == Some('\'');

        if !in_single && escape.is_none() && options.escape_chars.contains(c) {
            escape = Some(c);
            i += 2; // the protected character is not evidence
            continue;
        }
        if !in_single && Some(c) == escape {
            i += 2;
            continue;
        }

        match quote {
            Some(q) if c == q => quote = None,
            None if c == '\'' || c == '"' => quote = Some(c),
            _ => {}
        }

        if !in_single && expand.is_none() && options.expand_chars.contains(c) {
            expand = Some(c);
        }
        if quote.is_none() && cutter.is_none() && options.cutter_chars.contains(c) {
            cutter = Some(c);
        }

        if expand.is_some() && escape.is_some() && cutter.is_some() {
            break;
        }
        i += 1;
    }

    let expand_char = expand.unwrap_or('$');
    let escape_char = escape.unwrap_or(if expand_char == '%' { '^' } else { '\\' });
    let cutter_char = cutter.unwrap_or(if expand_char == '%' { ';' } else { '#' });

    Dialect {
        expand_char,
        escape_char,
        cutter_char,
    }
}
