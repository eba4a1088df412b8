//! The symmetric `%NAME%` expansion grammar.
//!
//! Covers `%NAME%`, `%N`, `%*`, `%%`, path-modifier argument references
//! (`%~dpnx1`) and the `%NAME:~start[,len]%` substring form. The escape
//! character (`^`) suppresses the next metacharacter. No command
//! substitution exists in this dialect.

use crate::dialect::Dialect;
use crate::error::ExpandResult;
use crate::expand::substring;
use crate::vars::Vars;

pub(crate) fn expand<V: Vars>(
    input: &str,
    dialect: Dialect,
    vars: &V,
    args: &[String],
    skip_env_vars: bool,
) -> ExpandResult<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == dialect.escape_char {
            match chars.get(i + 1) {
                Some(&next) => {
                    out.push(next);
                    i += 2;
                }
                None => {
                    // A trailing escape is literal in this dialect.
                    out.push(c);
                    i += 1;
                }
            }
            continue;
        }

        if c != '%' {
            out.push(c);
            i += 1;
            continue;
        }

        match chars.get(i + 1).copied() {
            None => {
                out.push('%');
                i += 1;
            }

            Some('%') => {
                out.push('%');
                i += 2;
            }

            Some('*') => {
                out.push_str(&args.join(" "));
                i += 2;
            }

            Some(d) if d.is_ascii_digit() => {
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_ascii_digit() {
                    j += 1;
                }
                let digits: String = chars[i + 1..j].iter().collect();
                match digits.parse::<usize>() {
                    Ok(n) if n >= 1 && n <= args.len() => out.push_str(&args[n - 1]),
                    _ => {
                        out.push('%');
                        out.push_str(&digits);
                    }
                }
                i = j;
            }

            Some('~') => {
                let mut j = i + 2;
                while j < chars.len() && chars[j].is_ascii_alphabetic() {
                    j += 1;
                }
                let mods: String = chars[i + 2..j].iter().collect();
                let mut k = j;
                while k < chars.len() && chars[k].is_ascii_digit() {
                    k += 1;
                }
                let digits: String = chars[j..k].iter().collect();
                match digits.parse::<usize>() {
                    Ok(n) if n >= 1 && n <= args.len() => {
                        out.push_str(&apply_mods(&mods, &args[n - 1]));
                        i = k;
                    }
                    _ => {
                        // Malformed or out of range: keep the token as is.
                        let token: String = chars[i..k].iter().collect();
                        out.push_str(&token);
                        i = k.max(i + 1);
                    }
                }
            }

            Some(c2) if c2.is_ascii_alphabetic() || c2 == '_' => {
                match chars[i + 1..].iter().position(|&c| c == '%') {
                    None => {
                        out.push('%');
                        i += 1;
                    }
                    Some(off) => {
                        let j = i + 1 + off;
                        let body: String = chars[i + 1..j].iter().collect();
                        match variable(&body, vars, skip_env_vars) {
                            Some(text) => {
                                out.push_str(&text);
                                i = j + 1;
                            }
                            None => {
                                out.push('%');
                                i += 1;
                            }
                        }
                    }
                }
            }

            Some(_) => {
                out.push('%');
                i += 1;
            }
        }
    }

    Ok(out)
}

/// Resolve a `%NAME%` or `%NAME:~start[,len]%` body. Returns `None` when
/// the body is not a well-formed reference (the `%` is then literal); an
/// unset variable or a skipped lookup yields the token verbatim.
fn variable<V: Vars>(body: &str, vars: &V, skip_env_vars: bool) -> Option<String> {
    let (name, slice) = match body.split_once(":~") {
        Some((name, spec)) => (name, Some(spec)),
        None => (body, None),
    };

    if !is_name(name) {
        return None;
    }

    let spec = match slice {
        None => None,
        Some(spec) => Some(parse_slice(spec)?),
    };

    if skip_env_vars {
        return Some(format!("%{body}%"));
    }

    let value = match vars.get(name) {
        Some(value) => value,
        None => return Some(format!("%{body}%")),
    };

    Some(match spec {
        Some((start, len)) => substring(&value, start, len),
        None => value,
    })
}

fn is_name(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse `start[,len]` of the substring form.
fn parse_slice(spec: &str) -> Option<(i64, Option<i64>)> {
    let mut parts = spec.splitn(2, ',');
    let start = parts.next()?.trim().parse::<i64>().ok()?;
    let len = match parts.next() {
        Some(len) => Some(len.trim().parse::<i64>().ok()?),
        None => None,
    };
    Some((start, len))
}

/// Apply `%~` path modifiers to an argument value.
///
/// `d` drive, `p` directory, `n` file name without extension, `x`
/// extension, `f` full path, `s` short form (treated as the full path).
/// Unknown letters are ignored; components assemble in `d p n x` order
/// whatever the letter order was.
fn apply_mods(mods: &str, value: &str) -> String {
    let mut drive = false;
    let mut dir = false;
    let mut stem = false;
    let mut ext = false;
    let mut full = mods.is_empty();

    for m in mods.chars() {
        match m {
            'd' => drive = true,
            'p' => dir = true,
            'n' => stem = true,
            'x' => ext = true,
            's' | 'f' => full = true,
            _ => {}
        }
    }
    if full {
        return value.to_string();
    }

    let (drive_part, rest) = split_drive(value);
    let (dir_part, file) = match rest.rfind(['/', '\\']) {
        Some(pos) => rest.split_at(pos + 1),
        None => ("", rest),
    };
    // A leading dot is a hidden-file name, not an extension separator.
    let (stem_part, ext_part) = match file.rfind('.') {
        Some(0) | None => (file, ""),
        Some(pos) => file.split_at(pos),
    };

    let mut out = String::new();
    if drive {
        out.push_str(drive_part);
    }
    if dir {
        out.push_str(dir_part);
    }
    if stem {
        out.push_str(stem_part);
    }
    if ext {
        out.push_str(ext_part);
    }
    out
}

fn split_drive(value: &str) -> (&str, &str) {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        value.split_at(2)
    } else {
        ("", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn run(pairs: &[(&str, &str)], args: &[&str], input: &str) -> String {
        let map = vars(pairs);
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        expand(input, Dialect::SYMMETRIC, &map, &args, false).unwrap()
    }

    #[test]
    fn name_and_arg() {
        assert_eq!(run(&[("USER", "root")], &["x"], "%USER%-%1"), "root-x");
    }

    #[test]
    fn unset_name_stays_verbatim() {
        assert_eq!(run(&[], &[], "a %MISSING% b"), "a %MISSING% b");
    }

    #[test]
    fn out_of_range_arg_stays_verbatim() {
        assert_eq!(run(&[], &["only"], "%1 %2 %20"), "only %2 %20");
    }

    #[test]
    fn star_joins_args() {
        assert_eq!(run(&[], &["a", "b", "c"], "[%*]"), "[a b c]");
        assert_eq!(run(&[], &[], "[%*]"), "[]");
    }

    #[test]
    fn doubled_percent_is_literal() {
        assert_eq!(run(&[], &[], "100%%"), "100%");
    }

    #[test]
    fn caret_escapes_metachars() {
        // The escape protects the opening %; the rest has no closing pair
        // and stays literal.
        assert_eq!(run(&[("V", "x")], &[], "^%V%"), "%V%");
        assert_eq!(run(&[], &[], "a^^b"), "a^b");
    }

    #[test]
    fn trailing_escape_is_literal() {
        assert_eq!(run(&[], &[], "100^"), "100^");
    }

    #[test]
    fn lone_percent_is_literal() {
        assert_eq!(run(&[], &[], "50% off"), "50% off");
        assert_eq!(run(&[], &[], "%"), "%");
    }

    #[test]
    fn substring_form() {
        let v = [("V", "abcdef")];
        assert_eq!(run(&v, &[], "%V:~2%"), "cdef");
        assert_eq!(run(&v, &[], "%V:~1,3%"), "bcd");
        assert_eq!(run(&v, &[], "%V:~-3%"), "def");
        assert_eq!(run(&v, &[], "%V:~0,-2%"), "abcd");
        assert_eq!(run(&v, &[], "%V:~10%"), "");
    }

    #[test]
    fn substring_of_unset_stays_verbatim() {
        assert_eq!(run(&[], &[], "%V:~1,2%"), "%V:~1,2%");
    }

    #[test]
    fn path_modifiers() {
        let args = ["/opt/app/tool.tar.gz"];
        assert_eq!(run(&[], &args, "%~n1"), "tool.tar");
        assert_eq!(run(&[], &args, "%~x1"), ".gz");
        assert_eq!(run(&[], &args, "%~nx1"), "tool.tar.gz");
        assert_eq!(run(&[], &args, "%~p1"), "/opt/app/");
        assert_eq!(run(&[], &args, "%~f1"), "/opt/app/tool.tar.gz");
        assert_eq!(run(&[], &args, "%~1"), "/opt/app/tool.tar.gz");
    }

    #[test]
    fn drive_modifier() {
        let args = [r"C:\tools\run.exe"];
        assert_eq!(run(&[], &args, "%~d1"), "C:");
        assert_eq!(run(&[], &args, "%~dpn1"), r"C:\tools\run");
        // Letter order does not matter.
        assert_eq!(run(&[], &args, "%~npd1"), r"C:\tools\run");
    }

    #[test]
    fn unknown_modifier_letters_are_ignored(){
        let args = ["/a/b.txt"];
        assert_eq!(run(&[], &args, "%~qn1"), "b");
    }

    #[test]
    fn modifier_out_of_range_is_verbatim() {
        assert_eq!(run(&[], &[], "%~n3"), "%~n3");
    }

    #[test]
    fn hidden_file_has_no_extension() {
        let args = ["/home/.profile"];
        assert_eq!(run(&[], &args, "%~n1"), ".profile");
        assert_eq!(run(&[], &args, "%~x1"), "");
    }

    #[test]
    fn skip_env_vars_keeps_references() {
        let map = vars(&[("V", "x")]);
        let args = ["a".to_string()];
        let result = expand("%V% %1", Dialect::SYMMETRIC, &map, &args, true).unwrap();
        assert_eq!(result, "%V% a");
    }
}
