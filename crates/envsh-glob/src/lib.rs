//! envsh-glob: Glob matching for parameter-expansion patterns.
//!
//! Implements the glob subset used by `${NAME#pattern}`-style operators:
//! - `*` matches zero or more characters
//! - `?` matches exactly one character
//! - `[abc]` matches any character in the set
//! - `[a-z]` matches any character in the range
//! - `[!abc]` or `[^abc]` matches any character NOT in the set
//!
//! There is no brace expansion and no backslash escaping here: expansion
//! operators hand over pattern text after escape processing has already
//! happened, so every character that is not a metacharacter is literal.
//!
//! On top of whole-string matching, this crate answers the question the
//! removal/substitution operators actually ask: *how many characters* of a
//! prefix or suffix does the pattern cover, preferring the shortest or the
//! longest possible match.

pub mod glob;

pub use glob::{
    full_match, prefix_longest, prefix_shortest, suffix_longest, suffix_shortest,
};
