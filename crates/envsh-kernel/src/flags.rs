//! Flag sets controlling expansion, file loading, and platform stacks.
//!
//! Plain named-boolean structs rather than bitmask integers: callers toggle
//! fields, `Default` carries the conventional combination.

/// What the expander is allowed to do with a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpandFlags {
    /// Run command substitutions through the platform shell.
    pub allow_shell: bool,
    /// Run command substitutions as a tokenized argv, no shell involved.
    /// `allow_shell` wins when both are set.
    pub allow_subproc: bool,
    /// Drop an unquoted `cutter_char` and everything after it.
    pub remove_line_comment: bool,
    /// Strip the outer quotes from the result.
    pub remove_quotes: bool,
    /// Leave `$NAME` / `${...}` references untouched.
    pub skip_env_vars: bool,
    /// Treat single-quoted content as opaque text.
    pub skip_single_quoted: bool,
    /// Decode `\n`, `\t`, `\xHH`, ... sequences.
    pub unescape: bool,
}

impl ExpandFlags {
    /// Everything off; the value passes through almost verbatim.
    pub const NONE: ExpandFlags = ExpandFlags {
        allow_shell: false,
        allow_subproc: false,
        remove_line_comment: false,
        remove_quotes: false,
        skip_env_vars: false,
        skip_single_quoted: false,
        unescape: false,
    };

    /// True when some execution mode is permitted for `$(...)`.
    pub fn substitution_enabled(&self) -> bool {
        self.allow_shell || self.allow_subproc
    }
}

impl Default for ExpandFlags {
    fn default() -> Self {
        ExpandFlags {
            allow_shell: true,
            remove_quotes: true,
            skip_single_quoted: true,
            unescape: true,
            ..ExpandFlags::NONE
        }
    }
}

/// How the dot-env file set is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFlags {
    /// Add a platform-derived filter next to the caller-supplied ones.
    pub add_platforms: bool,
    /// Forget which files earlier calls already loaded.
    pub reset_accumulated: bool,
}

impl Default for FileFlags {
    fn default() -> Self {
        FileFlags {
            add_platforms: true,
            reset_accumulated: false,
        }
    }
}

/// How the platform stack is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformFlags {
    /// Prepend the empty tag, which matches the bare `.env` file.
    pub add_empty: bool,
}

impl Default for PlatformFlags {
    fn default() -> Self {
        PlatformFlags { add_empty: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_expand_flags() {
        let flags = ExpandFlags::default();
        assert!(flags.allow_shell);
        assert!(!flags.allow_subproc);
        assert!(!flags.remove_line_comment);
        assert!(flags.remove_quotes);
        assert!(!flags.skip_env_vars);
        assert!(flags.skip_single_quoted);
        assert!(flags.unescape);
        assert!(flags.substitution_enabled());
    }

    #[test]
    fn none_disables_substitution() {
        assert!(!ExpandFlags::NONE.substitution_enabled());
    }
}
