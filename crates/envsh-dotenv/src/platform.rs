//! Platform classification.
//!
//! Turns a raw platform identity string (`std::env::consts::OS`, a Python
//! `sys.platform`, a uname output) into an ordered stack of tags from
//! broad to narrow. The stack both names the dot-env files worth loading
//! (`.env.posix` before `.env.linux`) and defines their load order.

use envsh_kernel::PlatformFlags;

/// Every platform tag the classifier can produce. Filenames carrying one
/// of these tokens are platform-scoped even when the tag does not apply
/// to the current run.
pub const ALL_PLATFORM_TAGS: &[&str] = &[
    "aix", "android", "beos", "bsd", "cygwin", "darwin", "haiku", "hp-ux", "ios", "linux",
    "macos", "msys", "os2", "posix", "riscos", "sunos", "unix", "vms", "windows",
];

/// Build the platform stack for `platform_id`, broadest tag first.
///
/// The identity itself is appended as the narrowest tag when it is more
/// specific than anything already present. With `add_empty` the empty tag
/// is prepended; it stands for the bare `.env` file that applies
/// everywhere.
pub fn platform_stack(platform_id: &str, flags: PlatformFlags) -> Vec<String> {
    let id = platform_id.trim().to_lowercase();
    let mut stack: Vec<String> = Vec::new();
    let push = |stack: &mut Vec<String>, tag: &str| {
        if !tag.is_empty() && !stack.iter().any(|t| t == tag) {
            stack.push(tag.to_string());
        }
    };

    let apple = id.contains("darwin") || id.contains("macos") || id.starts_with("ios");
    let posix_like = [
        "aix", "bsd", "hp-ux", "linux", "sunos", "cygwin", "msys", "android", "haiku", "beos",
        "unix",
    ]
    .iter()
    .any(|t| id.contains(t))
        || apple;

    // `java` says nothing by itself; the host family decides.
    if id.contains("java") {
        if cfg!(windows) {
            push(&mut stack, "windows");
        } else {
            push(&mut stack, "posix");
        }
    }

    if posix_like {
        push(&mut stack, "posix");
    }
    if id.contains("bsd") || apple {
        push(&mut stack, "bsd");
    }
    if id.contains("linux") || id.contains("android") {
        push(&mut stack, "linux");
    }
    if apple {
        push(&mut stack, "darwin");
    }
    if id.contains("darwin") || id.contains("macos") {
        push(&mut stack, "macos");
    }
    if id.contains("vms") {
        push(&mut stack, "vms");
    }
    if id.starts_with("win") || id.contains("windows") {
        push(&mut stack, "windows");
    }

    push(&mut stack, &id);

    if flags.add_empty {
        stack.insert(0, String::new());
    }
    stack
}
