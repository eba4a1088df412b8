//! Command execution for `$(...)` substitutions.
//!
//! The engine only knows the [`CommandRunner`] trait; the default
//! [`SystemRunner`] spawns real processes, and [`NoRunner`] refuses, for
//! callers that want expansion without any execution capability.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::{ExpandError, ExpandResult};

/// How long to sleep between liveness polls while a deadline is armed.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How a command substitution is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Hand the text to the platform shell unmodified.
    Shell,
    /// Split into words by quote-respecting rules and exec directly.
    Argv,
}

/// Captured output of a finished child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

/// The execution seam consumed by the expansion engine.
pub trait CommandRunner {
    /// Run `command` to completion, capturing both streams.
    ///
    /// A `Some` timeout must be enforced: on expiry the child is killed
    /// and [`ExpandError::SubprocessTimeout`] returned. A non-zero exit
    /// is not an error here; the engine decides what to do with it.
    fn execute(
        &self,
        command: &str,
        mode: ExecMode,
        timeout: Option<Duration>,
    ) -> ExpandResult<Captured>;
}

/// A runner that always refuses. Useful when command substitution flags
/// are enabled by configuration but execution is not wanted.
pub struct NoRunner;

impl CommandRunner for NoRunner {
    fn execute(
        &self,
        _command: &str,
        _mode: ExecMode,
        _timeout: Option<Duration>,
    ) -> ExpandResult<Captured> {
        Err(ExpandError::NoRunner)
    }
}

/// Runs commands on the host system via `std::process`.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn execute(
        &self,
        command: &str,
        mode: ExecMode,
        timeout: Option<Duration>,
    ) -> ExpandResult<Captured> {
        let mut cmd = match mode {
            ExecMode::Shell => {
                let mut cmd = if cfg!(windows) {
                    let mut cmd = Command::new("cmd");
                    cmd.arg("/C");
                    cmd
                } else {
                    let mut cmd = Command::new("sh");
                    cmd.arg("-c");
                    cmd
                };
                cmd.arg(command);
                cmd
            }
            ExecMode::Argv => {
                let words = split_words(command)?;
                let (program, rest) = match words.split_first() {
                    Some(split) => split,
                    None => {
                        return Err(ExpandError::Spawn {
                            source: std::io::Error::new(
                                std::io::ErrorKind::InvalidInput,
                                "empty command",
                            ),
                        })
                    }
                };
                let mut cmd = Command::new(program);
                cmd.args(rest);
                cmd
            }
        };

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        match timeout {
            None => {
                let output = cmd
                    .spawn()
                    .and_then(|child| child.wait_with_output())
                    .map_err(|source| ExpandError::Spawn { source })?;
                Ok(Captured {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    code: output.status.code().unwrap_or(-1),
                })
            }
            Some(limit) => run_with_deadline(cmd, limit),
        }
    }
}

/// Wait for the child under a deadline, draining both pipes on threads so
/// a chatty child cannot deadlock against a full pipe buffer.
fn run_with_deadline(mut cmd: Command, limit: Duration) -> ExpandResult<Captured> {
    let mut child = cmd.spawn().map_err(|source| ExpandError::Spawn { source })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let out_thread = std::thread::spawn(move || drain(stdout));
    let err_thread = std::thread::spawn(move || drain(stderr));

    let deadline = Instant::now() + limit;
    let status = loop {
        match child.try_wait().map_err(|source| ExpandError::Spawn { source })? {
            Some(status) => break status,
            None => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = out_thread.join();
                    let _ = err_thread.join();
                    return Err(ExpandError::SubprocessTimeout { limit });
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    };

    let stdout = out_thread.join().unwrap_or_default();
    let stderr = err_thread.join().unwrap_or_default();
    Ok(Captured {
        stdout,
        stderr,
        code: status.code().unwrap_or(-1),
    })
}

fn drain(pipe: Option<impl Read>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Split command text into words by POSIX shell rules: whitespace
/// separates, single quotes are literal, double quotes allow backslash
/// escapes of `"`, `\`, `$` and `` ` ``, a backslash outside quotes
/// protects the next character.
pub fn split_words(input: &str) -> ExpandResult<Vec<String>> {
    let chars: Vec<char> = input.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();
    let mut has_word = false;
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            c if c.is_whitespace() => {
                if has_word {
                    words.push(std::mem::take(&mut current));
                    has_word = false;
                }
                i += 1;
            }
            '\\' => {
                match chars.get(i + 1) {
                    Some(&n) => {
                        current.push(n);
                        has_word = true;
                        i += 2;
                    }
                    None => {
                        return Err(ExpandError::DanglingEscape {
                            input: input.to_string(),
                            pos: i,
                        })
                    }
                }
            }
            '\'' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&c| c == '\'')
                    .map(|off| i + 1 + off)
                    .ok_or_else(|| ExpandError::UnterminatedQuote {
                        input: input.to_string(),
                    })?;
                current.extend(&chars[i + 1..close]);
                has_word = true;
                i = close + 1;
            }
            '"' => {
                has_word = true;
                i += 1;
                loop {
                    match chars.get(i) {
                        None => {
                            return Err(ExpandError::UnterminatedQuote {
                                input: input.to_string(),
                            })
                        }
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some('\\') => match chars.get(i + 1) {
                            Some(&n) if matches!(n, '"' | '\\' | '$' | '`') => {
                                current.push(n);
                                i += 2;
                            }
                            Some(&n) => {
                                current.push('\\');
                                current.push(n);
                                i += 2;
                            }
                            None => {
                                return Err(ExpandError::DanglingEscape {
                                    input: input.to_string(),
                                    pos: i,
                                })
                            }
                        },
                        Some(&c) => {
                            current.push(c);
                            i += 1;
                        }
                    }
                }
            }
            c => {
                current.push(c);
                has_word = true;
                i += 1;
            }
        }
    }

    if has_word {
        words.push(current);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("echo hello", vec!["echo", "hello"])]
    #[case("  spaced   out  ", vec!["spaced", "out"])]
    #[case("echo 'a b' c", vec!["echo", "a b", "c"])]
    #[case(r#"echo "a b" c"#, vec!["echo", "a b", "c"])]
    #[case(r#"echo "a \" b""#, vec!["echo", "a \" b"])]
    #[case(r"echo a\ b", vec!["echo", "a b"])]
    #[case(r#"printf '%s\n' x"#, vec!["printf", r"%s\n", "x"])]
    #[case(r#"echo "keep \$HOME""#, vec!["echo", "keep $HOME"])]
    #[case(r#"echo "keep \n""#, vec!["echo", r"keep \n"])]
    #[case("", Vec::<&str>::new())]
    #[case("one''two", vec!["onetwo"])]
    fn split_cases(#[case] input: &str, #[case] expected: Vec<&str>) {
        assert_eq!(split_words(input).unwrap(), expected);
    }

    #[test]
    fn split_unterminated() {
        assert!(matches!(
            split_words("echo 'oops"),
            Err(ExpandError::UnterminatedQuote { .. })
        ));
        assert!(matches!(
            split_words("echo oops\\"),
            Err(ExpandError::DanglingEscape { .. })
        ));
    }

    #[test]
    fn no_runner_refuses() {
        let err = NoRunner
            .execute("echo hi", ExecMode::Shell, None)
            .unwrap_err();
        assert!(matches!(err, ExpandError::NoRunner));
    }

    #[cfg(unix)]
    mod system {
        use super::*;

        #[test]
        fn shell_captures_stdout() {
            let cap = SystemRunner
                .execute("echo hello", ExecMode::Shell, None)
                .unwrap();
            assert_eq!(cap.code, 0);
            assert_eq!(cap.stdout, "hello\n");
        }

        #[test]
        fn argv_mode_skips_the_shell() {
            let cap = SystemRunner
                .execute("echo '$HOME stays'", ExecMode::Argv, None)
                .unwrap();
            assert_eq!(cap.stdout.trim_end(), "$HOME stays");
        }

        #[test]
        fn nonzero_exit_is_reported() {
            let cap = SystemRunner
                .execute("exit 3", ExecMode::Shell, None)
                .unwrap();
            assert_eq!(cap.code, 3);
        }

        #[test]
        fn deadline_kills_the_child() {
            let err = SystemRunner
                .execute(
                    "sleep 5",
                    ExecMode::Shell,
                    Some(Duration::from_millis(100)),
                )
                .unwrap_err();
            assert!(matches!(err, ExpandError::SubprocessTimeout { .. }));
        }

        #[test]
        fn fast_child_beats_the_deadline() {
            let cap = SystemRunner
                .execute("echo quick", ExecMode::Shell, Some(Duration::from_secs(5)))
                .unwrap();
            assert_eq!(cap.stdout, "quick\n");
        }

        #[test]
        fn missing_program_is_a_spawn_error() {
            let err = SystemRunner
                .execute("/nonexistent/prog", ExecMode::Argv, None)
                .unwrap_err();
            assert!(matches!(err, ExpandError::Spawn { .. }));
        }
    }
}
