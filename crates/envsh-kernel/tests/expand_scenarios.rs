//! End-to-end expansion scenarios across quoting, dialects, and flags.

use std::collections::HashMap;
use std::time::Duration;

use rstest::rstest;

use envsh_kernel::{
    Captured, CommandRunner, ExecMode, ExpandError, ExpandFlags, ExpandOptions, Expander,
    NoRunner, QuoteType, SystemRunner,
};

fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A runner that records nothing and answers with a canned line.
struct FakeRunner {
    reply: &'static str,
}

impl CommandRunner for FakeRunner {
    fn execute(
        &self,
        _command: &str,
        _mode: ExecMode,
        _timeout: Option<Duration>,
    ) -> Result<Captured, ExpandError> {
        Ok(Captured {
            stdout: format!("{}\n", self.reply),
            stderr: String::new(),
            code: 0,
        })
    }
}

struct FailingRunner;

impl CommandRunner for FailingRunner {
    fn execute(
        &self,
        _command: &str,
        _mode: ExecMode,
        _timeout: Option<Duration>,
    ) -> Result<Captured, ExpandError> {
        Ok(Captured {
            stdout: String::new(),
            stderr: "boom".to_string(),
            code: 2,
        })
    }
}

#[rstest]
// No metacharacters: identity.
#[case(&[], &[], "plain text stays", "plain text stays")]
// Defaults and positionals.
#[case(&[("HOME", "/u/a")], &["app"], "Home ${HOME:-$USERPROFILE}, arg #1: $1", "Home /u/a, arg #1: app")]
#[case(&[("F", "file.tar.gz")], &[], "${F%.gz} ${F%%.*}", "file.tar file")]
#[case(&[("V", "a/b/c")], &[], "${V##*/} ${V#*/} ${V%/*} ${V%%/*}", "c b/c a/b a")]
#[case(&[("V", "abc")], &[], "${V///X}", "XaXbXcX")]
#[case(&[("V", "abc")], &[], "${V/#/P}+${V/%/P}", "Pabc+abcP")]
#[case(&[], &["a"], "$9", "$9")]
// Single-quoted opacity with default flags.
#[case(&[("HOME", "/u/a")], &[], "'$HOME'", "$HOME")]
fn posix_scenarios(
    #[case] pairs: &[(&str, &str)],
    #[case] args: &[&str],
    #[case] input: &str,
    #[case] expected: &str,
) {
    let mut map = vars(pairs);
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    let mut expander = Expander::new(&mut map, &NoRunner)
        .args(&args)
        .flags(ExpandFlags {
            allow_shell: false,
            ..ExpandFlags::default()
        });
    let (result, _) = expander.expand(input).unwrap();
    assert_eq!(result, expected);
}

#[test]
fn assignment_updates_the_store() {
    let mut map = vars(&[]);
    let mut expander = Expander::new(&mut map, &NoRunner).flags(ExpandFlags {
        allow_shell: false,
        ..ExpandFlags::default()
    });
    let (result, _) = expander.expand("${X:=42}-${X}").unwrap();
    assert_eq!(result, "42-42");
    assert_eq!(map.get("X"), Some(&"42".to_string()));
}

#[test]
fn comment_cut_preserves_trailing_space() {
    let mut map = vars(&[]);
    let mut expander = Expander::new(&mut map, &NoRunner).flags(ExpandFlags {
        allow_shell: false,
        remove_line_comment: true,
        ..ExpandFlags::default()
    });
    let (result, info) = expander.expand("A=1 # comment").unwrap();
    assert_eq!(result, "A=1 ");
    assert_eq!(info.cutter_char, Some('#'));
}

#[test]
fn symmetric_scenario() {
    let mut map = vars(&[("USER", "root")]);
    let args = ["x".to_string()];
    let mut expander = Expander::new(&mut map, &NoRunner)
        .args(&args)
        .flags(ExpandFlags {
            allow_shell: false,
            ..ExpandFlags::default()
        });
    let (result, info) = expander.expand("%USER%-%1").unwrap();
    assert_eq!(result, "root-x");
    assert_eq!(info.expand_char, Some('%'));
}

#[test]
fn mixed_lines_pick_their_own_dialect() {
    let mut map = vars(&[("A", "1"), ("B", "2")]);
    let mut expander = Expander::new(&mut map, &NoRunner).flags(ExpandFlags {
        allow_shell: false,
        ..ExpandFlags::default()
    });
    assert_eq!(expander.expand("$A").unwrap().0, "1");
    assert_eq!(expander.expand("%B%").unwrap().0, "2");
}

#[test]
fn disabled_substitution_is_verbatim() {
    let mut map = vars(&[]);
    let mut expander = Expander::new(&mut map, &NoRunner).flags(ExpandFlags {
        allow_shell: false,
        allow_subproc: false,
        ..ExpandFlags::default()
    });
    let (result, _) = expander.expand("$(echo hi)").unwrap();
    assert_eq!(result, "$(echo hi)");
}

#[test]
fn substitution_output_is_inserted_and_trimmed() {
    let mut map = vars(&[]);
    let runner = FakeRunner { reply: "value" };
    let mut expander = Expander::new(&mut map, &runner);
    let (result, _) = expander.expand("x=$(whatever)!").unwrap();
    assert_eq!(result, "x=value!");
}

#[test]
fn failing_substitution_carries_stderr() {
    let mut map = vars(&[]);
    let mut expander = Expander::new(&mut map, &FailingRunner);
    let err = expander.expand("$(nope)").unwrap_err();
    match err {
        ExpandError::SubprocessFailed { code, stderr } => {
            assert_eq!(code, 2);
            assert_eq!(stderr, "boom");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn missing_variable_error_reaches_the_caller() {
    let mut map = vars(&[]);
    let mut expander = Expander::new(&mut map, &NoRunner).flags(ExpandFlags {
        allow_shell: false,
        ..ExpandFlags::default()
    });
    let err = expander.expand("${REQUIRED:?set REQUIRED first}").unwrap_err();
    match err {
        ExpandError::MissingVariable { name, message } => {
            assert_eq!(name, "REQUIRED");
            assert_eq!(message, "set REQUIRED first");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn parse_info_reports_the_quote_type() {
    let mut map = vars(&[]);
    let mut expander = Expander::new(&mut map, &NoRunner).flags(ExpandFlags {
        allow_shell: false,
        ..ExpandFlags::default()
    });
    assert_eq!(expander.expand("bare").unwrap().1.quote_type, QuoteType::None);
    assert_eq!(expander.expand("'sq'").unwrap().1.quote_type, QuoteType::Single);
    assert_eq!(expander.expand("\"dq\"").unwrap().1.quote_type, QuoteType::Double);
}

#[cfg(unix)]
mod with_real_shell {
    use super::*;

    #[test]
    fn shell_substitution_round_trip() {
        let mut map = vars(&[("WHO", "world")]);
        let mut expander = Expander::new(&mut map, &SystemRunner);
        let (result, _) = expander.expand("$(echo hello $WHO)").unwrap();
        assert_eq!(result, "hello world");
    }

    #[test]
    fn nested_substitution_expands_inner_first() {
        let mut map = vars(&[("X", "ok")]);
        let mut expander = Expander::new(&mut map, &SystemRunner);
        let (result, _) = expander.expand("$(echo $(echo $X))").unwrap();
        assert_eq!(result, "ok");
    }

    #[test]
    fn backtick_form_works() {
        let mut map = vars(&[]);
        let mut expander = Expander::new(&mut map, &SystemRunner);
        let (result, _) = expander.expand("`echo tick`").unwrap();
        assert_eq!(result, "tick");
    }

    #[test]
    fn argv_mode_does_not_consult_a_shell() {
        let mut map = vars(&[]);
        let mut expander = Expander::new(&mut map, &SystemRunner).flags(ExpandFlags {
            allow_shell: false,
            allow_subproc: true,
            ..ExpandFlags::default()
        });
        let (result, _) = expander.expand("$(echo one two)").unwrap();
        assert_eq!(result, "one two");
    }

    #[test]
    fn timeout_is_enforced() {
        let mut map = vars(&[]);
        let mut expander = Expander::new(&mut map, &SystemRunner).options(ExpandOptions {
            subprocess_timeout: Some(Duration::from_millis(100)),
            ..ExpandOptions::default()
        });
        let err = expander.expand("$(sleep 5)").unwrap_err();
        assert!(matches!(err, ExpandError::SubprocessTimeout { .. }));
    }

    #[test]
    fn nonzero_exit_fails_the_expansion() {
        let mut map = vars(&[]);
        let mut expander = Expander::new(&mut map, &SystemRunner);
        let err = expander.expand("$(false)").unwrap_err();
        assert!(matches!(err, ExpandError::SubprocessFailed { code: 1, .. }));
    }
}
