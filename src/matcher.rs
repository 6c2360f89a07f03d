//! Alignment of live invocations against compiled templates.
//!
//! Matching walks the template and the argv with independent cursors. Literal
//! and placeholder tokens consume one argument each; option-shaped arguments
//! that do not align are skipped as noise. There is no backtracking, so a
//! given template and argv always produce the same outcome.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Candidate, MockError, NoMatchReport, Result};
use crate::scenario::Scenario;
use crate::template::{Binding, Template, Token};

/// Git flags that commonly take their value as the following argument.
pub const GIT_VALUE_FLAGS: &[&str] = &["--since", "--until", "--after", "--before", "--author"];

/// Tuning for noise handling during alignment.
///
/// The default treats every noise flag as a single argument. Value flags are
/// opt-in: skipping one also skips the argument after it, which relaxes
/// trailing-argument rejection for that argument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Noise flags whose separate-argument value is skipped along with them.
    pub value_flags: BTreeSet<String>,
}

impl MatchOptions {
    /// Options with [`GIT_VALUE_FLAGS`] taking a separate value.
    pub fn git_value_flags() -> Self {
        GIT_VALUE_FLAGS
            .iter()
            .fold(Self::default(), |options, flag| options.with_value_flag(*flag))
    }

    pub fn with_value_flag(mut self, flag: impl Into<String>) -> Self {
        self.value_flags.insert(flag.into());
        self
    }

    fn takes_value(&self, arg: &str) -> bool {
        !arg.contains('=') && self.value_flags.contains(arg)
    }
}

/// Option-shaped arguments (`-x`, `--long`, `--long=value`) may be skipped.
///
/// A bare `-` or `--` is positional and never noise.
pub fn is_noise_flag(arg: &str) -> bool {
    arg.starts_with('-') && arg != "-" && arg != "--"
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchReason {
    Literal {
        expected: String,
        found: String,
    },
    EmptyValue {
        name: String,
    },
    Prefix {
        prefix: String,
        found: String,
    },
    Suffix {
        suffix: String,
        found: String,
    },
    Conflict {
        name: String,
        bound: String,
        found: String,
    },
    MissingArgument {
        expected: String,
    },
    TrailingArgument {
        found: String,
    },
}

/// Why a template rejected an invocation, with the cursor positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub template_index: usize,
    pub arg_index: usize,
    pub reason: MismatchReason,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (t, i) = (self.template_index, self.arg_index);
        match &self.reason {
            MismatchReason::Literal { expected, found } => {
                write!(f, "arg {i} is {found:?}, template token {t} expects {expected:?}")
            }
            MismatchReason::EmptyValue { name } => {
                write!(f, "arg {i} is empty, {{{name}}} needs a value")
            }
            MismatchReason::Prefix { prefix, found } => {
                write!(f, "arg {i} is {found:?}, template token {t} expects prefix {prefix:?}")
            }
            MismatchReason::Suffix { suffix, found } => {
                write!(f, "arg {i} is {found:?}, template token {t} expects suffix {suffix:?}")
            }
            MismatchReason::Conflict { name, bound, found } => write!(
                f,
                "arg {i} binds {{{name}}} to {found:?} but it is already {bound:?}"
            ),
            MismatchReason::MissingArgument { expected } => {
                write!(f, "invocation ends before template token {t} ({expected:?})")
            }
            MismatchReason::TrailingArgument { found } => {
                write!(f, "unexpected trailing arg {i} ({found:?})")
            }
        }
    }
}

/// Align `args` against `template`, returning the bound placeholder values.
pub fn match_template(
    template: &Template,
    args: &[String],
    options: &MatchOptions,
) -> std::result::Result<Binding, Mismatch> {
    let tokens = template.tokens();
    let mut binding = Binding::new();
    let mut t = 0;
    let mut i = 0;

    while t < tokens.len() {
        let Some(arg) = args.get(i) else {
            return Err(Mismatch {
                template_index: t,
                arg_index: i,
                reason: MismatchReason::MissingArgument {
                    expected: template.raw()[t].clone(),
                },
            });
        };
        match align(&tokens[t], arg, &binding) {
            Ok(capture) => {
                if let Some((name, value)) = capture {
                    binding.insert(name, value);
                }
                t += 1;
                i += 1;
            }
            Err(reason) if is_noise_flag(arg) => {
                tracing::trace!(arg = %arg, ?reason, "skipping noise flag");
                i += skip_width(arg, options);
            }
            Err(reason) => {
                return Err(Mismatch {
                    template_index: t,
                    arg_index: i,
                    reason,
                })
            }
        }
    }

    while let Some(arg) = args.get(i) {
        if !is_noise_flag(arg) {
            return Err(Mismatch {
                template_index: t,
                arg_index: i,
                reason: MismatchReason::TrailingArgument { found: arg.clone() },
            });
        }
        i += skip_width(arg, options);
    }

    Ok(binding)
}

fn skip_width(arg: &str, options: &MatchOptions) -> usize {
    if options.takes_value(arg) {
        2
    } else {
        1
    }
}

/// Try one token against one argument without touching `binding`.
fn align(
    token: &Token,
    arg: &str,
    binding: &Binding,
) -> std::result::Result<Option<(String, String)>, MismatchReason> {
    match token {
        Token::Literal(expected) => {
            if expected == arg {
                Ok(None)
            } else {
                Err(MismatchReason::Literal {
                    expected: expected.clone(),
                    found: arg.to_string(),
                })
            }
        }
        Token::Standalone { name } => {
            if arg.is_empty() {
                return Err(MismatchReason::EmptyValue { name: name.clone() });
            }
            bind(binding, name, arg)
        }
        Token::Embedded {
            prefix,
            name,
            suffix,
        } => {
            if !arg.starts_with(prefix.as_str()) {
                return Err(MismatchReason::Prefix {
                    prefix: prefix.clone(),
                    found: arg.to_string(),
                });
            }
            if arg.len() < prefix.len() + suffix.len() || !arg.ends_with(suffix.as_str()) {
                return Err(MismatchReason::Suffix {
                    suffix: suffix.clone(),
                    found: arg.to_string(),
                });
            }
            bind(binding, name, &arg[prefix.len()..arg.len() - suffix.len()])
        }
    }
}

fn bind(
    binding: &Binding,
    name: &str,
    value: &str,
) -> std::result::Result<Option<(String, String)>, MismatchReason> {
    match binding.get(name) {
        Some(bound) if bound != value => Err(MismatchReason::Conflict {
            name: name.to_string(),
            bound: bound.clone(),
            found: value.to_string(),
        }),
        Some(_) => Ok(None),
        None => Ok(Some((name.to_string(), value.to_string()))),
    }
}

/// The scenario chosen for an invocation.
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    pub index: usize,
    pub scenario: &'a Scenario,
    pub binding: Binding,
}

/// Pick the first scenario, in recorded order, whose template accepts `args`.
pub fn select_scenario<'a, I>(
    source: &str,
    scenarios: I,
    args: &[String],
    options: &MatchOptions,
) -> Result<Selection<'a>>
where
    I: IntoIterator<Item = &'a Scenario>,
{
    let mut candidates = Vec::new();
    for (index, scenario) in scenarios.into_iter().enumerate() {
        match match_template(&scenario.template, args, options) {
            Ok(binding) => {
                tracing::debug!(
                    source,
                    scenario = %scenario.name,
                    ?binding,
                    "scenario matched"
                );
                return Ok(Selection {
                    index,
                    scenario,
                    binding,
                });
            }
            Err(mismatch) => candidates.push(Candidate {
                name: scenario.name.clone(),
                command: scenario.template.raw().to_vec(),
                reason: mismatch.to_string(),
            }),
        }
    }
    Err(MockError::NoMatch(Box::new(NoMatchReport {
        source: source.to_string(),
        args: args.to_vec(),
        candidates,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn template(raw: &[&str]) -> Template {
        Template::compile(raw).expect("compile template")
    }

    fn matches(raw: &[&str], args: &[&str]) -> std::result::Result<Binding, Mismatch> {
        match_template(&template(raw), &argv(args), &MatchOptions::default())
    }

    fn scenario(name: &str, raw: &[&str]) -> Scenario {
        Scenario {
            name: name.to_string(),
            description: String::new(),
            template: template(raw),
            returncode: 0,
            output_file: format!("outputs/{name}.txt"),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    #[test]
    fn exact_literals_match() {
        assert_eq!(matches(&["git", "log"], &["git", "log"]), Ok(Binding::new()));
        let err = matches(&["git", "log"], &["git", "status"]).expect_err("literal");
        assert_eq!(err.template_index, 1);
        assert_eq!(err.arg_index, 1);
    }

    #[test]
    fn embedded_placeholder_binds_remainder() {
        let binding = matches(&["git", "log", "--grep={term}"], &["git", "log", "--grep=fix"])
            .expect("match");
        assert_eq!(binding["term"], "fix");
        assert!(matches(&["git", "log", "--grep={term}"], &["git", "log", "--other=fix"]).is_err());
    }

    #[test]
    fn embedded_placeholder_honours_suffix() {
        let raw = ["git", "diff", "{base}..HEAD"];
        let binding = matches(&raw, &["git", "diff", "main..HEAD"]).expect("match");
        assert_eq!(binding["base"], "main");
        let err = matches(&raw, &["git", "diff", "main..topic"]).expect_err("suffix");
        assert!(matches!(err.reason, MismatchReason::Suffix { .. }));
        let binding = matches(&["x", "--a={v}="], &["x", "--a=="]).expect("empty capture");
        assert_eq!(binding["v"], "");
        assert!(matches(&["x", "--a={v}="], &["x", "--a="]).is_err());
    }

    #[test]
    fn trailing_noise_flag_is_ignored() {
        let binding = matches(
            &["git", "log", "--grep={term}"],
            &["git", "log", "--grep=fix", "--since=1 hour ago"],
        )
        .expect("match");
        assert_eq!(binding, Binding::from([("term".to_string(), "fix".to_string())]));
    }

    #[test]
    fn missing_argument_fails() {
        let err = matches(&["git", "add", "{filepath}"], &["git", "add"]).expect_err("missing");
        assert_eq!(
            err.reason,
            MismatchReason::MissingArgument {
                expected: "{filepath}".to_string()
            }
        );
    }

    #[test]
    fn noise_flag_between_literals_is_skipped() {
        let binding = matches(
            &["git", "log", "--follow", "--", "{filepath}"],
            &["git", "log", "--follow", "--no-color", "--", "app.py"],
        )
        .expect("match");
        assert_eq!(binding["filepath"], "app.py");
    }

    #[test]
    fn value_flags_are_single_noise_by_default() {
        let err = matches(&["git", "log"], &["git", "log", "--author", "bob"]).expect_err("trailing");
        assert_eq!(
            err.reason,
            MismatchReason::TrailingArgument {
                found: "bob".to_string()
            }
        );
        let binding = matches(&["git", "log", "HEAD"], &["git", "log", "--since", "HEAD"])
            .expect("flag skipped alone");
        assert!(binding.is_empty());
    }

    #[test]
    fn opted_in_value_flags_consume_their_argument() {
        let options = MatchOptions::git_value_flags();
        let args = argv(&["git", "log", "--since", "1 day ago"]);
        assert!(match_template(&template(&["git", "log"]), &args, &options).is_ok());
        assert!(match_template(
            &template(&["git", "log"]),
            &argv(&["git", "log", "--since=1 day ago"]),
            &options
        )
        .is_ok());

        let custom = MatchOptions::default().with_value_flag("--format");
        assert_eq!(custom.value_flags.len(), 1);
        let args = argv(&["git", "show", "--format", "%H", "HEAD"]);
        assert!(match_template(&template(&["git", "show", "HEAD"]), &args, &custom).is_ok());
        let err = matches(&["git", "show", "HEAD"], &["git", "show", "--format", "%H", "HEAD"])
            .expect_err("value left behind");
        assert!(matches!(err.reason, MismatchReason::Literal { ref found, .. } if found == "%H"));
    }

    #[test]
    fn trailing_positional_is_rejected() {
        let err = matches(&["git", "add", "{filepath}"], &["git", "add", "a.py", "b.py"])
            .expect_err("trailing");
        assert_eq!(
            err.reason,
            MismatchReason::TrailingArgument {
                found: "b.py".to_string()
            }
        );
    }

    #[test]
    fn bare_dashes_are_not_noise() {
        assert!(!is_noise_flag("-"));
        assert!(!is_noise_flag("--"));
        assert!(is_noise_flag("-x"));
        assert!(is_noise_flag("--flag=value"));
        assert!(matches(&["git", "log"], &["git", "log", "--"]).is_err());
    }

    #[test]
    fn repeated_placeholder_must_agree() {
        let raw = ["cp", "{name}", "backup/{name}"];
        let binding = matches(&raw, &["cp", "a.txt", "backup/a.txt"]).expect("agree");
        assert_eq!(binding.len(), 1);
        let err = matches(&raw, &["cp", "a.txt", "backup/b.txt"]).expect_err("conflict");
        assert!(matches!(err.reason, MismatchReason::Conflict { .. }));
    }

    #[test]
    fn standalone_placeholder_rejects_empty_argument() {
        let err = matches(&["echo", "{msg}"], &["echo", ""]).expect_err("empty");
        assert_eq!(
            err.reason,
            MismatchReason::EmptyValue {
                name: "msg".to_string()
            }
        );
    }

    #[test]
    fn greedy_alignment_does_not_backtrack() {
        // The placeholder takes the flag; the real path is then trailing.
        assert!(matches(&["git", "add", "{filepath}"], &["git", "add", "--force", "a.py"]).is_err());
    }

    #[test]
    fn first_matching_scenario_wins() {
        let scenarios = vec![
            scenario("clean", &["git", "status"]),
            scenario("dirty", &["git", "status"]),
        ];
        let selection = select_scenario("status.toml", &scenarios, &argv(&["git", "status"]), &MatchOptions::default())
            .expect("select");
        assert_eq!(selection.scenario.name, "clean");
        assert_eq!(selection.index, 0);
    }

    #[test]
    fn no_match_lists_every_candidate() {
        let scenarios = vec![
            scenario("log", &["git", "log"]),
            scenario("add", &["git", "add", "{filepath}"]),
        ];
        let err = select_scenario("git.toml", &scenarios, &argv(&["git", "add"]), &MatchOptions::default())
            .expect_err("no match");
        let report = err.no_match().expect("no match report");
        assert_eq!(report.args, argv(&["git", "add"]));
        assert_eq!(report.candidates.len(), 2);
        assert_eq!(report.candidates[1].command, argv(&["git", "add", "{filepath}"]));
        let rendered = err.to_string();
        assert!(rendered.contains("git add {filepath}"), "{rendered}");
        assert!(rendered.contains("invocation ends before"), "{rendered}");
    }

    #[derive(Debug, Clone)]
    enum Part {
        Literal(String),
        Standalone(String),
        Embedded(String),
        Repeated(String),
    }

    fn part() -> impl Strategy<Value = Part> {
        prop_oneof![
            "[a-z]{1,6}".prop_map(Part::Literal),
            "[a-z0-9]{1,6}".prop_map(Part::Standalone),
            "[a-z0-9]{0,6}".prop_map(Part::Embedded),
            "[a-z0-9]{1,6}".prop_map(Part::Repeated),
        ]
    }

    fn noise_flag() -> impl Strategy<Value = String> {
        prop_oneof![
            "-[a-z]",
            "--[a-z]{1,8}",
            "--[a-z]{1,8}=v",
            prop::sample::select(GIT_VALUE_FLAGS).prop_map(str::to_string),
        ]
    }

    /// Template tokens, the values they bind, and the substituted argv. Each
    /// argv entry is flagged when a standalone placeholder consumes it.
    fn build(parts: &[Part]) -> (Vec<String>, Binding, Vec<(String, bool)>) {
        let mut raw = Vec::new();
        let mut values = Binding::new();
        let mut args = Vec::new();
        for (idx, part) in parts.iter().enumerate() {
            match part {
                Part::Literal(word) => {
                    raw.push(word.clone());
                    args.push((word.clone(), false));
                }
                Part::Standalone(value) => {
                    raw.push(format!("{{v{idx}}}"));
                    values.insert(format!("v{idx}"), value.clone());
                    args.push((value.clone(), true));
                }
                Part::Embedded(value) => {
                    raw.push(format!("--opt{idx}={{v{idx}}}"));
                    values.insert(format!("v{idx}"), value.clone());
                    args.push((format!("--opt{idx}={value}"), false));
                }
                Part::Repeated(value) => {
                    raw.push(format!("{{v{idx}}}"));
                    raw.push(format!("--again{idx}={{v{idx}}}"));
                    values.insert(format!("v{idx}"), value.clone());
                    args.push((value.clone(), true));
                    args.push((format!("--again{idx}={value}"), false));
                }
            }
        }
        (raw, values, args)
    }

    fn plain(args: Vec<(String, bool)>) -> Vec<String> {
        args.into_iter().map(|(arg, _)| arg).collect()
    }

    proptest! {
        #[test]
        fn substituted_invocation_round_trips(parts in prop::collection::vec(part(), 1..8)) {
            let (raw, values, _) = build(&parts);
            let template = Template::compile(&raw).expect("compile");
            let args = template.substitute(&values).expect("substitute");
            let binding = match_template(&template, &args, &MatchOptions::default()).expect("match");
            prop_assert_eq!(binding, values);
        }

        #[test]
        fn inserted_noise_flags_are_tolerated(
            parts in prop::collection::vec(part(), 1..8),
            noise in prop::collection::vec((noise_flag(), 0usize..20), 1..5),
        ) {
            let (raw, values, mut args) = build(&parts);
            for (flag, at) in noise {
                // A standalone placeholder takes whatever reaches it first,
                // so noise goes before the next non-placeholder position.
                let mut at = at.min(args.len());
                while at < args.len() && args[at].1 {
                    at += 1;
                }
                args.insert(at, (flag, false));
            }
            let template = Template::compile(&raw).expect("compile");
            let binding = match_template(&template, &plain(args), &MatchOptions::default())
                .expect("match");
            prop_assert_eq!(binding, values);
        }

        #[test]
        fn repeated_placeholder_rejects_disagreement(
            value in "[a-z0-9]{1,6}",
            other in "[a-z0-9]{1,6}",
        ) {
            prop_assume!(value != other);
            let template = Template::compile(&["cp", "{f}", "--to={f}"]).expect("compile");
            let to = format!("--to={other}");
            let args = argv(&["cp", value.as_str(), to.as_str()]);
            prop_assert!(match_template(&template, &args, &MatchOptions::default()).is_err());
        }

        #[test]
        fn matching_is_deterministic(
            parts in prop::collection::vec(part(), 1..6),
            extra in prop::collection::vec("-{0,2}[a-z]{1,4}", 0..4),
        ) {
            let (raw, _, args) = build(&parts);
            let mut args = plain(args);
            args.extend(extra);
            let template = Template::compile(&raw).expect("compile");
            let first = match_template(&template, &args, &MatchOptions::default());
            let second = match_template(&template, &args, &MatchOptions::default());
            prop_assert_eq!(first, second);
        }

        #[test]
        fn trailing_positional_never_matches(
            parts in prop::collection::vec(part(), 1..6),
            flag in prop::option::of(noise_flag()),
            extra in "[a-z]{1,6}",
        ) {
            let (raw, _, args) = build(&parts);
            let mut args = plain(args);
            args.extend(flag);
            args.push(extra);
            let template = Template::compile(&raw).expect("compile");
            prop_assert!(match_template(&template, &args, &MatchOptions::default()).is_err());
        }
    }
}
