use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use command_mock::util::{display_path, format_command_line, truncate_string};
use command_mock::{
    Binding, MatchOptions, MockError, MockPaths, Player, RecordRequest, Recorder, ScenarioStore,
    SystemExecutor,
};

mod cli;
use cli::{Command, ListArgs, RecordArgs, ResolveArgs, RootArgs, SourceArgs};

const STDOUT_PREVIEW_BYTES: usize = 512;

#[derive(Serialize)]
struct ListEntry<'a> {
    name: &'a str,
    description: &'a str,
    command: &'a [String],
    returncode: i32,
    output_file: &'a str,
}

#[derive(Serialize)]
struct ResolveReport<'a> {
    matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    scenario: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    binding: Option<&'a Binding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    returncode: Option<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    candidates: Vec<CandidateReport<'a>>,
}

#[derive(Serialize)]
struct CandidateReport<'a> {
    name: &'a str,
    command: &'a [String],
    reason: &'a str,
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let args = RootArgs::parse();

    match args.command {
        Command::List(args) => cmd_list(args),
        Command::Resolve(args) => cmd_resolve(args),
        Command::Record(args) => cmd_record(args),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn paths(source: &SourceArgs) -> MockPaths {
    MockPaths::new(source.fixtures.clone(), source.command_type.clone())
}

fn cmd_list(args: ListArgs) -> Result<ExitCode> {
    let store = ScenarioStore::new(paths(&args.source));
    let set = store
        .load(&args.source.file)
        .with_context(|| format!("load {}", args.source.file))?;

    if args.json {
        let entries: Vec<ListEntry<'_>> = set
            .scenarios()
            .iter()
            .map(|scenario| ListEntry {
                name: &scenario.name,
                description: &scenario.description,
                command: scenario.template.raw(),
                returncode: scenario.returncode,
                output_file: &scenario.output_file,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(ExitCode::SUCCESS);
    }

    let base = std::path::absolute(&args.source.fixtures)
        .unwrap_or_else(|_| args.source.fixtures.clone());
    println!(
        "{} ({} scenarios)",
        display_path(set.path(), Some(base.as_path())),
        set.len()
    );
    for scenario in set.scenarios() {
        println!("  {}: {}", scenario.name, scenario.template);
        if !scenario.description.is_empty() {
            println!("      {}", scenario.description);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_resolve(args: ResolveArgs) -> Result<ExitCode> {
    let store = Arc::new(ScenarioStore::new(paths(&args.source)));
    let base = if args.git_value_flags {
        MatchOptions::git_value_flags()
    } else {
        MatchOptions::default()
    };
    let options = args
        .value_flags
        .iter()
        .fold(base, |options, flag| options.with_value_flag(flag.clone()));
    let mut player = Player::new(store, args.source.file.clone()).with_options(options);
    if let Some(name) = &args.scenario {
        player = player.pinned(name.clone());
    }

    match player.resolve(&args.argv) {
        Ok(resolution) => {
            if args.json {
                let report = ResolveReport {
                    matched: true,
                    scenario: Some(&resolution.scenario),
                    binding: Some(&resolution.binding),
                    returncode: Some(resolution.output.returncode),
                    candidates: Vec::new(),
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("scenario: {}", resolution.scenario);
                for (name, value) in &resolution.binding {
                    println!("  {name} = {value}");
                }
                println!("returncode: {}", resolution.output.returncode);
                println!(
                    "stdout:\n{}",
                    truncate_string(&resolution.output.stdout, STDOUT_PREVIEW_BYTES)
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(MockError::NoMatch(report)) => {
            if args.json {
                let json = ResolveReport {
                    matched: false,
                    scenario: None,
                    binding: None,
                    returncode: None,
                    candidates: report
                        .candidates
                        .iter()
                        .map(|candidate| CandidateReport {
                            name: &candidate.name,
                            command: &candidate.command,
                            reason: &candidate.reason,
                        })
                        .collect(),
                };
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                eprintln!("{report}");
            }
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err).with_context(|| {
            format!("resolve `{}`", format_command_line(&args.argv))
        }),
    }
}

fn cmd_record(args: RecordArgs) -> Result<ExitCode> {
    let executor = SystemExecutor::new(Duration::from_secs(args.timeout_secs));
    let recorder = Recorder::new(paths(&args.source), executor);
    let mut request = RecordRequest::new(args.name.clone(), args.template.clone())
        .description(args.description.clone());
    for (key, value) in &args.vars {
        request = request.var(key.clone(), value.clone());
    }
    if let Some(cwd) = &args.cwd {
        request = request.cwd(cwd.clone());
    }

    let scenario = recorder
        .record_into(&args.source.file, &request)
        .with_context(|| format!("record scenario {}", args.name))?;
    println!(
        "recorded {} (returncode {}, {} bytes stdout) into {}",
        scenario.name,
        scenario.returncode,
        scenario.stdout.len(),
        args.source.file
    );
    Ok(ExitCode::SUCCESS)
}
