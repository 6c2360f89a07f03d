//! CLI argument parsing for inspecting and recording mock files.
//!
//! The CLI is a thin shell over the library: every subcommand maps to one
//! store, player or recorder call.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "cmdmock",
    version,
    about = "Inspect, resolve and record command mock scenarios",
    after_help = "Examples:\n  cmdmock list --command-type git --file log/follow.toml\n  cmdmock resolve --command-type git --file log/follow.toml -- git log --follow -- app.py\n  cmdmock record --command-type git --file status.toml --name clean -- git status",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    List(ListArgs),
    Resolve(ResolveArgs),
    Record(RecordArgs),
}

/// Selects one mock file.
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Fixtures root containing mocks/<command-type>/
    #[arg(long, value_name = "DIR", env = "CMDMOCK_FIXTURES_ROOT", default_value = "tests/fixtures")]
    pub fixtures: PathBuf,

    /// Command type (subdirectory of mocks/)
    #[arg(long, value_name = "NAME", env = "CMDMOCK_COMMAND_TYPE")]
    pub command_type: String,

    /// Mock file relative to mocks/<command-type>/
    #[arg(long, value_name = "PATH")]
    pub file: String,
}

#[derive(Parser, Debug)]
#[command(about = "List the scenarios of a mock file in priority order")]
pub struct ListArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Show which scenario an invocation would replay")]
pub struct ResolveArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Only consider this scenario
    #[arg(long, value_name = "NAME")]
    pub scenario: Option<String>,

    /// Let --since, --until, --after, --before and --author skip their value
    #[arg(long)]
    pub git_value_flags: bool,

    /// Noise flag that also skips the following argument, repeatable
    #[arg(long = "value-flag", value_name = "FLAG", allow_hyphen_values = true)]
    pub value_flags: Vec<String>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,

    /// The invocation to resolve
    #[arg(last = true, required = true, value_name = "ARGV")]
    pub argv: Vec<String>,
}

#[derive(Parser, Debug)]
#[command(about = "Run a command for real and store it as a scenario")]
pub struct RecordArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Scenario name (also the output file stem)
    #[arg(long, value_name = "NAME")]
    pub name: String,

    /// Human-readable description
    #[arg(long, default_value = "")]
    pub description: String,

    /// Placeholder value, repeatable
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// Working directory for the recorded command
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Seconds before the recorded command is killed
    #[arg(
        long,
        value_name = "SECS",
        env = "CMDMOCK_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_secs: u64,

    /// Template tokens; `{name}` marks a placeholder
    #[arg(last = true, required = true, value_name = "TEMPLATE")]
    pub template: Vec<String>,
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))?;
    if key.is_empty() {
        return Err(format!("empty key in {raw:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}
