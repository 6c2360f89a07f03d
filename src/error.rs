//! Error taxonomy shared by the compiler, store, player and recorder.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::util::format_command_line;

pub type Result<T> = std::result::Result<T, MockError>;

#[derive(Error, Debug)]
pub enum MockError {
    #[error("invalid placeholder in template token {token:?}: {reason}")]
    TemplateSyntax { token: String, reason: String },

    #[error("placeholder {{{name}}} has no value to substitute")]
    UnboundPlaceholder { name: String },

    #[error("mock file not found: {}", path.display())]
    MissingMockFile { path: PathBuf },

    #[error("invalid mock file {}: {reason}", path.display())]
    InvalidMockFile { path: PathBuf, reason: String },

    #[error("scenario {name:?} not found (available: {})", available.join(", "))]
    ScenarioNotFound {
        name: String,
        available: Vec<String>,
    },

    #[error("{0}")]
    NoMatch(Box<NoMatchReport>),

    #[error("{stream} of `{command}` is not valid UTF-8 text")]
    BinaryOutput {
        command: String,
        stream: &'static str,
    },

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("invalid {var}: {reason}")]
    Config { var: String, reason: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl MockError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        MockError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn syntax(token: &str, reason: impl Into<String>) -> Self {
        MockError::TemplateSyntax {
            token: token.to_string(),
            reason: reason.into(),
        }
    }

    /// The no-match report, if this is a `NoMatch` error.
    pub fn no_match(&self) -> Option<&NoMatchReport> {
        match self {
            MockError::NoMatch(report) => Some(report),
            _ => None,
        }
    }
}

/// One scenario that was tried and rejected.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub name: String,
    pub command: Vec<String>,
    pub reason: String,
}

/// Diagnostics for an invocation that no recorded scenario accepted.
#[derive(Debug, Clone)]
pub struct NoMatchReport {
    pub source: String,
    pub args: Vec<String>,
    pub candidates: Vec<Candidate>,
}

impl fmt::Display for NoMatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "no recorded scenario in {} matches `{}`",
            self.source,
            format_command_line(&self.args)
        )?;
        if self.candidates.is_empty() {
            return write!(f, "  (mock file has no scenarios)");
        }
        writeln!(f, "candidates:")?;
        for (idx, candidate) in self.candidates.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "  {}: {}\n    {}",
                candidate.name,
                format_command_line(&candidate.command),
                candidate.reason
            )?;
        }
        Ok(())
    }
}
