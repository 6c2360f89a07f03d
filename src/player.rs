//! Replays recorded scenarios in place of real command execution.
//!
//! A `Player` never spawns processes: an invocation either matches a recorded
//! scenario or fails with `NoMatch`.

use std::sync::{Arc, Mutex};

use crate::error::{MockError, Result};
use crate::executor::{CommandExecutor, CommandOutput, CommandRequest};
use crate::matcher::{select_scenario, MatchOptions};
use crate::scenario::{Scenario, ScenarioSet};
use crate::store::ScenarioStore;
use crate::template::Binding;

/// The outcome of resolving one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub scenario: String,
    pub binding: Binding,
    pub output: CommandOutput,
}

#[derive(Debug)]
pub struct Player {
    store: Arc<ScenarioStore>,
    source: String,
    pinned: Option<String>,
    options: MatchOptions,
    calls: Mutex<Vec<CommandRequest>>,
}

impl Player {
    /// Replay scenarios from the mock file `source` (relative to the store).
    pub fn new(store: Arc<ScenarioStore>, source: impl Into<String>) -> Self {
        Self {
            store,
            source: source.into(),
            pinned: None,
            options: MatchOptions::default(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Only consider the scenario called `name`.
    pub fn pinned(mut self, name: impl Into<String>) -> Self {
        self.pinned = Some(name.into());
        self
    }

    pub fn with_options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Load the backing scenario set, from cache after the first call.
    pub fn scenarios(&self) -> Result<Arc<ScenarioSet>> {
        self.store.load(&self.source)
    }

    /// Match `args` and return the chosen scenario with its bindings.
    pub fn resolve(&self, args: &[String]) -> Result<Resolution> {
        let set = self.scenarios()?;
        let label = set.path().display().to_string();
        let selection = match &self.pinned {
            Some(name) => {
                let scenario = set.get(name).ok_or_else(|| MockError::ScenarioNotFound {
                    name: name.clone(),
                    available: set.names(),
                })?;
                select_scenario(&label, std::iter::once(scenario), args, &self.options)?
            }
            None => select_scenario(&label, set.scenarios(), args, &self.options)?,
        };
        Ok(Resolution {
            scenario: selection.scenario.name.clone(),
            binding: selection.binding,
            output: recorded_output(selection.scenario),
        })
    }

    /// Every request this player has been asked to serve, in call order.
    pub fn calls(&self) -> Vec<CommandRequest> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn remember(&self, request: &CommandRequest) {
        let mut calls = self
            .calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        calls.push(request.clone());
    }
}

impl CommandExecutor for Player {
    fn execute(&self, request: &CommandRequest) -> Result<CommandOutput> {
        self.remember(request);
        let resolution = self.resolve(&request.args)?;
        tracing::debug!(
            source = %self.source,
            scenario = %resolution.scenario,
            command = %request.command_line(),
            "replayed recorded output"
        );
        Ok(resolution.output)
    }
}

fn recorded_output(scenario: &Scenario) -> CommandOutput {
    CommandOutput {
        returncode: scenario.returncode,
        stdout: scenario.stdout.clone(),
        stderr: scenario.stderr.clone(),
    }
}
