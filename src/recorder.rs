//! Capture real command output as scenarios and persist mock files.
//!
//! Recording runs the substituted command through a `CommandExecutor`, so a
//! failed or timed-out run never reaches the filesystem. Captured outputs and
//! the mock file are staged together and published with the mock file last;
//! a failed publish puts the previous files back.

use std::path::{Path, PathBuf};

use crate::error::{MockError, Result};
use crate::executor::{CommandExecutor, CommandRequest, SystemExecutor};
use crate::paths::MockPaths;
use crate::scenario::{
    is_valid_scenario_name, parse_mock_file, render_mock_file, validate_entries, MockFile,
    MockFileMeta, Scenario, ScenarioEntry,
};
use crate::template::{Binding, Template};
use crate::util::{now_epoch_ms, StagedWrites};

/// What to record: a named template plus the values to run it with.
#[derive(Debug, Clone, Default)]
pub struct RecordRequest {
    pub name: String,
    pub description: String,
    pub command: Vec<String>,
    pub vars: Binding,
    pub cwd: Option<PathBuf>,
    pub input: Option<String>,
}

impl RecordRequest {
    pub fn new<I, S>(name: impl Into<String>, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            command: command.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }
}

#[derive(Debug)]
pub struct Recorder<E = SystemExecutor> {
    paths: MockPaths,
    executor: E,
}

impl Recorder<SystemExecutor> {
    pub fn new(paths: MockPaths, executor: SystemExecutor) -> Self {
        Self { paths, executor }
    }
}

impl<E: CommandExecutor> Recorder<E> {
    pub fn with_executor(paths: MockPaths, executor: E) -> Self {
        Self { paths, executor }
    }

    pub fn paths(&self) -> &MockPaths {
        &self.paths
    }

    /// Run the substituted command and capture it as a scenario.
    pub fn record_scenario(&self, request: &RecordRequest) -> Result<Scenario> {
        if !is_valid_scenario_name(&request.name) {
            return Err(MockError::InvalidMockFile {
                path: PathBuf::from(&request.name),
                reason: format!("scenario name {:?} is invalid", request.name),
            });
        }
        let template = Template::compile(&request.command)?;
        let args = template.substitute(&request.vars)?;
        let placeholders = template.placeholders();
        for unused in request
            .vars
            .keys()
            .filter(|name| !placeholders.contains(&name.as_str()))
        {
            tracing::warn!(scenario = %request.name, var = %unused, "value has no placeholder");
        }

        let command = CommandRequest {
            args,
            cwd: request.cwd.clone(),
            input: request.input.clone(),
        };
        let output = self.executor.execute(&command)?;
        tracing::info!(
            scenario = %request.name,
            command = %command.command_line(),
            returncode = output.returncode,
            "recorded scenario"
        );
        Ok(Scenario {
            name: request.name.clone(),
            description: request.description.clone(),
            template,
            returncode: output.returncode,
            output_file: MockPaths::output_ref(&request.name),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    /// Write `scenarios` as the complete contents of mock file `rel`.
    pub fn write_mock_file(&self, scenarios: &[Scenario], rel: &str) -> Result<PathBuf> {
        let path = self.resolve(rel)?;
        let entries: Vec<ScenarioEntry> = scenarios.iter().map(Scenario::to_entry).collect();
        if let Some(errors) = validate_entries(&entries) {
            return Err(MockError::InvalidMockFile {
                path,
                reason: errors.join("; "),
            });
        }
        let base = mock_dir(&path);
        let mut writes = StagedWrites::new();
        for scenario in scenarios {
            writes.stage(&base.join(&scenario.output_file), scenario.stdout.as_bytes())?;
        }
        self.publish_with_entries(writes, &path, entries)?;
        Ok(path)
    }

    /// Record one scenario and store it in `rel`, replacing any scenario of
    /// the same name and leaving the others untouched.
    pub fn record_into(&self, rel: &str, request: &RecordRequest) -> Result<Scenario> {
        let path = self.resolve(rel)?;
        let mut entries = if path.is_file() {
            let text = std::fs::read_to_string(&path)
                .map_err(|err| MockError::io(format!("read {}", path.display()), err))?;
            parse_mock_file(&path, &text)?.scenarios
        } else {
            Vec::new()
        };

        let scenario = self.record_scenario(request)?;
        let entry = scenario.to_entry();
        match entries.iter_mut().find(|existing| existing.name == entry.name) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        let mut writes = StagedWrites::new();
        writes.stage(
            &mock_dir(&path).join(&scenario.output_file),
            scenario.stdout.as_bytes(),
        )?;
        self.publish_with_entries(writes, &path, entries)?;
        Ok(scenario)
    }

    fn resolve(&self, rel: &str) -> Result<PathBuf> {
        self.paths
            .mock_file(rel)
            .map_err(|reason| MockError::InvalidMockFile {
                path: PathBuf::from(rel),
                reason,
            })
    }

    /// Stage the mock file after the outputs in `writes` and publish them all.
    fn publish_with_entries(
        &self,
        mut writes: StagedWrites,
        path: &Path,
        scenarios: Vec<ScenarioEntry>,
    ) -> Result<()> {
        let file = MockFile {
            meta: Some(MockFileMeta {
                command_type: Some(self.paths.command_type().to_string()),
                recorded_at_epoch_ms: u64::try_from(now_epoch_ms()).ok(),
            }),
            scenarios,
        };
        let text = render_mock_file(&file)?;
        writes.stage(path, text.as_bytes())?;
        writes.publish()?;
        tracing::debug!(path = %path.display(), scenarios = file.scenarios.len(), "wrote mock file");
        Ok(())
    }
}

fn mock_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}
