//! Scenario model and the TOML mock-file schema.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MockError, Result};
use crate::template::Template;

/// Optional provenance block at the top of a mock file.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MockFileMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at_epoch_ms: Option<u64>,
}

/// On-disk form of a mock file.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct MockFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<MockFileMeta>,
    #[serde(default)]
    pub scenarios: Vec<ScenarioEntry>,
}

/// On-disk form of one scenario.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScenarioEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub command: Vec<String>,
    pub returncode: i32,
    #[serde(alias = "output_reference")]
    pub output_file: String,
    #[serde(default)]
    pub stderr: String,
}

/// A compiled scenario with its captured stdout loaded.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    pub template: Template,
    pub returncode: i32,
    /// Path of the captured stdout, relative to the mock file's directory.
    pub output_file: String,
    pub stdout: String,
    pub stderr: String,
}

impl Scenario {
    pub fn to_entry(&self) -> ScenarioEntry {
        ScenarioEntry {
            name: self.name.clone(),
            description: self.description.clone(),
            command: self.template.raw().to_vec(),
            returncode: self.returncode,
            output_file: self.output_file.clone(),
            stderr: self.stderr.clone(),
        }
    }
}

/// The ordered scenarios of one mock file; order is match priority.
#[derive(Debug)]
pub struct ScenarioSet {
    path: PathBuf,
    meta: Option<MockFileMeta>,
    scenarios: Vec<Scenario>,
}

impl ScenarioSet {
    /// Parse and compile a mock file, reading each referenced stdout capture.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(MockError::MissingMockFile {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path)
            .map_err(|err| MockError::io(format!("read {}", path.display()), err))?;
        let file = parse_mock_file(path, &text)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let scenarios = file
            .scenarios
            .into_iter()
            .map(|entry| compile_entry(base, entry))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            path: path.to_path_buf(),
            meta: file.meta,
            scenarios,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn meta(&self) -> Option<&MockFileMeta> {
        self.meta.as_ref()
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn get(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|scenario| scenario.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.scenarios.iter().map(|s| s.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

/// Parse mock-file TOML and validate its entries.
pub fn parse_mock_file(path: &Path, text: &str) -> Result<MockFile> {
    let file: MockFile = toml::from_str(text).map_err(|err| MockError::InvalidMockFile {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    if let Some(errors) = validate_entries(&file.scenarios) {
        return Err(MockError::InvalidMockFile {
            path: path.to_path_buf(),
            reason: errors.join("; "),
        });
    }
    Ok(file)
}

pub fn render_mock_file(file: &MockFile) -> Result<String> {
    toml::to_string_pretty(file).map_err(|err| MockError::InvalidMockFile {
        path: PathBuf::new(),
        reason: format!("serialize mock file: {err}"),
    })
}

/// Scenario names double as output file stems.
pub fn is_valid_scenario_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'))
}

/// Validate scenario entries, returning errors if any.
pub fn validate_entries(entries: &[ScenarioEntry]) -> Option<Vec<String>> {
    let mut errors = Vec::new();
    let mut seen = BTreeSet::new();
    for (idx, entry) in entries.iter().enumerate() {
        if !is_valid_scenario_name(&entry.name) {
            errors.push(format!("scenarios[{idx}].name {:?} is invalid", entry.name));
        }
        if !seen.insert(entry.name.as_str()) {
            errors.push(format!("scenario name {:?} is duplicated", entry.name));
        }
        if entry.command.is_empty() {
            errors.push(format!("scenarios[{idx}].command is empty"));
        }
        if let Err(err) = crate::paths::validate_relative_path(&entry.output_file) {
            errors.push(format!("scenarios[{idx}].output_file invalid: {err}"));
        }
    }
    if errors.is_empty() {
        None
    } else {
        Some(errors)
    }
}

fn compile_entry(base: &Path, entry: ScenarioEntry) -> Result<Scenario> {
    let template = Template::compile(&entry.command)?;
    let output_path = base.join(&entry.output_file);
    if !output_path.is_file() {
        return Err(MockError::MissingMockFile { path: output_path });
    }
    let bytes = std::fs::read(&output_path)
        .map_err(|err| MockError::io(format!("read {}", output_path.display()), err))?;
    let stdout = String::from_utf8(bytes).map_err(|_| MockError::InvalidMockFile {
        path: output_path.clone(),
        reason: "captured stdout is not valid UTF-8".to_string(),
    })?;
    Ok(Scenario {
        name: entry.name,
        description: entry.description,
        template,
        returncode: entry.returncode,
        output_file: entry.output_file,
        stdout,
        stderr: entry.stderr,
    })
}
