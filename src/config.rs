//! Configuration for a mock session and the context built from it.
//!
//! The config selects which command type's mocks to use and whether the
//! caller wants to regenerate recordings. Branching on `regenerate` is left to
//! the caller; `MockContext` only hands out the two executors.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{MockError, Result};
use crate::executor::{SystemExecutor, DEFAULT_TIMEOUT};
use crate::paths::MockPaths;
use crate::player::Player;
use crate::recorder::Recorder;
use crate::store::ScenarioStore;

pub const ENV_FIXTURES_ROOT: &str = "CMDMOCK_FIXTURES_ROOT";
pub const ENV_COMMAND_TYPE: &str = "CMDMOCK_COMMAND_TYPE";
pub const ENV_REGENERATE: &str = "CMDMOCK_REGENERATE";
pub const ENV_TIMEOUT_SECS: &str = "CMDMOCK_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockConfig {
    pub fixtures_root: PathBuf,
    pub command_type: String,
    pub regenerate: bool,
    /// Wall-clock limit for real commands run while recording.
    pub timeout: Duration,
}

impl MockConfig {
    pub fn new(fixtures_root: impl Into<PathBuf>, command_type: impl Into<String>) -> Self {
        Self {
            fixtures_root: fixtures_root.into(),
            command_type: command_type.into(),
            regenerate: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn regenerate(mut self, regenerate: bool) -> Self {
        self.regenerate = regenerate;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a config from `CMDMOCK_*` environment variables.
    ///
    /// `default_command_type` is used when `CMDMOCK_COMMAND_TYPE` is unset.
    pub fn from_env(default_command_type: &str) -> Result<Self> {
        Self::from_lookup(default_command_type, |key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(default_command_type: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fixtures_root = lookup(ENV_FIXTURES_ROOT)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("tests").join("fixtures"));
        let command_type =
            lookup(ENV_COMMAND_TYPE).unwrap_or_else(|| default_command_type.to_string());
        if command_type.trim().is_empty() {
            return Err(config_error(ENV_COMMAND_TYPE, "command type is empty"));
        }
        let regenerate = match lookup(ENV_REGENERATE) {
            Some(raw) => parse_flag(&raw)
                .ok_or_else(|| config_error(ENV_REGENERATE, format!("not a boolean: {raw:?}")))?,
            None => false,
        };
        let timeout = match lookup(ENV_TIMEOUT_SECS) {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| config_error(ENV_TIMEOUT_SECS, format!("not an integer: {raw:?}")))?;
                if secs == 0 {
                    return Err(config_error(ENV_TIMEOUT_SECS, "must be > 0"));
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_TIMEOUT,
        };
        Ok(Self {
            fixtures_root,
            command_type,
            regenerate,
            timeout,
        })
    }

    pub fn paths(&self) -> MockPaths {
        MockPaths::new(self.fixtures_root.clone(), self.command_type.clone())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn config_error(var: &str, reason: impl Into<String>) -> MockError {
    MockError::Config {
        var: var.to_string(),
        reason: reason.into(),
    }
}

/// One store shared by every player of a test session.
#[derive(Debug, Clone)]
pub struct MockContext {
    config: MockConfig,
    store: Arc<ScenarioStore>,
}

impl MockContext {
    pub fn new(config: MockConfig) -> Self {
        let store = Arc::new(ScenarioStore::new(config.paths()));
        Self { config, store }
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ScenarioStore> {
        &self.store
    }

    /// Whether the caller should record instead of replay.
    pub fn regenerate(&self) -> bool {
        self.config.regenerate
    }

    /// A player over mock file `source`.
    pub fn player(&self, source: &str) -> Player {
        Player::new(Arc::clone(&self.store), source)
    }

    /// A recorder that runs real commands with the configured timeout.
    pub fn recorder(&self) -> Recorder {
        Recorder::new(self.config.paths(), SystemExecutor::new(self.config.timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let config = MockConfig::from_lookup("git", lookup(&[])).expect("config");
        assert_eq!(config, MockConfig::new("tests/fixtures", "git"));
    }

    #[test]
    fn env_overrides_every_field() {
        let config = MockConfig::from_lookup(
            "git",
            lookup(&[
                (ENV_FIXTURES_ROOT, "/data"),
                (ENV_COMMAND_TYPE, "docker"),
                (ENV_REGENERATE, "YES"),
                (ENV_TIMEOUT_SECS, "5"),
            ]),
        )
        .expect("config");
        assert_eq!(config.fixtures_root, PathBuf::from("/data"));
        assert_eq!(config.command_type, "docker");
        assert!(config.regenerate);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(MockConfig::from_lookup("git", lookup(&[(ENV_REGENERATE, "maybe")])).is_err());
        assert!(MockConfig::from_lookup("git", lookup(&[(ENV_TIMEOUT_SECS, "0")])).is_err());
        assert!(MockConfig::from_lookup("git", lookup(&[(ENV_TIMEOUT_SECS, "soon")])).is_err());
        assert!(MockConfig::from_lookup("", lookup(&[])).is_err());
    }

    #[test]
    fn context_players_share_one_store() {
        let context = MockContext::new(MockConfig::new("/fixtures", "git").regenerate(true));
        assert!(context.regenerate());
        let a = context.player("a.toml");
        let b = context.player("b.toml");
        assert_eq!(a.source(), "a.toml");
        assert_eq!(b.source(), "b.toml");
        assert_eq!(Arc::strong_count(context.store()), 3);
        assert_eq!(context.recorder().paths().command_type(), "git");
    }
}
