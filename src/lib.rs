//! Deterministic stand-ins for external command-line tools in tests.
//!
//! Recorded scenarios pair a command template (`["git", "log", "--grep={term}"]`)
//! with the output the real command produced. A [`Player`] matches live
//! invocations against those templates and replays the recorded result; a
//! [`Recorder`] runs the real command once and writes the scenario.
//!
//! ```no_run
//! use command_mock::{CommandExecutor, CommandRequest, MockConfig, MockContext};
//!
//! let context = MockContext::new(MockConfig::new("tests/fixtures", "git"));
//! let player = context.player("log/follow.toml");
//! let output = player.execute(&CommandRequest::new(["git", "log", "--follow", "--", "app.py"]))?;
//! assert_eq!(output.returncode, 0);
//! # Ok::<(), command_mock::MockError>(())
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod matcher;
pub mod paths;
pub mod player;
pub mod recorder;
pub mod scenario;
pub mod store;
pub mod template;
pub mod util;

pub use config::{MockConfig, MockContext};
pub use error::{Candidate, MockError, NoMatchReport, Result};
pub use executor::{CommandExecutor, CommandOutput, CommandRequest, SystemExecutor};
pub use matcher::{match_template, select_scenario, MatchOptions, Mismatch, MismatchReason};
pub use paths::MockPaths;
pub use player::{Player, Resolution};
pub use recorder::{RecordRequest, Recorder};
pub use scenario::{Scenario, ScenarioSet};
pub use store::ScenarioStore;
pub use template::{Binding, Template, Token};
