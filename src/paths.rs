//! Typed paths into a fixtures tree.
//!
//! Layout: `<root>/mocks/<command_type>/<mock file>`, with captured stdout
//! stored beside each mock file under `outputs/`.
use std::path::{Component, Path, PathBuf};

/// Directory under a mock file's parent that holds captured stdout.
pub const OUTPUTS_DIR: &str = "outputs";

/// Convenience wrapper for locating mock files of one command type.
#[derive(Debug, Clone)]
pub struct MockPaths {
    root: PathBuf,
    command_type: String,
}

impl MockPaths {
    pub fn new(root: PathBuf, command_type: impl Into<String>) -> Self {
        Self {
            root,
            command_type: command_type.into(),
        }
    }

    /// Return the fixtures root used for path derivation.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn command_type(&self) -> &str {
        &self.command_type
    }

    /// Return the `mocks/<command_type>/` directory path.
    pub fn command_dir(&self) -> PathBuf {
        self.root.join("mocks").join(&self.command_type)
    }

    /// Resolve a relative mock-file identifier to an absolute path.
    pub fn mock_file(&self, rel: &str) -> Result<PathBuf, String> {
        validate_relative_path(rel)?;
        let joined = self.command_dir().join(rel);
        std::path::absolute(&joined).map_err(|err| format!("resolve {}: {err}", joined.display()))
    }

    /// Relative reference, from the mock file's directory, to a scenario's stdout.
    pub fn output_ref(scenario_name: &str) -> String {
        format!("{OUTPUTS_DIR}/{scenario_name}.txt")
    }
}

/// Reject absolute paths and parent traversal.
pub fn validate_relative_path(rel: &str) -> Result<(), String> {
    if rel.trim().is_empty() {
        return Err("path is empty".to_string());
    }
    let path = Path::new(rel);
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return Err(format!("{rel:?} contains '..'")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(format!("{rel:?} must be relative"))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_file_lives_under_command_dir() {
        let paths = MockPaths::new(PathBuf::from("/fixtures"), "git");
        let path = paths.mock_file("log/follow.toml").expect("resolve");
        assert_eq!(path, PathBuf::from("/fixtures/mocks/git/log/follow.toml"));
        assert_eq!(MockPaths::output_ref("basic"), "outputs/basic.txt");
    }

    #[test]
    fn relative_paths_are_validated() {
        assert!(validate_relative_path("log/follow.toml").is_ok());
        assert!(validate_relative_path("./status.toml").is_ok());
        assert!(validate_relative_path("../escape.toml").is_err());
        assert!(validate_relative_path("/etc/passwd").is_err());
        assert!(validate_relative_path("  ").is_err());
    }

    #[test]
    fn relative_root_is_made_absolute() {
        let paths = MockPaths::new(PathBuf::from("fixtures"), "git");
        let path = paths.mock_file("status.toml").expect("resolve");
        assert!(path.is_absolute());
        assert!(path.ends_with("fixtures/mocks/git/status.toml"));
    }
}
