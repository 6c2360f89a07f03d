//! Shared test infrastructure for integration tests.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use command_mock::{MockConfig, MockContext};
use tempfile::TempDir;

fn manifest_dir() -> PathBuf {
    PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()))
}

/// The checked-in fixtures root (`tests/fixtures`).
pub fn fixtures_root() -> PathBuf {
    manifest_dir().join("tests").join("fixtures")
}

/// A context over the checked-in `git` mocks.
#[allow(dead_code)]
pub fn git_context() -> MockContext {
    MockContext::new(MockConfig::new(fixtures_root(), "git"))
}

#[allow(dead_code)]
pub fn argv(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// A writable copy of the checked-in fixtures.
#[allow(dead_code)]
pub fn scratch_fixtures() -> TempDir {
    let dir = tempfile::tempdir().expect("create temp dir");
    copy_tree(&fixtures_root(), dir.path());
    dir
}

fn copy_tree(from: &Path, to: &Path) {
    fs::create_dir_all(to).expect("create directory");
    for entry in fs::read_dir(from).expect("read fixtures") {
        let entry = entry.expect("dir entry");
        let dest = to.join(entry.file_name());
        if entry.path().is_dir() {
            copy_tree(&entry.path(), &dest);
        } else {
            fs::copy(entry.path(), &dest).expect("copy fixture");
        }
    }
}
