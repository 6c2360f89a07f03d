use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{MockError, Result};

/// Render an argv the way a shell user would type it.
pub fn format_command_line(argv: &[String]) -> String {
    shell_words::join(argv)
}

pub fn display_path(path: &Path, base: Option<&Path>) -> String {
    if let Some(base) = base {
        if let Ok(relative) = path.strip_prefix(base) {
            return relative.display().to_string();
        }
    }
    path.display().to_string()
}

pub fn truncate_string(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut truncated = String::new();
    for ch in text.chars() {
        if truncated.len() + ch.len_utf8() > max_bytes {
            break;
        }
        truncated.push(ch);
    }
    truncated
}

/// Current epoch time in milliseconds for recording timestamps.
pub fn now_epoch_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

/// Files that are replaced together or not at all.
///
/// Each file is fully written to a temp file beside its destination before
/// anything is published. Publishing renames them in staging order; if one
/// rename fails, the destinations already replaced get their previous
/// contents back and newly created ones are removed.
#[derive(Debug, Default)]
pub struct StagedWrites {
    staged: Vec<(PathBuf, tempfile::NamedTempFile)>,
}

impl StagedWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, dest: &Path, bytes: &[u8]) -> Result<()> {
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .map_err(|err| MockError::io(format!("create {}", parent.display()), err))?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|err| MockError::io(format!("stage {}", dest.display()), err))?;
        tmp.write_all(bytes)
            .map_err(|err| MockError::io(format!("write {}", dest.display()), err))?;
        self.staged.push((dest.to_path_buf(), tmp));
        Ok(())
    }

    pub fn publish(self) -> Result<()> {
        let mut published: Vec<(PathBuf, Option<Vec<u8>>)> = Vec::new();
        for (dest, tmp) in self.staged {
            let previous = match backup(&dest) {
                Ok(previous) => previous,
                Err(err) => {
                    rollback_publish(&published);
                    return Err(err);
                }
            };
            if let Err(err) = tmp.persist(&dest) {
                rollback_publish(&published);
                return Err(MockError::io(format!("publish {}", dest.display()), err.error));
            }
            published.push((dest, previous));
        }
        Ok(())
    }
}

fn backup(dest: &Path) -> Result<Option<Vec<u8>>> {
    if !dest.is_file() {
        return Ok(None);
    }
    fs::read(dest)
        .map(Some)
        .map_err(|err| MockError::io(format!("back up {}", dest.display()), err))
}

fn rollback_publish(published: &[(PathBuf, Option<Vec<u8>>)]) {
    for (dest, previous) in published.iter().rev() {
        let restored = match previous {
            Some(bytes) => fs::write(dest, bytes),
            None => fs::remove_file(dest),
        };
        if let Err(err) = restored {
            tracing::warn!(path = %dest.display(), error = %err, "rollback failed");
        }
    }
}
