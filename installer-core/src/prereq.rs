//! Pre-flight detection of required tools

use std::path::{Path, PathBuf};

use crate::error::InstallerError;

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && (m.permissions().mode() & 0o111 != 0))
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file())
        .unwrap_or(false)
}

fn has_separator(tool: &Path) -> bool {
    tool.components().count() > 1 || tool.is_absolute()
}

/// Locate `tool` either as a direct path or by name in `search_path`
pub fn find_executable(tool: &Path, search_path: &[PathBuf]) -> Option<PathBuf> {
    if tool.as_os_str().is_empty() {
        return None;
    }
    if has_separator(tool) {
        return is_executable(tool).then(|| tool.to_path_buf());
    }

    search_path
        .iter()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(tool))
        .find(|candidate| is_executable(candidate))
}

/// Like [`find_executable`], failing with `PrerequisiteMissing`
pub fn require_executable(tool: &Path, search_path: &[PathBuf]) -> Result<PathBuf, InstallerError> {
    find_executable(tool, search_path).ok_or_else(|| InstallerError::PrerequisiteMissing {
        tool: tool.display().to_string(),
    })
}
