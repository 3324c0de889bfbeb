//! Process-scoped temporary workspace
//!
//! Backed by [`tempfile::TempDir`], so the directory is removed when the guard
//! is dropped: on success, on every error path, and during unwinding.

use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::InstallerError;

const WORKSPACE_PREFIX: &str = "devkit-install-";

/// Exclusively owned temporary directory for one run
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh directory under `root`, or under the OS temp dir
    pub fn create(root: Option<&Path>) -> Result<Self, InstallerError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);

        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|source| InstallerError::Workspace { source })?;

        debug!("Created workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory now, reporting failures instead of ignoring them
    pub fn release(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!("Removed workspace {}", path.display()),
            Err(e) => warn!("Failed to remove workspace {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_removes_contents() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(Some(root.path())).unwrap();
        let path = workspace.path().to_path_buf();
        std::fs::write(path.join("bootstrap.sh"), "#!/bin/sh\n").unwrap();

        assert!(path.starts_with(root.path()));
        workspace.release();
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let workspace = Workspace::create(Some(root.path())).unwrap();
            workspace.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_removed_on_panic() {
        let root = tempfile::tempdir().unwrap();
        let root_path = root.path().to_path_buf();

        let result = std::panic::catch_unwind(move || {
            let _workspace = Workspace::create(Some(&root_path)).unwrap();
            panic!("stage failed");
        });

        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_each_workspace_is_fresh() {
        let root = tempfile::tempdir().unwrap();
        let a = Workspace::create(Some(root.path())).unwrap();
        let b = Workspace::create(Some(root.path())).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_missing_root_is_workspace_error() {
        let err = Workspace::create(Some(Path::new("/nonexistent/devkit-root"))).unwrap_err();
        assert!(matches!(err, InstallerError::Workspace { .. }));
    }
}
