//! Installer configuration
//!
//! The configuration is assembled once at start-up (by the CLI, from flags and
//! environment) and handed to the session by value. Nothing in this crate reads
//! the process environment on its own.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the devkit sources
pub const DEFAULT_BASE_URL: &str = "https://raw.githubusercontent.com/vietcgi/devkit";

/// Default branch the script is fetched from
pub const DEFAULT_BRANCH: &str = "main";

/// Default script name under the branch
pub const DEFAULT_SCRIPT_NAME: &str = "bootstrap.sh";

/// Default interpreter used to run the script
pub const DEFAULT_INTERPRETER: &str = "bash";

/// Time budget for the script download
pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Time budget for the checksum download
pub const DEFAULT_CHECKSUM_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a run needs to know, resolved up front
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    /// Base URL the branch and script name are appended to
    pub base_url: String,

    /// Branch or version selector substituted into the script URL
    pub branch: String,

    /// File name of the script under the branch
    pub script_name: String,

    /// Operator-supplied SHA-256 of the script (highest trust priority)
    pub inline_checksum: Option<String>,

    /// URL of a checksum file whose first token is the expected digest
    pub checksum_url: Option<String>,

    /// Timeout for the script download
    pub script_timeout: Duration,

    /// Timeout for the checksum download
    pub checksum_timeout: Duration,

    /// Interpreter the verified script is handed to
    pub interpreter: PathBuf,

    /// Reject plain-HTTP URLs
    pub require_https: bool,

    /// Parent directory for the temporary workspace (OS temp dir when unset)
    pub workspace_root: Option<PathBuf>,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            script_name: DEFAULT_SCRIPT_NAME.to_string(),
            inline_checksum: None,
            checksum_url: None,
            script_timeout: DEFAULT_SCRIPT_TIMEOUT,
            checksum_timeout: DEFAULT_CHECKSUM_TIMEOUT,
            interpreter: PathBuf::from(DEFAULT_INTERPRETER),
            require_https: true,
            workspace_root: None,
        }
    }
}

impl InstallerConfig {
    /// Full URL of the script for the configured branch
    pub fn script_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.branch.trim_matches('/'),
            self.script_name.trim_start_matches('/')
        )
    }

    /// Retrieval target for the script inside `workspace`
    pub fn script_target(&self, workspace: &Path) -> RetrievalTarget {
        let file_name = Path::new(&self.script_name)
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| DEFAULT_SCRIPT_NAME.into());

        RetrievalTarget::new(
            self.script_url(),
            workspace.join(file_name),
            self.script_timeout,
        )
    }
}

/// One remote resource and where it lands on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalTarget {
    url: String,
    destination: PathBuf,
    timeout: Duration,
}

impl RetrievalTarget {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
