//! Installer error types with clear, actionable messages

use std::path::PathBuf;
use thiserror::Error;

/// Exit code reported for every run that stops before the script executes
pub const ABORT_EXIT_CODE: i32 = 1;

/// Signal number of an operator interrupt (Ctrl-C)
pub const SIGINT: i32 = 2;

/// Signal number of a termination request (`kill`, `timeout`, service managers)
pub const SIGTERM: i32 = 15;

/// Exit code reported when the operator interrupts the run with Ctrl-C
pub const INTERRUPT_EXIT_CODE: i32 = 128 + SIGINT;

/// Failures of a single HTTP retrieval
#[derive(Error, Debug)]
pub enum TransportError {
    /// Network, DNS or TLS failure
    #[error("could not reach {url}: {reason}")]
    Unreachable { url: String, reason: String },

    /// The request did not finish within its time budget
    #[error("timed out after {seconds}s fetching {url}")]
    Timeout { url: String, seconds: u64 },

    /// The server answered successfully but sent no bytes
    #[error("empty response body from {url}")]
    EmptyBody { url: String },

    /// Non-success HTTP status
    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// Plain-HTTP URL while HTTPS is required
    #[error("refusing non-HTTPS URL: {url}")]
    InsecureScheme { url: String },

    /// The configured URL cannot be parsed
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Writing the downloaded body to disk failed
    #[error("failed to write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    /// Whether the remote side failed, as opposed to the local configuration or disk
    pub fn is_service_failure(&self) -> bool {
        matches!(
            self,
            TransportError::Unreachable { .. }
                | TransportError::Timeout { .. }
                | TransportError::EmptyBody { .. }
                | TransportError::HttpStatus { .. }
        )
    }
}

/// Which remote resource a transport failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Script,
    Checksum,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::Script => f.write_str("bootstrap script"),
            Resource::Checksum => f.write_str("checksum file"),
        }
    }
}

/// Installer errors, one variant per failure class
#[derive(Error, Debug)]
pub enum InstallerError {
    /// A tool the run depends on is not installed
    #[error("Required tool not found: {tool}")]
    PrerequisiteMissing { tool: String },

    /// Downloading a resource failed
    #[error("Failed to download {resource}: {source}")]
    Transport {
        resource: Resource,
        #[source]
        source: TransportError,
    },

    /// The downloaded script does not start with a shell interpreter line
    #[error("Downloaded content from {url} is not a shell script (first line: {first_line:?})")]
    NotAScript { url: String, first_line: String },

    /// The expected checksum is not a SHA-256 hex digest
    #[error("Malformed checksum {value:?}: expected 64 hexadecimal characters")]
    MalformedChecksum { value: String },

    /// The script digest differs from the trusted value
    #[error("SECURITY ALERT: bootstrap script integrity check failed!\n\nExpected SHA-256: {expected}\nActual SHA-256:   {actual}\n\nThe downloaded script does not match the trusted checksum.\nIt has NOT been executed. Treat this as a possible tampering incident.")]
    VerificationMismatch { expected: String, actual: String },

    /// The script ran and exited unsuccessfully
    #[error("Bootstrap script exited with status {code}")]
    ExecutionFailure { code: i32, signaled: bool },

    /// The interpreter could not be started
    #[error("Failed to start {interpreter}")]
    Spawn {
        interpreter: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The temporary workspace could not be created
    #[error("Failed to create temporary workspace")]
    Workspace {
        #[source]
        source: std::io::Error,
    },

    /// The run was stopped by a signal
    #[error("Interrupted by signal {signal}")]
    Interrupted { signal: i32 },
}

impl InstallerError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            InstallerError::Interrupted { signal } => 128 + signal,
            InstallerError::ExecutionFailure { code, .. } => *code,
            _ => ABORT_EXIT_CODE,
        }
    }

    /// Whether the failure happened before the executor stage
    pub fn is_abort(&self) -> bool {
        !matches!(self, InstallerError::ExecutionFailure { .. })
    }

    /// Recovery steps shown to the operator
    pub fn remediation(&self) -> &'static [&'static str] {
        match self {
            InstallerError::PrerequisiteMissing { .. } => &[
                "Install the missing tool with your package manager",
                "Verify it is on PATH: which <tool>",
                "Or point --interpreter at an absolute path",
            ],
            InstallerError::Transport { source, .. } if !source.is_service_failure() => &[
                "Check the configured URLs (--base-url, --checksum-url and the DEVKIT_* variables)",
                "Serve the checksum over https://; plain HTTP is refused unless --allow-http is given",
            ],
            InstallerError::Transport { .. } => &[
                "Check your internet connection",
                "Verify GitHub is accessible: curl -I https://github.com",
                "Re-run the installer; failed downloads are never retried automatically",
                "Use offline verification with the DEVKIT_BOOTSTRAP_CHECKSUM env var",
            ],
            InstallerError::NotAScript { .. } => &[
                "A proxy or captive portal may be answering instead of the server",
                "Check the branch name (DEVKIT_BRANCH) and base URL",
            ],
            InstallerError::MalformedChecksum { .. } => &[
                "Provide the full SHA-256 digest as 64 hex characters",
                "Compute it locally with: sha256sum bootstrap.sh",
            ],
            InstallerError::VerificationMismatch { .. } => &[
                "Do not run the downloaded script manually",
                "Verify you are downloading from the official source",
                "Check whether your network is filtering or rewriting downloads",
                "Confirm the expected checksum matches the selected branch",
            ],
            InstallerError::ExecutionFailure { .. } => &[
                "Review the script output above for the failing step",
                "Re-run the installer once the problem is fixed",
            ],
            InstallerError::Spawn { .. } => &[
                "Check that the interpreter is executable",
                "Run with --log-level debug for details",
            ],
            InstallerError::Workspace { .. } => &[
                "Check free space and permissions of the temporary directory",
                "Set TMPDIR to a writable location",
            ],
            InstallerError::Interrupted { .. } => &[],
        }
    }

    /// Log security-critical failures on the dedicated target
    pub fn log_if_security_critical(&self) {
        if let InstallerError::VerificationMismatch { expected, actual } = self {
            tracing::error!(
                target: "security",
                expected = %expected,
                actual = %actual,
                "INTEGRITY VIOLATION: refusing to execute bootstrap script"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aborts_use_sentinel_exit_code() {
        let errors = [
            InstallerError::PrerequisiteMissing {
                tool: "bash".into(),
            },
            InstallerError::Transport {
                resource: Resource::Script,
                source: TransportError::EmptyBody {
                    url: "https://example.com".into(),
                },
            },
            InstallerError::MalformedChecksum {
                value: "abc".into(),
            },
            InstallerError::VerificationMismatch {
                expected: "0".repeat(64),
                actual: "1".repeat(64),
            },
        ];

        for err in errors {
            assert_eq!(err.exit_code(), ABORT_EXIT_CODE, "{err}");
            assert!(err.is_abort());
            assert!(!err.remediation().is_empty());
        }
    }

    #[test]
    fn test_execution_failure_propagates_child_code() {
        let err = InstallerError::ExecutionFailure {
            code: 42,
            signaled: false,
        };
        assert_eq!(err.exit_code(), 42);
        assert!(!err.is_abort());
    }

    #[test]
    fn test_interrupt_exit_code_follows_signal() {
        assert_eq!(
            InstallerError::Interrupted { signal: SIGINT }.exit_code(),
            INTERRUPT_EXIT_CODE
        );
        assert_eq!(InstallerError::Interrupted { signal: SIGTERM }.exit_code(), 143);
    }

    #[test]
    fn test_only_remote_failures_are_service_failures() {
        let url = "http://example.com/bootstrap.sh.sha256".to_string();
        assert!(TransportError::Timeout {
            url: url.clone(),
            seconds: 10
        }
        .is_service_failure());
        assert!(TransportError::HttpStatus {
            url: url.clone(),
            status: 503
        }
        .is_service_failure());
        assert!(!TransportError::InsecureScheme { url: url.clone() }.is_service_failure());
        assert!(!TransportError::InvalidUrl {
            url,
            reason: "relative URL without a base".into()
        }
        .is_service_failure());
    }

    #[test]
    fn test_insecure_checksum_url_gets_configuration_fixes() {
        let err = InstallerError::Transport {
            resource: Resource::Checksum,
            source: TransportError::InsecureScheme {
                url: "http://example.com/bootstrap.sh.sha256".into(),
            },
        };
        assert_eq!(err.exit_code(), ABORT_EXIT_CODE);
        assert!(err.remediation().iter().any(|step| step.contains("https://")));
    }

    #[test]
    fn test_mismatch_message_names_both_digests() {
        let err = InstallerError::VerificationMismatch {
            expected: "aa".repeat(32),
            actual: "bb".repeat(32),
        };
        let message = err.to_string();
        assert!(message.contains(&"aa".repeat(32)));
        assert!(message.contains(&"bb".repeat(32)));
        assert!(message.contains("NOT been executed"));
    }
}
