//! Devkit installer core
//!
//! Fetches the bootstrap script, establishes trust in its bytes through a
//! SHA-256 checksum, and only then executes it.
//!
//! # Pipeline
//!
//! ```text
//! Session ── Transport ──▶ workspace/bootstrap.sh
//!    │
//!    ├── trust::resolve ──▶ TrustSource (inline > remote > none)
//!    ├── trust::Verifier ─▶ VerificationOutcome (matched / mismatched / skipped)
//!    └── ScriptRunner ───▶ ExecutionResult (exit code, signal)
//! ```
//!
//! A mismatch never reaches the runner. The workspace is removed on every
//! path out of the session.

pub mod config;
pub mod error;
pub mod executor;
pub mod prereq;
pub mod report;
pub mod session;
pub mod transport;
pub mod trust;
pub mod workspace;

pub use config::{InstallerConfig, RetrievalTarget};
pub use error::{
    InstallerError, TransportError, ABORT_EXIT_CODE, INTERRUPT_EXIT_CODE, SIGINT, SIGTERM,
};
pub use executor::{ExecutionResult, ProcessRunner, ScriptRunner};
pub use report::RunReport;
pub use session::{Session, SessionState};
pub use transport::{HttpTransport, Transport};
