//! Run report
//!
//! Summary of one session, written as JSON for audit trails when requested.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use crate::error::InstallerError;
use crate::executor::ExecutionResult;
use crate::session::SessionState;
use crate::trust::{TrustSourceKind, VerificationOutcome};

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub script_url: String,
    pub trust_source: Option<TrustSourceKind>,
    pub verification: Option<VerificationOutcome>,
    pub final_state: SessionState,
    pub execution: Option<ExecutionResult>,
    pub error: Option<String>,
    pub exit_code: i32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    #[serde(skip)]
    pub failure: Option<InstallerError>,
}

impl RunReport {
    pub(crate) fn new(script_url: String) -> Self {
        let now = Utc::now();
        Self {
            script_url,
            trust_source: None,
            verification: None,
            final_state: SessionState::Init,
            execution: None,
            error: None,
            exit_code: 0,
            started_at: now,
            finished_at: now,
            failure: None,
        }
    }

    /// Close the report with the script's result or the failure that stopped the run
    pub(crate) fn finish(&mut self, state: SessionState, outcome: Result<ExecutionResult, InstallerError>) {
        self.final_state = state;
        self.finished_at = Utc::now();

        match outcome {
            Ok(result) => {
                self.execution = Some(result);
                self.exit_code = result.exit_code;
                if !result.success() {
                    self.record_failure(InstallerError::ExecutionFailure {
                        code: result.exit_code,
                        signaled: result.signaled,
                    });
                }
            }
            Err(err) => {
                self.exit_code = err.exit_code();
                self.record_failure(err);
            }
        }
    }

    fn record_failure(&mut self, err: InstallerError) {
        self.error = Some(err.to_string());
        self.failure = Some(err);
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}
