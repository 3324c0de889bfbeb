//! Script verification against the resolved trust anchor
//!
//! A present-but-wrong checksum is always fatal. An unreachable checksum
//! service only degrades the run to unverified, with a warning; a checksum URL
//! the transport refuses to fetch at all is a configuration error and aborts.

use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::hasher::{digests_equal, Digester};
use super::resolver::TrustSource;
use crate::config::RetrievalTarget;
use crate::error::{InstallerError, Resource, TransportError};
use crate::transport::Transport;

/// File name of the downloaded checksum inside the workspace
pub const CHECKSUM_FILE_NAME: &str = "checksum.txt";

/// Result of comparing the script digest with the expected value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Matched,
    Mismatched,
    Skipped,
}

/// Why a comparison was not performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No trust anchor configured
    NotConfigured,
    /// The remote checksum could not be fetched
    ChecksumServiceUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationOutcome {
    pub expected: Option<String>,
    pub actual: String,
    pub matched: MatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
}

impl VerificationOutcome {
    fn skipped(actual: String, reason: SkipReason) -> Self {
        Self {
            expected: None,
            actual,
            matched: MatchStatus::Skipped,
            skip_reason: Some(reason),
        }
    }

    /// Only a mismatch blocks execution
    pub fn permits_execution(&self) -> bool {
        self.matched != MatchStatus::Mismatched
    }
}

/// Compares script bytes against a [`TrustSource`]
pub struct Verifier<'a> {
    transport: &'a dyn Transport,
    digester: &'a dyn Digester,
    workspace: &'a Path,
}

impl<'a> Verifier<'a> {
    /// `workspace` receives the checksum file when a remote source is used
    pub fn new(
        transport: &'a dyn Transport,
        digester: &'a dyn Digester,
        workspace: &'a Path,
    ) -> Self {
        Self {
            transport,
            digester,
            workspace,
        }
    }

    pub async fn verify(
        &self,
        script: &[u8],
        trust: &TrustSource,
    ) -> Result<VerificationOutcome, InstallerError> {
        let actual = self.digester.digest_hex(script);
        debug!("Computed {} of script: {}", self.digester.algorithm(), actual);

        match trust {
            TrustSource::InlineChecksum(expected) => {
                info!("Verifying script against inline checksum");
                self.compare(expected, actual)
            }
            TrustSource::RemoteChecksumUrl { url, timeout } => {
                match self.fetch_expected(url, *timeout).await {
                    Ok(body) => {
                        let expected = first_token(&body);
                        info!("Verifying script against checksum from {}", url);
                        self.compare(expected, actual)
                    }
                    Err(e) if !e.is_service_failure() => Err(InstallerError::Transport {
                        resource: Resource::Checksum,
                        source: e,
                    }),
                    Err(e) => {
                        warn!(
                            target: "security",
                            "CHECKSUM SERVICE UNAVAILABLE ({e}). Proceeding WITHOUT integrity \
                             verification. Set DEVKIT_BOOTSTRAP_CHECKSUM to verify offline."
                        );
                        Ok(VerificationOutcome::skipped(
                            actual,
                            SkipReason::ChecksumServiceUnavailable,
                        ))
                    }
                }
            }
            TrustSource::NoVerification => Ok(VerificationOutcome::skipped(
                actual,
                SkipReason::NotConfigured,
            )),
        }
    }

    async fn fetch_expected(&self, url: &str, timeout: Duration) -> Result<String, TransportError> {
        let target = RetrievalTarget::new(url, self.workspace.join(CHECKSUM_FILE_NAME), timeout);
        self.transport.fetch(&target).await?;

        let bytes = tokio::fs::read(target.destination())
            .await
            .map_err(|source| TransportError::Io {
                path: target.destination().to_path_buf(),
                source,
            })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn compare(&self, expected: &str, actual: String) -> Result<VerificationOutcome, InstallerError> {
        let expected_bytes = self.parse_expected(expected)?;
        let actual_bytes = hex::decode(&actual).unwrap_or_default();

        let matched = if digests_equal(&expected_bytes, &actual_bytes) {
            info!("Checksum verified: {}", actual);
            MatchStatus::Matched
        } else {
            MatchStatus::Mismatched
        };

        Ok(VerificationOutcome {
            expected: Some(expected.to_ascii_lowercase()),
            actual,
            matched,
            skip_reason: None,
        })
    }

    /// Exactly `2 * digest_len` hex characters, any case
    fn parse_expected(&self, expected: &str) -> Result<Vec<u8>, InstallerError> {
        let malformed = || InstallerError::MalformedChecksum {
            value: expected.to_string(),
        };

        if expected.len() != self.digester.digest_len() * 2 {
            return Err(malformed());
        }
        hex::decode(expected).map_err(|_| malformed())
    }
}

/// First whitespace-delimited token, as in `sha256sum` output
fn first_token(body: &str) -> &str {
    body.split_whitespace().next().unwrap_or_default()
}
