//! Trust anchor selection
//!
//! Priority, first match wins:
//! 1. operator-supplied inline checksum
//! 2. remote checksum URL
//! 3. no verification (loud warning)

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::InstallerConfig;

/// The single trust anchor used for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustSource {
    /// Expected digest given directly by the operator
    InlineChecksum(String),
    /// Expected digest published next to the script
    RemoteChecksumUrl { url: String, timeout: Duration },
    /// Integrity checking disabled for this run
    NoVerification,
}

impl TrustSource {
    pub fn kind(&self) -> TrustSourceKind {
        match self {
            TrustSource::InlineChecksum(_) => TrustSourceKind::Inline,
            TrustSource::RemoteChecksumUrl { .. } => TrustSourceKind::Remote,
            TrustSource::NoVerification => TrustSourceKind::None,
        }
    }
}

/// Serializable tag of a [`TrustSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustSourceKind {
    Inline,
    Remote,
    None,
}

/// Pick the trust anchor for this run
///
/// Pure apart from the warning logged when verification ends up disabled.
pub fn resolve(config: &InstallerConfig) -> TrustSource {
    if let Some(value) = non_empty(config.inline_checksum.as_deref()) {
        if config.checksum_url.is_some() {
            debug!("Inline checksum takes precedence; remote checksum URL ignored");
        }
        return TrustSource::InlineChecksum(value.to_string());
    }

    if let Some(url) = non_empty(config.checksum_url.as_deref()) {
        return TrustSource::RemoteChecksumUrl {
            url: url.to_string(),
            timeout: config.checksum_timeout,
        };
    }

    warn!(
        target: "security",
        "INTEGRITY CHECKING DISABLED: no checksum configured. The bootstrap script will run \
         unverified. This mode is meant for pre-release/development use only; set \
         DEVKIT_BOOTSTRAP_CHECKSUM or DEVKIT_CHECKSUM_URL to verify downloads."
    );
    TrustSource::NoVerification
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
