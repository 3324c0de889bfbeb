//! Shared helpers for installer integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use installer_core::trust::{Digester, Sha256Digester};
use installer_core::{ExecutionResult, InstallerConfig, InstallerError, ScriptRunner};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};
use std::time::Duration;
use tokio::sync::oneshot;

static INIT: Once = Once::new();

/// Initialize logging for tests (only once per test run)
pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

pub const SCRIPT: &[u8] = b"#!/bin/bash\necho ok";
pub const SCRIPT_PATH: &str = "/main/bootstrap.sh";
pub const CHECKSUM_PATH: &str = "/main/bootstrap.sh.sha256";

pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256Digester.digest_hex(bytes)
}

/// Config pointing at a local mock server, with the workspace under `root`
pub fn config_for(base_url: &str, root: &Path) -> InstallerConfig {
    InstallerConfig {
        base_url: base_url.to_string(),
        branch: "main".to_string(),
        require_https: false,
        checksum_timeout: Duration::from_secs(1),
        script_timeout: Duration::from_secs(5),
        workspace_root: Some(root.to_path_buf()),
        ..Default::default()
    }
}

/// Resolves to `signal` once `delay` has passed
pub async fn signal_after(delay: Duration, signal: i32) -> i32 {
    tokio::time::sleep(delay).await;
    signal
}

/// True when no run left anything behind under `root`
pub fn workspace_root_is_empty(root: &Path) -> bool {
    std::fs::read_dir(root)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

/// Script runner that records invocations instead of spawning processes
pub struct RecordingRunner {
    exit_code: i32,
    calls: Mutex<Vec<(PathBuf, Vec<u8>, Vec<String>)>>,
}

impl RecordingRunner {
    pub fn exiting_with(exit_code: i32) -> Self {
        Self {
            exit_code,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Arguments of the single recorded call
    pub fn only_call_args(&self) -> Vec<String> {
        let calls = self.calls.lock().unwrap();
        assert_eq!(calls.len(), 1, "expected exactly one execution");
        calls[0].2.clone()
    }

    /// Script bytes seen by the single recorded call
    pub fn only_call_script(&self) -> Vec<u8> {
        let calls = self.calls.lock().unwrap();
        assert_eq!(calls.len(), 1, "expected exactly one execution");
        calls[0].1.clone()
    }
}

impl Default for RecordingRunner {
    fn default() -> Self {
        Self::exiting_with(0)
    }
}

#[async_trait]
impl ScriptRunner for RecordingRunner {
    async fn execute(
        &self,
        script: &Path,
        args: &[String],
        _interrupt: oneshot::Receiver<i32>,
    ) -> Result<ExecutionResult, InstallerError> {
        let bytes = std::fs::read(script).expect("script readable while executing");
        self.calls
            .lock()
            .unwrap()
            .push((script.to_path_buf(), bytes, args.to_vec()));
        Ok(ExecutionResult {
            exit_code: self.exit_code,
            signaled: false,
        })
    }
}
