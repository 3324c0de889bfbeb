//! Running the verified script
//!
//! The executor trusts its input completely; verification is the only gate
//! and happens before anything here is called.

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::{InstallerError, ABORT_EXIT_CODE};
use crate::prereq::require_executable;

/// How long a signalled script may take to exit before it is killed
pub const TERMINATION_GRACE: Duration = Duration::from_secs(10);

/// How the script terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    /// Effective exit status (`128 + signal` when killed by a signal)
    pub exit_code: i32,
    /// Terminated by a signal rather than a normal exit
    pub signaled: bool,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.signaled
    }

    pub fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self {
                    exit_code: 128 + signal,
                    signaled: true,
                };
            }
        }

        Self {
            exit_code: status.code().unwrap_or(ABORT_EXIT_CODE),
            signaled: false,
        }
    }
}

/// Runs a verified script with forwarded arguments
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Pre-flight check, called before anything is downloaded
    fn check_prerequisites(&self) -> Result<(), InstallerError> {
        Ok(())
    }

    /// Run `script` until it exits
    ///
    /// A signal number arriving on `interrupt` must be passed on to the
    /// script; the call still returns only once the script has exited.
    async fn execute(
        &self,
        script: &Path,
        args: &[String],
        interrupt: oneshot::Receiver<i32>,
    ) -> Result<ExecutionResult, InstallerError>;
}

/// Runs `<interpreter> <script> <args...>` with inherited stdio
pub struct ProcessRunner {
    interpreter: PathBuf,
    search_path: Vec<PathBuf>,
}

impl ProcessRunner {
    pub fn new(interpreter: impl Into<PathBuf>, search_path: Vec<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            search_path,
        }
    }
}

#[async_trait]
impl ScriptRunner for ProcessRunner {
    fn check_prerequisites(&self) -> Result<(), InstallerError> {
        let resolved = require_executable(&self.interpreter, &self.search_path)?;
        debug!("Using interpreter {}", resolved.display());
        Ok(())
    }

    async fn execute(
        &self,
        script: &Path,
        args: &[String],
        mut interrupt: oneshot::Receiver<i32>,
    ) -> Result<ExecutionResult, InstallerError> {
        let program = require_executable(&self.interpreter, &self.search_path)?;

        info!(
            "Running {} with {} forwarded argument(s)",
            script.display(),
            args.len()
        );

        let mut child = tokio::process::Command::new(&program)
            .arg(script)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| InstallerError::Spawn {
                interpreter: program.clone(),
                source,
            })?;

        let waited = tokio::select! {
            status = child.wait() => status,
            Ok(signal) = &mut interrupt => {
                warn!("Forwarding signal {} to the bootstrap script", signal);
                forward_signal(&mut child, signal);
                match tokio::time::timeout(TERMINATION_GRACE, child.wait()).await {
                    Ok(status) => status,
                    Err(_) => {
                        warn!(
                            "Bootstrap script still running {}s after signal {}; killing it",
                            TERMINATION_GRACE.as_secs(),
                            signal
                        );
                        if let Err(e) = child.start_kill() {
                            warn!("Failed to kill bootstrap script: {}", e);
                        }
                        child.wait().await
                    }
                }
            }
        };
        let status = waited.map_err(|source| InstallerError::Spawn {
            interpreter: program.clone(),
            source,
        })?;

        let result = ExecutionResult::from_status(status);
        if result.signaled {
            warn!("Bootstrap script terminated by signal (exit {})", result.exit_code);
        } else {
            debug!("Bootstrap script exited with {}", result.exit_code);
        }
        Ok(result)
    }
}

#[cfg(unix)]
fn forward_signal(child: &mut tokio::process::Child, signal: i32) {
    let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    // SAFETY: kill(2) takes plain integers; the pid belongs to a child we have not reaped.
    let result = unsafe { libc::kill(pid, signal) };
    if result != 0 {
        warn!(
            "Failed to send signal {} to pid {}: {}",
            signal,
            pid,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn forward_signal(child: &mut tokio::process::Child, _signal: i32) {
    if let Err(e) = child.start_kill() {
        warn!("Failed to stop bootstrap script: {}", e);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;

    fn sh_runner() -> ProcessRunner {
        ProcessRunner::new("/bin/sh", Vec::new())
    }

    fn no_interrupt() -> oneshot::Receiver<i32> {
        oneshot::channel().1
    }

    #[tokio::test]
    async fn test_forwards_arguments_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("bootstrap.sh");
        let marker = dir.path().join("args.txt");
        fs::write(
            &script,
            format!(
                "#!/bin/sh\nprintf '%s|' \"$@\" > '{}'\nexit 7\n",
                marker.display()
            ),
        )
        .unwrap();

        let args = vec![
            "--with space".to_string(),
            "$HOME".to_string(),
            "*".to_string(),
        ];
        let result = sh_runner()
            .execute(&script, &args, no_interrupt())
            .await
            .unwrap();

        assert_eq!(
            result,
            ExecutionResult {
                exit_code: 7,
                signaled: false
            }
        );
        assert_eq!(fs::read_to_string(&marker).unwrap(), "--with space|$HOME|*|");
    }

    #[tokio::test]
    async fn test_signal_termination_is_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("bootstrap.sh");
        fs::write(&script, "#!/bin/sh\nkill -TERM $$\n").unwrap();

        let result = sh_runner()
            .execute(&script, &[], no_interrupt())
            .await
            .unwrap();
        assert!(result.signaled);
        assert_eq!(result.exit_code, 128 + 15);
        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_interrupt_is_forwarded_to_running_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("bootstrap.sh");
        fs::write(&script, "#!/bin/sh\nsleep 30\n").unwrap();

        let (tx, rx) = oneshot::channel();
        let runner = sh_runner();
        let started = std::time::Instant::now();
        let execution = tokio::spawn(async move { runner.execute(&script, &[], rx).await });

        tokio::time::sleep(Duration::from_millis(300)).await;
        tx.send(crate::error::SIGTERM).unwrap();

        let result = execution.await.unwrap().unwrap();
        assert!(result.signaled);
        assert_eq!(result.exit_code, 128 + crate::error::SIGTERM);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_dropped_interrupt_sender_does_not_stop_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("bootstrap.sh");
        fs::write(&script, "#!/bin/sh\nexit 4\n").unwrap();

        let (tx, rx) = oneshot::channel::<i32>();
        drop(tx);
        let result = sh_runner().execute(&script, &[], rx).await.unwrap();

        assert_eq!(result.exit_code, 4);
        assert!(!result.signaled);
    }

    #[test]
    fn test_missing_interpreter_fails_preflight() {
        let runner = ProcessRunner::new("no-such-shell", vec![PathBuf::from("/nonexistent")]);
        assert!(matches!(
            runner.check_prerequisites(),
            Err(InstallerError::PrerequisiteMissing { .. })
        ));
    }
}
