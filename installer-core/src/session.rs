//! Session controller
//!
//! Drives one run through `Init -> Fetching -> Verifying -> Executing -> Done`,
//! with any failure or interrupt moving to `Aborted`. The workspace guard is
//! owned here and released on every path out of the machine.

use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::config::InstallerConfig;
use crate::error::{InstallerError, Resource, TransportError};
use crate::executor::ScriptRunner;
use crate::report::RunReport;
use crate::transport::{ensure_script, Transport};
use crate::trust::{resolve, Digester, PlatformDigester, Verifier};
use crate::workspace::Workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Init,
    Fetching,
    Verifying,
    Executing,
    Done,
    Aborted,
}

/// One fetch-verify-execute run
pub struct Session<T, R> {
    config: InstallerConfig,
    transport: T,
    runner: R,
    digester: Box<dyn Digester>,
}

impl<T: Transport, R: ScriptRunner> Session<T, R> {
    pub fn new(config: InstallerConfig, transport: T, runner: R) -> Self {
        Self {
            config,
            transport,
            runner,
            digester: Box::new(PlatformDigester::default()),
        }
    }

    /// Replace the build-time digester
    pub fn with_digester(mut self, digester: impl Digester + 'static) -> Self {
        self.digester = Box::new(digester);
        self
    }

    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run the pipeline, forwarding `args` to the script
    ///
    /// `shutdown` resolves to the number of the signal that stopped the run.
    /// Before execution it aborts the run with [`InstallerError::Interrupted`];
    /// while the script runs the signal is passed on to it and the session
    /// waits for the script to exit before cleaning up.
    pub async fn run<F>(&self, args: &[String], shutdown: F) -> RunReport
    where
        F: Future<Output = i32>,
    {
        let mut report = RunReport::new(self.config.script_url());
        let mut state = SessionState::Init;

        let workspace = match self.init() {
            Ok(workspace) => workspace,
            Err(err) => {
                transition(&mut state, SessionState::Aborted);
                report.finish(state, Err(err));
                return report;
            }
        };

        tokio::pin!(shutdown);
        let staged = tokio::select! {
            biased;
            signal = &mut shutdown => {
                info!("Received signal {}; discarding downloaded files", signal);
                Err(InstallerError::Interrupted { signal })
            }
            staged = self.fetch_and_verify(&workspace, &mut state, &mut report) => staged,
        };

        let outcome = match staged {
            Ok(script) => {
                transition(&mut state, SessionState::Executing);

                let (interrupt_tx, interrupt_rx) = oneshot::channel();
                let execution = self.runner.execute(&script, args, interrupt_rx);
                tokio::pin!(execution);

                let mut interrupted = None;
                let executed = tokio::select! {
                    biased;
                    executed = &mut execution => executed,
                    signal = &mut shutdown => {
                        warn!("Received signal {}; waiting for the bootstrap script to stop", signal);
                        interrupted = Some(signal);
                        if interrupt_tx.send(signal).is_err() {
                            debug!("Bootstrap script already finished");
                        }
                        execution.await
                    }
                };

                let executed = match (interrupted, executed) {
                    (Some(signal), Ok(result)) if result.success() => {
                        Err(InstallerError::Interrupted { signal })
                    }
                    (_, executed) => executed,
                };
                transition(
                    &mut state,
                    if executed.is_ok() && interrupted.is_none() {
                        SessionState::Done
                    } else {
                        SessionState::Aborted
                    },
                );
                executed
            }
            Err(err) => {
                transition(&mut state, SessionState::Aborted);
                Err(err)
            }
        };

        workspace.release();

        if let Err(err) = &outcome {
            err.log_if_security_critical();
        }
        report.finish(state, outcome);
        report
    }

    fn init(&self) -> Result<Workspace, InstallerError> {
        self.runner.check_prerequisites()?;
        Workspace::create(self.config.workspace_root.as_deref())
    }

    async fn fetch_and_verify(
        &self,
        workspace: &Workspace,
        state: &mut SessionState,
        report: &mut RunReport,
    ) -> Result<PathBuf, InstallerError> {
        transition(state, SessionState::Fetching);

        let target = self.config.script_target(workspace.path());
        info!("Fetching {}", target.url());
        self.transport
            .fetch(&target)
            .await
            .map_err(|source| InstallerError::Transport {
                resource: Resource::Script,
                source,
            })?;

        let script = tokio::fs::read(target.destination())
            .await
            .map_err(|source| InstallerError::Transport {
                resource: Resource::Script,
                source: TransportError::Io {
                    path: target.destination().to_path_buf(),
                    source,
                },
            })?;
        ensure_script(target.url(), &script)?;

        transition(state, SessionState::Verifying);

        let trust = resolve(&self.config);
        report.trust_source = Some(trust.kind());

        let verifier = Verifier::new(&self.transport, self.digester.as_ref(), workspace.path());
        let outcome = verifier.verify(&script, &trust).await?;
        report.verification = Some(outcome.clone());

        if !outcome.permits_execution() {
            error!("Checksum mismatch for {}", target.url());
            return Err(InstallerError::VerificationMismatch {
                expected: outcome.expected.unwrap_or_default(),
                actual: outcome.actual,
            });
        }

        Ok(target.destination().to_path_buf())
    }
}

fn transition(state: &mut SessionState, next: SessionState) {
    debug!("Session state: {:?} -> {:?}", state, next);
    *state = next;
}
