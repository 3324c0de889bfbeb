//! devkit-install - fetch, verify and run the devkit bootstrap script
//!
//! Configuration is read once here (flags and environment) and handed to the
//! installer session; the process exits with the script's own status, or with
//! the abort sentinel when the script was never run.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use installer_core::config::{
    DEFAULT_BASE_URL, DEFAULT_BRANCH, DEFAULT_INTERPRETER, DEFAULT_SCRIPT_NAME,
};
use installer_core::trust::{MatchStatus, SkipReason};
use installer_core::{
    HttpTransport, InstallerConfig, ProcessRunner, RunReport, Session, SIGINT, SIGTERM,
};

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "devkit-install",
    about = "Download the devkit bootstrap script, verify its checksum, then run it",
    version
)]
struct Cli {
    /// Branch or tag to install from
    #[clap(long, env = "DEVKIT_BRANCH", default_value = DEFAULT_BRANCH)]
    branch: String,

    /// Base URL the branch and script name are appended to
    #[clap(long, env = "DEVKIT_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Script path under the branch
    #[clap(long, default_value = DEFAULT_SCRIPT_NAME)]
    script: String,

    /// Expected SHA-256 of the script (takes precedence over --checksum-url)
    #[clap(long, env = "DEVKIT_BOOTSTRAP_CHECKSUM", hide_env_values = true)]
    checksum: Option<String>,

    /// URL of a checksum file; its first token is the expected SHA-256
    #[clap(long, env = "DEVKIT_CHECKSUM_URL")]
    checksum_url: Option<String>,

    /// Script download timeout in seconds
    #[clap(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    script_timeout: u64,

    /// Checksum download timeout in seconds
    #[clap(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    checksum_timeout: u64,

    /// Interpreter used to run the verified script
    #[clap(long, default_value = DEFAULT_INTERPRETER)]
    interpreter: PathBuf,

    /// Allow plain-HTTP URLs (local mirrors only)
    #[clap(long, hide = true)]
    allow_http: bool,

    /// Write a JSON run report to this path
    #[clap(long)]
    report: Option<PathBuf>,

    /// Set log level
    #[clap(long, default_value = "info")]
    log_level: LogLevel,

    /// Disable colored output (also honored: NO_COLOR)
    #[clap(long)]
    no_color: bool,

    /// Arguments forwarded verbatim to the bootstrap script
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    script_args: Vec<String>,
}

/// Blank flag or environment values fall back to the default
fn or_default(value: &str, default: &str) -> String {
    match value.trim() {
        "" => default.to_string(),
        value => value.to_string(),
    }
}

impl Cli {
    fn installer_config(&self) -> InstallerConfig {
        InstallerConfig {
            base_url: or_default(&self.base_url, DEFAULT_BASE_URL),
            branch: or_default(&self.branch, DEFAULT_BRANCH),
            script_name: or_default(&self.script, DEFAULT_SCRIPT_NAME),
            inline_checksum: self.checksum.clone(),
            checksum_url: self.checksum_url.clone(),
            script_timeout: Duration::from_secs(self.script_timeout),
            checksum_timeout: Duration::from_secs(self.checksum_timeout),
            interpreter: self.interpreter.clone(),
            require_https: !self.allow_http,
            workspace_root: None,
        }
    }

    fn use_color(&self) -> bool {
        let no_color_env = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
        !self.no_color && !no_color_env && std::io::stderr().is_terminal()
    }
}

/// Initialize tracing with CLI flags
///
/// Logs go to stderr so the script keeps stdout to itself. `RUST_LOG`
/// overrides `--log-level` when set.
fn initialize_tracing(log_level: &LogLevel, color: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_filter_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(color)
        .with_writer(std::io::stderr)
        .init();
}

/// Directories searched for the interpreter
fn search_path() -> Vec<PathBuf> {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).collect())
        .unwrap_or_default()
}

/// Resolves to the number of the first Ctrl-C or (on Unix) SIGTERM received
async fn shutdown_signal() -> i32 {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => SIGINT,
        _ = terminate => SIGTERM,
    }
}

/// Print the outcome: warnings for degraded trust, errors with recovery steps
fn render_outcome(report: &RunReport) {
    if let Some(verification) = &report.verification {
        if verification.matched == MatchStatus::Skipped {
            let why = match verification.skip_reason {
                Some(SkipReason::ChecksumServiceUnavailable) => "checksum service unavailable",
                _ => "no checksum configured",
            };
            warn!(
                "Bootstrap script ran WITHOUT integrity verification ({}); sha256 was {}",
                why, verification.actual
            );
        }
    }

    match &report.failure {
        None => info!("Bootstrap completed successfully"),
        Some(err) => {
            error!("{}", err);
            let steps = err.remediation();
            if !steps.is_empty() {
                eprintln!("\nHow to fix:");
                for (i, step) in steps.iter().enumerate() {
                    eprintln!("   {}. {}", i + 1, step);
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, cli.use_color());

    let config = cli.installer_config();
    let transport =
        HttpTransport::new(config.require_https).context("Failed to create HTTP client")?;
    let runner = ProcessRunner::new(config.interpreter.clone(), search_path());
    let session = Session::new(config, transport, runner);

    let report = session.run(&cli.script_args, shutdown_signal()).await;

    render_outcome(&report);

    if let Some(path) = &cli.report {
        if let Err(e) = report.write_json(path) {
            warn!("Failed to write run report to {}: {}", path.display(), e);
        }
    }

    std::process::exit(report.exit_code);
}
