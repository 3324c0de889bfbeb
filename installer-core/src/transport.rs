//! Bounded-timeout HTTPS retrieval into the workspace
//!
//! Every fetch either leaves exactly the remote bytes at the destination or
//! leaves nothing at all. Failures are reported once and never retried here.

use async_trait::async_trait;
use std::error::Error as _;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::RetrievalTarget;
use crate::error::{InstallerError, TransportError};

/// Maximum number of redirects followed per request
const MAX_REDIRECTS: usize = 10;

/// Interpreters accepted on the first line of a fetched script
const KNOWN_SHELLS: &[&str] = &["sh", "bash", "zsh", "dash", "ksh"];

/// Retrieval of a single remote resource
#[async_trait]
pub trait Transport: Send + Sync {
    /// Download `target` to its destination and return the number of bytes written
    async fn fetch(&self, target: &RetrievalTarget) -> Result<u64, TransportError>;
}

/// `reqwest`-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
    require_https: bool,
}

impl HttpTransport {
    /// Create a transport; with `require_https` every plain-HTTP URL is refused
    pub fn new(require_https: bool) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("devkit-install/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .https_only(require_https)
            .build()?;

        Ok(Self {
            client,
            require_https,
        })
    }

    fn check_scheme(&self, url: &str) -> Result<(), TransportError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| TransportError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if self.require_https && parsed.scheme() != "https" {
            return Err(TransportError::InsecureScheme {
                url: url.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, target: &RetrievalTarget) -> Result<u64, TransportError> {
        let url = target.url();
        self.check_scheme(url)?;

        debug!(
            "GET {} (timeout {}s) -> {}",
            url,
            target.timeout().as_secs(),
            target.destination().display()
        );

        let response = self
            .client
            .get(url)
            .timeout(target.timeout())
            .send()
            .await
            .map_err(|e| classify(url, target.timeout(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| classify(url, target.timeout(), e))?;

        if body.is_empty() {
            return Err(TransportError::EmptyBody {
                url: url.to_string(),
            });
        }

        write_body(target.destination(), &body).await?;

        info!("Downloaded {} bytes from {}", body.len(), url);
        Ok(body.len() as u64)
    }
}

fn classify(url: &str, timeout: Duration, err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout {
            url: url.to_string(),
            seconds: timeout.as_secs(),
        };
    }

    // reqwest's top-level message is generic; the cause chain names the DNS/TLS/connect failure
    let mut reason = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        reason.push_str(": ");
        reason.push_str(&cause.to_string());
        source = cause.source();
    }

    TransportError::Unreachable {
        url: url.to_string(),
        reason,
    }
}

/// Write the body to a fresh owner-only file, removing it again on failure
async fn write_body(path: &Path, body: &[u8]) -> Result<(), TransportError> {
    let io_error = |source| TransportError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await.map_err(io_error)?;

    let written = async {
        file.write_all(body).await?;
        file.flush().await?;
        file.sync_all().await
    }
    .await;

    if let Err(source) = written {
        drop(file);
        let _ = tokio::fs::remove_file(path).await;
        return Err(io_error(source));
    }
    Ok(())
}

/// Check that fetched script content starts with a shell interpreter line
///
/// Guards against proxies and CDNs that answer 200 with an HTML error page.
pub fn ensure_script(url: &str, content: &[u8]) -> Result<(), InstallerError> {
    let first_line = content.split(|b| *b == b'\n').next().unwrap_or_default();
    let first_line = String::from_utf8_lossy(first_line);
    let first_line = first_line.trim_end_matches('\r');

    if names_known_shell(first_line) {
        return Ok(());
    }

    Err(InstallerError::NotAScript {
        url: url.to_string(),
        first_line: first_line.chars().take(80).collect(),
    })
}

fn names_known_shell(line: &str) -> bool {
    let Some(rest) = line.strip_prefix("#!") else {
        return false;
    };

    let mut tokens = rest.split_whitespace();
    let Some(program) = tokens.next().map(basename) else {
        return false;
    };

    let interpreter = if program == "env" {
        match tokens.find(|t| !t.starts_with('-')) {
            Some(t) => basename(t),
            None => return false,
        }
    } else {
        program
    };

    KNOWN_SHELLS.contains(&interpreter)
}

fn basename(token: &str) -> &str {
    token.rsplit('/').next().unwrap_or(token)
}
