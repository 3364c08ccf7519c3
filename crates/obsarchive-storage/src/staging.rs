//! Client for the tape staging daemon.
//!
//! Wire format, client to server: a `u32` big-endian byte length followed by
//! UTF-8 JSON `{"files": ["name", ...]}` with bare filenames. Server to
//! client: a `u16` big-endian status, zero on success.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use obsarchive_core::config::StagingConfig;
use obsarchive_core::error::{AppError, ErrorKind};
use obsarchive_core::result::AppResult;
use obsarchive_core::retry::{RetryError, RetryPolicy, retry};

/// Errors from a single staging request.
#[derive(Debug, Error)]
pub enum StagingError {
    /// Connecting, writing or reading failed.
    #[error("Other error staging data: {0}")]
    Io(#[from] std::io::Error),

    /// The request could not be encoded.
    #[error("Failed to encode staging request: {0}")]
    Encode(#[from] serde_json::Error),

    /// The encoded request does not fit the 32-bit length prefix.
    #[error("Staging request of {0} bytes is too large")]
    TooLarge(usize),

    /// No status arrived within the read timeout.
    #[error("No reply from staging daemon within {0:?}")]
    Timeout(Duration),

    /// The daemon answered with a non-zero status.
    #[error("Staging daemon returned exit code {0}")]
    Status(u16),
}

impl From<StagingError> for AppError {
    fn from(err: StagingError) -> Self {
        AppError::with_source(ErrorKind::Staging, err.to_string(), err)
    }
}

#[derive(Serialize)]
struct StageRequest<'a> {
    files: Vec<&'a str>,
}

/// Encode a staging request frame. Paths are reduced to bare filenames.
pub fn encode_request<S: AsRef<str>>(files: &[S]) -> Result<Vec<u8>, StagingError> {
    let request = StageRequest {
        files: files
            .iter()
            .map(|f| {
                let f = f.as_ref();
                f.rsplit('/').next().unwrap_or(f)
            })
            .collect(),
    };
    let payload = serde_json::to_vec(&request)?;
    let len = u32::try_from(payload.len()).map_err(|_| StagingError::TooLarge(payload.len()))?;

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Talks to the staging daemon at a fixed address.
#[derive(Debug, Clone)]
pub struct StagingClient {
    host: String,
    port: u16,
    read_timeout: Duration,
    policy: RetryPolicy,
}

impl StagingClient {
    /// Create a client from the `[staging]` section.
    pub fn new(config: &StagingConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            read_timeout: Duration::from_secs(config.read_timeout_seconds),
            policy: RetryPolicy::new(config.retry_attempts, config.backoff_seconds),
        }
    }

    /// Override the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Send one staging request and return the daemon's status code.
    pub async fn stage<S: AsRef<str>>(&self, files: &[S]) -> Result<u16, StagingError> {
        let frame = encode_request(files)?;

        let mut stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        stream.write_all(&frame).await?;
        stream.flush().await?;

        let mut status = [0u8; 2];
        tokio::time::timeout(self.read_timeout, stream.read_exact(&mut status))
            .await
            .map_err(|_| StagingError::Timeout(self.read_timeout))??;
        Ok(u16::from_be_bytes(status))
    }

    /// Stage `files`, retrying any failure up to the configured attempts.
    ///
    /// Shutdown stops the loop early and is reported as a cancellation, not
    /// as exhaustion.
    pub async fn stage_with_retry<S: AsRef<str> + Sync>(
        &self,
        files: &[S],
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        let result = retry(self.policy, cancel, |_| true, |attempt| async move {
            tracing::debug!(attempt, files = files.len(), "Requesting staging");
            match self.stage(files).await {
                Ok(0) => Ok(()),
                Ok(code) => Err(StagingError::Status(code)),
                Err(e) => Err(e),
            }
        })
        .await;

        match result {
            Ok(()) => Ok(()),
            Err(RetryError::Cancelled) => Err(AppError::cancelled("Staging abandoned for shutdown")),
            Err(RetryError::Exhausted { attempts, last }) => {
                tracing::error!(attempts, "Staging failed too many times: {}", last);
                Err(AppError::with_source(
                    ErrorKind::Staging,
                    format!("Staging failed too many times ({attempts} attempts)"),
                    last,
                ))
            }
            Err(RetryError::Fatal(e)) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Serve `replies.len()` connections, answering each with the next status.
    async fn fake_daemon(replies: Vec<u16>) -> (u16, tokio::task::JoinHandle<Vec<Vec<u8>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let mut payloads = Vec::new();
            for status in replies {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut len = [0u8; 4];
                socket.read_exact(&mut len).await.unwrap();
                let mut payload = vec![0u8; u32::from_be_bytes(len) as usize];
                socket.read_exact(&mut payload).await.unwrap();
                socket.write_all(&status.to_be_bytes()).await.unwrap();
                payloads.push(payload);
            }
            payloads
        });
        (port, handle)
    }

    fn client(port: u16, attempts: u32) -> StagingClient {
        StagingClient::new(&StagingConfig {
            host: "127.0.0.1".into(),
            port,
            read_timeout_seconds: 5,
            ..StagingConfig::default()
        })
        .with_policy(RetryPolicy {
            max_attempts: attempts,
            backoff: Duration::from_millis(1),
        })
    }

    #[test]
    fn frame_is_length_prefixed_json_of_basenames() {
        let frame = encode_request(&["/archive/1234567890_a.fits", "1234567890_b.fits"]).unwrap();
        let body = br#"{"files":["1234567890_a.fits","1234567890_b.fits"]}"#;
        assert_eq!(&frame[..4], &(body.len() as u32).to_be_bytes());
        assert_eq!(&frame[4..], body);
    }

    #[tokio::test]
    async fn stage_returns_daemon_status() {
        let (port, daemon) = fake_daemon(vec![7]).await;
        let code = client(port, 1).stage(&["x.fits"]).await.unwrap();
        assert_eq!(code, 7);

        let payloads = daemon.await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&payloads[0]).unwrap();
        assert_eq!(json["files"][0], "x.fits");
    }

    #[tokio::test]
    async fn non_zero_status_is_retried_until_success() {
        let (port, daemon) = fake_daemon(vec![1, 0]).await;
        client(port, 3)
            .stage_with_retry(&["x.fits"], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(daemon.await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn exhaustion_is_a_staging_error() {
        let (port, daemon) = fake_daemon(vec![2, 2]).await;
        let err = client(port, 2)
            .stage_with_retry(&["x.fits"], &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Staging);
        daemon.await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_before_start_is_not_exhaustion() {
        let token = CancellationToken::new();
        token.cancel();
        let err = client(1, 3)
            .stage_with_retry(&["x.fits"], &token)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
