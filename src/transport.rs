use std::io::{Read, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use tracing::warn;

use crate::error::PrepError;

const CHUNK_SIZE: usize = 64 * 1024;
const MAX_RETRIES: u32 = 3;
const RETRY_BACKOFF_MS: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferProgress {
    pub received: u64,
    pub total: Option<u64>,
}

impl TransferProgress {
    /// Completion ratio clamped to `[0, 1]`; `None` when the size is unknown.
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some((self.received as f64 / total as f64).min(1.0)),
            _ => None,
        }
    }
}

/// Fetches one remote resource into one local file.
///
/// The destination's folder must already exist. Implementations block for
/// the whole transfer and call `on_progress` synchronously as bytes arrive.
pub trait Transport: Send + Sync {
    fn fetch(
        &self,
        url: &str,
        destination: &Path,
        on_progress: Option<&mut dyn FnMut(TransferProgress)>,
    ) -> Result<(), PrepError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, PrepError> {
        Self::with_timeout(Duration::from_secs(300))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, PrepError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("dsprep/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| PrepError::TransportHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| PrepError::TransportHttp(err.to_string()))?;
        Ok(Self { client })
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, PrepError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "request failed".to_string());
        Err(PrepError::TransportStatus { status, message })
    }

    /// Sends a GET, backing off and trying again while the failure looks
    /// transient. The last response (or error) is returned as is.
    fn get_with_retries(&self, url: &str) -> Result<reqwest::blocking::Response, PrepError> {
        let mut attempt = 0u32;
        loop {
            let outcome = self.client.get(url).send();
            let transient = match &outcome {
                Ok(response) => is_retryable_status(response.status().as_u16()),
                Err(err) => is_retryable_error(err),
            };
            if !transient || attempt >= MAX_RETRIES {
                return outcome.map_err(|err| PrepError::TransportHttp(format!("{url}: {err}")));
            }
            attempt += 1;
            let delay = Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt));
            match &outcome {
                Ok(response) => {
                    let status = response.status().as_u16();
                    warn!(url, status, attempt, "transient status, retrying");
                }
                Err(err) => warn!(url, error = %err, attempt, "transfer failed, retrying"),
            }
            thread::sleep(delay);
        }
    }
}

impl Transport for HttpTransport {
    fn fetch(
        &self,
        url: &str,
        destination: &Path,
        mut on_progress: Option<&mut dyn FnMut(TransferProgress)>,
    ) -> Result<(), PrepError> {
        let parent = destination
            .parent()
            .ok_or_else(|| PrepError::Filesystem("invalid destination path".to_string()))?;

        let response = self.get_with_retries(url)?;
        let mut response = Self::handle_status(response)?;
        let total = response.content_length();

        // Bytes land in a temp file first so the artifact name only appears once complete.
        let mut temp = tempfile::Builder::new()
            .prefix(".dsprep-download")
            .tempfile_in(parent)
            .map_err(|err| PrepError::Filesystem(err.to_string()))?;
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut received = 0u64;
        loop {
            let read = response
                .read(&mut buffer)
                .map_err(|err| PrepError::TransportHttp(format!("{url}: {err}")))?;
            if read == 0 {
                break;
            }
            temp.write_all(&buffer[..read])
                .map_err(|err| PrepError::Filesystem(err.to_string()))?;
            received += read as u64;
            if let Some(callback) = on_progress.as_deref_mut() {
                callback(TransferProgress { received, total });
            }
        }
        temp.flush()
            .map_err(|err| PrepError::Filesystem(err.to_string()))?;
        temp.persist(destination)
            .map_err(|err| PrepError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_fraction_is_clamped() {
        let over = TransferProgress {
            received: 120,
            total: Some(100),
        };
        assert_eq!(over.fraction(), Some(1.0));
        let unknown = TransferProgress {
            received: 10,
            total: None,
        };
        assert_eq!(unknown.fraction(), None);
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
    }
}
