//! HTTP access for listing pages, landing pages and PDF downloads
//!
//! All requests share one `reqwest::Client` and go through the retry policy.
//! PDF responses are size-limited, gunzipped when the server compresses the
//! body without saying so, and checked for the `%PDF` magic.

use async_trait::async_trait;
use reqwest::Client;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::papers::filename_from_url;
use crate::retry::{with_retry, RetryPolicy, Transient};
use crate::settings::Settings;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("PDF from {url} too large: {size_mb} MB (limit: {limit_mb} MB)")]
    TooLarge { url: String, size_mb: u64, limit_mb: u64 },
    #[error("{url} did not return a valid PDF")]
    NotPdf { url: String },
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("cannot derive a file name from {0}")]
    NoFilename(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Transient for FetchError {
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Network { source, .. } => !source.is_builder(),
            FetchError::Timeout(_) => true,
            _ => false,
        }
    }

    fn timed_out(after: Duration) -> Self {
        FetchError::Timeout(after)
    }
}

/// Fetch an HTML page as text
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;
}

/// Download a PDF into a folder, returning the written path
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, FetchError>;
}

/// reqwest-backed implementation of both fetch seams
pub struct HttpClient {
    client: Client,
    policy: RetryPolicy,
    max_pdf_bytes: usize,
}

impl HttpClient {
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .user_agent(settings.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|source| FetchError::Network {
                url: String::new(),
                source,
            })?;

        Ok(Self {
            client,
            policy: RetryPolicy::from_settings(settings),
            max_pdf_bytes: (settings.max_pdf_size_mb as usize) * 1024 * 1024,
        })
    }

    async fn get_text_once(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml")
            .send()
            .await
            .map_err(|source| FetchError::Network { url: url.to_string(), source })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|source| FetchError::Network { url: url.to_string(), source })
    }

    async fn get_pdf_once(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/pdf, */*")
            .send()
            .await
            .map_err(|source| FetchError::Network { url: url.to_string(), source })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        // Check content-length header first
        if let Some(content_length) = response.content_length() {
            self.check_size(url, content_length as usize)?;
        }

        let raw_bytes = response
            .bytes()
            .await
            .map_err(|source| FetchError::Network { url: url.to_string(), source })?;

        let bytes = decode_body(&raw_bytes)?;
        self.check_size(url, bytes.len())?;

        if !bytes.starts_with(b"%PDF") {
            return Err(FetchError::NotPdf { url: url.to_string() });
        }

        Ok(bytes)
    }

    fn check_size(&self, url: &str, len: usize) -> Result<(), FetchError> {
        if len > self.max_pdf_bytes {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
                size_mb: (len / 1024 / 1024) as u64,
                limit_mb: (self.max_pdf_bytes / 1024 / 1024) as u64,
            });
        }
        Ok(())
    }
}

/// Gunzip bodies that arrive compressed without a Content-Encoding header
fn decode_body(raw: &[u8]) -> Result<Vec<u8>, FetchError> {
    if raw.starts_with(&[0x1f, 0x8b]) {
        let mut decoder = flate2::read::GzDecoder::new(raw);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;
        tracing::debug!("[HTTP] Decompressed gzip body: {} -> {} bytes", raw.len(), decompressed.len());
        return Ok(decompressed);
    }
    Ok(raw.to_vec())
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        with_retry(&self.policy, url, move || self.get_text_once(url)).await
    }
}

#[async_trait]
impl Downloader for HttpClient {
    async fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, FetchError> {
        let filename = filename_from_url(url).ok_or_else(|| FetchError::NoFilename(url.to_string()))?;
        let bytes = with_retry(&self.policy, url, move || self.get_pdf_once(url)).await?;

        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(&filename);
        tokio::fs::write(&path, &bytes).await?;

        tracing::info!(url = %url, kb = bytes.len() / 1024, "[HTTP] Downloaded {}", filename);
        Ok(path)
    }
}
