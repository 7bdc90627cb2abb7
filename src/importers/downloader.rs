use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info};

use crate::period::{ReportPeriod, DEFAULT_BASE_URL};

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("File not found (404): {0}")]
    NotFound(String),

    #[error("Server error (5xx): {0}")]
    ServerError(String),

    #[error("Unexpected HTTP status: {0}")]
    UnexpectedStatus(String),
}

/// KBA downloader for the monthly FZ10 registration workbooks
pub struct KbaDownloader {
    client: Client,
    base_url: String,
}

impl KbaDownloader {
    /// Create a downloader against the production KBA endpoint
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL.to_string())
    }

    /// Downloader against a custom base URL (tests point this at a mock server)
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("Failed to create HTTP client"),
            base_url,
        }
    }

    /// Download the workbook for one report period
    /// Example: 2025-06 downloads fz10_2025_06.xlsx
    pub async fn download_report(&self, period: &ReportPeriod) -> Result<Vec<u8>, DownloadError> {
        let url = period.download_url(&self.base_url);
        info!("Downloading FZ10 workbook: {}", url);
        self.download_file(&url, &period.cache_key()).await
    }

    /// Internal helper to download a file from a URL
    async fn download_file(&self, url: &str, filename: &str) -> Result<Vec<u8>, DownloadError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();

        if status.is_success() {
            let bytes = response.bytes().await?;
            debug!("Downloaded {filename} ({} bytes)", bytes.len());
            Ok(bytes.to_vec())
        } else if status.as_u16() == 404 {
            Err(DownloadError::NotFound(format!(
                "{filename} not found on server"
            )))
        } else if status.is_server_error() {
            Err(DownloadError::ServerError(format!(
                "Server error {status} while downloading {filename}"
            )))
        } else {
            Err(DownloadError::UnexpectedStatus(format!(
                "Status {status} while downloading {filename}"
            )))
        }
    }
}

impl Default for KbaDownloader {
    fn default() -> Self {
        Self::new()
    }
}
