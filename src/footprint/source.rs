//! Where the footprint dataset comes from

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::{parse_footprint_csv, FootprintRow};
use crate::error::FootprintError;

/// Loads the footprint dataset; called once per overlay build
#[async_trait]
pub trait FootprintSource: Send + Sync {
    async fn load(&self) -> Result<Vec<FootprintRow>, FootprintError>;

    /// Human-readable origin for logs and alerts
    fn describe(&self) -> String;
}

pub struct FileFootprintSource {
    path: PathBuf,
}

impl FileFootprintSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FootprintSource for FileFootprintSource {
    async fn load(&self) -> Result<Vec<FootprintRow>, FootprintError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| FootprintError::Unavailable {
                source_name: self.describe(),
                message: e.to_string(),
            })?;
        parse_footprint_csv(bytes.as_slice())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

pub struct HttpFootprintSource {
    http: Client,
    url: Url,
}

impl HttpFootprintSource {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, FootprintError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FootprintError::Unavailable {
                source_name: url.to_string(),
                message: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl FootprintSource for HttpFootprintSource {
    async fn load(&self) -> Result<Vec<FootprintRow>, FootprintError> {
        let unavailable = |e: reqwest::Error| FootprintError::Unavailable {
            source_name: self.describe(),
            message: e.to_string(),
        };
        let body = self
            .http
            .get(self.url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(unavailable)?
            .text()
            .await
            .map_err(unavailable)?;
        parse_footprint_csv(body.as_bytes())
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}
