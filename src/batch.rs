//! Uploaded target lists
//!
//! A batch file is turned into an ordered list of [`BatchRow`]s, either by
//! the backend upload endpoint or in-process by [`LocalBatchParser`]. Each
//! row then becomes one [`ResolutionRequest`].
//!
//! Local file rules (CSV, no header):
//! - `ra,dec` → coordinates
//! - a single all-digit field → TIC id
//! - any other single field → target name
//! - blank lines are skipped; three or more fields reject the file

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::coordinates::{CatalogId, InputKind};
use crate::error::BatchError;
use crate::resolver::ResolutionRequest;
use crate::target::UNNAMED_TARGET;

const UPLOAD_PATH: &str = "csv_upload";

/// One uploaded row; exactly one of the coordinate pair, `target_name` or
/// `tic_id` is expected to be set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchRow {
    #[serde(default)]
    pub target_name: Option<String>,
    #[serde(default)]
    pub ra: Option<f64>,
    #[serde(default)]
    pub dec: Option<f64>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub tic_id: Option<String>,
}

impl BatchRow {
    pub fn coordinates(ra: f64, dec: f64) -> Self {
        Self {
            ra: Some(ra),
            dec: Some(dec),
            ..Self::default()
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            target_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn tic(id: impl Into<String>) -> Self {
        Self {
            tic_id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Resolution request for this row, checked in order: coordinate pair,
    /// target name, TIC id. `None` if the row carries none of them.
    pub fn to_request(&self) -> Option<ResolutionRequest> {
        let name = self
            .target_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        if let (Some(ra), Some(dec)) = (self.ra, self.dec) {
            let label = name.unwrap_or(UNNAMED_TARGET);
            return Some(ResolutionRequest::new(InputKind::Coordinates { ra, dec }).with_label(label));
        }
        if let Some(text) = name {
            return Some(ResolutionRequest::new(InputKind::Name {
                text: text.to_string(),
            }));
        }
        let tic = self.tic_id.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
        Some(ResolutionRequest::new(InputKind::CatalogId {
            id: CatalogId::from_text(tic),
        }))
    }
}

/// Accept `"tic_id": 42` as well as `"tic_id": "42"`
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    }))
}

/// Turns an uploaded file into rows
#[async_trait]
pub trait BatchSource: Send + Sync {
    async fn rows(&self, file: &[u8]) -> Result<Vec<BatchRow>, BatchError>;
}

/// Parses target lists in-process
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalBatchParser;

impl LocalBatchParser {
    pub fn parse(file: &[u8]) -> Result<Vec<BatchRow>, BatchError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let line = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(rows.len() + 1);

            if record.iter().all(str::is_empty) {
                continue;
            }

            let row = match record.len() {
                1 => {
                    let field = &record[0];
                    if field.chars().all(|c| c.is_ascii_digit()) {
                        BatchRow::tic(field)
                    } else {
                        BatchRow::named(field)
                    }
                }
                2 => BatchRow::coordinates(
                    parse_coordinate(line, &record[0])?,
                    parse_coordinate(line, &record[1])?,
                ),
                fields => return Err(BatchError::InvalidRow { line, fields }),
            };
            rows.push(row);
        }
        tracing::debug!(rows = rows.len(), "Parsed batch file");
        Ok(rows)
    }
}

fn parse_coordinate(line: usize, value: &str) -> Result<f64, BatchError> {
    value.parse::<f64>().map_err(|_| BatchError::InvalidCoordinate {
        line,
        value: value.to_string(),
    })
}

#[async_trait]
impl BatchSource for LocalBatchParser {
    async fn rows(&self, file: &[u8]) -> Result<Vec<BatchRow>, BatchError> {
        Self::parse(file)
    }
}

/// Sends the file to the backend's `/csv_upload` endpoint as the
/// `csv_file` multipart field
pub struct UploadClient {
    http: Client,
    endpoint: Url,
}

impl UploadClient {
    pub fn new(backend_url: &Url, timeout: Duration) -> Result<Self, BatchError> {
        let endpoint = backend_url.join(UPLOAD_PATH).map_err(|e| BatchError::Upload {
            message: format!("invalid backend URL: {}", e),
        })?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BatchError::Upload {
                message: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl BatchSource for UploadClient {
    async fn rows(&self, file: &[u8]) -> Result<Vec<BatchRow>, BatchError> {
        let part = Part::bytes(file.to_vec())
            .file_name("targets.csv")
            .mime_str("text/csv")
            .map_err(|e| BatchError::Upload {
                message: e.to_string(),
            })?;
        let form = Form::new().part("csv_file", part);

        let response = self
            .http
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| BatchError::Upload {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BatchError::Upload {
                message: format!(
                    "backend returned {}: {}",
                    status,
                    body.chars().take(200).collect::<String>()
                ),
            });
        }

        response
            .json::<Vec<BatchRow>>()
            .await
            .map_err(|e| BatchError::Upload {
                message: format!("failed to parse upload response: {}", e),
            })
    }
}
