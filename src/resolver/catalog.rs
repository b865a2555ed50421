//! Catalog identifier lookup
//!
//! HTTP client for the backend's `/lookup_tic` endpoint plus an in-memory
//! catalog for tests and offline use.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::coordinates::{CatalogId, SkyPosition};
use crate::error::LookupError;

const LOOKUP_PATH: &str = "lookup_tic";

/// Remote lookup of a canonical catalog identifier
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// `Err(LookupError::NotFound)` when the backend positively reports the
    /// identifier as unknown; any other error is transient.
    async fn lookup(&self, id: &CatalogId) -> Result<SkyPosition, LookupError>;
}

/// Body of a `/lookup_tic` reply
#[derive(Debug, Deserialize)]
struct LookupReply {
    ra: Option<f64>,
    dec: Option<f64>,
    error: Option<String>,
}

/// Client for the backend catalog lookup endpoint
///
/// Sends the canonical identifier as the `tic_id` form field and expects
/// `{"ra": .., "dec": ..}` or `{"error": ..}` back.
pub struct TicLookupClient {
    http: Client,
    endpoint: Url,
}

impl TicLookupClient {
    pub fn new(backend_url: &Url, timeout: Duration) -> Result<Self, LookupError> {
        let endpoint = backend_url
            .join(LOOKUP_PATH)
            .map_err(|e| LookupError::Transport {
                identifier: backend_url.to_string(),
                message: format!("invalid backend URL: {}", e),
            })?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Transport {
                identifier: endpoint.to_string(),
                message: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl CatalogLookup for TicLookupClient {
    async fn lookup(&self, id: &CatalogId) -> Result<SkyPosition, LookupError> {
        tracing::debug!(%id, endpoint = %self.endpoint, "Submitting catalog lookup");
        let response = self
            .http
            .post(self.endpoint.clone())
            .form(&[("tic_id", id.as_str())])
            .send()
            .await
            .map_err(|e| LookupError::Transport {
                identifier: id.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| LookupError::Transport {
            identifier: id.to_string(),
            message: format!("failed to read response body: {}", e),
        })?;

        interpret_reply(id.as_str(), status, &body)
    }
}

/// Map a backend reply onto a position or a lookup error
///
/// * 404, or any reply carrying an `error` field → not found (the backend
///   answers unknown identifiers with `500 {"error": ...}`)
/// * other non-success statuses → transport failure
/// * success without a usable `ra`/`dec` pair → malformed
fn interpret_reply(identifier: &str, status: StatusCode, body: &str) -> Result<SkyPosition, LookupError> {
    if status == StatusCode::NOT_FOUND {
        return Err(LookupError::NotFound {
            identifier: identifier.to_string(),
        });
    }

    let reply = serde_json::from_str::<LookupReply>(body).ok();

    if let Some(LookupReply { error: Some(message), .. }) = &reply {
        tracing::debug!(identifier, %status, %message, "Backend reported unknown identifier");
        return Err(LookupError::NotFound {
            identifier: identifier.to_string(),
        });
    }

    if !status.is_success() {
        return Err(LookupError::Transport {
            identifier: identifier.to_string(),
            message: format!(
                "backend returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            ),
        });
    }

    match reply {
        Some(LookupReply {
            ra: Some(ra),
            dec: Some(dec),
            ..
        }) => SkyPosition::new(ra, dec).map_err(|e| LookupError::MalformedResponse {
            identifier: identifier.to_string(),
            message: e.to_string(),
        }),
        _ => Err(LookupError::MalformedResponse {
            identifier: identifier.to_string(),
            message: "expected {\"ra\", \"dec\"}".to_string(),
        }),
    }
}

/// Fixed catalog held in memory
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    entries: HashMap<CatalogId, SkyPosition>,
    failures: HashMap<CatalogId, String>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, id: CatalogId, position: SkyPosition) -> Self {
        self.entries.insert(id, position);
        self
    }

    /// Make lookups of `id` fail as if the transport broke
    pub fn with_failure(mut self, id: CatalogId, message: impl Into<String>) -> Self {
        self.failures.insert(id, message.into());
        self
    }
}

#[async_trait]
impl CatalogLookup for InMemoryCatalog {
    async fn lookup(&self, id: &CatalogId) -> Result<SkyPosition, LookupError> {
        if let Some(message) = self.failures.get(id) {
            return Err(LookupError::Transport {
                identifier: id.to_string(),
                message: message.clone(),
            });
        }
        self.entries
            .get(id)
            .copied()
            .ok_or_else(|| LookupError::NotFound {
                identifier: id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_reply() {
        let position =
            interpret_reply("TIC 1", StatusCode::OK, r#"{"ra": 10.5, "dec": -5.0}"#).unwrap();
        assert_eq!(position, SkyPosition::new(10.5, -5.0).unwrap());
    }

    #[test]
    fn test_error_reply_is_not_found() {
        let err = interpret_reply(
            "TIC 1",
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error": "Error: Invalid TIC ID."}"#,
        )
        .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_404_is_not_found() {
        let err = interpret_reply("TIC 1", StatusCode::NOT_FOUND, "").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_gateway_failure_is_transient() {
        let err = interpret_reply("TIC 1", StatusCode::BAD_GATEWAY, "<html>bad gateway</html>")
            .unwrap_err();
        assert!(matches!(err, LookupError::Transport { .. }));
    }

    #[test]
    fn test_malformed_success() {
        let err = interpret_reply("TIC 1", StatusCode::OK, r#"{"ra": 1.0}"#).unwrap_err();
        assert!(matches!(err, LookupError::MalformedResponse { .. }));

        let err = interpret_reply("TIC 1", StatusCode::OK, r#"{"ra": 1.0, "dec": 120.0}"#)
            .unwrap_err();
        assert!(matches!(err, LookupError::MalformedResponse { .. }));
    }

    #[test]
    fn test_endpoint_join() {
        let base = Url::parse("http://localhost:5000/").unwrap();
        let client = TicLookupClient::new(&base, Duration::from_secs(5)).unwrap();
        assert_eq!(client.endpoint().as_str(), "http://localhost:5000/lookup_tic");
    }

    #[tokio::test]
    async fn test_in_memory_catalog() {
        let id = CatalogId::from_number(42);
        let catalog =
            InMemoryCatalog::new().with_entry(id.clone(), SkyPosition::new(1.0, 2.0).unwrap());
        assert!(catalog.lookup(&id).await.is_ok());
        assert!(catalog
            .lookup(&CatalogId::from_number(1))
            .await
            .unwrap_err()
            .is_not_found());
    }
}
