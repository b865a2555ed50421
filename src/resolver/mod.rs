//! Target resolution
//!
//! One strategy per [`InputKind`]:
//!
//! ```text
//! Coordinates ──► validate in place (no I/O)
//! CatalogId   ──► CatalogLookup (remote backend)      ─┐
//! Name        ──► NameResolver (map view + settle poll) ├─► ResolutionOutcome
//! ```
//!
//! Every call yields exactly one [`ResolutionOutcome`]. There are no retries
//! and no fallback from one strategy to another.

pub mod catalog;
pub mod name;
pub mod sesame;

pub use catalog::{CatalogLookup, InMemoryCatalog, TicLookupClient};
pub use name::{settle_and_probe, NameResolver, ProbeSettings, SkyView, ViewProbe};
pub use sesame::SesameView;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::coordinates::{classify, InputKind, SkyPosition};
use crate::target::{Target, ZOrder, ZOrderClock, DEFAULT_TARGET_COLOR, UNNAMED_TARGET};

/// Result of a single resolution attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResolutionOutcome {
    Success(Target),
    /// The input could not be matched to an object
    NotFound { label: String, reason: String },
    /// The lookup could not be completed (network, backend failure)
    TransientError { label: String, message: String },
}

impl ResolutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ResolutionOutcome::Success(_))
    }

    pub fn target(&self) -> Option<&Target> {
        match self {
            ResolutionOutcome::Success(target) => Some(target),
            _ => None,
        }
    }
}

/// What to resolve and how to display it once resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionRequest {
    pub kind: InputKind,
    /// Display name of the resulting target
    pub label: String,
    pub color: String,
    pub z_order: ZOrder,
}

impl ResolutionRequest {
    /// Request with the label the input kind implies
    pub fn new(kind: InputKind) -> Self {
        let label = match &kind {
            InputKind::Coordinates { .. } => UNNAMED_TARGET.to_string(),
            InputKind::CatalogId { id } => id.to_string(),
            InputKind::Name { text } => text.clone(),
        };
        Self {
            kind,
            label,
            color: DEFAULT_TARGET_COLOR.to_string(),
            z_order: ZOrder::Auto,
        }
    }

    /// Classify typed text. Blank text yields `None` and nothing is resolved.
    ///
    /// A typed coordinate pair keeps the text itself as its label.
    pub fn from_text(raw: &str) -> Option<Self> {
        let kind = classify(raw)?;
        let is_coordinates = matches!(kind, InputKind::Coordinates { .. });
        let request = Self::new(kind);
        Some(if is_coordinates {
            request.with_label(raw.trim())
        } else {
            request
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn with_z_order(mut self, z_order: ZOrder) -> Self {
        self.z_order = z_order;
        self
    }
}

/// Dispatches each request to the strategy its input kind calls for
pub struct TargetResolver {
    catalog: Arc<dyn CatalogLookup>,
    names: NameResolver,
    clock: ZOrderClock,
}

impl TargetResolver {
    pub fn new(catalog: Arc<dyn CatalogLookup>, names: NameResolver) -> Self {
        Self {
            catalog,
            names,
            clock: ZOrderClock::new(),
        }
    }

    /// Resolve one request. Never fails: failures are outcomes.
    pub async fn resolve(&self, request: &ResolutionRequest) -> ResolutionOutcome {
        tracing::debug!(
            label = %request.label,
            strategy = request.kind.strategy(),
            "Resolving target"
        );
        let outcome = match &request.kind {
            InputKind::Coordinates { ra, dec } => return self.resolve_coordinates(request, *ra, *dec),
            InputKind::CatalogId { id } => match self.catalog.lookup(id).await {
                Ok(position) => self.success(request, position),
                Err(err) if err.is_not_found() => ResolutionOutcome::NotFound {
                    label: request.label.clone(),
                    reason: err.to_string(),
                },
                Err(err) => ResolutionOutcome::TransientError {
                    label: request.label.clone(),
                    message: err.to_string(),
                },
            },
            InputKind::Name { text } => match self.names.resolve(text).await {
                Some(position) => self.success(request, position),
                None => ResolutionOutcome::NotFound {
                    label: request.label.clone(),
                    reason: format!("target name '{}' not found", text),
                },
            },
        };
        log_outcome(&outcome);
        outcome
    }

    /// Coordinates resolve in place; only non-finite or impossible values fail
    pub fn resolve_coordinates(
        &self,
        request: &ResolutionRequest,
        ra: f64,
        dec: f64,
    ) -> ResolutionOutcome {
        let outcome = match SkyPosition::new(ra, dec) {
            Ok(position) => self.success(request, position),
            Err(err) => ResolutionOutcome::NotFound {
                label: request.label.clone(),
                reason: err.to_string(),
            },
        };
        log_outcome(&outcome);
        outcome
    }

    fn success(&self, request: &ResolutionRequest, position: SkyPosition) -> ResolutionOutcome {
        ResolutionOutcome::Success(Target {
            name: request.label.clone(),
            position,
            color: request.color.clone(),
            z_order: self.clock.resolve(request.z_order),
        })
    }
}

fn log_outcome(outcome: &ResolutionOutcome) {
    match outcome {
        ResolutionOutcome::Success(target) => {
            tracing::info!(name = %target.name, position = %target.position, "Target resolved")
        }
        ResolutionOutcome::NotFound { label, reason } => {
            tracing::warn!(%label, %reason, "Target not found")
        }
        ResolutionOutcome::TransientError { label, message } => {
            tracing::warn!(%label, %message, "Target lookup failed")
        }
    }
}
