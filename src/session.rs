//! The target-resolution dispatcher
//!
//! A [`SkyMapSession`] owns one map's overlays and the registry of the batch
//! currently in flight. Each submission classifies its inputs, spawns one
//! resolution task per target, and consumes the outcomes from a channel:
//!
//! ```text
//! submit ─► classify ─► spawn resolve ×N ─► mpsc ─► apply ─► registry
//!                                                       └──► overlays
//! ```
//!
//! Outcomes are applied one at a time by the session, so the registry and
//! the map are never touched concurrently. A new submission replaces the
//! registry; outcomes still in flight for the old batch arrive tagged with
//! its [`BatchId`] and are discarded.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::batch::{BatchSource, LocalBatchParser, UploadClient};
use crate::config::SkyPlotConfig;
use crate::coordinates::{InputKind, SkyPosition};
use crate::error::{FootprintError, SkyPlotResult};
use crate::footprint::{
    FileFootprintSource, FootprintGrouper, FootprintSelection, FootprintSource,
    HttpFootprintSource,
};
use crate::overlay::{
    LayerStyle, MapSurface, OverlayLayer, OverlayManager, FOOTPRINT_LAYER,
    TARGETS_LAYER, TARGET_CIRCLES_LAYER,
};
use crate::registry::{AttemptId, BatchId, RecordStatus, TargetRegistry};
use crate::resolver::{
    NameResolver, ResolutionOutcome, ResolutionRequest, SesameView, TargetResolver,
    TicLookupClient,
};
use crate::target::DEFAULT_TARGET_COLOR;

type OutcomeMessage = (AttemptId, ResolutionOutcome);

/// One press of the submit button
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Typed target: coordinates, TIC id or name
    pub target_text: Option<String>,
    /// Uploaded target list
    pub batch_file: Option<Vec<u8>>,
    /// Footprint cycle to draw
    pub cycle: Option<u32>,
}

/// User-visible notice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    NotFound { label: String, reason: String },
    Transient { label: String, message: String },
    UploadFailed { message: String },
    FootprintUnavailable { message: String },
}

/// Progress of the current batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStatus {
    pub batch: Option<BatchId>,
    pub expected: usize,
    pub received: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub complete: bool,
    pub centroid: Option<SkyPosition>,
}

pub struct SkyMapSession<S: MapSurface> {
    overlays: OverlayManager<S>,
    resolver: Arc<TargetResolver>,
    batches: Arc<dyn BatchSource>,
    footprints: Arc<dyn FootprintSource>,
    grouper: FootprintGrouper,
    footprint_style: LayerStyle,
    marker_color: String,
    registry: Option<TargetRegistry>,
    outcomes_tx: UnboundedSender<OutcomeMessage>,
    outcomes_rx: UnboundedReceiver<OutcomeMessage>,
    alerts: Vec<Alert>,
}

impl<S: MapSurface> SkyMapSession<S> {
    pub fn new(
        overlays: OverlayManager<S>,
        resolver: Arc<TargetResolver>,
        batches: Arc<dyn BatchSource>,
        footprints: Arc<dyn FootprintSource>,
    ) -> Self {
        let (outcomes_tx, outcomes_rx) = unbounded_channel();
        Self {
            overlays,
            resolver,
            batches,
            footprints,
            grouper: FootprintGrouper::default(),
            footprint_style: LayerStyle {
                color: "cyan".to_string(),
                line_width: 1.0,
                z_index: 5,
            },
            marker_color: DEFAULT_TARGET_COLOR.to_string(),
            registry: None,
            outcomes_tx,
            outcomes_rx,
            alerts: Vec::new(),
        }
    }

    /// Wire every collaborator from configuration
    pub fn from_config(config: &SkyPlotConfig, surface: S) -> SkyPlotResult<Self> {
        let backend = config.backend_url()?;
        let timeout = config.http_timeout();

        let catalog = TicLookupClient::new(&backend, timeout)?;
        let view = SesameView::new(&config.sesame_url, config.default_fov_deg, timeout)?;
        let names = NameResolver::new(Arc::new(view), config.probe_settings());
        let resolver = TargetResolver::new(Arc::new(catalog), names);

        let batches: Arc<dyn BatchSource> = if config.upload_via_backend {
            Arc::new(UploadClient::new(&backend, timeout)?)
        } else {
            Arc::new(LocalBatchParser)
        };
        let footprints: Arc<dyn FootprintSource> = match config.footprint_url() {
            Some(url) => Arc::new(HttpFootprintSource::new(url, timeout)?),
            None => Arc::new(FileFootprintSource::new(&config.footprint_source)),
        };

        let overlays = OverlayManager::new(surface)
            .with_marker_radius(config.marker_radius_deg)
            .with_circle_color(config.circle_color.clone());

        Ok(Self::new(overlays, Arc::new(resolver), batches, footprints)
            .with_grouper(FootprintGrouper::new(config.cycle_size))
            .with_marker_color(config.marker_color.clone()))
    }

    pub fn with_grouper(mut self, grouper: FootprintGrouper) -> Self {
        self.grouper = grouper;
        self
    }

    pub fn with_marker_color(mut self, color: impl Into<String>) -> Self {
        self.marker_color = color.into();
        self
    }

    pub fn with_footprint_style(mut self, style: LayerStyle) -> Self {
        self.footprint_style = style;
        self
    }

    /// Handle a submission. Returns the id of the batch started, if any.
    ///
    /// Blank text is ignored without an alert. A failed upload raises an
    /// alert but the typed target and the cycle selection still proceed.
    pub async fn submit(&mut self, submission: Submission) -> Option<BatchId> {
        let mut requests = Vec::new();

        if let Some(text) = submission.target_text.as_deref() {
            match ResolutionRequest::from_text(text) {
                Some(request) => requests.push(request.with_color(self.marker_color.clone())),
                None => tracing::debug!("Ignoring blank target input"),
            }
        }

        if let Some(file) = submission.batch_file.as_deref() {
            match self.batches.rows(file).await {
                Ok(rows) => {
                    for (line, row) in rows.iter().enumerate() {
                        match row.to_request() {
                            Some(request) => {
                                requests.push(request.with_color(self.marker_color.clone()))
                            }
                            None => tracing::debug!(line = line + 1, "Skipping empty batch row"),
                        }
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "Batch upload failed");
                    self.alerts.push(Alert::UploadFailed {
                        message: err.to_string(),
                    });
                }
            }
        }

        let batch = if requests.is_empty() {
            None
        } else {
            Some(self.start_batch(requests))
        };

        if let Some(cycle) = submission.cycle {
            // failure is already recorded as an alert
            let _ = self.select_cycle(cycle).await;
        }

        batch
    }

    fn start_batch(&mut self, requests: Vec<ResolutionRequest>) -> BatchId {
        let registry = TargetRegistry::new(requests.len());
        let batch = registry.batch_id();
        tracing::info!(%batch, targets = requests.len(), "Starting batch");

        self.overlays.attach(OverlayLayer::catalog(TARGETS_LAYER));
        self.overlays.attach(OverlayLayer::graphic(
            TARGET_CIRCLES_LAYER,
            LayerStyle::default(),
        ));

        for (index, request) in requests.into_iter().enumerate() {
            let attempt = registry.attempt(index);
            let resolver = Arc::clone(&self.resolver);
            let tx = self.outcomes_tx.clone();
            tokio::spawn(async move {
                let outcome = resolver.resolve(&request).await;
                // receiver lives as long as the session
                let _ = tx.send((attempt, outcome));
            });
        }

        self.registry = Some(registry);
        batch
    }

    /// Apply one outcome to the current batch
    pub fn apply(&mut self, attempt: AttemptId, outcome: ResolutionOutcome) -> RecordStatus {
        let status = match self.registry.as_mut() {
            Some(registry) => registry.record(attempt, &outcome),
            None => RecordStatus::Stale,
        };
        if status != RecordStatus::Recorded {
            tracing::debug!(batch = %attempt.batch, index = attempt.index, ?status, "Discarding outcome");
            return status;
        }

        match outcome {
            ResolutionOutcome::Success(target) => self.overlays.place_target(&target),
            ResolutionOutcome::NotFound { label, reason } => {
                self.alerts.push(Alert::NotFound { label, reason })
            }
            ResolutionOutcome::TransientError { label, message } => {
                self.alerts.push(Alert::Transient { label, message })
            }
        }

        if let Some(registry) = &self.registry {
            if registry.is_complete() {
                tracing::info!(
                    batch = %registry.batch_id(),
                    succeeded = registry.success_count(),
                    failed = registry.failure_count(),
                    "Batch complete"
                );
                if let Some(centroid) = registry.centroid() {
                    self.overlays.goto(centroid);
                }
            }
        }
        status
    }

    /// Apply every outcome already delivered, without waiting
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok((attempt, outcome)) = self.outcomes_rx.try_recv() {
            self.apply(attempt, outcome);
            applied += 1;
        }
        applied
    }

    /// Apply outcomes as they arrive until the current batch is complete
    pub async fn wait_for_completion(&mut self) {
        loop {
            match &self.registry {
                Some(registry) if !registry.is_complete() => {}
                _ => return,
            }
            match self.outcomes_rx.recv().await {
                Some((attempt, outcome)) => {
                    self.apply(attempt, outcome);
                }
                None => return,
            }
        }
    }

    /// Place an unnamed target at a clicked position. Not part of any batch
    /// and never recenters the map.
    pub fn click(&mut self, ra: f64, dec: f64) -> ResolutionOutcome {
        let request = ResolutionRequest::new(InputKind::Coordinates { ra, dec })
            .with_color(self.marker_color.clone());
        let outcome = self.resolver.resolve_coordinates(&request, ra, dec);
        match &outcome {
            ResolutionOutcome::Success(target) => self.overlays.place_target(target),
            ResolutionOutcome::NotFound { label, reason } => self.alerts.push(Alert::NotFound {
                label: label.clone(),
                reason: reason.clone(),
            }),
            ResolutionOutcome::TransientError { label, message } => {
                self.alerts.push(Alert::Transient {
                    label: label.clone(),
                    message: message.clone(),
                })
            }
        }
        outcome
    }

    /// Draw the footprints of one cycle, replacing whatever cycle was drawn
    ///
    /// When the dataset cannot be loaded the footprint layer is removed and
    /// an alert raised.
    pub async fn select_cycle(&mut self, cycle: u32) -> Result<FootprintSelection, FootprintError> {
        let rows = match self.footprints.load().await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::error!(
                    source = %self.footprints.describe(),
                    error = %err,
                    "Footprint dataset unavailable"
                );
                self.overlays.detach_by_name(FOOTPRINT_LAYER);
                self.alerts.push(Alert::FootprintUnavailable {
                    message: err.to_string(),
                });
                return Err(err);
            }
        };

        let groups = self.grouper.group(&rows);
        let (drawables, selection) = self.grouper.polylines_for_range(&groups, cycle);
        self.overlays.attach(
            OverlayLayer::graphic(FOOTPRINT_LAYER, self.footprint_style.clone())
                .with_drawables(drawables),
        );
        tracing::info!(
            cycle,
            drawn = selection.drawn.len(),
            missing = selection.missing.len(),
            "Drew footprint cycle"
        );
        Ok(selection)
    }

    pub fn status(&self) -> BatchStatus {
        match &self.registry {
            Some(registry) => BatchStatus {
                batch: Some(registry.batch_id()),
                expected: registry.expected(),
                received: registry.received(),
                succeeded: registry.success_count(),
                failed: registry.failure_count(),
                complete: registry.is_complete(),
                centroid: registry.centroid(),
            },
            None => BatchStatus::default(),
        }
    }

    /// Drain the pending alerts
    pub fn take_alerts(&mut self) -> Vec<Alert> {
        std::mem::take(&mut self.alerts)
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn registry(&self) -> Option<&TargetRegistry> {
        self.registry.as_ref()
    }

    pub fn overlays(&self) -> &OverlayManager<S> {
        &self.overlays
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinates::CatalogId;
    use crate::footprint::FootprintRow;
    use crate::overlay::{Drawable, SceneMap};
    use crate::resolver::{InMemoryCatalog, ProbeSettings, SkyView, ViewProbe};
    use crate::target::UNNAMED_TARGET;
    use async_trait::async_trait;
    use std::time::Duration;

    struct BlankView;

    #[async_trait]
    impl SkyView for BlankView {
        async fn goto_object(&self, _name: &str) -> ViewProbe {
            ViewProbe::pending()
        }
    }

    struct NoFootprints;

    #[async_trait]
    impl FootprintSource for NoFootprints {
        async fn load(&self) -> Result<Vec<FootprintRow>, FootprintError> {
            Err(FootprintError::Unavailable {
                source_name: self.describe(),
                message: "offline".to_string(),
            })
        }

        fn describe(&self) -> String {
            "nowhere".to_string()
        }
    }

    fn session() -> SkyMapSession<SceneMap> {
        let catalog = InMemoryCatalog::new()
            .with_entry(
                CatalogId::from_number(42),
                SkyPosition::new(10.0, 20.0).unwrap(),
            )
            .with_failure(CatalogId::from_number(7), "backend unreachable");
        let names = NameResolver::new(
            Arc::new(BlankView),
            ProbeSettings {
                settle_delay: Duration::from_millis(1),
                fov_threshold_deg: 0.0001,
            },
        );
        SkyMapSession::new(
            OverlayManager::new(SceneMap::new()),
            Arc::new(TargetResolver::new(Arc::new(catalog), names)),
            Arc::new(LocalBatchParser),
            Arc::new(NoFootprints),
        )
    }

    #[tokio::test]
    async fn test_blank_submission_starts_nothing() {
        let mut session = session();
        let batch = session
            .submit(Submission {
                target_text: Some("   ".to_string()),
                ..Submission::default()
            })
            .await;
        assert!(batch.is_none());
        assert!(session.registry().is_none());
        assert!(session.alerts().is_empty());
        assert_eq!(session.overlays().attached_count(), 0);
    }

    #[tokio::test]
    async fn test_single_target_recenters_on_completion() {
        let mut session = session();
        session
            .submit(Submission {
                target_text: Some("TIC 42".to_string()),
                ..Submission::default()
            })
            .await
            .unwrap();
        session.wait_for_completion().await;

        let status = session.status();
        assert!(status.complete);
        assert_eq!(status.succeeded, 1);
        assert_eq!(
            session.overlays().surface().snapshot().center,
            Some(SkyPosition::new(10.0, 20.0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_bad_upload_alerts_but_text_target_proceeds() {
        let mut session = session();
        session
            .submit(Submission {
                target_text: Some("1, 2".to_string()),
                batch_file: Some(b"1,2,3\n".to_vec()),
                cycle: None,
            })
            .await
            .unwrap();
        session.wait_for_completion().await;

        assert_eq!(session.status().expected, 1);
        assert!(matches!(
            session.take_alerts().as_slice(),
            [Alert::UploadFailed { .. }]
        ));
    }

    #[tokio::test]
    async fn test_transient_lookup_failure_alerts_and_batch_completes() {
        let mut session = session();
        session
            .submit(Submission {
                batch_file: Some(b"7\n42\n".to_vec()),
                ..Submission::default()
            })
            .await
            .unwrap();
        session.wait_for_completion().await;

        let status = session.status();
        assert!(status.complete);
        assert_eq!(status.succeeded, 1);
        assert_eq!(status.failed, 1);
        assert!(matches!(
            session.take_alerts().as_slice(),
            [Alert::Transient { label, .. }] if label == "TIC 7"
        ));
    }

    #[tokio::test]
    async fn test_footprint_failure_detaches_layer() {
        let mut session = session();
        let err = session.select_cycle(1).await.unwrap_err();
        assert!(matches!(err, FootprintError::Unavailable { .. }));
        assert!(!session.overlays().is_attached(FOOTPRINT_LAYER));
        assert!(matches!(
            session.alerts(),
            [Alert::FootprintUnavailable { .. }]
        ));
    }

    #[test]
    fn test_click_places_unnamed_target_outside_batch() {
        let mut session = session();
        let outcome = session.click(370.0, -10.0);
        let target = outcome.target().unwrap();
        assert_eq!(target.name, UNNAMED_TARGET);
        assert!((target.ra() - 10.0).abs() < 1e-9);

        assert!(session.registry().is_none());
        let markers = &session.overlays().layer(TARGETS_LAYER).unwrap().drawables;
        assert!(matches!(&markers[0], Drawable::Marker { title, .. } if title == UNNAMED_TARGET));
        assert_eq!(session.overlays().surface().snapshot().center, None);
    }

    #[test]
    fn test_click_out_of_range_declination_alerts() {
        let mut session = session();
        let outcome = session.click(10.0, 95.0);
        assert!(matches!(outcome, ResolutionOutcome::NotFound { .. }));
        assert!(matches!(session.alerts(), [Alert::NotFound { .. }]));
    }
}
