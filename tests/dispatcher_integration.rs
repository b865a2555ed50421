//! End-to-end tests of the dispatcher against in-process collaborators

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use skyplot::batch::LocalBatchParser;
use skyplot::error::LookupError;
use skyplot::footprint::FileFootprintSource;
use skyplot::overlay::{FOOTPRINT_LAYER, TARGETS_LAYER};
use skyplot::registry::{RecordStatus, TargetRegistry};
use skyplot::resolver::{CatalogLookup, NameResolver, ProbeSettings, SkyView, ViewProbe};
use skyplot::{
    Alert, CatalogId, Drawable, OverlayManager, ResolutionOutcome, SceneMap, SkyMapSession,
    SkyPosition, Submission, TargetResolver,
};

fn pos(ra: f64, dec: f64) -> SkyPosition {
    SkyPosition::new(ra, dec).unwrap()
}

/// Catalog answering each id after its own delay
struct DelayedCatalog {
    entries: HashMap<String, (Duration, Option<SkyPosition>)>,
}

#[async_trait]
impl CatalogLookup for DelayedCatalog {
    async fn lookup(&self, id: &CatalogId) -> Result<SkyPosition, LookupError> {
        let not_found = || LookupError::NotFound {
            identifier: id.to_string(),
        };
        let (delay, position) = self.entries.get(id.number()).ok_or_else(not_found)?;
        tokio::time::sleep(*delay).await;
        (*position).ok_or_else(not_found)
    }
}

/// View that settles at once on known names and leaves others pending
struct NamedView {
    known: HashMap<String, SkyPosition>,
}

#[async_trait]
impl SkyView for NamedView {
    async fn goto_object(&self, name: &str) -> ViewProbe {
        let probe = ViewProbe::pending();
        if let Some(&position) = self.known.get(name) {
            probe.settle(position, 0.5).await;
        }
        probe
    }
}

fn catalog() -> DelayedCatalog {
    let entries = [
        ("1", (Duration::from_millis(300), Some(pos(10.0, 20.0)))),
        ("2", (Duration::from_millis(100), None)),
        ("3", (Duration::from_millis(200), Some(pos(30.0, 40.0)))),
    ]
    .into_iter()
    .map(|(id, entry)| (id.to_string(), entry))
    .collect();
    DelayedCatalog { entries }
}

fn session_with_footprints(footprints: FileFootprintSource) -> SkyMapSession<SceneMap> {
    let view = NamedView {
        known: [("M31".to_string(), pos(10.68, 41.27))].into_iter().collect(),
    };
    let names = NameResolver::new(Arc::new(view), ProbeSettings::default());
    SkyMapSession::new(
        OverlayManager::new(SceneMap::new()),
        Arc::new(TargetResolver::new(Arc::new(catalog()), names)),
        Arc::new(LocalBatchParser),
        Arc::new(footprints),
    )
}

fn session() -> SkyMapSession<SceneMap> {
    session_with_footprints(FileFootprintSource::new("/nonexistent/ccd_edges.csv"))
}

fn marker_titles(session: &SkyMapSession<SceneMap>) -> Vec<String> {
    session
        .overlays()
        .layer(TARGETS_LAYER)
        .map(|layer| {
            layer
                .drawables
                .iter()
                .filter_map(|d| match d {
                    Drawable::Marker { title, .. } => Some(title.clone()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test(start_paused = true)]
async fn test_three_row_batch_with_failing_middle_row() {
    let mut session = session();
    session
        .submit(Submission {
            batch_file: Some(b"1\n2\n3\n".to_vec()),
            ..Submission::default()
        })
        .await
        .unwrap();

    // outcomes arrive in the order 2, 3, 1
    session.wait_for_completion().await;

    let status = session.status();
    assert!(status.complete);
    assert_eq!(status.expected, 3);
    assert_eq!(status.succeeded, 2);
    assert_eq!(status.failed, 1);

    let centroid = status.centroid.unwrap();
    assert!((centroid.ra - 20.0).abs() < 1e-9);
    assert!((centroid.dec - 30.0).abs() < 1e-9);
    assert_eq!(session.overlays().surface().snapshot().center, Some(centroid));

    assert_eq!(marker_titles(&session), vec!["TIC 3", "TIC 1"]);
    assert!(matches!(
        session.take_alerts().as_slice(),
        [Alert::NotFound { label, .. }] if label == "TIC 2"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_outcomes_from_superseded_batch_are_discarded() {
    let mut session = session();
    let first = session
        .submit(Submission {
            target_text: Some("M31".to_string()),
            ..Submission::default()
        })
        .await
        .unwrap();
    let second = session
        .submit(Submission {
            target_text: Some("5, 6".to_string()),
            ..Submission::default()
        })
        .await
        .unwrap();
    assert_ne!(first, second);

    session.wait_for_completion().await;
    assert_eq!(marker_titles(&session), vec!["5, 6"]);

    // let the name probe of the first batch finish
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(session.pump(), 1);

    let registry = session.registry().unwrap();
    assert_eq!(registry.batch_id(), second);
    assert_eq!(registry.received(), 1);
    assert_eq!(registry.targets().len(), 1);
    assert_eq!(marker_titles(&session), vec!["5, 6"]);
    assert_eq!(session.overlays().surface().snapshot().center, Some(pos(5.0, 6.0)));
}

#[tokio::test]
async fn test_apply_rejects_attempt_of_other_batch() {
    let mut session = session();
    session
        .submit(Submission {
            target_text: Some("1,2".to_string()),
            ..Submission::default()
        })
        .await
        .unwrap();
    session.wait_for_completion().await;

    let foreign = TargetRegistry::single().attempt(0);
    let outcome = session.click(50.0, 50.0);
    assert_eq!(session.apply(foreign, outcome), RecordStatus::Stale);
    assert_eq!(session.registry().unwrap().received(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_name_resolves_through_view() {
    let mut session = session();
    session
        .submit(Submission {
            target_text: Some("M31".to_string()),
            ..Submission::default()
        })
        .await
        .unwrap();
    session.wait_for_completion().await;

    assert_eq!(marker_titles(&session), vec!["M31"]);
    assert_eq!(
        session.overlays().surface().snapshot().center,
        Some(pos(10.68, 41.27))
    );
}

#[tokio::test(start_paused = true)]
async fn test_name_rows_resolve_side_by_side() {
    let mut session = session();
    let file = "M31\n".repeat(40);
    session
        .submit(Submission {
            batch_file: Some(file.into_bytes()),
            ..Submission::default()
        })
        .await
        .unwrap();

    let started = tokio::time::Instant::now();
    session.wait_for_completion().await;

    // one settle delay for the whole batch, not one per row
    assert!(started.elapsed() < Duration::from_secs(2));
    let status = session.status();
    assert!(status.complete);
    assert_eq!(status.succeeded, 40);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_name_alerts_not_found() {
    let mut session = session();
    session
        .submit(Submission {
            target_text: Some("Nowhere Nebula".to_string()),
            ..Submission::default()
        })
        .await
        .unwrap();
    session.wait_for_completion().await;

    assert!(session.status().complete);
    assert_eq!(session.status().centroid, None);
    assert_eq!(session.overlays().surface().snapshot().center, None);
    assert!(matches!(session.alerts(), [Alert::NotFound { .. }]));
}

#[tokio::test]
async fn test_empty_input_makes_no_attempt() {
    let mut session = session();
    let batch = session
        .submit(Submission {
            target_text: Some("".to_string()),
            batch_file: Some(b"\n\n".to_vec()),
            cycle: None,
        })
        .await;

    assert!(batch.is_none());
    assert!(session.registry().is_none());
    assert!(session.alerts().is_empty());
    assert_eq!(session.overlays().surface().snapshot().revision, 0);
}

#[tokio::test]
async fn test_cycle_selection_replaces_footprint_layer() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "id,camera,ra,dec,ccd,corner,sector").unwrap();
    writeln!(file, "1,1,0.0,0.0,1,1,1").unwrap();
    writeln!(file, "2,1,1.0,1.0,1,2,1").unwrap();
    writeln!(file, "3,1,2.0,2.0,1,1,14").unwrap();
    writeln!(file, "4,1,3.0,3.0,1,2,14").unwrap();

    let mut session = session_with_footprints(FileFootprintSource::new(file.path()));

    let first = session.select_cycle(1).await.unwrap();
    assert_eq!(first.drawn, vec![1]);

    session
        .submit(Submission {
            cycle: Some(2),
            ..Submission::default()
        })
        .await;

    let snapshot = session.overlays().surface().snapshot();
    let edges: Vec<_> = snapshot
        .layers
        .iter()
        .filter(|layer| layer.name == FOOTPRINT_LAYER)
        .collect();
    assert_eq!(edges.len(), 1);
    assert_eq!(
        edges[0].drawables,
        vec![Drawable::Polyline {
            vertices: vec![pos(2.0, 2.0), pos(3.0, 3.0)],
            line_width: 1.0,
        }]
    );
}

#[tokio::test]
async fn test_missing_footprints_alert_and_batch_still_runs() {
    let mut session = session();
    session
        .submit(Submission {
            target_text: Some("12.5,-30".to_string()),
            batch_file: None,
            cycle: Some(1),
        })
        .await
        .unwrap();
    session.wait_for_completion().await;

    assert!(!session.overlays().is_attached(FOOTPRINT_LAYER));
    assert_eq!(session.status().succeeded, 1);
    assert!(matches!(
        session.alerts(),
        [Alert::FootprintUnavailable { .. }]
    ));
}

#[tokio::test]
async fn test_click_during_batch_does_not_count() {
    let mut session = session();
    session
        .submit(Submission {
            batch_file: Some(b"10,20\n30,40\n".to_vec()),
            ..Submission::default()
        })
        .await
        .unwrap();

    let outcome = session.click(100.0, 10.0);
    assert!(matches!(outcome, ResolutionOutcome::Success(_)));

    session.wait_for_completion().await;
    let status = session.status();
    assert_eq!(status.expected, 2);
    assert_eq!(status.succeeded, 2);
    assert_eq!(marker_titles(&session).len(), 3);
    assert_eq!(
        session.overlays().surface().snapshot().center,
        Some(pos(20.0, 30.0))
    );
}
