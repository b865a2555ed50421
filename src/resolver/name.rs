//! Name resolution through the map view
//!
//! The map widget resolves object names itself (`goto_object`) and reports
//! back through a callback, but gives no signal when a name is unknown.
//! [`settle_and_probe`] is the single adapter that papers over that: it waits
//! a fixed delay and then reads the request's [`ViewProbe`] back. This is a
//! heuristic, not a guarantee. A slow resolver looks exactly like an unknown
//! name. Swap this function out if the view ever exposes a failure event.
//!
//! Every `goto_object` call gets its own probe, so lookups for different rows
//! of a batch run side by side.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::coordinates::SkyPosition;

/// Default wait between `goto_object` and reading the view back
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Field of view below which the view is considered unresolved, in degrees
pub const DEFAULT_FOV_THRESHOLD_DEG: f64 = 0.0001;

#[derive(Debug, Default)]
struct ProbeState {
    center: Option<SkyPosition>,
    fov: f64,
}

/// View state of one `goto_object` request
///
/// Starts pending (no center, zero field of view). The view calls
/// [`ViewProbe::settle`] from its completion callback once the name resolves.
#[derive(Debug, Clone, Default)]
pub struct ViewProbe {
    state: Arc<RwLock<ProbeState>>,
}

impl ViewProbe {
    pub fn pending() -> Self {
        Self::default()
    }

    pub async fn settle(&self, center: SkyPosition, fov: f64) {
        let mut state = self.state.write().await;
        state.center = Some(center);
        state.fov = fov;
    }

    pub async fn ra_dec(&self) -> Option<SkyPosition> {
        self.state.read().await.center
    }

    /// Horizontal field of view in degrees
    pub async fn fov(&self) -> f64 {
        self.state.read().await.fov
    }
}

/// Name-resolution primitive of the map widget
#[async_trait]
pub trait SkyView: Send + Sync {
    /// Ask the view to move to a named object. Returns immediately with the
    /// probe the view fills in once the name resolves.
    async fn goto_object(&self, name: &str) -> ViewProbe;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeSettings {
    pub settle_delay: Duration,
    pub fov_threshold_deg: f64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            fov_threshold_deg: DEFAULT_FOV_THRESHOLD_DEG,
        }
    }
}

/// Move the view to `name`, wait for it to settle, and read the result back
///
/// Returns `None` when the field of view is still below the threshold after
/// the delay, which is taken to mean the name did not resolve.
pub async fn settle_and_probe(
    view: &dyn SkyView,
    name: &str,
    settings: &ProbeSettings,
) -> Option<SkyPosition> {
    let probe = view.goto_object(name).await;
    tokio::time::sleep(settings.settle_delay).await;

    let fov = probe.fov().await;
    if fov.abs() < settings.fov_threshold_deg {
        tracing::debug!(name, fov, "View did not settle on target");
        return None;
    }
    probe.ra_dec().await
}

pub struct NameResolver {
    view: Arc<dyn SkyView>,
    settings: ProbeSettings,
}

impl NameResolver {
    pub fn new(view: Arc<dyn SkyView>, settings: ProbeSettings) -> Self {
        Self { view, settings }
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    pub async fn resolve(&self, name: &str) -> Option<SkyPosition> {
        settle_and_probe(self.view.as_ref(), name, &self.settings).await
    }
}
