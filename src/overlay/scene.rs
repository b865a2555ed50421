//! In-memory map surface
//!
//! Records what a real widget would display so a front-end can poll it and
//! tests can assert on it.

use serde::{Deserialize, Serialize};

use super::{Drawable, MapSurface, OverlayLayer};
use crate::coordinates::SkyPosition;

/// Serialisable view of everything currently on the map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    /// Attached layers in attach order
    pub layers: Vec<OverlayLayer>,
    pub center: Option<SkyPosition>,
    /// Bumped on every mutation so pollers can skip unchanged scenes
    pub revision: u64,
}

#[derive(Debug, Default)]
pub struct SceneMap {
    scene: SceneSnapshot,
}

impl SceneMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        self.scene.clone()
    }

    fn touch(&mut self) {
        self.scene.revision += 1;
    }
}

impl MapSurface for SceneMap {
    fn attach_layer(&mut self, layer: &OverlayLayer) {
        self.scene.layers.push(layer.clone());
        self.touch();
    }

    fn detach_layer(&mut self, name: &str) {
        self.scene.layers.retain(|layer| layer.name != name);
        self.touch();
    }

    fn draw(&mut self, layer: &str, drawables: &[Drawable]) {
        match self.scene.layers.iter_mut().find(|l| l.name == layer) {
            Some(attached) => attached.drawables.extend_from_slice(drawables),
            None => tracing::warn!(layer, "Draw on a layer that is not attached"),
        }
        self.touch();
    }

    fn goto_ra_dec(&mut self, position: SkyPosition) {
        self.scene.center = Some(position);
        self.touch();
    }
}
