//! Overlay layer management
//!
//! The map widget is an external collaborator reached through [`MapSurface`].
//! [`OverlayManager`] is the only thing that mutates it and guarantees that at
//! most one layer per name is attached at any time: attaching a layer whose
//! name is already in use first detaches the old one.
//!
//! ```text
//! TargetRegistry ──► OverlayManager ──► MapSurface (widget / SceneMap)
//! FootprintGrouper ─┘
//! ```

pub mod scene;

pub use scene::{SceneMap, SceneSnapshot};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::coordinates::SkyPosition;
use crate::target::Target;

/// Marker catalog holding one point per resolved target
pub const TARGETS_LAYER: &str = "Targets";
/// Graphic overlay holding the circle drawn around each target
pub const TARGET_CIRCLES_LAYER: &str = "Target Circles";
/// Graphic overlay holding the CCD footprint polylines
pub const FOOTPRINT_LAYER: &str = "CCD Edges";

/// Default radius of the circle drawn around each target, in degrees
pub const DEFAULT_MARKER_RADIUS_DEG: f64 = 0.04;

/// Whether a layer is a marker catalog or a graphic overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Catalog,
    Graphic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStyle {
    pub color: String,
    pub line_width: f32,
    pub z_index: i64,
}

impl Default for LayerStyle {
    fn default() -> Self {
        Self {
            color: "#ee2345".to_string(),
            line_width: 3.0,
            z_index: 10,
        }
    }
}

/// A single primitive drawn on the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Drawable {
    Marker {
        position: SkyPosition,
        title: String,
        description: String,
        color: String,
        z_order: i64,
    },
    Circle {
        center: SkyPosition,
        radius_deg: f64,
        color: String,
        z_order: i64,
    },
    Polyline {
        vertices: Vec<SkyPosition>,
        line_width: f32,
    },
}

/// Named, mutable collection of drawables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayLayer {
    pub name: String,
    pub kind: LayerKind,
    pub style: LayerStyle,
    pub drawables: Vec<Drawable>,
}

impl OverlayLayer {
    pub fn catalog(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: LayerKind::Catalog,
            style: LayerStyle::default(),
            drawables: Vec::new(),
        }
    }

    pub fn graphic(name: impl Into<String>, style: LayerStyle) -> Self {
        Self {
            name: name.into(),
            kind: LayerKind::Graphic,
            style,
            drawables: Vec::new(),
        }
    }

    pub fn with_drawables(mut self, drawables: Vec<Drawable>) -> Self {
        self.drawables = drawables;
        self
    }

    /// Same name, kind and style, no drawables
    fn emptied(&self) -> Self {
        Self {
            name: self.name.clone(),
            kind: self.kind,
            style: self.style.clone(),
            drawables: Vec::new(),
        }
    }
}

/// Primitives the map widget must provide
pub trait MapSurface: Send {
    /// Attach a layer and everything already in it
    fn attach_layer(&mut self, layer: &OverlayLayer);

    /// Remove a layer and all its drawables from the map
    fn detach_layer(&mut self, name: &str);

    /// Add drawables to an attached layer
    fn draw(&mut self, layer: &str, drawables: &[Drawable]);

    /// Recenter the view
    fn goto_ra_dec(&mut self, position: SkyPosition);
}

/// Sole owner of the overlay state of one map
pub struct OverlayManager<S: MapSurface> {
    surface: S,
    layers: HashMap<String, OverlayLayer>,
    marker_radius_deg: f64,
    circle_color: String,
}

impl<S: MapSurface> OverlayManager<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            layers: HashMap::new(),
            marker_radius_deg: DEFAULT_MARKER_RADIUS_DEG,
            circle_color: "red".to_string(),
        }
    }

    pub fn with_marker_radius(mut self, radius_deg: f64) -> Self {
        self.marker_radius_deg = radius_deg;
        self
    }

    pub fn with_circle_color(mut self, color: impl Into<String>) -> Self {
        self.circle_color = color.into();
        self
    }

    /// Attach a layer, replacing any attached layer of the same name
    pub fn attach(&mut self, layer: OverlayLayer) {
        if self.layers.remove(&layer.name).is_some() {
            tracing::debug!(layer = %layer.name, "Replacing attached layer");
            self.surface.detach_layer(&layer.name);
        }
        self.surface.attach_layer(&layer);
        self.layers.insert(layer.name.clone(), layer);
    }

    /// Detach a layer by name, returning it if it was attached
    pub fn detach_by_name(&mut self, name: &str) -> Option<OverlayLayer> {
        let removed = self.layers.remove(name);
        if removed.is_some() {
            self.surface.detach_layer(name);
        }
        removed
    }

    /// Replace the contents of a layer wholesale
    ///
    /// Keeps the kind and style of the currently attached layer of that name;
    /// an unknown name becomes a graphic layer with the default style.
    pub fn clear_and_redraw(&mut self, name: &str, drawables: Vec<Drawable>) {
        let fresh = match self.layers.get(name) {
            Some(existing) => existing.emptied(),
            None => OverlayLayer::graphic(name, LayerStyle::default()),
        };
        self.attach(fresh.with_drawables(drawables));
    }

    /// Append drawables to a layer, attaching an empty graphic layer first if
    /// none of that name exists
    pub fn add_to(&mut self, name: &str, drawables: Vec<Drawable>) {
        if !self.layers.contains_key(name) {
            self.attach(OverlayLayer::graphic(name, LayerStyle::default()));
        }
        self.surface.draw(name, &drawables);
        if let Some(layer) = self.layers.get_mut(name) {
            layer.drawables.extend(drawables);
        }
    }

    /// Draw a target: a marker in the catalog layer plus a circle around it
    pub fn place_target(&mut self, target: &Target) {
        tracing::debug!(name = %target.name, position = %target.position, "Placing target");
        let marker = Drawable::Marker {
            position: target.position,
            title: target.name.clone(),
            description: target.position.describe(),
            color: target.color.clone(),
            z_order: target.z_order,
        };
        let circle = Drawable::Circle {
            center: target.position,
            radius_deg: self.marker_radius_deg,
            color: self.circle_color.clone(),
            z_order: target.z_order,
        };
        if !self.layers.contains_key(TARGETS_LAYER) {
            self.attach(OverlayLayer::catalog(TARGETS_LAYER));
        }
        self.add_to(TARGETS_LAYER, vec![marker]);
        self.add_to(TARGET_CIRCLES_LAYER, vec![circle]);
    }

    /// Recenter the map
    pub fn goto(&mut self, position: SkyPosition) {
        tracing::debug!(%position, "Recentering map");
        self.surface.goto_ra_dec(position);
    }

    pub fn layer(&self, name: &str) -> Option<&OverlayLayer> {
        self.layers.get(name)
    }

    pub fn is_attached(&self, name: &str) -> bool {
        self.layers.contains_key(name)
    }

    pub fn attached_count(&self) -> usize {
        self.layers.len()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}
