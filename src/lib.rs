//! skyplot - target resolution and overlay management for an interactive sky map
//!
//! Typed text, uploaded target lists and map clicks are classified, resolved
//! to sky positions (in place, through a catalog lookup, or through a name
//! resolver), aggregated per batch and drawn as overlay layers.
//!
//! ## Flow
//! raw input -> classify -> TargetResolver -> TargetRegistry -> OverlayManager
//!
//! Footprint selection runs alongside:
//! cycle -> FootprintGrouper -> OverlayManager ("CCD Edges")
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use skyplot::{SceneMap, SkyMapSession, SkyPlotConfig, Submission};
//!
//! # async fn run() -> skyplot::SkyPlotResult<()> {
//! let config = SkyPlotConfig::from_env()?;
//! let mut session = SkyMapSession::from_config(&config, SceneMap::new())?;
//! session
//!     .submit(Submission {
//!         target_text: Some("TIC 261136679".to_string()),
//!         ..Submission::default()
//!     })
//!     .await;
//! session.wait_for_completion().await;
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Input classification and resolved targets
pub mod coordinates;
pub mod target;

// Resolution strategies
pub mod resolver;

// Batch aggregation and uploaded target lists
pub mod batch;
pub mod registry;

// Map overlays and CCD footprints
pub mod footprint;
pub mod overlay;

// Dispatcher tying the above together
pub mod session;

pub mod config;
pub mod export;

// REST API over a session (when enabled)
#[cfg(feature = "server")]
pub mod api;

pub use config::SkyPlotConfig;
pub use coordinates::{classify, CatalogId, InputKind, SkyPosition};
pub use error::{SkyPlotError, SkyPlotResult};
pub use export::{export_selected, sector_results_csv, Column, ColumnTable, SectorResult};
pub use footprint::{FootprintGrouper, FootprintRow, FootprintSelection};
pub use overlay::{Drawable, MapSurface, OverlayLayer, OverlayManager, SceneMap};
pub use registry::{AttemptId, BatchId, TargetRegistry};
pub use resolver::{ResolutionOutcome, ResolutionRequest, TargetResolver};
pub use session::{Alert, BatchStatus, SkyMapSession, Submission};
pub use target::Target;
