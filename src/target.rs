//! Resolved targets and their display ordering

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::coordinates::SkyPosition;

/// Label used when a target has no name of its own (map clicks, bare rows)
pub const UNNAMED_TARGET: &str = "Unnamed Target";

/// Default marker colour
pub const DEFAULT_TARGET_COLOR: &str = "red";

/// A successfully resolved target
///
/// Position and name never change after creation; colour and z-order are
/// display attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub position: SkyPosition,
    pub color: String,
    pub z_order: i64,
}

impl Target {
    pub fn ra(&self) -> f64 {
        self.position.ra
    }

    pub fn dec(&self) -> f64 {
        self.position.dec
    }
}

/// How a target's z-order is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ZOrder {
    /// Next value from the session's [`ZOrderClock`]
    #[default]
    Auto,
    /// Caller-supplied rank
    Rank(i64),
}

/// Strictly increasing z-order source derived from wall-clock milliseconds
///
/// Two targets created in the same millisecond still get distinct values, so
/// later additions always render above earlier ones.
#[derive(Debug, Default)]
pub struct ZOrderClock {
    last: AtomicI64,
}

impl ZOrderClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }

    pub fn resolve(&self, z: ZOrder) -> i64 {
        match z {
            ZOrder::Rank(rank) => rank,
            ZOrder::Auto => self.next(),
        }
    }
}
