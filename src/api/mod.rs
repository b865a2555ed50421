//! REST API over a [`SkyMapSession`]
//!
//! One shared session backs the whole server. Handlers hold the session lock
//! only while touching it; a waiting submit re-takes it on each pump.

pub mod routes;

pub use routes::create_router;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::overlay::SceneMap;
use crate::session::SkyMapSession;

/// Shared state for the API routes
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<SkyMapSession<SceneMap>>>,
    /// Upper bound on how long a submit request waits for its batch
    pub submit_timeout: Duration,
}

impl AppState {
    pub fn new(session: SkyMapSession<SceneMap>, submit_timeout: Duration) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            submit_timeout,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}
