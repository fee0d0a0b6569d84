//! The health check endpoint used by the container runtime.

use axum::Json;
use serde::{Deserialize, Serialize};

/// The body of a health check response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"healthy"` while the server is able to respond.
    pub status: String,
}

/// Handler that reports the server is up.
///
/// Reachability is the whole check: if this handler runs, the process is
/// serving requests.
pub async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_owned(),
    })
}
