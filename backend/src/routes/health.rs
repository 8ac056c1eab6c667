//! Health check endpoints
//!
//! `/health` and `/health/live` only prove the process answers.
//! `/health/ready` also pings storage and answers 503 while it is down.

use crate::repositories::Repository;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageCheck>,
}

#[derive(Debug, Serialize)]
pub struct StorageCheck {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthResponse {
    fn bare(status: &'static str) -> Self {
        Self {
            status,
            version: env!("CARGO_PKG_VERSION"),
            storage: None,
        }
    }
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::bare("healthy"))
}

pub async fn liveness_check() -> Json<HealthResponse> {
    Json(HealthResponse::bare("alive"))
}

pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let check = match state.repo().health_check().await {
        Ok(()) => StorageCheck {
            healthy: true,
            error: None,
        },
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            StorageCheck {
                healthy: false,
                error: Some(e.to_string()),
            }
        }
    };

    let (status, label) = if check.healthy {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    let mut body = HealthResponse::bare(label);
    body.storage = Some(check);
    (status, Json(body))
}
