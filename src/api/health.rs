use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::time::Instant;

use crate::controller::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: chrono::DateTime<chrono::Utc>,
    checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    storage: ComponentHealth,
}

/// Health status of a component
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    plants: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ComponentHealth {
    fn healthy(latency_ms: u64, plants: usize) -> Self {
        Self {
            status: "healthy".to_string(),
            latency_ms: Some(latency_ms),
            plants: Some(plants),
            error: None,
        }
    }

    fn unhealthy(error: String) -> Self {
        Self {
            status: "unhealthy".to_string(),
            latency_ms: None,
            plants: None,
            error: Some(error),
        }
    }

    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// GET /health - storage health with latency
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let storage = check_storage(&state).await;
    let healthy = storage.is_healthy();

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        timestamp: chrono::Utc::now(),
        checks: HealthChecks { storage },
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    tracing::debug!(healthy, "Health check completed");
    (status_code, Json(response))
}

async fn check_storage(state: &AppState) -> ComponentHealth {
    let start = Instant::now();
    match state.controller.plant_count().await {
        Ok(plants) => ComponentHealth::healthy(start.elapsed().as_millis() as u64, plants),
        Err(e) => ComponentHealth::unhealthy(e.to_string()),
    }
}

/// GET /health/ready - 200 once the plant store can be listed
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if check_storage(&state).await.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health/live - 200 while the process is running
pub async fn liveness_check() -> impl IntoResponse {
    StatusCode::OK
}
