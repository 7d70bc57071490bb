use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use super::{health, plants, ApiError};
use crate::{
    controller::AppState,
    domain::{series::lenient, SeriesRecord},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::liveness_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/simulate", post(simulate))
        .route(
            "/companies/:company_id",
            get(plants::get_plant)
                .post(plants::create_company)
                .delete(plants::delete_company),
        )
        .route("/companies/:company_id/tables", post(plants::create_table))
        .route(
            "/companies/:company_id/tables/:table_id",
            delete(plants::delete_table),
        )
        .route(
            "/companies/:company_id/tables/:table_id/panels",
            post(plants::add_panels),
        )
        .route(
            "/companies/:company_id/tables/:table_id/panels/:side/:index",
            delete(plants::delete_panel),
        )
        .route("/companies/:company_id/refresh", post(plants::refresh))
        .route("/companies/:company_id/faults", get(plants::faults))
        .route("/companies/:company_id/summary", get(plants::summary))
        .with_state(state)
}

pub async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

/// One simulation cycle for a string the caller holds
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SimulateRequest {
    pub panel_count: usize,
    #[validate(range(exclusive_min = 0.0, max = 1500.0))]
    pub voltage_per_panel: f64,
    #[validate(range(exclusive_min = 0.0, max = 100.0))]
    pub current_per_panel: f64,
    /// Previous cycle's record; absent for a new string
    #[serde(default, deserialize_with = "lenient::optional_record")]
    pub prior: Option<SeriesRecord>,
}

pub async fn simulate(
    State(st): State<AppState>,
    Json(req): Json<SimulateRequest>,
) -> Result<Json<SeriesRecord>, ApiError> {
    req.validate()?;
    let state = st.controller.simulate_string(
        req.panel_count,
        req.voltage_per_panel,
        req.current_per_panel,
        req.prior.as_ref(),
    )?;
    Ok(Json(SeriesRecord::from(state)))
}
