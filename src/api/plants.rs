//! Company plant handlers: tables, panels, refresh and fault views.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::ApiError;
use crate::{
    controller::{AppState, NewTable},
    domain::Side,
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTableRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub panels_top: usize,
    #[serde(default)]
    pub panels_bottom: usize,
    #[validate(range(exclusive_min = 0.0, max = 1500.0))]
    pub voltage_per_panel: f64,
    #[validate(range(exclusive_min = 0.0, max = 100.0))]
    pub current_per_panel: f64,
}

impl From<CreateTableRequest> for NewTable {
    fn from(req: CreateTableRequest) -> Self {
        Self {
            name: req.name,
            panels_top: req.panels_top,
            panels_bottom: req.panels_bottom,
            voltage_per_panel: req.voltage_per_panel,
            current_per_panel: req.current_per_panel,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddPanelsRequest {
    pub side: Side,
    #[validate(range(min = 1))]
    pub count: usize,
}

pub async fn create_company(
    State(st): State<AppState>,
    Path(company_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let plant = st.controller.create_company(&company_id).await?;
    Ok((StatusCode::CREATED, Json(plant)))
}

pub async fn get_plant(
    State(st): State<AppState>,
    Path(company_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(st.controller.plant(&company_id).await?))
}

pub async fn delete_company(
    State(st): State<AppState>,
    Path(company_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    st.controller.delete_company(&company_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_table(
    State(st): State<AppState>,
    Path(company_id): Path<String>,
    Json(req): Json<CreateTableRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let table = st.controller.create_table(&company_id, req.into()).await?;
    Ok((StatusCode::CREATED, Json(table)))
}

pub async fn delete_table(
    State(st): State<AppState>,
    Path((company_id, table_id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    st.controller.delete_table(&company_id, table_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_panels(
    State(st): State<AppState>,
    Path((company_id, table_id)): Path<(String, Uuid)>,
    Json(req): Json<AddPanelsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let table = st
        .controller
        .add_panels(&company_id, table_id, req.side, req.count)
        .await?;
    Ok(Json(table))
}

pub async fn delete_panel(
    State(st): State<AppState>,
    Path((company_id, table_id, side, index)): Path<(String, Uuid, Side, usize)>,
) -> Result<impl IntoResponse, ApiError> {
    let table = st
        .controller
        .delete_panel(&company_id, table_id, side, index)
        .await?;
    Ok(Json(table))
}

pub async fn refresh(
    State(st): State<AppState>,
    Path(company_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(st.controller.refresh_company(&company_id).await?))
}

pub async fn faults(
    State(st): State<AppState>,
    Path(company_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(st.controller.faults(&company_id).await?))
}

pub async fn summary(
    State(st): State<AppState>,
    Path(company_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(st.controller.summary(&company_id).await?))
}
