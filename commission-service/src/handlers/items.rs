//! Affiliate margin endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::items::{MarginZonesResponse, SaveMarginRequest, SaveMarginResponse};
use crate::startup::AppState;

pub async fn get_margin_zones(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<MarginZonesResponse>, AppError> {
    let view = state.selection.margin_zones(item_id).await?;
    Ok(Json(view.into()))
}

/// Save an affiliate margin. Rejections carry the maximum allowed margin so
/// the UI can offer it.
pub async fn save_margin(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<SaveMarginRequest>,
) -> Result<Json<SaveMarginResponse>, AppError> {
    let saved = state
        .selection
        .save_margin(item_id, payload.margin_rate)
        .await?;
    Ok(Json(saved.into()))
}
