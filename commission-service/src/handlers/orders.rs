use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::orders::{CommissionResponse, RefundResponse};
use crate::startup::AppState;

pub async fn get_commission(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<CommissionResponse>, AppError> {
    let commission = state.webhooks.commission_for_order(order_id).await?;
    Ok(Json(commission.into()))
}

pub async fn refund_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<RefundResponse>, AppError> {
    let outcome = state.webhooks.record_refund(order_id).await?;
    Ok(Json(RefundResponse {
        order_id: outcome.order.order_id,
        status: outcome.order.status,
        commission_action: outcome.action.as_str().to_string(),
    }))
}
