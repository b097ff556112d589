use axum::{extract::State, http::StatusCode, Json};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::checkout::{CheckoutRequest, CheckoutResponse};
use crate::startup::AppState;

pub async fn create_checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), AppError> {
    payload.validate()?;

    tracing::info!(
        affiliate_id = %payload.affiliate_id,
        selection_id = %payload.selection_id,
        lines = payload.lines.len(),
        "Creating checkout"
    );

    let created = state.checkout.create_checkout(&payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse::new(&created.checkout, created.checkout_token)),
    ))
}
