//! Payment provider webhook endpoint.
//!
//! Non-2xx responses make the provider redeliver, so anything that may
//! have been charged without a recorded commission must fail loudly here.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use service_core::error::AppError;

use crate::dtos::webhooks::{WebhookAck, WebhookEnvelope};
use crate::services::provider::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::startup::AppState;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    state.webhooks.verify_signature(
        &body,
        header(&headers, SIGNATURE_HEADER),
        header(&headers, TIMESTAMP_HEADER),
    )?;

    let envelope: WebhookEnvelope = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "Malformed webhook payload");
        AppError::BadRequest(anyhow::anyhow!("Malformed webhook payload: {}", e))
    })?;

    let outcome = state.webhooks.handle(&envelope).await?;

    Ok(Json(WebhookAck {
        received: true,
        outcome: outcome.label().to_string(),
    }))
}
