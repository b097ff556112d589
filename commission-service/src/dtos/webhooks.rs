use serde::{Deserialize, Serialize};

/// Payment provider webhook body. Amounts are never read from here; the
/// order is re-fetched from the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    pub order_id: String,
    #[serde(default)]
    pub merchant_order_ext_ref: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: String,
}
