use thiserror::Error;

/// Rejections produced by the pricing engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PricingError {
    /// Malformed or missing prices/rates; nothing was computed.
    #[error("invalid pricing input: {0}")]
    InvalidInput(String),

    /// The composed customer price would breach the buffered public price.
    #[error(
        "margin {requested_rate:.4} exceeds the maximum allowed {max_allowed_rate:.4} \
         (price ceiling {max_allowed_selling_price:.2})"
    )]
    MarginExceedsPublicPrice {
        requested_rate: f64,
        max_allowed_rate: f64,
        max_allowed_selling_price: f64,
    },

    /// No margin above the floor fits under the public price: hide the item.
    #[error("item is not sellable: maximum margin {max_rate:.4} does not exceed floor {min_rate:.4}")]
    NonSellableItem { max_rate: f64, min_rate: f64 },
}

impl PricingError {
    pub fn invalid(message: impl Into<String>) -> Self {
        PricingError::InvalidInput(message.into())
    }
}
