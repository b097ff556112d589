pub mod checkout;
pub mod database;
pub mod memory;
pub mod metrics;
pub mod provider;
pub mod selection;
pub mod store;
pub mod webhook;

pub use checkout::{CheckoutCreated, CheckoutService};
pub use database::PgStore;
pub use memory::InMemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use provider::{PaymentProviderClient, ProviderError, ProviderOrder, ProviderOrderState};
pub use selection::{ItemMarginZones, MarginSaved, SelectionService};
pub use store::CommerceStore;
pub use webhook::{
    PaymentEvent, RefundAction, RefundOutcome, RefundPolicy, RetainCommission, WebhookOutcome,
    WebhookService,
};
