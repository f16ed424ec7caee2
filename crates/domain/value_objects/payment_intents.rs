use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /create-payment-intent`. Fields are optional so a missing
/// plan id is reported by the use case rather than by the JSON decoder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePaymentIntentRequest {
    #[serde(default)]
    pub subscription_plan_id: Option<String>,
    #[serde(default)]
    pub billing_details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatePaymentIntentResponse {
    pub client_secret: String,
    pub payment_intent_id: String,
    pub transaction_id: Uuid,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookAck {
    pub received: bool,
}

impl WebhookAck {
    pub fn received() -> Self {
        Self { received: true }
    }
}
