use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::stripe_client::StripeEvent;

pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const PAYMENT_INTENT_PAYMENT_FAILED: &str = "payment_intent.payment_failed";
pub const INVOICE_PAYMENT_SUCCEEDED: &str = "invoice.payment_succeeded";
pub const CUSTOMER_SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";

/// Webhook events this service reconciles. Every other type lands in `Unhandled`.
#[derive(Debug, Clone, PartialEq)]
pub enum StripeWebhookEvent {
    PaymentIntentSucceeded(PaymentIntentObject),
    PaymentIntentPaymentFailed(PaymentIntentObject),
    InvoicePaymentSucceeded(InvoiceObject),
    CustomerSubscriptionDeleted(SubscriptionObject),
    Unhandled(String),
}

impl TryFrom<StripeEvent> for StripeWebhookEvent {
    type Error = anyhow::Error;

    fn try_from(event: StripeEvent) -> Result<Self> {
        let object = event.data.object;
        let parsed = match event.type_.as_str() {
            PAYMENT_INTENT_SUCCEEDED => StripeWebhookEvent::PaymentIntentSucceeded(
                serde_json::from_value(object).context("invalid payment intent payload")?,
            ),
            PAYMENT_INTENT_PAYMENT_FAILED => StripeWebhookEvent::PaymentIntentPaymentFailed(
                serde_json::from_value(object).context("invalid payment intent payload")?,
            ),
            INVOICE_PAYMENT_SUCCEEDED => StripeWebhookEvent::InvoicePaymentSucceeded(
                serde_json::from_value(object).context("invalid invoice payload")?,
            ),
            CUSTOMER_SUBSCRIPTION_DELETED => StripeWebhookEvent::CustomerSubscriptionDeleted(
                serde_json::from_value(object).context("invalid subscription payload")?,
            ),
            _ => StripeWebhookEvent::Unhandled(event.type_),
        };
        Ok(parsed)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PaymentIntentObject {
    pub id: String,
    #[serde(default, deserialize_with = "expandable_id")]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct InvoiceObject {
    pub id: Option<String>,
    #[serde(default, deserialize_with = "expandable_id")]
    pub subscription: Option<String>,
    #[serde(default)]
    pub parent: Option<InvoiceParent>,
    #[serde(default)]
    pub lines: InvoiceLines,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct InvoiceParent {
    #[serde(default)]
    pub subscription_details: Option<InvoiceSubscriptionDetails>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct InvoiceSubscriptionDetails {
    #[serde(default, deserialize_with = "expandable_id")]
    pub subscription: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct InvoiceLines {
    #[serde(default)]
    pub data: Vec<InvoiceLine>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct InvoiceLine {
    pub period: Option<InvoiceLinePeriod>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct InvoiceLinePeriod {
    pub start: i64,
    pub end: i64,
}

impl InvoiceObject {
    /// Subscription reference, falling back to `parent.subscription_details`
    /// where newer API versions moved it.
    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription.as_deref().or_else(|| {
            self.parent
                .as_ref()
                .and_then(|parent| parent.subscription_details.as_ref())
                .and_then(|details| details.subscription.as_deref())
        })
    }

    /// Unix seconds at which the first line item's period ends.
    pub fn first_line_period_end(&self) -> Option<i64> {
        self.lines
            .data
            .first()
            .and_then(|line| line.period)
            .map(|period| period.end)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SubscriptionObject {
    pub id: String,
}

/// Stripe sends either a bare id or the expanded object carrying an `id`.
fn expandable_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(id)) => Some(id),
        Some(serde_json::Value::Object(map)) => map
            .get("id")
            .and_then(|id| id.as_str())
            .map(|id| id.to_string()),
        _ => None,
    })
}
