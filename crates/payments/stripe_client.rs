use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use sha2::Sha256;
use tracing::error;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Stripe's recommended replay window for webhook timestamps.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;
const WEBHOOK_FUTURE_SKEW_SECS: i64 = 60;

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
    webhook_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub api_version: Option<String>,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StripePaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub status: Option<String>,
}

/// Parameters for `POST /v1/payment_intents`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePaymentIntentParams {
    pub amount_minor: i64,
    pub currency: String,
    pub description: String,
    pub metadata: HashMap<String, String>,
    pub receipt_email: Option<String>,
}

impl CreatePaymentIntentParams {
    fn form_body(&self) -> Vec<(String, String)> {
        let mut body: Vec<(String, String)> = vec![
            ("amount".to_string(), self.amount_minor.to_string()),
            ("currency".to_string(), self.currency.clone()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
            ("description".to_string(), self.description.clone()),
        ];

        if let Some(email) = self.receipt_email.as_ref() {
            body.push(("receipt_email".to_string(), email.clone()));
        }

        let mut metadata: Vec<_> = self.metadata.iter().collect();
        metadata.sort();
        for (key, value) in metadata {
            body.push((format!("metadata[{}]", key), value.clone()));
        }

        body
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
    decline_code: Option<String>,
}

impl StripeClient {
    pub fn new(api_base: String, secret_key: String, webhook_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
            webhook_secret,
        }
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            stripe_decline_code = ?details.as_ref().and_then(|d| d.decline_code.as_deref()),
            response_body = %body,
            context = %context,
            "stripe api request failed"
        );

        match details.and_then(|d| d.message) {
            Some(message) => anyhow::bail!(message),
            None => anyhow::bail!(
                "Stripe API request failed: {} (status {}, request_id={:?})",
                context,
                status,
                request_id
            ),
        }
    }

    /// Creates a PaymentIntent with automatic payment methods enabled.
    pub async fn create_payment_intent(
        &self,
        params: &CreatePaymentIntentParams,
    ) -> Result<StripePaymentIntent> {
        // https://stripe.com/docs/api/payment_intents/create
        let resp = self
            .http
            .post(format!("{}/v1/payment_intents", self.api_base))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&params.form_body())
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create payment intent").await?;

        let intent: StripePaymentIntent = resp.json().await?;
        Ok(intent)
    }

    /// Verifies the webhook signature. https://stripe.com/docs/webhooks/signatures
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent> {
        verify_signature_at(
            &self.webhook_secret,
            payload,
            signature_header,
            Utc::now().timestamp(),
        )?;

        let event: StripeEvent =
            serde_json::from_slice(payload).context("webhook payload is not a stripe event")?;
        Ok(event)
    }
}

/// Hex-encoded `v1` signature of `payload` signed at `timestamp`.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn verify_signature_at(
    secret: &str,
    payload: &[u8],
    signature_header: &str,
    now: i64,
) -> Result<()> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("t=") {
            timestamp = Some(rest);
        } else if let Some(rest) = part.strip_prefix("v1=") {
            signatures.push(rest);
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| anyhow::anyhow!("missing timestamp in stripe-signature"))?
        .parse::<i64>()
        .context("invalid timestamp in stripe-signature")?;
    if signatures.is_empty() {
        anyhow::bail!("missing v1 in stripe-signature");
    }

    let age = now - timestamp;
    if age > WEBHOOK_TOLERANCE_SECS {
        anyhow::bail!("timestamp outside the tolerance zone ({age}s old)");
    }
    if age < -WEBHOOK_FUTURE_SKEW_SECS {
        anyhow::bail!("timestamp is in the future ({}s ahead)", -age);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = signatures
        .iter()
        .filter_map(|candidate| hex::decode(candidate).ok())
        .any(|provided| mac.clone().verify_slice(&provided).is_ok());

    if !matched {
        anyhow::bail!("no signatures found matching the expected signature for payload");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const PAYLOAD: &[u8] = br#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_1"}}}"#;

    fn header(secret: &str, timestamp: i64, payload: &[u8]) -> String {
        format!(
            "t={},v1={}",
            timestamp,
            compute_signature(secret, timestamp, payload).unwrap()
        )
    }

    fn client() -> StripeClient {
        StripeClient::new(
            DEFAULT_STRIPE_API_BASE.to_string(),
            "sk_test".to_string(),
            SECRET.to_string(),
        )
    }

    #[test]
    fn accepts_valid_signature_and_decodes_event() {
        let now = Utc::now().timestamp();
        let event = client()
            .verify_webhook_signature(PAYLOAD, &header(SECRET, now, PAYLOAD))
            .expect("signature should verify");
        assert_eq!(event.type_, "payment_intent.succeeded");
        assert_eq!(event.data.object["id"], "pi_1");
    }

    #[test]
    fn rejects_tampered_body() {
        let now = Utc::now().timestamp();
        let signature = header(SECRET, now, PAYLOAD);
        let tampered = br#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_2"}}}"#;
        assert!(client().verify_webhook_signature(tampered, &signature).is_err());
    }

    #[test]
    fn rejects_wrong_secret() {
        let now = Utc::now().timestamp();
        let signature = header("whsec_other", now, PAYLOAD);
        assert!(client().verify_webhook_signature(PAYLOAD, &signature).is_err());
    }

    #[test]
    fn rejects_malformed_headers() {
        let c = client();
        assert!(c.verify_webhook_signature(PAYLOAD, "").is_err());
        assert!(c.verify_webhook_signature(PAYLOAD, "v1=deadbeef").is_err());
        assert!(c.verify_webhook_signature(PAYLOAD, "t=123").is_err());
        assert!(c.verify_webhook_signature(PAYLOAD, "t=abc,v1=deadbeef").is_err());
    }

    #[test]
    fn rejects_stale_and_future_timestamps() {
        let now = 1_700_000_000;
        let stale = now - WEBHOOK_TOLERANCE_SECS - 1;
        assert!(verify_signature_at(SECRET, PAYLOAD, &header(SECRET, stale, PAYLOAD), now).is_err());

        let future = now + 120;
        assert!(
            verify_signature_at(SECRET, PAYLOAD, &header(SECRET, future, PAYLOAD), now).is_err()
        );

        let recent = now - 30;
        assert!(verify_signature_at(SECRET, PAYLOAD, &header(SECRET, recent, PAYLOAD), now).is_ok());
    }

    #[test]
    fn accepts_any_matching_v1_entry() {
        let now = 1_700_000_000;
        let valid = compute_signature(SECRET, now, PAYLOAD).unwrap();
        let rotated = format!("t={now},v1={},v1={valid},v0=ignored", "0".repeat(64));
        assert!(verify_signature_at(SECRET, PAYLOAD, &rotated, now).is_ok());
    }

    #[test]
    fn form_body_carries_intent_fields() {
        let params = CreatePaymentIntentParams {
            amount_minor: 999,
            currency: "usd".to_string(),
            description: "Brand - Pro Subscription".to_string(),
            metadata: HashMap::from([
                ("user_id".to_string(), "u1".to_string()),
                ("plan_name".to_string(), "Pro".to_string()),
            ]),
            receipt_email: Some("a@example.com".to_string()),
        };

        let body = params.form_body();
        let get = |key: &str| {
            body.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("amount"), Some("999"));
        assert_eq!(get("currency"), Some("usd"));
        assert_eq!(get("automatic_payment_methods[enabled]"), Some("true"));
        assert_eq!(get("receipt_email"), Some("a@example.com"));
        assert_eq!(get("metadata[user_id]"), Some("u1"));
        assert_eq!(get("metadata[plan_name]"), Some("Pro"));
    }
}
