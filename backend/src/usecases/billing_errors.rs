use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("Invalid subscription plan")]
    InvalidPlan,
    #[error("Webhook signature verification failed: {0}")]
    SignatureInvalid(String),
    #[error("Invalid webhook payload: {0}")]
    InvalidWebhook(String),
    #[error("{context}: {cause:#}")]
    UpstreamFailure {
        context: String,
        cause: anyhow::Error,
    },
}

impl BillingError {
    pub fn upstream(context: impl Into<String>, cause: anyhow::Error) -> Self {
        BillingError::UpstreamFailure {
            context: context.into(),
            cause,
        }
    }

    /// Every failure is a 400; for webhooks any non-2xx makes Stripe redeliver.
    pub fn status_code(&self) -> StatusCode {
        match self {
            BillingError::Unauthenticated(_)
            | BillingError::InvalidInput(_)
            | BillingError::InvalidPlan
            | BillingError::SignatureInvalid(_)
            | BillingError::InvalidWebhook(_)
            | BillingError::UpstreamFailure { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, BillingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_message_includes_context_and_cause() {
        let err = BillingError::upstream(
            "Error creating transaction record",
            anyhow::anyhow!("duplicate key value"),
        );
        assert_eq!(
            err.to_string(),
            "Error creating transaction record: duplicate key value"
        );
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn signature_message_is_prefixed() {
        let err = BillingError::SignatureInvalid("missing stripe-signature header".to_string());
        assert_eq!(
            err.to_string(),
            "Webhook signature verification failed: missing stripe-signature header"
        );
    }
}
