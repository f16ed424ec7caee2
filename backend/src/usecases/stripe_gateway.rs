use anyhow::Result as AnyResult;
use async_trait::async_trait;
use crates::payments::stripe_client::{
    CreatePaymentIntentParams, StripeClient, StripeEvent, StripePaymentIntent,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn create_payment_intent(
        &self,
        params: CreatePaymentIntentParams,
    ) -> AnyResult<StripePaymentIntent>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent>;
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn create_payment_intent(
        &self,
        params: CreatePaymentIntentParams,
    ) -> AnyResult<StripePaymentIntent> {
        StripeClient::create_payment_intent(self, &params).await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent> {
        StripeClient::verify_webhook_signature(self, payload, signature)
    }
}
