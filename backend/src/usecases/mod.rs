pub mod billing_errors;
pub mod payment_intents;
pub mod stripe_gateway;
pub mod stripe_webhook;
