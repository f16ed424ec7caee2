pub mod payment_intents;
pub mod stripe_webhook;
