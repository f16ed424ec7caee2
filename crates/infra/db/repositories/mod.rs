pub mod payment_transactions;
pub mod plans;
pub mod user_subscriptions;
