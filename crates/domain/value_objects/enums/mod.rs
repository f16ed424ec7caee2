pub mod billing_intervals;
pub mod payment_statuses;
pub mod subscription_statuses;
