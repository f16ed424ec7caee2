pub mod enums;
pub mod payment_intents;
