use anyhow::{Context, Result};
use crates::payments::stripe_client::DEFAULT_STRIPE_API_BASE;

use super::{
    config_model::{BackendServer, Database, DotEnvyConfig, Payments, Stripe, Supabase},
    stage::Stage,
};

const DEFAULT_POOL_SIZE: u32 = 10;
const DEFAULT_BRAND_NAME: &str = "Joyce's Ink";

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?
            .parse()
            .context("SERVER_PORT_BACKEND is invalid")?,
        body_limit: required("SERVER_BODY_LIMIT")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: required("SERVER_TIMEOUT")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        pool_size: match optional("DATABASE_POOL_SIZE") {
            Some(raw) => raw.parse().context("DATABASE_POOL_SIZE is invalid")?,
            None => DEFAULT_POOL_SIZE,
        },
    };

    let supabase = Supabase {
        jwt_secret: required("SUPABASE_JWT_SECRET")?,
    };

    let stripe = Stripe {
        api_base: optional("STRIPE_API_BASE")
            .unwrap_or_else(|| DEFAULT_STRIPE_API_BASE.to_string()),
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
    };

    let payments = Payments {
        brand_name: optional("PAYMENT_BRAND_NAME")
            .unwrap_or_else(|| DEFAULT_BRAND_NAME.to_string()),
    };

    Ok(DotEnvyConfig {
        stage: get_stage(),
        backend_server,
        database,
        supabase,
        stripe,
        payments,
    })
}

pub fn get_stage() -> Stage {
    let stage_str = std::env::var("STAGE").unwrap_or_default();
    Stage::try_from(stage_str.as_str()).unwrap_or_default()
}

fn required(key: &str) -> Result<String> {
    optional(key).with_context(|| format!("{key} is invalid"))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
