use crate::{
    auth::{IdentityVerifier, SupabaseJwtVerifier, bearer_token},
    axum_http::cors::{FUNCTION_ALLOW_HEADERS, cors_headers, preflight},
    config::config_model::DotEnvyConfig,
    usecases::{payment_intents::PaymentIntentUseCase, stripe_gateway::StripeGateway},
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
    routing::post,
};
use crates::{
    domain::repositories::{
        payment_transactions::PaymentTransactionRepository, plans::PlanRepository,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{payment_transactions::PaymentTransactionPostgres, plans::PlanPostgres},
    },
    payments::stripe_client::StripeClient,
};
use std::sync::Arc;
use tracing::info;

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    config: Arc<DotEnvyConfig>,
    stripe_client: Arc<StripeClient>,
) -> Router {
    let plan_repository = PlanPostgres::new(Arc::clone(&db_pool));
    let transaction_repository = PaymentTransactionPostgres::new(Arc::clone(&db_pool));
    let identity_verifier = SupabaseJwtVerifier::new(&config.supabase.jwt_secret);

    let usecase = PaymentIntentUseCase::new(
        Arc::new(plan_repository),
        Arc::new(transaction_repository),
        stripe_client,
        Arc::new(identity_verifier),
        config.payments.brand_name.clone(),
    );

    router(Arc::new(usecase))
}

pub fn router<P, T, Stripe, Auth>(usecase: Arc<PaymentIntentUseCase<P, T, Stripe, Auth>>) -> Router
where
    P: PlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
    Auth: IdentityVerifier + Send + Sync + 'static,
{
    Router::new()
        .route(
            "/create-payment-intent",
            post(create_payment_intent::<P, T, Stripe, Auth>).options(options),
        )
        .with_state(usecase)
}

pub async fn create_payment_intent<P, T, Stripe, Auth>(
    State(usecase): State<Arc<PaymentIntentUseCase<P, T, Stripe, Auth>>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
    Auth: IdentityVerifier + Send + Sync + 'static,
{
    info!("payment_intents: create request received");
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(bearer_token);

    let response = match usecase.create_payment_intent(token, &body).await {
        Ok(created) => (StatusCode::OK, Json(created)).into_response(),
        Err(err) => err.into_response(),
    };

    (cors_headers(FUNCTION_ALLOW_HEADERS), response)
}

pub async fn options() -> impl IntoResponse {
    preflight(FUNCTION_ALLOW_HEADERS)
}
