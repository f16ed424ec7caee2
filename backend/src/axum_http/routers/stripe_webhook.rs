use crate::{
    axum_http::cors::{WEBHOOK_ALLOW_HEADERS, cors_headers, preflight},
    usecases::{stripe_gateway::StripeGateway, stripe_webhook::StripeWebhookUseCase},
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use crates::{
    domain::{
        repositories::{
            payment_transactions::PaymentTransactionRepository,
            user_subscriptions::UserSubscriptionRepository,
        },
        value_objects::payment_intents::WebhookAck,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            payment_transactions::PaymentTransactionPostgres,
            user_subscriptions::UserSubscriptionPostgres,
        },
    },
    payments::stripe_client::StripeClient,
};
use std::sync::Arc;

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes(db_pool: Arc<PgPoolSquad>, stripe_client: Arc<StripeClient>) -> Router {
    let transaction_repository = PaymentTransactionPostgres::new(Arc::clone(&db_pool));
    let subscription_repository = UserSubscriptionPostgres::new(Arc::clone(&db_pool));

    let usecase = StripeWebhookUseCase::new(
        Arc::new(transaction_repository),
        Arc::new(subscription_repository),
        stripe_client,
    );

    router(Arc::new(usecase))
}

pub fn router<T, S, Stripe>(usecase: Arc<StripeWebhookUseCase<T, S, Stripe>>) -> Router
where
    T: PaymentTransactionRepository + Send + Sync + 'static,
    S: UserSubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    Router::new()
        .route(
            "/stripe-webhook",
            post(stripe_webhook::<T, S, Stripe>).options(options),
        )
        .with_state(usecase)
}

/// The body is taken as raw bytes: the signature covers them exactly.
pub async fn stripe_webhook<T, S, Stripe>(
    State(usecase): State<Arc<StripeWebhookUseCase<T, S, Stripe>>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse
where
    T: PaymentTransactionRepository + Send + Sync + 'static,
    S: UserSubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let response = match usecase.handle_stripe_webhook(&body, signature).await {
        Ok(()) => (StatusCode::OK, Json(WebhookAck::received())).into_response(),
        Err(err) => err.into_response(),
    };

    (cors_headers(WEBHOOK_ALLOW_HEADERS), response)
}

pub async fn options() -> impl IntoResponse {
    preflight(WEBHOOK_ALLOW_HEADERS)
}
