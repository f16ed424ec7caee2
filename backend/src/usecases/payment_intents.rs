use std::{collections::HashMap, sync::Arc};

use anyhow::anyhow;
use crates::{
    domain::{
        entities::payment_transactions::InsertPaymentTransactionEntity,
        repositories::{
            payment_transactions::PaymentTransactionRepository, plans::PlanRepository,
        },
        value_objects::{
            enums::payment_statuses::PaymentStatus,
            payment_intents::{CreatePaymentIntentRequest, CreatePaymentIntentResponse},
        },
    },
    payments::stripe_client::CreatePaymentIntentParams,
};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    auth::IdentityVerifier,
    usecases::{
        billing_errors::{BillingError, UseCaseResult},
        stripe_gateway::StripeGateway,
    },
};

pub struct PaymentIntentUseCase<P, T, Stripe, Auth>
where
    P: PlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
    Auth: IdentityVerifier + Send + Sync + 'static,
{
    plan_repo: Arc<P>,
    transaction_repo: Arc<T>,
    stripe_client: Arc<Stripe>,
    identity_verifier: Arc<Auth>,
    brand_name: String,
}

impl<P, T, Stripe, Auth> PaymentIntentUseCase<P, T, Stripe, Auth>
where
    P: PlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
    Auth: IdentityVerifier + Send + Sync + 'static,
{
    pub fn new(
        plan_repo: Arc<P>,
        transaction_repo: Arc<T>,
        stripe_client: Arc<Stripe>,
        identity_verifier: Arc<Auth>,
        brand_name: String,
    ) -> Self {
        Self {
            plan_repo,
            transaction_repo,
            stripe_client,
            identity_verifier,
            brand_name,
        }
    }

    /// Creates a Stripe payment intent for an active plan and records a
    /// pending transaction for it.
    ///
    /// `token` is the caller's bearer token and `body` the raw JSON request
    /// body. Checks run in a fixed order: token presence, body shape, plan id
    /// presence, token validity, plan lookup.
    pub async fn create_payment_intent(
        &self,
        token: Option<&str>,
        body: &[u8],
    ) -> UseCaseResult<CreatePaymentIntentResponse> {
        let token = token.ok_or_else(|| {
            let err = BillingError::Unauthenticated("Missing Authorization header".to_string());
            warn!(
                status = err.status_code().as_u16(),
                "payment_intents: missing authorization header"
            );
            err
        })?;

        let request: CreatePaymentIntentRequest = serde_json::from_slice(body).map_err(|err| {
            warn!(
                error = %err,
                "payment_intents: request body is not valid json"
            );
            BillingError::InvalidInput(format!("Invalid request body: {err}"))
        })?;

        let raw_plan_id = request
            .subscription_plan_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                BillingError::InvalidInput("Subscription plan ID is required".to_string())
            })?;

        let identity = self.identity_verifier.verify(token).await.map_err(|err| {
            warn!(
                error = %err,
                "payment_intents: caller token rejected"
            );
            BillingError::Unauthenticated("User not authenticated".to_string())
        })?;
        let user_id = identity.user_id;

        info!(
            %user_id,
            subscription_plan_id = %raw_plan_id,
            has_billing_details = request.billing_details.is_some(),
            "payment_intents: create payment intent requested"
        );

        let plan_id = Uuid::parse_str(raw_plan_id).map_err(|_| {
            warn!(
                %user_id,
                subscription_plan_id = %raw_plan_id,
                "payment_intents: plan id is not a uuid"
            );
            BillingError::InvalidPlan
        })?;

        let plan = self
            .plan_repo
            .find_active_plan_by_id(plan_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %plan_id,
                    db_error = ?err,
                    "payment_intents: failed to load plan"
                );
                BillingError::InvalidPlan
            })?
            .ok_or_else(|| {
                warn!(
                    %user_id,
                    %plan_id,
                    "payment_intents: plan missing or inactive"
                );
                BillingError::InvalidPlan
            })?;

        let amount_minor = plan.price_minor().ok_or_else(|| {
            BillingError::upstream(
                "Invalid plan price",
                anyhow!("price {} does not fit in minor units", plan.price),
            )
        })?;

        let params = CreatePaymentIntentParams {
            amount_minor,
            currency: plan.currency.to_lowercase(),
            description: format!("{} - {} Subscription", self.brand_name, plan.name),
            metadata: HashMap::from([
                ("user_id".to_string(), user_id.to_string()),
                ("subscription_plan_id".to_string(), plan.id.to_string()),
                ("plan_name".to_string(), plan.name.clone()),
                ("billing_interval".to_string(), plan.billing_interval.clone()),
            ]),
            receipt_email: identity.email.clone(),
        };

        let intent = self
            .stripe_client
            .create_payment_intent(params)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %plan_id,
                    amount_minor,
                    error = ?err,
                    "payment_intents: stripe payment intent creation failed"
                );
                BillingError::upstream("Error creating payment intent", err)
            })?;

        let client_secret = intent.client_secret.clone().ok_or_else(|| {
            error!(
                %user_id,
                payment_intent_id = %intent.id,
                "payment_intents: stripe returned no client secret"
            );
            BillingError::upstream(
                "Error creating payment intent",
                anyhow!("client secret missing on payment intent {}", intent.id),
            )
        })?;

        let transaction = self
            .transaction_repo
            .insert_transaction(InsertPaymentTransactionEntity {
                user_id,
                stripe_payment_intent_id: intent.id.clone(),
                amount: plan.price,
                currency: plan.currency.clone(),
                status: PaymentStatus::Pending.to_string(),
                description: Some(format!("Payment for {} subscription", plan.name)),
                metadata: json!({
                    "subscription_plan_id": plan.id,
                    "billing_interval": plan.billing_interval,
                }),
            })
            .await
            .map_err(|err| {
                // The intent already exists at Stripe and is left unreferenced.
                error!(
                    %user_id,
                    %plan_id,
                    payment_intent_id = %intent.id,
                    db_error = ?err,
                    "payment_intents: failed to record transaction; stripe intent orphaned"
                );
                BillingError::upstream("Error creating transaction record", err)
            })?;

        info!(
            %user_id,
            %plan_id,
            payment_intent_id = %intent.id,
            transaction_id = %transaction.id,
            "payment_intents: payment intent created"
        );

        Ok(CreatePaymentIntentResponse {
            client_secret,
            payment_intent_id: intent.id,
            transaction_id: transaction.id,
            amount: plan.price,
            currency: plan.currency,
            description: plan.description,
        })
    }
}
