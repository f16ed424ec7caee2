use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, TimeZone, Utc};
use crates::{
    domain::{
        entities::user_subscriptions::InsertUserSubscriptionEntity,
        repositories::{
            payment_transactions::PaymentTransactionRepository,
            user_subscriptions::UserSubscriptionRepository,
        },
        value_objects::enums::{
            billing_intervals::BillingInterval, subscription_statuses::SubscriptionStatus,
        },
    },
    payments::stripe_events::{
        InvoiceObject, PaymentIntentObject, StripeWebhookEvent, SubscriptionObject,
    },
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::usecases::{
    billing_errors::{BillingError, UseCaseResult},
    stripe_gateway::StripeGateway,
};

pub struct StripeWebhookUseCase<T, S, Stripe>
where
    T: PaymentTransactionRepository + Send + Sync + 'static,
    S: UserSubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    transaction_repo: Arc<T>,
    subscription_repo: Arc<S>,
    stripe_client: Arc<Stripe>,
}

impl<T, S, Stripe> StripeWebhookUseCase<T, S, Stripe>
where
    T: PaymentTransactionRepository + Send + Sync + 'static,
    S: UserSubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    pub fn new(transaction_repo: Arc<T>, subscription_repo: Arc<S>, stripe_client: Arc<Stripe>) -> Self {
        Self {
            transaction_repo,
            subscription_repo,
            stripe_client,
        }
    }

    /// Verifies and applies one Stripe webhook delivery.
    ///
    /// Returns `Ok` for unhandled event types. Any error makes the caller
    /// answer non-2xx, which Stripe treats as a request to redeliver.
    pub async fn handle_stripe_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> UseCaseResult<()> {
        let signature = signature.ok_or_else(|| {
            let err = BillingError::SignatureInvalid("missing stripe-signature header".to_string());
            warn!(
                status = err.status_code().as_u16(),
                "stripe_webhook: signature header missing"
            );
            err
        })?;

        let event = self
            .stripe_client
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                let err = BillingError::SignatureInvalid(err.to_string());
                warn!(
                    error = %err,
                    status = err.status_code().as_u16(),
                    "stripe_webhook: verification failed"
                );
                err
            })?;

        let event_id = event.id.clone().unwrap_or_default();
        info!(
            event_id = %event_id,
            event_type = %event.type_,
            "stripe_webhook: processing webhook event"
        );

        let event = StripeWebhookEvent::try_from(event).map_err(|err| {
            let err = BillingError::InvalidWebhook(format!("{err:#}"));
            warn!(
                event_id = %event_id,
                error = %err,
                status = err.status_code().as_u16(),
                "stripe_webhook: event object could not be decoded"
            );
            err
        })?;

        match event {
            StripeWebhookEvent::PaymentIntentSucceeded(intent) => {
                self.handle_payment_intent_succeeded(&intent).await?;
            }
            StripeWebhookEvent::PaymentIntentPaymentFailed(intent) => {
                self.handle_payment_intent_failed(&intent).await?;
            }
            StripeWebhookEvent::InvoicePaymentSucceeded(invoice) => {
                self.handle_invoice_payment_succeeded(&invoice).await?;
            }
            StripeWebhookEvent::CustomerSubscriptionDeleted(subscription) => {
                self.handle_subscription_deleted(&subscription).await?;
            }
            StripeWebhookEvent::Unhandled(event_type) => {
                info!(
                    event_id = %event_id,
                    event_type = %event_type,
                    "stripe_webhook: unhandled event type"
                );
            }
        }

        Ok(())
    }

    async fn handle_payment_intent_succeeded(
        &self,
        intent: &PaymentIntentObject,
    ) -> UseCaseResult<()> {
        let updated = self
            .transaction_repo
            .mark_succeeded_by_payment_intent_id(&intent.id, intent.payment_method.clone())
            .await
            .map_err(|err| {
                error!(
                    payment_intent_id = %intent.id,
                    db_error = ?err,
                    "stripe_webhook: failed to mark transaction succeeded"
                );
                BillingError::upstream("Failed to update transaction", err)
            })?;

        if updated == 0 {
            warn!(
                payment_intent_id = %intent.id,
                "stripe_webhook: no pending transaction matched succeeded intent"
            );
        }

        let user_id = metadata_uuid(intent, "user_id");
        let plan_id = metadata_uuid(intent, "subscription_plan_id");
        let (user_id, plan_id) = match (user_id, plan_id) {
            (Some(user_id), Some(plan_id)) => (user_id, plan_id),
            _ => {
                warn!(
                    payment_intent_id = %intent.id,
                    metadata = ?intent.metadata,
                    "stripe_webhook: intent metadata lacks user or plan; subscription untouched"
                );
                return Ok(());
            }
        };

        let interval = BillingInterval::from_metadata(
            intent.metadata.get("billing_interval").map(String::as_str),
        );
        let starts_at = Utc::now();
        let ends_at = interval.period_end(starts_at).ok_or_else(|| {
            BillingError::upstream(
                "Failed to compute subscription period",
                anyhow!("period end overflows for {starts_at}"),
            )
        })?;

        // Not isolated: two concurrent deliveries can both miss and insert.
        let existing = self
            .subscription_repo
            .find_active_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    db_error = ?err,
                    "stripe_webhook: failed to load active subscription"
                );
                BillingError::upstream("Failed to load subscription", err)
            })?;

        match existing {
            Some(subscription) => {
                self.subscription_repo
                    .refresh_subscription(subscription.id, plan_id, starts_at, ends_at)
                    .await
                    .map_err(|err| {
                        error!(
                            %user_id,
                            %plan_id,
                            subscription_id = %subscription.id,
                            db_error = ?err,
                            "stripe_webhook: failed to refresh subscription"
                        );
                        BillingError::upstream("Failed to update subscription", err)
                    })?;

                info!(
                    %user_id,
                    %plan_id,
                    subscription_id = %subscription.id,
                    period_end = %ends_at,
                    "stripe_webhook: active subscription refreshed"
                );
            }
            None => {
                let subscription_id = self
                    .subscription_repo
                    .insert_subscription(InsertUserSubscriptionEntity {
                        user_id,
                        subscription_plan_id: plan_id,
                        status: SubscriptionStatus::Active.to_string(),
                        current_period_start: starts_at,
                        current_period_end: ends_at,
                    })
                    .await
                    .map_err(|err| {
                        error!(
                            %user_id,
                            %plan_id,
                            db_error = ?err,
                            "stripe_webhook: failed to create subscription"
                        );
                        BillingError::upstream("Failed to create subscription", err)
                    })?;

                info!(
                    %user_id,
                    %plan_id,
                    %subscription_id,
                    period_end = %ends_at,
                    "stripe_webhook: subscription created"
                );
            }
        }

        Ok(())
    }

    async fn handle_payment_intent_failed(&self, intent: &PaymentIntentObject) -> UseCaseResult<()> {
        let updated = self
            .transaction_repo
            .mark_failed_by_payment_intent_id(&intent.id)
            .await
            .map_err(|err| {
                error!(
                    payment_intent_id = %intent.id,
                    db_error = ?err,
                    "stripe_webhook: failed to mark transaction failed"
                );
                BillingError::upstream("Failed to update failed payment", err)
            })?;

        info!(
            payment_intent_id = %intent.id,
            updated,
            "stripe_webhook: payment failure recorded"
        );

        Ok(())
    }

    async fn handle_invoice_payment_succeeded(&self, invoice: &InvoiceObject) -> UseCaseResult<()> {
        let Some(stripe_subscription_id) = invoice.subscription_id() else {
            debug!(
                invoice_id = ?invoice.id,
                "stripe_webhook: invoice has no subscription reference"
            );
            return Ok(());
        };

        let subscription = self
            .subscription_repo
            .find_by_stripe_subscription_id(stripe_subscription_id)
            .await
            .map_err(|err| {
                error!(
                    %stripe_subscription_id,
                    db_error = ?err,
                    "stripe_webhook: failed to load subscription for invoice"
                );
                BillingError::upstream("Failed to load subscription", err)
            })?;

        if subscription.is_none() {
            debug!(
                %stripe_subscription_id,
                "stripe_webhook: no local subscription for invoice"
            );
            return Ok(());
        }

        let Some(period_end) = invoice.first_line_period_end().and_then(ts_to_datetime) else {
            warn!(
                %stripe_subscription_id,
                invoice_id = ?invoice.id,
                "stripe_webhook: invoice carries no line period"
            );
            return Ok(());
        };

        self.subscription_repo
            .extend_period_by_stripe_subscription_id(stripe_subscription_id, period_end)
            .await
            .map_err(|err| {
                error!(
                    %stripe_subscription_id,
                    db_error = ?err,
                    "stripe_webhook: failed to extend subscription period"
                );
                BillingError::upstream("Failed to update subscription", err)
            })?;

        info!(
            %stripe_subscription_id,
            period_end = %period_end,
            "stripe_webhook: subscription period extended"
        );

        Ok(())
    }

    async fn handle_subscription_deleted(
        &self,
        subscription: &SubscriptionObject,
    ) -> UseCaseResult<()> {
        let updated = self
            .subscription_repo
            .cancel_by_stripe_subscription_id(&subscription.id, Utc::now())
            .await
            .map_err(|err| {
                error!(
                    stripe_subscription_id = %subscription.id,
                    db_error = ?err,
                    "stripe_webhook: failed to cancel subscription"
                );
                BillingError::upstream("Failed to cancel subscription", err)
            })?;

        info!(
            stripe_subscription_id = %subscription.id,
            updated,
            "stripe_webhook: subscription cancellation recorded"
        );

        Ok(())
    }
}

fn metadata_uuid(intent: &PaymentIntentObject, key: &str) -> Option<Uuid> {
    intent
        .metadata
        .get(key)
        .and_then(|value| Uuid::parse_str(value).ok())
}

fn ts_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::stripe_gateway::MockStripeGateway;
    use chrono::Duration;
    use crates::{
        domain::{
            entities::user_subscriptions::UserSubscriptionEntity,
            repositories::{
                payment_transactions::MockPaymentTransactionRepository,
                user_subscriptions::MockUserSubscriptionRepository,
            },
        },
        payments::stripe_client::StripeEvent,
    };
    use mockall::predicate::{always, eq};
    use serde_json::json;
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    const SIGNATURE: &str = "t=1,v1=abc";

    fn stripe_event(type_: &str, object: serde_json::Value) -> StripeEvent {
        serde_json::from_value(json!({
            "id": "evt_test",
            "type": type_,
            "data": { "object": object }
        }))
        .unwrap()
    }

    fn gateway_returning(event: StripeEvent) -> MockStripeGateway {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_webhook_signature()
            .with(always(), eq(SIGNATURE))
            .returning(move |_, _| Ok(event.clone()));
        stripe
    }

    fn active_subscription(user_id: Uuid) -> UserSubscriptionEntity {
        let now = Utc::now();
        UserSubscriptionEntity {
            id: Uuid::new_v4(),
            user_id,
            subscription_plan_id: Uuid::new_v4(),
            status: "active".to_string(),
            current_period_start: now - Duration::days(20),
            current_period_end: now + Duration::days(10),
            stripe_subscription_id: None,
            canceled_at: None,
            created_at: now - Duration::days(20),
            updated_at: now - Duration::days(20),
        }
    }

    fn succeeded_event(user_id: Uuid, plan_id: Uuid, interval: &str) -> StripeEvent {
        stripe_event(
            "payment_intent.succeeded",
            json!({
                "id": "pi_123",
                "object": "payment_intent",
                "payment_method": "pm_card_visa",
                "metadata": {
                    "user_id": user_id.to_string(),
                    "subscription_plan_id": plan_id.to_string(),
                    "plan_name": "Premium",
                    "billing_interval": interval,
                }
            }),
        )
    }

    fn usecase(
        transaction_repo: MockPaymentTransactionRepository,
        subscription_repo: MockUserSubscriptionRepository,
        stripe: MockStripeGateway,
    ) -> StripeWebhookUseCase<
        MockPaymentTransactionRepository,
        MockUserSubscriptionRepository,
        MockStripeGateway,
    > {
        StripeWebhookUseCase::new(
            Arc::new(transaction_repo),
            Arc::new(subscription_repo),
            Arc::new(stripe),
        )
    }

    #[tokio::test]
    async fn missing_signature_is_rejected_without_verification() {
        let mut stripe = MockStripeGateway::new();
        stripe.expect_verify_webhook_signature().never();

        let err = usecase(
            MockPaymentTransactionRepository::new(),
            MockUserSubscriptionRepository::new(),
            stripe,
        )
        .handle_stripe_webhook(b"{}", None)
        .await
        .unwrap_err();

        assert!(matches!(err, BillingError::SignatureInvalid(_)));
    }

    #[tokio::test]
    async fn failed_verification_stops_before_dispatch() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_webhook_signature()
            .returning(|_, _| Err(anyhow!("no signatures found matching the expected signature")));

        let mut transaction_repo = MockPaymentTransactionRepository::new();
        transaction_repo.expect_mark_succeeded_by_payment_intent_id().never();
        transaction_repo.expect_mark_failed_by_payment_intent_id().never();
        let mut subscription_repo = MockUserSubscriptionRepository::new();
        subscription_repo.expect_find_active_by_user_id().never();
        subscription_repo.expect_cancel_by_stripe_subscription_id().never();

        let err = usecase(transaction_repo, subscription_repo, stripe)
            .handle_stripe_webhook(b"{\"type\":\"payment_intent.succeeded\"}", Some(SIGNATURE))
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::SignatureInvalid(_)));
        assert!(err.to_string().starts_with("Webhook signature verification failed"));
    }

    #[tokio::test]
    async fn succeeded_payment_marks_transaction_and_creates_monthly_subscription() {
        let user_id = Uuid::new_v4();
        let plan_id = Uuid::new_v4();

        let mut transaction_repo = MockPaymentTransactionRepository::new();
        transaction_repo
            .expect_mark_succeeded_by_payment_intent_id()
            .with(eq("pi_123"), eq(Some("pm_card_visa".to_string())))
            .times(1)
            .returning(|_, _| Ok(1));

        let mut subscription_repo = MockUserSubscriptionRepository::new();
        subscription_repo
            .expect_find_active_by_user_id()
            .with(eq(user_id))
            .times(1)
            .returning(|_| Ok(None));
        subscription_repo.expect_refresh_subscription().never();

        let inserted = Arc::new(Mutex::new(Vec::<InsertUserSubscriptionEntity>::new()));
        let inserted_rows = Arc::clone(&inserted);
        subscription_repo
            .expect_insert_subscription()
            .times(1)
            .returning(move |row| {
                inserted_rows.lock().unwrap().push(row);
                Ok(Uuid::new_v4())
            });

        let before = Utc::now();
        usecase(
            transaction_repo,
            subscription_repo,
            gateway_returning(succeeded_event(user_id, plan_id, "month")),
        )
        .handle_stripe_webhook(b"raw", Some(SIGNATURE))
        .await
        .unwrap();
        let after = Utc::now();

        let inserted = inserted.lock().unwrap();
        assert_eq!(inserted.len(), 1);
        let row = &inserted[0];
        assert_eq!(row.user_id, user_id);
        assert_eq!(row.subscription_plan_id, plan_id);
        assert_eq!(row.status, "active");
        assert!(row.current_period_start >= before && row.current_period_start <= after);
        assert_eq!(
            Some(row.current_period_end),
            BillingInterval::Month.period_end(row.current_period_start)
        );
    }

    #[tokio::test]
    async fn succeeded_payment_refreshes_existing_active_subscription_for_a_year() {
        let user_id = Uuid::new_v4();
        let plan_id = Uuid::new_v4();
        let existing = active_subscription(user_id);
        let existing_id = existing.id;

        let mut transaction_repo = MockPaymentTransactionRepository::new();
        transaction_repo
            .expect_mark_succeeded_by_payment_intent_id()
            .returning(|_, _| Ok(1));

        let mut subscription_repo = MockUserSubscriptionRepository::new();
        subscription_repo
            .expect_find_active_by_user_id()
            .returning(move |_| Ok(Some(existing.clone())));
        subscription_repo.expect_insert_subscription().never();
        subscription_repo
            .expect_refresh_subscription()
            .withf(move |id, plan, starts_at, ends_at| {
                *id == existing_id
                    && *plan == plan_id
                    && Some(*ends_at) == BillingInterval::Year.period_end(*starts_at)
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        usecase(
            transaction_repo,
            subscription_repo,
            gateway_returning(succeeded_event(user_id, plan_id, "year")),
        )
        .handle_stripe_webhook(b"raw", Some(SIGNATURE))
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn replayed_success_event_does_not_create_second_subscription() {
        let user_id = Uuid::new_v4();
        let plan_id = Uuid::new_v4();

        let stored: Arc<Mutex<Option<UserSubscriptionEntity>>> = Arc::new(Mutex::new(None));

        let mut transaction_repo = MockPaymentTransactionRepository::new();
        let mark_calls = Arc::new(AtomicUsize::new(0));
        let mark_counter = Arc::clone(&mark_calls);
        transaction_repo
            .expect_mark_succeeded_by_payment_intent_id()
            .times(2)
            .returning(move |_, _| {
                // Only the first delivery finds the row still pending.
                Ok(if mark_counter.fetch_add(1, Ordering::SeqCst) == 0 { 1 } else { 0 })
            });

        let mut subscription_repo = MockUserSubscriptionRepository::new();
        let lookup = Arc::clone(&stored);
        subscription_repo
            .expect_find_active_by_user_id()
            .times(2)
            .returning(move |_| Ok(lookup.lock().unwrap().clone()));

        let insert_target = Arc::clone(&stored);
        subscription_repo
            .expect_insert_subscription()
            .times(1)
            .returning(move |row| {
                let mut entity = active_subscription(row.user_id);
                entity.subscription_plan_id = row.subscription_plan_id;
                entity.current_period_start = row.current_period_start;
                entity.current_period_end = row.current_period_end;
                let id = entity.id;
                *insert_target.lock().unwrap() = Some(entity);
                Ok(id)
            });
        subscription_repo
            .expect_refresh_subscription()
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let usecase = usecase(
            transaction_repo,
            subscription_repo,
            gateway_returning(succeeded_event(user_id, plan_id, "month")),
        );

        usecase
            .handle_stripe_webhook(b"raw", Some(SIGNATURE))
            .await
            .unwrap();
        usecase
            .handle_stripe_webhook(b"raw", Some(SIGNATURE))
            .await
            .unwrap();

        assert_eq!(mark_calls.load(Ordering::SeqCst), 2);
        assert!(stored.lock().unwrap().is_some());
    }

    #[tokio::test]
    async fn succeeded_payment_without_metadata_only_updates_transaction() {
        let mut transaction_repo = MockPaymentTransactionRepository::new();
        transaction_repo
            .expect_mark_succeeded_by_payment_intent_id()
            .with(eq("pi_bare"), eq(None::<String>))
            .times(1)
            .returning(|_, _| Ok(0));

        let mut subscription_repo = MockUserSubscriptionRepository::new();
        subscription_repo.expect_find_active_by_user_id().never();
        subscription_repo.expect_insert_subscription().never();

        usecase(
            transaction_repo,
            subscription_repo,
            gateway_returning(stripe_event(
                "payment_intent.succeeded",
                json!({ "id": "pi_bare", "payment_method": null, "metadata": {} }),
            )),
        )
        .handle_stripe_webhook(b"raw", Some(SIGNATURE))
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn transaction_update_failure_surfaces_as_error() {
        let mut transaction_repo = MockPaymentTransactionRepository::new();
        transaction_repo
            .expect_mark_succeeded_by_payment_intent_id()
            .returning(|_, _| Err(anyhow!("deadlock detected")));

        let mut subscription_repo = MockUserSubscriptionRepository::new();
        subscription_repo.expect_find_active_by_user_id().never();

        let err = usecase(
            transaction_repo,
            subscription_repo,
            gateway_returning(succeeded_event(Uuid::new_v4(), Uuid::new_v4(), "month")),
        )
        .handle_stripe_webhook(b"raw", Some(SIGNATURE))
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "Failed to update transaction: deadlock detected");
    }

    #[tokio::test]
    async fn success_after_failure_leaves_failed_transaction_untouched() {
        use crates::domain::value_objects::enums::payment_statuses::PaymentStatus;

        let row_status = Arc::new(Mutex::new(PaymentStatus::Pending.to_string()));

        let mut transaction_repo = MockPaymentTransactionRepository::new();
        let failed_row = Arc::clone(&row_status);
        transaction_repo
            .expect_mark_failed_by_payment_intent_id()
            .times(1)
            .returning(move |_| {
                let mut status = failed_row.lock().unwrap();
                if !PaymentStatus::transitionable().contains(&status) {
                    return Ok(0);
                }
                *status = PaymentStatus::Failed.to_string();
                Ok(1)
            });
        let succeeded_row = Arc::clone(&row_status);
        transaction_repo
            .expect_mark_succeeded_by_payment_intent_id()
            .times(1)
            .returning(move |_, _| {
                let mut status = succeeded_row.lock().unwrap();
                if !PaymentStatus::transitionable().contains(&status) {
                    return Ok(0);
                }
                *status = PaymentStatus::Succeeded.to_string();
                Ok(1)
            });

        let failed = stripe_event("payment_intent.payment_failed", json!({ "id": "pi_retry" }));
        let succeeded = stripe_event(
            "payment_intent.succeeded",
            json!({ "id": "pi_retry", "payment_method": "pm_1", "metadata": {} }),
        );
        let deliveries = Arc::new(Mutex::new(vec![succeeded, failed]));
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_webhook_signature()
            .times(2)
            .returning(move |_, _| Ok(deliveries.lock().unwrap().pop().unwrap()));

        let usecase = usecase(
            transaction_repo,
            MockUserSubscriptionRepository::new(),
            stripe,
        );
        usecase
            .handle_stripe_webhook(b"raw", Some(SIGNATURE))
            .await
            .unwrap();
        usecase
            .handle_stripe_webhook(b"raw", Some(SIGNATURE))
            .await
            .unwrap();

        assert_eq!(*row_status.lock().unwrap(), "failed");
    }

    #[tokio::test]
    async fn payment_failed_marks_transaction_failed_even_when_nothing_matches() {
        let mut transaction_repo = MockPaymentTransactionRepository::new();
        transaction_repo
            .expect_mark_failed_by_payment_intent_id()
            .with(eq("pi_unknown"))
            .times(1)
            .returning(|_| Ok(0));

        usecase(
            transaction_repo,
            MockUserSubscriptionRepository::new(),
            gateway_returning(stripe_event(
                "payment_intent.payment_failed",
                json!({ "id": "pi_unknown" }),
            )),
        )
        .handle_stripe_webhook(b"raw", Some(SIGNATURE))
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn invoice_payment_extends_matching_subscription() {
        let period_end = 1_767_225_600;
        let mut existing = active_subscription(Uuid::new_v4());
        existing.stripe_subscription_id = Some("sub_123".to_string());

        let mut subscription_repo = MockUserSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_stripe_subscription_id()
            .with(eq("sub_123"))
            .returning(move |_| Ok(Some(existing.clone())));
        subscription_repo
            .expect_extend_period_by_stripe_subscription_id()
            .with(eq("sub_123"), eq(Utc.timestamp_opt(period_end, 0).unwrap()))
            .times(1)
            .returning(|_, _| Ok(1));

        usecase(
            MockPaymentTransactionRepository::new(),
            subscription_repo,
            gateway_returning(stripe_event(
                "invoice.payment_succeeded",
                json!({
                    "id": "in_1",
                    "subscription": "sub_123",
                    "lines": { "data": [ { "period": { "start": 1_764_547_200, "end": period_end } } ] }
                }),
            )),
        )
        .handle_stripe_webhook(b"raw", Some(SIGNATURE))
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn invoice_without_subscription_or_match_is_skipped() {
        let mut subscription_repo = MockUserSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_stripe_subscription_id()
            .with(eq("sub_unknown"))
            .times(1)
            .returning(|_| Ok(None));
        subscription_repo
            .expect_extend_period_by_stripe_subscription_id()
            .never();

        let usecase_unknown = usecase(
            MockPaymentTransactionRepository::new(),
            subscription_repo,
            gateway_returning(stripe_event(
                "invoice.payment_succeeded",
                json!({
                    "id": "in_2",
                    "subscription": "sub_unknown",
                    "lines": { "data": [ { "period": { "start": 1, "end": 2 } } ] }
                }),
            )),
        );
        usecase_unknown
            .handle_stripe_webhook(b"raw", Some(SIGNATURE))
            .await
            .unwrap();

        let mut untouched = MockUserSubscriptionRepository::new();
        untouched.expect_find_by_stripe_subscription_id().never();
        usecase(
            MockPaymentTransactionRepository::new(),
            untouched,
            gateway_returning(stripe_event(
                "invoice.payment_succeeded",
                json!({ "id": "in_3", "subscription": null }),
            )),
        )
        .handle_stripe_webhook(b"raw", Some(SIGNATURE))
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn subscription_deleted_for_unknown_id_is_acknowledged() {
        let mut subscription_repo = MockUserSubscriptionRepository::new();
        subscription_repo
            .expect_cancel_by_stripe_subscription_id()
            .with(eq("sub_missing"), always())
            .times(1)
            .returning(|_, _| Ok(0));

        usecase(
            MockPaymentTransactionRepository::new(),
            subscription_repo,
            gateway_returning(stripe_event(
                "customer.subscription.deleted",
                json!({ "id": "sub_missing", "object": "subscription" }),
            )),
        )
        .handle_stripe_webhook(b"raw", Some(SIGNATURE))
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn unhandled_event_type_is_acknowledged_without_side_effects() {
        let mut transaction_repo = MockPaymentTransactionRepository::new();
        transaction_repo.expect_mark_succeeded_by_payment_intent_id().never();
        let mut subscription_repo = MockUserSubscriptionRepository::new();
        subscription_repo.expect_find_active_by_user_id().never();

        usecase(
            transaction_repo,
            subscription_repo,
            gateway_returning(stripe_event("charge.refunded", json!({ "id": "ch_1" }))),
        )
        .handle_stripe_webhook(b"raw", Some(SIGNATURE))
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn handled_event_with_malformed_object_is_invalid_webhook() {
        let err = usecase(
            MockPaymentTransactionRepository::new(),
            MockUserSubscriptionRepository::new(),
            gateway_returning(stripe_event(
                "customer.subscription.deleted",
                json!({ "object": "subscription" }),
            )),
        )
        .handle_stripe_webhook(b"raw", Some(SIGNATURE))
        .await
        .unwrap_err();

        assert!(matches!(err, BillingError::InvalidWebhook(_)));
    }
}
