use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::user_subscriptions::{
    InsertUserSubscriptionEntity, UserSubscriptionEntity,
};

#[automock]
#[async_trait]
pub trait UserSubscriptionRepository {
    /// Most recently created active subscription for the user, if any.
    async fn find_active_by_user_id(&self, user_id: Uuid)
    -> Result<Option<UserSubscriptionEntity>>;

    async fn insert_subscription(&self, subscription: InsertUserSubscriptionEntity) -> Result<Uuid>;

    /// Overwrites plan and period of an existing row and marks it active.
    async fn refresh_subscription(
        &self,
        subscription_id: Uuid,
        subscription_plan_id: Uuid,
        current_period_start: DateTime<Utc>,
        current_period_end: DateTime<Utc>,
    ) -> Result<()>;

    async fn find_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<UserSubscriptionEntity>>;

    async fn extend_period_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
        current_period_end: DateTime<Utc>,
    ) -> Result<usize>;

    async fn cancel_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
        canceled_at: DateTime<Utc>,
    ) -> Result<usize>;
}
