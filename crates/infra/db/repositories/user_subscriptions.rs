use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::user_subscriptions},
};
use domain::{
    entities::user_subscriptions::{InsertUserSubscriptionEntity, UserSubscriptionEntity},
    repositories::user_subscriptions::UserSubscriptionRepository,
    value_objects::enums::subscription_statuses::SubscriptionStatus,
};

pub struct UserSubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UserSubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserSubscriptionRepository for UserSubscriptionPostgres {
    async fn find_active_by_user_id(
        &self,
        user_id: Uuid,
    ) -> Result<Option<UserSubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let subscription = user_subscriptions::table
            .filter(user_subscriptions::user_id.eq(user_id))
            .filter(user_subscriptions::status.eq(SubscriptionStatus::Active.to_string()))
            .order(user_subscriptions::created_at.desc())
            .select(UserSubscriptionEntity::as_select())
            .first::<UserSubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(subscription)
    }

    async fn insert_subscription(&self, subscription: InsertUserSubscriptionEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let id = insert_into(user_subscriptions::table)
            .values(&subscription)
            .returning(user_subscriptions::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(id)
    }

    async fn refresh_subscription(
        &self,
        subscription_id: Uuid,
        subscription_plan_id: Uuid,
        current_period_start: DateTime<Utc>,
        current_period_end: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(user_subscriptions::table)
            .filter(user_subscriptions::id.eq(subscription_id))
            .set((
                user_subscriptions::subscription_plan_id.eq(subscription_plan_id),
                user_subscriptions::current_period_start.eq(current_period_start),
                user_subscriptions::current_period_end.eq(current_period_end),
                user_subscriptions::status.eq(SubscriptionStatus::Active.to_string()),
                user_subscriptions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn find_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<UserSubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let subscription = user_subscriptions::table
            .filter(user_subscriptions::stripe_subscription_id.eq(stripe_subscription_id))
            .select(UserSubscriptionEntity::as_select())
            .first::<UserSubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(subscription)
    }

    async fn extend_period_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
        current_period_end: DateTime<Utc>,
    ) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let affected = update(user_subscriptions::table)
            .filter(user_subscriptions::stripe_subscription_id.eq(stripe_subscription_id))
            .set((
                user_subscriptions::current_period_end.eq(current_period_end),
                user_subscriptions::status.eq(SubscriptionStatus::Active.to_string()),
                user_subscriptions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(affected)
    }

    async fn cancel_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
        canceled_at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let affected = update(user_subscriptions::table)
            .filter(user_subscriptions::stripe_subscription_id.eq(stripe_subscription_id))
            .set((
                user_subscriptions::status.eq(SubscriptionStatus::Canceled.to_string()),
                user_subscriptions::canceled_at.eq(Some(canceled_at)),
                user_subscriptions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(affected)
    }
}
