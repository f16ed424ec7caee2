use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::payment_transactions},
};
use domain::{
    entities::payment_transactions::{InsertPaymentTransactionEntity, PaymentTransactionEntity},
    repositories::payment_transactions::PaymentTransactionRepository,
    value_objects::enums::payment_statuses::PaymentStatus,
};

pub struct PaymentTransactionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentTransactionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentTransactionRepository for PaymentTransactionPostgres {
    async fn insert_transaction(
        &self,
        transaction: InsertPaymentTransactionEntity,
    ) -> Result<PaymentTransactionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let inserted = insert_into(payment_transactions::table)
            .values(&transaction)
            .returning(PaymentTransactionEntity::as_returning())
            .get_result::<PaymentTransactionEntity>(&mut conn)?;

        Ok(inserted)
    }

    async fn mark_succeeded_by_payment_intent_id(
        &self,
        payment_intent_id: &str,
        payment_method_id: Option<String>,
    ) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let affected = update(payment_transactions::table)
            .filter(payment_transactions::stripe_payment_intent_id.eq(payment_intent_id))
            .filter(payment_transactions::status.eq_any(PaymentStatus::transitionable()))
            .set((
                payment_transactions::status.eq(PaymentStatus::Succeeded.to_string()),
                payment_transactions::stripe_payment_method_id.eq(payment_method_id),
                payment_transactions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(affected)
    }

    async fn mark_failed_by_payment_intent_id(&self, payment_intent_id: &str) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let affected = update(payment_transactions::table)
            .filter(payment_transactions::stripe_payment_intent_id.eq(payment_intent_id))
            .filter(payment_transactions::status.eq_any(PaymentStatus::transitionable()))
            .set((
                payment_transactions::status.eq(PaymentStatus::Failed.to_string()),
                payment_transactions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(affected)
    }
}
