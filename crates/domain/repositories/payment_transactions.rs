use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::payment_transactions::{
    InsertPaymentTransactionEntity, PaymentTransactionEntity,
};

#[automock]
#[async_trait]
pub trait PaymentTransactionRepository {
    async fn insert_transaction(
        &self,
        transaction: InsertPaymentTransactionEntity,
    ) -> Result<PaymentTransactionEntity>;

    /// Moves pending rows for the intent to `succeeded`. Returns affected rows.
    async fn mark_succeeded_by_payment_intent_id(
        &self,
        payment_intent_id: &str,
        payment_method_id: Option<String>,
    ) -> Result<usize>;

    /// Moves pending rows for the intent to `failed`. Returns affected rows.
    async fn mark_failed_by_payment_intent_id(&self, payment_intent_id: &str) -> Result<usize>;
}
