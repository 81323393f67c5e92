use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::payout_attempts::{InsertPayoutAttemptEntity, PayoutAttemptEntity};

#[async_trait]
#[automock]
pub trait PayoutAttemptRepository {
    async fn find_by_charge_reference(
        &self,
        charge_reference: String,
    ) -> Result<Vec<PayoutAttemptEntity>>;

    /// Returns the attempt for (charge_reference, destination), creating it if absent.
    async fn insert_if_absent(
        &self,
        attempt: InsertPayoutAttemptEntity,
    ) -> Result<PayoutAttemptEntity>;

    async fn mark_succeeded(
        &self,
        attempt_id: Uuid,
        processor_payout_id: Option<String>,
    ) -> Result<PayoutAttemptEntity>;

    /// Records a failed submission. `rejected` bumps the key generation so the next
    /// submission is not answered from the processor's idempotency cache.
    async fn mark_failed(
        &self,
        attempt_id: Uuid,
        error: String,
        rejected: bool,
    ) -> Result<PayoutAttemptEntity>;

    /// Charges that still have failed attempts, or pending ones untouched since `stale_before`.
    async fn list_redrivable_charge_references(
        &self,
        max_attempts: i32,
        stale_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<String>>;
}
