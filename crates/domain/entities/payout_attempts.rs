use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::payout_attempts;

/// One recipient's share of one settled split charge; unique per (charge_reference, destination).
#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payout_attempts)]
pub struct PayoutAttemptEntity {
    pub id: Uuid,
    pub charge_reference: String,
    pub split_entry_id: Uuid,
    pub recipient_kind: String,
    pub destination: String,
    pub amount_minor: i64,
    pub currency: String,
    pub status: String,
    pub processor_payout_id: Option<String>,
    pub error: Option<String>,
    pub attempts: i32,
    /// Bumped each time the processor definitively rejects a submission, so the next
    /// submission carries a fresh idempotency key. Timeouts keep the current key.
    pub key_generation: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PayoutAttemptEntity {
    pub fn idempotency_key(&self) -> String {
        format!(
            "payout-{}-{}-g{}",
            self.charge_reference, self.destination, self.key_generation
        )
    }
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = payout_attempts)]
pub struct InsertPayoutAttemptEntity {
    pub charge_reference: String,
    pub split_entry_id: Uuid,
    pub recipient_kind: String,
    pub destination: String,
    pub amount_minor: i64,
    pub currency: String,
    pub status: String,
}
