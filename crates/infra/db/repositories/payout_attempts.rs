use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::payout_attempts},
};
use domain::{
    entities::payout_attempts::{InsertPayoutAttemptEntity, PayoutAttemptEntity},
    repositories::payout_attempts::PayoutAttemptRepository,
    value_objects::enums::payout_statuses::PayoutStatus,
};

pub struct PayoutAttemptPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PayoutAttemptPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PayoutAttemptRepository for PayoutAttemptPostgres {
    async fn find_by_charge_reference(
        &self,
        charge_reference: String,
    ) -> Result<Vec<PayoutAttemptEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let attempts = payout_attempts::table
            .filter(payout_attempts::charge_reference.eq(charge_reference))
            .order(payout_attempts::created_at.asc())
            .select(PayoutAttemptEntity::as_select())
            .load::<PayoutAttemptEntity>(&mut conn)?;

        Ok(attempts)
    }

    async fn insert_if_absent(
        &self,
        attempt: InsertPayoutAttemptEntity,
    ) -> Result<PayoutAttemptEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let inserted = insert_into(payout_attempts::table)
            .values(&attempt)
            .on_conflict((
                payout_attempts::charge_reference,
                payout_attempts::destination,
            ))
            .do_nothing()
            .returning(PayoutAttemptEntity::as_returning())
            .get_result::<PayoutAttemptEntity>(&mut conn)
            .optional()?;

        if let Some(attempt) = inserted {
            return Ok(attempt);
        }

        let existing = payout_attempts::table
            .filter(payout_attempts::charge_reference.eq(&attempt.charge_reference))
            .filter(payout_attempts::destination.eq(&attempt.destination))
            .select(PayoutAttemptEntity::as_select())
            .first::<PayoutAttemptEntity>(&mut conn)?;

        Ok(existing)
    }

    async fn mark_succeeded(
        &self,
        attempt_id: Uuid,
        processor_payout_id: Option<String>,
    ) -> Result<PayoutAttemptEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // A succeeded attempt is final; re-marking it is a read.
        let updated = update(
            payout_attempts::table
                .filter(payout_attempts::id.eq(attempt_id))
                .filter(payout_attempts::status.ne(PayoutStatus::Succeeded.as_str())),
        )
        .set((
            payout_attempts::status.eq(PayoutStatus::Succeeded.as_str()),
            payout_attempts::processor_payout_id.eq(processor_payout_id),
            payout_attempts::error.eq(None::<String>),
            payout_attempts::attempts.eq(payout_attempts::attempts + 1),
            payout_attempts::updated_at.eq(Utc::now()),
        ))
        .returning(PayoutAttemptEntity::as_returning())
        .get_result::<PayoutAttemptEntity>(&mut conn)
        .optional()?;

        match updated {
            Some(attempt) => Ok(attempt),
            None => Ok(payout_attempts::table
                .filter(payout_attempts::id.eq(attempt_id))
                .select(PayoutAttemptEntity::as_select())
                .first::<PayoutAttemptEntity>(&mut conn)?),
        }
    }

    async fn mark_failed(
        &self,
        attempt_id: Uuid,
        error: String,
        rejected: bool,
    ) -> Result<PayoutAttemptEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let generation_bump = if rejected { 1 } else { 0 };

        let updated = update(
            payout_attempts::table
                .filter(payout_attempts::id.eq(attempt_id))
                .filter(payout_attempts::status.ne(PayoutStatus::Succeeded.as_str())),
        )
        .set((
            payout_attempts::status.eq(PayoutStatus::Failed.as_str()),
            payout_attempts::error.eq(Some(error)),
            payout_attempts::attempts.eq(payout_attempts::attempts + 1),
            payout_attempts::key_generation.eq(payout_attempts::key_generation + generation_bump),
            payout_attempts::updated_at.eq(Utc::now()),
        ))
        .returning(PayoutAttemptEntity::as_returning())
        .get_result::<PayoutAttemptEntity>(&mut conn)
        .optional()?;

        match updated {
            Some(attempt) => Ok(attempt),
            None => Ok(payout_attempts::table
                .filter(payout_attempts::id.eq(attempt_id))
                .select(PayoutAttemptEntity::as_select())
                .first::<PayoutAttemptEntity>(&mut conn)?),
        }
    }

    async fn list_redrivable_charge_references(
        &self,
        max_attempts: i32,
        stale_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<String>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let failed = payout_attempts::status.eq(PayoutStatus::Failed.as_str());
        let stale_pending = payout_attempts::status
            .eq(PayoutStatus::Pending.as_str())
            .and(payout_attempts::updated_at.lt(stale_before));

        let charge_references = payout_attempts::table
            .filter(failed.or(stale_pending))
            .filter(payout_attempts::attempts.lt(max_attempts))
            .select(payout_attempts::charge_reference)
            .distinct()
            .limit(limit)
            .load::<String>(&mut conn)?;

        Ok(charge_references)
    }
}
