use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{OptionalExtension, RunQueryDsl, dsl::not, insert_into, prelude::*};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{donations, payout_attempts},
    },
};
use domain::{
    entities::donations::{DonationEntity, InsertDonationEntity},
    repositories::donations::DonationRepository,
    value_objects::{donations::RecordedDonation, enums::donation_statuses::DonationStatus},
};

pub struct DonationPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl DonationPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl DonationRepository for DonationPostgres {
    async fn insert_if_absent(&self, donation: InsertDonationEntity) -> Result<RecordedDonation> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // The unique index on charge_reference decides concurrent writers; the loser gets no row
        // back and reads the winner's.
        let inserted = insert_into(donations::table)
            .values(&donation)
            .on_conflict(donations::charge_reference)
            .do_nothing()
            .returning(DonationEntity::as_returning())
            .get_result::<DonationEntity>(&mut conn)
            .optional()?;

        if let Some(donation) = inserted {
            return Ok(RecordedDonation {
                donation,
                created: true,
            });
        }

        let existing = donations::table
            .filter(donations::charge_reference.eq(&donation.charge_reference))
            .select(DonationEntity::as_select())
            .first::<DonationEntity>(&mut conn)?;

        Ok(RecordedDonation {
            donation: existing,
            created: false,
        })
    }

    async fn find_by_charge_reference(
        &self,
        charge_reference: String,
    ) -> Result<Option<DonationEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let donation = donations::table
            .filter(donations::charge_reference.eq(charge_reference))
            .select(DonationEntity::as_select())
            .first::<DonationEntity>(&mut conn)
            .optional()?;

        Ok(donation)
    }

    async fn list_undistributed_charge_references(
        &self,
        settled_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<String>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let distributed = payout_attempts::table.select(payout_attempts::charge_reference);

        let charge_references = donations::table
            .filter(donations::status.eq(DonationStatus::Succeeded.as_str()))
            .filter(donations::split_share_count.gt(0))
            .filter(donations::updated_at.lt(settled_before))
            .filter(not(donations::charge_reference.eq_any(distributed)))
            .order(donations::created_at.asc())
            .select(donations::charge_reference)
            .limit(limit)
            .load::<String>(&mut conn)?;

        Ok(charge_references)
    }
}
