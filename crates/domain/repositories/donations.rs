use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;

use crate::domain::{
    entities::donations::InsertDonationEntity,
    entities::donations::DonationEntity,
    value_objects::donations::RecordedDonation,
};

#[async_trait]
#[automock]
pub trait DonationRepository {
    /// Inserts the donation unless one already exists for its charge reference, in which case
    /// the existing row is returned with `created == false`.
    async fn insert_if_absent(&self, donation: InsertDonationEntity) -> Result<RecordedDonation>;

    async fn find_by_charge_reference(
        &self,
        charge_reference: String,
    ) -> Result<Option<DonationEntity>>;

    /// Split donations recorded before `settled_before` that have no payout attempt at all,
    /// oldest first.
    async fn list_undistributed_charge_references(
        &self,
        settled_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<String>>;
}
