use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::organizations},
};
use domain::{
    entities::organizations::{OrganizationEntity, UpdatePaymentDestinationEntity},
    repositories::organizations::OrganizationRepository,
};

pub struct OrganizationPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl OrganizationPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl OrganizationRepository for OrganizationPostgres {
    async fn find_by_id(&self, organization_id: Uuid) -> Result<Option<OrganizationEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let organization = organizations::table
            .filter(organizations::id.eq(organization_id))
            .select(OrganizationEntity::as_select())
            .first::<OrganizationEntity>(&mut conn)
            .optional()?;

        Ok(organization)
    }

    async fn find_by_ids(&self, organization_ids: Vec<Uuid>) -> Result<Vec<OrganizationEntity>> {
        if organization_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = Arc::clone(&self.db_pool).get()?;

        let found = organizations::table
            .filter(organizations::id.eq_any(organization_ids))
            .select(OrganizationEntity::as_select())
            .load::<OrganizationEntity>(&mut conn)?;

        Ok(found)
    }

    async fn update_payment_destination(
        &self,
        organization_id: Uuid,
        destination: UpdatePaymentDestinationEntity,
    ) -> Result<OrganizationEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(organizations::table.filter(organizations::id.eq(organization_id)))
            .set(&destination)
            .returning(OrganizationEntity::as_returning())
            .get_result::<OrganizationEntity>(&mut conn)?;

        Ok(updated)
    }
}
