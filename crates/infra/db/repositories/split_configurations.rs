use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::split_entries},
};
use domain::{
    entities::split_entries::SplitEntryEntity,
    repositories::split_configurations::SplitConfigurationRepository,
    value_objects::enums::split_sources::SplitSourceKind,
};

pub struct SplitConfigurationPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SplitConfigurationPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SplitConfigurationRepository for SplitConfigurationPostgres {
    async fn find_entries(
        &self,
        source_kind: SplitSourceKind,
        source_id: Uuid,
    ) -> Result<Vec<SplitEntryEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let entries = split_entries::table
            .filter(split_entries::source_kind.eq(source_kind.as_str()))
            .filter(split_entries::source_id.eq(source_id))
            .order((split_entries::position.asc(), split_entries::created_at.asc()))
            .select(SplitEntryEntity::as_select())
            .load::<SplitEntryEntity>(&mut conn)?;

        Ok(entries)
    }
}
