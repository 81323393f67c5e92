use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::split_entries::SplitEntryEntity,
    value_objects::enums::split_sources::SplitSourceKind,
};

#[async_trait]
#[automock]
pub trait SplitConfigurationRepository {
    /// Entries attached to one source, in configured order.
    async fn find_entries(
        &self,
        source_kind: SplitSourceKind,
        source_id: Uuid,
    ) -> Result<Vec<SplitEntryEntity>>;
}
