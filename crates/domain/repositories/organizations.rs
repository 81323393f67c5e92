use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::organizations::{
    OrganizationEntity, UpdatePaymentDestinationEntity,
};

#[async_trait]
#[automock]
pub trait OrganizationRepository {
    async fn find_by_id(&self, organization_id: Uuid) -> Result<Option<OrganizationEntity>>;

    async fn find_by_ids(&self, organization_ids: Vec<Uuid>) -> Result<Vec<OrganizationEntity>>;

    async fn update_payment_destination(
        &self,
        organization_id: Uuid,
        destination: UpdatePaymentDestinationEntity,
    ) -> Result<OrganizationEntity>;
}
