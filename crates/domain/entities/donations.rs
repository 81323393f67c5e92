use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::donations;

/// A settled donation. Rows are only ever written once the processor reports the charge as
/// succeeded, so `status` is always `succeeded`.
#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = donations)]
pub struct DonationEntity {
    pub id: Uuid,
    pub charge_reference: String,
    pub amount_minor: i64,
    pub charged_amount_minor: i64,
    pub currency: String,
    pub donor_email: String,
    pub donor_name: Option<String>,
    pub organization_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub status: String,
    pub receipt_token: String,
    pub anonymous: bool,
    pub frequency: String,
    pub fee_coverage: String,
    pub metadata: serde_json::Value,
    pub split_share_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = donations)]
pub struct InsertDonationEntity {
    pub charge_reference: String,
    pub amount_minor: i64,
    pub charged_amount_minor: i64,
    pub currency: String,
    pub donor_email: String,
    pub donor_name: Option<String>,
    pub organization_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub status: String,
    pub receipt_token: String,
    pub anonymous: bool,
    pub frequency: String,
    pub fee_coverage: String,
    pub metadata: serde_json::Value,
    pub split_share_count: i32,
}
