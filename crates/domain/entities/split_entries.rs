use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::split_entries;

/// One configured recipient row. Exactly one of the two recipient columns is expected to be set;
/// rows with neither are unresolvable and ignored by split resolution.
#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = split_entries)]
pub struct SplitEntryEntity {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub source_kind: String,
    pub source_id: Uuid,
    pub recipient_organization_id: Option<Uuid>,
    pub recipient_bank_account_id: Option<String>,
    pub percentage_bps: i32,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}
