use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only record of one consent status transition.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "consent_status_audits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub status_audit_id: String,
    pub consent_id: String,
    pub org_id: String,
    pub current_status: String,
    pub previous_status: Option<String>, // None only for the creation record
    pub action_time: i64,
    pub action_by: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub reason: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
