use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "consent_auth_resources")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub auth_id: String,
    pub consent_id: String,
    pub org_id: String,
    pub auth_type: String,
    pub user_id: Option<String>,
    pub auth_status: String,
    pub updated_time: i64,
    #[sea_orm(column_type = "Text", nullable)]
    pub resources: Option<String>, // JSON-encoded Value
    #[sea_orm(column_type = "Text", nullable)]
    pub approved_purpose_details: Option<String>, // JSON-encoded Value
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
