use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "consents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub consent_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub org_id: String,
    pub client_id: String,
    pub consent_type: String,
    pub current_status: String,
    pub consent_frequency: Option<i32>,
    pub validity_time: Option<i64>, // epoch seconds or millis, see service::validity_deadline_millis
    pub recurring_indicator: Option<bool>,
    pub data_access_validity_duration: Option<i64>,
    pub created_time: i64,
    pub updated_time: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
