//! Request and response shapes for the consent API, and the pure assembly
//! of a composite consent response from its stored rows.

use crate::entities;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

fn default_auth_type() -> String {
    "authorization".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequest {
    #[serde(rename = "type", default = "default_auth_type")]
    pub auth_type: String,
    pub status: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub resources: Option<Value>,
    #[serde(default)]
    pub approved_purpose_details: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurposeRequestItem {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub is_user_approved: bool,
    #[serde(default)]
    pub is_mandatory: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentCreateRequest {
    #[serde(rename = "type")]
    pub consent_type: String,
    #[serde(default)]
    pub validity_time: Option<i64>,
    #[serde(default)]
    pub recurring_indicator: Option<bool>,
    #[serde(default)]
    pub frequency: Option<i32>,
    #[serde(default)]
    pub data_access_validity_duration: Option<i64>,
    #[serde(default)]
    pub attributes: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub authorizations: Option<Vec<AuthorizationRequest>>,
    #[serde(default)]
    pub purposes: Option<Vec<PurposeRequestItem>>,
}

/// Partial update. `None` leaves the stored value alone; `Some(vec![])`
/// clears the collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentUpdateRequest {
    #[serde(rename = "type", default)]
    pub consent_type: Option<String>,
    #[serde(default)]
    pub validity_time: Option<i64>,
    #[serde(default)]
    pub recurring_indicator: Option<bool>,
    #[serde(default)]
    pub frequency: Option<i32>,
    #[serde(default)]
    pub data_access_validity_duration: Option<i64>,
    #[serde(default)]
    pub attributes: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub authorizations: Option<Vec<AuthorizationRequest>>,
    #[serde(default)]
    pub purposes: Option<Vec<PurposeRequestItem>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationUpdateRequest {
    #[serde(rename = "type", default)]
    pub auth_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub resources: Option<Value>,
    #[serde(default)]
    pub approved_purpose_details: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeRequest {
    #[serde(default)]
    pub action_by: Option<String>,
    #[serde(default)]
    pub revocation_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeResponse {
    /// Epoch seconds
    pub action_time: i64,
    pub action_by: String,
    pub revocation_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    #[serde(default)]
    pub consent_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consent_information: Option<ConsentResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub auth_type: String,
    pub user_id: Option<String>,
    pub status: String,
    pub updated_time: i64,
    pub resources: Option<Value>,
    pub approved_purpose_details: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurposeItem {
    pub name: String,
    pub value: Option<String>,
    pub is_user_approved: bool,
    pub is_mandatory: bool,
    /// Catalog details, filled in by consent validation only
    #[serde(rename = "type", skip_serializing_if = "Option::is_none", default)]
    pub purpose_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub catalog_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentResponse {
    pub id: String,
    pub client_id: String,
    #[serde(rename = "type")]
    pub consent_type: String,
    pub status: String,
    pub frequency: Option<i32>,
    pub validity_time: Option<i64>,
    pub recurring_indicator: Option<bool>,
    pub data_access_validity_duration: Option<i64>,
    pub created_time: i64,
    pub updated_time: i64,
    pub attributes: BTreeMap<String, String>,
    pub authorizations: Vec<AuthorizationResponse>,
    pub purposes: Vec<PurposeItem>,
}

/// Consent row without its child collections, used for list and search pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentSummary {
    pub id: String,
    pub client_id: String,
    #[serde(rename = "type")]
    pub consent_type: String,
    pub status: String,
    pub frequency: Option<i32>,
    pub validity_time: Option<i64>,
    pub recurring_indicator: Option<bool>,
    pub data_access_validity_duration: Option<i64>,
    pub created_time: i64,
    pub updated_time: i64,
}

impl From<entities::consent::Model> for ConsentSummary {
    fn from(m: entities::consent::Model) -> Self {
        Self {
            id: m.consent_id,
            client_id: m.client_id,
            consent_type: m.consent_type,
            status: m.current_status,
            frequency: m.consent_frequency,
            validity_time: m.validity_time,
            recurring_indicator: m.recurring_indicator,
            data_access_validity_duration: m.data_access_validity_duration,
            created_time: m.created_time,
            updated_time: m.updated_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMetadata {
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub metadata: PageMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeSearchResponse {
    pub consent_ids: Vec<String>,
    pub count: usize,
}

/// Search filters. Lists combine with AND; values inside a list with OR.
#[derive(Debug, Clone, Default)]
pub struct ConsentSearchFilter {
    pub consent_types: Vec<String>,
    pub consent_statuses: Vec<String>,
    pub client_ids: Vec<String>,
    pub user_ids: Vec<String>,
    /// Inclusive lower bound on created time (epoch millis)
    pub from_time: Option<i64>,
    /// Inclusive upper bound on created time (epoch millis)
    pub to_time: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusAuditResponse {
    pub status_audit_id: String,
    pub consent_id: String,
    pub current_status: String,
    pub previous_status: Option<String>,
    pub action_time: i64,
    pub action_by: Option<String>,
    pub reason: Option<String>,
}

impl From<entities::consent_status_audit::Model> for StatusAuditResponse {
    fn from(m: entities::consent_status_audit::Model) -> Self {
        Self {
            status_audit_id: m.status_audit_id,
            consent_id: m.consent_id,
            current_status: m.current_status,
            previous_status: m.previous_status,
            action_time: m.action_time,
            action_by: m.action_by,
            reason: m.reason,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurposeCreateRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub purpose_type: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurposeUpdateRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub purpose_type: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurposeResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub purpose_type: String,
    pub value: Option<String>,
    pub created_time: i64,
    pub updated_time: i64,
}

impl From<entities::consent_purpose::Model> for PurposeResponse {
    fn from(m: entities::consent_purpose::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            description: m.description,
            purpose_type: m.r#type,
            value: m.value,
            created_time: m.created_time,
            updated_time: m.updated_time,
        }
    }
}

/// A purpose mapping joined with the name of the catalog entry it points at.
#[derive(Debug, Clone, PartialEq)]
pub struct PurposeLink {
    pub consent_id: String,
    pub purpose_id: String,
    pub name: String,
    pub value: Option<String>,
    pub is_user_approved: bool,
    pub is_mandatory: bool,
}

impl From<PurposeLink> for PurposeItem {
    fn from(link: PurposeLink) -> Self {
        Self {
            name: link.name,
            value: link.value,
            is_user_approved: link.is_user_approved,
            is_mandatory: link.is_mandatory,
            purpose_type: None,
            description: None,
            catalog_value: None,
        }
    }
}

/// Rehydrate a JSON blob column. Unparseable payloads are dropped rather
/// than failing the whole read.
pub fn parse_payload(raw: Option<&str>) -> Option<Value> {
    let raw = raw?;
    match serde_json::from_str(raw) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unparseable stored payload");
            None
        }
    }
}

impl From<entities::consent_auth_resource::Model> for AuthorizationResponse {
    fn from(m: entities::consent_auth_resource::Model) -> Self {
        Self {
            resources: parse_payload(m.resources.as_deref()),
            approved_purpose_details: parse_payload(m.approved_purpose_details.as_deref()),
            id: m.auth_id,
            auth_type: m.auth_type,
            user_id: m.user_id,
            status: m.auth_status,
            updated_time: m.updated_time,
        }
    }
}

impl ConsentResponse {
    /// Compose one consent response from its row and child collections.
    pub fn assemble(
        consent: entities::consent::Model,
        attributes: BTreeMap<String, String>,
        authorizations: Vec<entities::consent_auth_resource::Model>,
        purposes: Vec<PurposeLink>,
    ) -> Self {
        let summary = ConsentSummary::from(consent);
        Self {
            id: summary.id,
            client_id: summary.client_id,
            consent_type: summary.consent_type,
            status: summary.status,
            frequency: summary.frequency,
            validity_time: summary.validity_time,
            recurring_indicator: summary.recurring_indicator,
            data_access_validity_duration: summary.data_access_validity_duration,
            created_time: summary.created_time,
            updated_time: summary.updated_time,
            attributes,
            authorizations: authorizations.into_iter().map(Into::into).collect(),
            purposes: purposes.into_iter().map(Into::into).collect(),
        }
    }
}
