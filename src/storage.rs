//! Data access for consents and their child tables.
//!
//! Every function takes any SeaORM connection, so the same calls run against
//! the pool for reads and against an open transaction for multi-step writes.
//! All lookups are scoped by organization.

use crate::entities;
use crate::errors::AssentError;
use crate::models::{AuthorizationRequest, ConsentSearchFilter, PurposeLink, PurposeRequestItem};
use crate::settings::Database as DbCfg;
use chrono::Utc;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, SqlErr,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

pub async fn init(cfg: &DbCfg) -> Result<DatabaseConnection, AssentError> {
    let db = Database::connect(&cfg.url).await?;
    Ok(db)
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn to_json_column(value: Option<&Value>) -> Result<Option<String>, AssentError> {
    value.map(serde_json::to_string).transpose().map_err(Into::into)
}

// ============================================================================
// Consents
// ============================================================================

pub async fn insert_consent<C: ConnectionTrait>(
    db: &C,
    consent: entities::consent::Model,
) -> Result<(), AssentError> {
    use entities::consent::Entity;

    Entity::insert(consent.into_active_model())
        .exec_without_returning(db)
        .await?;
    Ok(())
}

pub async fn get_consent<C: ConnectionTrait>(
    db: &C,
    consent_id: &str,
    org_id: &str,
) -> Result<Option<entities::consent::Model>, AssentError> {
    use entities::consent::{Column, Entity};

    Ok(Entity::find()
        .filter(Column::ConsentId.eq(consent_id))
        .filter(Column::OrgId.eq(org_id))
        .one(db)
        .await?)
}

/// Write back every mutable column of a consent row.
pub async fn save_consent<C: ConnectionTrait>(
    db: &C,
    consent: &entities::consent::Model,
) -> Result<(), AssentError> {
    use entities::consent::{Column, Entity};

    Entity::update_many()
        .col_expr(Column::ConsentType, Expr::value(consent.consent_type.clone()))
        .col_expr(
            Column::CurrentStatus,
            Expr::value(consent.current_status.clone()),
        )
        .col_expr(Column::ConsentFrequency, Expr::value(consent.consent_frequency))
        .col_expr(Column::ValidityTime, Expr::value(consent.validity_time))
        .col_expr(
            Column::RecurringIndicator,
            Expr::value(consent.recurring_indicator),
        )
        .col_expr(
            Column::DataAccessValidityDuration,
            Expr::value(consent.data_access_validity_duration),
        )
        .col_expr(Column::UpdatedTime, Expr::value(consent.updated_time))
        .filter(Column::ConsentId.eq(consent.consent_id.as_str()))
        .filter(Column::OrgId.eq(consent.org_id.as_str()))
        .exec(db)
        .await?;
    Ok(())
}

pub async fn update_consent_status<C: ConnectionTrait>(
    db: &C,
    consent_id: &str,
    org_id: &str,
    status: &str,
    updated_time: i64,
) -> Result<u64, AssentError> {
    use entities::consent::{Column, Entity};

    let result = Entity::update_many()
        .col_expr(Column::CurrentStatus, Expr::value(status))
        .col_expr(Column::UpdatedTime, Expr::value(updated_time))
        .filter(Column::ConsentId.eq(consent_id))
        .filter(Column::OrgId.eq(org_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Moves a consent from `from_status` to `to_status` only if it still holds
/// `from_status`. Returns 0 when another writer got there first.
pub async fn transition_consent_status<C: ConnectionTrait>(
    db: &C,
    consent_id: &str,
    org_id: &str,
    from_status: &str,
    to_status: &str,
    updated_time: i64,
) -> Result<u64, AssentError> {
    use entities::consent::{Column, Entity};

    let result = Entity::update_many()
        .col_expr(Column::CurrentStatus, Expr::value(to_status))
        .col_expr(Column::UpdatedTime, Expr::value(updated_time))
        .filter(Column::ConsentId.eq(consent_id))
        .filter(Column::OrgId.eq(org_id))
        .filter(Column::CurrentStatus.eq(from_status))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub async fn delete_consent<C: ConnectionTrait>(
    db: &C,
    consent_id: &str,
    org_id: &str,
) -> Result<u64, AssentError> {
    use entities::consent::{Column, Entity};

    let result = Entity::delete_many()
        .filter(Column::ConsentId.eq(consent_id))
        .filter(Column::OrgId.eq(org_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

fn search_condition(org_id: &str, filter: &ConsentSearchFilter) -> Condition {
    use entities::consent::Column;
    use entities::consent_auth_resource as auth;

    let mut cond = Condition::all().add(Column::OrgId.eq(org_id));

    if !filter.consent_types.is_empty() {
        cond = cond.add(Column::ConsentType.is_in(filter.consent_types.clone()));
    }
    if !filter.consent_statuses.is_empty() {
        let statuses: Vec<String> = filter
            .consent_statuses
            .iter()
            .map(|s| s.to_uppercase())
            .collect();
        cond = cond.add(Column::CurrentStatus.is_in(statuses));
    }
    if !filter.client_ids.is_empty() {
        cond = cond.add(Column::ClientId.is_in(filter.client_ids.clone()));
    }
    if !filter.user_ids.is_empty() {
        cond = cond.add(
            Column::ConsentId.in_subquery(
                Query::select()
                    .column(auth::Column::ConsentId)
                    .from(auth::Entity)
                    .and_where(auth::Column::OrgId.eq(org_id))
                    .and_where(auth::Column::UserId.is_in(filter.user_ids.clone()))
                    .to_owned(),
            ),
        );
    }
    if let Some(from) = filter.from_time {
        cond = cond.add(Column::CreatedTime.gte(from));
    }
    if let Some(to) = filter.to_time {
        cond = cond.add(Column::CreatedTime.lte(to));
    }
    cond
}

/// One page of consents matching `filter`, plus the total match count.
pub async fn search_consents<C: ConnectionTrait>(
    db: &C,
    org_id: &str,
    filter: &ConsentSearchFilter,
    limit: u64,
    offset: u64,
) -> Result<(Vec<entities::consent::Model>, u64), AssentError> {
    use entities::consent::{Column, Entity};

    let cond = search_condition(org_id, filter);

    let total = Entity::find().filter(cond.clone()).count(db).await?;

    let rows = Entity::find()
        .filter(cond)
        .order_by_desc(Column::CreatedTime)
        .order_by_asc(Column::ConsentId)
        .limit(limit)
        .offset(offset)
        .all(db)
        .await?;

    Ok((rows, total))
}

// ============================================================================
// Attributes
// ============================================================================

pub async fn insert_attributes<C: ConnectionTrait>(
    db: &C,
    consent_id: &str,
    org_id: &str,
    attributes: &BTreeMap<String, String>,
) -> Result<(), AssentError> {
    use entities::consent_attribute::{ActiveModel, Entity};
    use sea_orm::Set;

    if attributes.is_empty() {
        return Ok(());
    }

    let rows = attributes.iter().map(|(key, value)| ActiveModel {
        consent_id: Set(consent_id.to_string()),
        org_id: Set(org_id.to_string()),
        att_key: Set(key.clone()),
        att_value: Set(value.clone()),
    });

    Entity::insert_many(rows).exec_without_returning(db).await?;
    Ok(())
}

pub async fn get_attributes<C: ConnectionTrait>(
    db: &C,
    consent_id: &str,
    org_id: &str,
) -> Result<BTreeMap<String, String>, AssentError> {
    use entities::consent_attribute::{Column, Entity};

    let rows = Entity::find()
        .filter(Column::ConsentId.eq(consent_id))
        .filter(Column::OrgId.eq(org_id))
        .all(db)
        .await?;

    Ok(rows.into_iter().map(|r| (r.att_key, r.att_value)).collect())
}

/// Attributes for many consents in one query, grouped by consent id.
pub async fn get_attributes_for<C: ConnectionTrait>(
    db: &C,
    org_id: &str,
    consent_ids: &[String],
) -> Result<HashMap<String, BTreeMap<String, String>>, AssentError> {
    use entities::consent_attribute::{Column, Entity};

    let mut grouped: HashMap<String, BTreeMap<String, String>> = HashMap::new();
    if consent_ids.is_empty() {
        return Ok(grouped);
    }

    let rows = Entity::find()
        .filter(Column::OrgId.eq(org_id))
        .filter(Column::ConsentId.is_in(consent_ids.to_vec()))
        .all(db)
        .await?;

    for row in rows {
        grouped
            .entry(row.consent_id)
            .or_default()
            .insert(row.att_key, row.att_value);
    }
    Ok(grouped)
}

pub async fn delete_attributes<C: ConnectionTrait>(
    db: &C,
    consent_id: &str,
    org_id: &str,
) -> Result<u64, AssentError> {
    use entities::consent_attribute::{Column, Entity};

    let result = Entity::delete_many()
        .filter(Column::ConsentId.eq(consent_id))
        .filter(Column::OrgId.eq(org_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Distinct consent ids carrying attribute `key`, optionally with an exact `value`.
pub async fn find_consent_ids_by_attribute<C: ConnectionTrait>(
    db: &C,
    org_id: &str,
    key: &str,
    value: Option<&str>,
) -> Result<Vec<String>, AssentError> {
    use entities::consent_attribute::{Column, Entity};

    let mut query = Entity::find()
        .select_only()
        .column(Column::ConsentId)
        .distinct()
        .filter(Column::OrgId.eq(org_id))
        .filter(Column::AttKey.eq(key));

    if let Some(value) = value {
        query = query.filter(Column::AttValue.eq(value));
    }

    Ok(query
        .order_by_asc(Column::ConsentId)
        .into_tuple::<String>()
        .all(db)
        .await?)
}

// ============================================================================
// Status audit
// ============================================================================

#[derive(Debug, Clone)]
pub struct NewStatusAudit<'a> {
    pub consent_id: &'a str,
    pub org_id: &'a str,
    pub current_status: &'a str,
    pub previous_status: Option<&'a str>,
    pub action_time: i64,
    pub action_by: Option<&'a str>,
    pub reason: Option<&'a str>,
}

pub async fn insert_status_audit<C: ConnectionTrait>(
    db: &C,
    audit: NewStatusAudit<'_>,
) -> Result<entities::consent_status_audit::Model, AssentError> {
    use entities::consent_status_audit::{Entity, Model};

    let model = Model {
        // Time-ordered, so rows written in the same millisecond keep their order
        status_audit_id: uuid::Uuid::now_v7().to_string(),
        consent_id: audit.consent_id.to_string(),
        org_id: audit.org_id.to_string(),
        current_status: audit.current_status.to_string(),
        previous_status: audit.previous_status.map(str::to_string),
        action_time: audit.action_time,
        action_by: audit.action_by.map(str::to_string),
        reason: audit.reason.map(str::to_string),
    };

    Entity::insert(model.clone().into_active_model())
        .exec_without_returning(db)
        .await?;
    Ok(model)
}

pub async fn get_status_audits<C: ConnectionTrait>(
    db: &C,
    consent_id: &str,
    org_id: &str,
) -> Result<Vec<entities::consent_status_audit::Model>, AssentError> {
    use entities::consent_status_audit::{Column, Entity};

    Ok(Entity::find()
        .filter(Column::ConsentId.eq(consent_id))
        .filter(Column::OrgId.eq(org_id))
        .order_by_asc(Column::ActionTime)
        .order_by_asc(Column::StatusAuditId)
        .all(db)
        .await?)
}

pub async fn delete_status_audits<C: ConnectionTrait>(
    db: &C,
    consent_id: &str,
    org_id: &str,
) -> Result<u64, AssentError> {
    use entities::consent_status_audit::{Column, Entity};

    let result = Entity::delete_many()
        .filter(Column::ConsentId.eq(consent_id))
        .filter(Column::OrgId.eq(org_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

// ============================================================================
// Authorization resources
// ============================================================================

/// Insert authorizations with freshly generated ids.
pub async fn insert_auth_resources<C: ConnectionTrait>(
    db: &C,
    consent_id: &str,
    org_id: &str,
    authorizations: &[AuthorizationRequest],
    updated_time: i64,
) -> Result<Vec<entities::consent_auth_resource::Model>, AssentError> {
    use entities::consent_auth_resource::{Entity, Model};

    if authorizations.is_empty() {
        return Ok(Vec::new());
    }

    let models = authorizations
        .iter()
        .map(|auth| {
            Ok(Model {
                auth_id: new_id(),
                consent_id: consent_id.to_string(),
                org_id: org_id.to_string(),
                auth_type: auth.auth_type.clone(),
                user_id: auth.user_id.clone(),
                auth_status: auth.status.clone(),
                updated_time,
                resources: to_json_column(auth.resources.as_ref())?,
                approved_purpose_details: to_json_column(
                    auth.approved_purpose_details.as_ref(),
                )?,
            })
        })
        .collect::<Result<Vec<_>, AssentError>>()?;

    Entity::insert_many(models.iter().cloned().map(IntoActiveModel::into_active_model))
        .exec_without_returning(db)
        .await?;
    Ok(models)
}

pub async fn get_auth_resources<C: ConnectionTrait>(
    db: &C,
    consent_id: &str,
    org_id: &str,
) -> Result<Vec<entities::consent_auth_resource::Model>, AssentError> {
    use entities::consent_auth_resource::{Column, Entity};

    Ok(Entity::find()
        .filter(Column::ConsentId.eq(consent_id))
        .filter(Column::OrgId.eq(org_id))
        .order_by_asc(Column::UpdatedTime)
        .order_by_asc(Column::AuthId)
        .all(db)
        .await?)
}

/// Authorizations for many consents in one query, grouped by consent id.
pub async fn get_auth_resources_for<C: ConnectionTrait>(
    db: &C,
    org_id: &str,
    consent_ids: &[String],
) -> Result<HashMap<String, Vec<entities::consent_auth_resource::Model>>, AssentError> {
    use entities::consent_auth_resource::{Column, Entity};

    let mut grouped: HashMap<String, Vec<_>> = HashMap::new();
    if consent_ids.is_empty() {
        return Ok(grouped);
    }

    let rows = Entity::find()
        .filter(Column::OrgId.eq(org_id))
        .filter(Column::ConsentId.is_in(consent_ids.to_vec()))
        .order_by_asc(Column::UpdatedTime)
        .order_by_asc(Column::AuthId)
        .all(db)
        .await?;

    for row in rows {
        grouped.entry(row.consent_id.clone()).or_default().push(row);
    }
    Ok(grouped)
}

pub async fn get_auth_resource<C: ConnectionTrait>(
    db: &C,
    consent_id: &str,
    auth_id: &str,
    org_id: &str,
) -> Result<Option<entities::consent_auth_resource::Model>, AssentError> {
    use entities::consent_auth_resource::{Column, Entity};

    Ok(Entity::find()
        .filter(Column::AuthId.eq(auth_id))
        .filter(Column::ConsentId.eq(consent_id))
        .filter(Column::OrgId.eq(org_id))
        .one(db)
        .await?)
}

pub async fn save_auth_resource<C: ConnectionTrait>(
    db: &C,
    auth: &entities::consent_auth_resource::Model,
) -> Result<(), AssentError> {
    use entities::consent_auth_resource::{Column, Entity};

    Entity::update_many()
        .col_expr(Column::AuthType, Expr::value(auth.auth_type.clone()))
        .col_expr(Column::UserId, Expr::value(auth.user_id.clone()))
        .col_expr(Column::AuthStatus, Expr::value(auth.auth_status.clone()))
        .col_expr(Column::UpdatedTime, Expr::value(auth.updated_time))
        .col_expr(Column::Resources, Expr::value(auth.resources.clone()))
        .col_expr(
            Column::ApprovedPurposeDetails,
            Expr::value(auth.approved_purpose_details.clone()),
        )
        .filter(Column::AuthId.eq(auth.auth_id.as_str()))
        .filter(Column::ConsentId.eq(auth.consent_id.as_str()))
        .filter(Column::OrgId.eq(auth.org_id.as_str()))
        .exec(db)
        .await?;
    Ok(())
}

/// Set every authorization of a consent to `status`.
pub async fn update_auth_statuses<C: ConnectionTrait>(
    db: &C,
    consent_id: &str,
    org_id: &str,
    status: &str,
    updated_time: i64,
) -> Result<u64, AssentError> {
    use entities::consent_auth_resource::{Column, Entity};

    let result = Entity::update_many()
        .col_expr(Column::AuthStatus, Expr::value(status))
        .col_expr(Column::UpdatedTime, Expr::value(updated_time))
        .filter(Column::ConsentId.eq(consent_id))
        .filter(Column::OrgId.eq(org_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub async fn delete_auth_resources<C: ConnectionTrait>(
    db: &C,
    consent_id: &str,
    org_id: &str,
) -> Result<u64, AssentError> {
    use entities::consent_auth_resource::{Column, Entity};

    let result = Entity::delete_many()
        .filter(Column::ConsentId.eq(consent_id))
        .filter(Column::OrgId.eq(org_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

// ============================================================================
// Purpose catalog
// ============================================================================

pub async fn insert_purpose<C: ConnectionTrait>(
    db: &C,
    purpose: entities::consent_purpose::Model,
) -> Result<(), AssentError> {
    use entities::consent_purpose::Entity;

    let name = purpose.name.clone();
    Entity::insert(purpose.into_active_model())
        .exec_without_returning(db)
        .await
        .map_err(|e| name_conflict(e, &name))?;
    Ok(())
}

/// Maps a violation of the unique (org, name) index to a conflict.
fn name_conflict(err: DbErr, name: &str) -> AssentError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AssentError::Conflict(format!("purpose '{name}' already exists"))
        }
        _ => err.into(),
    }
}

pub async fn get_purpose<C: ConnectionTrait>(
    db: &C,
    purpose_id: &str,
    org_id: &str,
) -> Result<Option<entities::consent_purpose::Model>, AssentError> {
    use entities::consent_purpose::{Column, Entity};

    Ok(Entity::find()
        .filter(Column::Id.eq(purpose_id))
        .filter(Column::OrgId.eq(org_id))
        .one(db)
        .await?)
}

pub async fn get_purpose_by_name<C: ConnectionTrait>(
    db: &C,
    org_id: &str,
    name: &str,
) -> Result<Option<entities::consent_purpose::Model>, AssentError> {
    use entities::consent_purpose::{Column, Entity};

    Ok(Entity::find()
        .filter(Column::OrgId.eq(org_id))
        .filter(Column::Name.eq(name))
        .one(db)
        .await?)
}

pub async fn get_purposes_by_names<C: ConnectionTrait>(
    db: &C,
    org_id: &str,
    names: &[String],
) -> Result<Vec<entities::consent_purpose::Model>, AssentError> {
    use entities::consent_purpose::{Column, Entity};

    if names.is_empty() {
        return Ok(Vec::new());
    }

    Ok(Entity::find()
        .filter(Column::OrgId.eq(org_id))
        .filter(Column::Name.is_in(names.to_vec()))
        .all(db)
        .await?)
}

pub async fn list_purposes<C: ConnectionTrait>(
    db: &C,
    org_id: &str,
    limit: u64,
    offset: u64,
) -> Result<(Vec<entities::consent_purpose::Model>, u64), AssentError> {
    use entities::consent_purpose::{Column, Entity};

    let total = Entity::find()
        .filter(Column::OrgId.eq(org_id))
        .count(db)
        .await?;

    let rows = Entity::find()
        .filter(Column::OrgId.eq(org_id))
        .order_by_asc(Column::Name)
        .limit(limit)
        .offset(offset)
        .all(db)
        .await?;

    Ok((rows, total))
}

pub async fn save_purpose<C: ConnectionTrait>(
    db: &C,
    purpose: &entities::consent_purpose::Model,
) -> Result<(), AssentError> {
    use entities::consent_purpose::{Column, Entity};

    Entity::update_many()
        .col_expr(Column::Name, Expr::value(purpose.name.clone()))
        .col_expr(Column::Description, Expr::value(purpose.description.clone()))
        .col_expr(Column::Type, Expr::value(purpose.r#type.clone()))
        .col_expr(Column::Value, Expr::value(purpose.value.clone()))
        .col_expr(Column::UpdatedTime, Expr::value(purpose.updated_time))
        .filter(Column::Id.eq(purpose.id.as_str()))
        .filter(Column::OrgId.eq(purpose.org_id.as_str()))
        .exec(db)
        .await
        .map_err(|e| name_conflict(e, &purpose.name))?;
    Ok(())
}

pub async fn delete_purpose<C: ConnectionTrait>(
    db: &C,
    purpose_id: &str,
    org_id: &str,
) -> Result<u64, AssentError> {
    use entities::consent_purpose::{Column, Entity};

    let result = Entity::delete_many()
        .filter(Column::Id.eq(purpose_id))
        .filter(Column::OrgId.eq(org_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

// ============================================================================
// Purpose mappings
// ============================================================================

/// Resolve requested purpose names to catalog ids and link them to a consent.
/// Fails without writing anything when any name is unknown in the org.
pub async fn insert_purpose_mappings<C: ConnectionTrait>(
    db: &C,
    consent_id: &str,
    org_id: &str,
    purposes: &[PurposeRequestItem],
) -> Result<(), AssentError> {
    use entities::consent_purpose_mapping::{ActiveModel, Entity};
    use sea_orm::Set;

    if purposes.is_empty() {
        return Ok(());
    }

    let names: Vec<String> = purposes.iter().map(|p| p.name.trim().to_string()).collect();
    let ids: HashMap<String, String> = get_purposes_by_names(db, org_id, &names)
        .await?
        .into_iter()
        .map(|p| (p.name, p.id))
        .collect();

    let missing: Vec<&str> = names
        .iter()
        .filter(|n| !ids.contains_key(n.as_str()))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(AssentError::validation(format!(
            "purposes not found: {}",
            missing.join(", ")
        )));
    }

    let rows = purposes
        .iter()
        .zip(&names)
        .map(|(p, name)| {
            let purpose_id = ids
                .get(name)
                .ok_or_else(|| AssentError::validation(format!("purpose not found: {name}")))?;
            Ok(ActiveModel {
                consent_id: Set(consent_id.to_string()),
                org_id: Set(org_id.to_string()),
                purpose_id: Set(purpose_id.clone()),
                value: Set(p.value.clone()),
                is_user_approved: Set(p.is_user_approved),
                is_mandatory: Set(p.is_mandatory),
            })
        })
        .collect::<Result<Vec<_>, AssentError>>()?;

    Entity::insert_many(rows).exec_without_returning(db).await?;
    Ok(())
}

/// Purpose links for the given consents, joined with catalog names.
pub async fn get_purpose_links<C: ConnectionTrait>(
    db: &C,
    org_id: &str,
    consent_ids: &[String],
) -> Result<Vec<PurposeLink>, AssentError> {
    use entities::consent_purpose;
    use entities::consent_purpose_mapping::{Column, Entity};

    if consent_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mappings = Entity::find()
        .filter(Column::OrgId.eq(org_id))
        .filter(Column::ConsentId.is_in(consent_ids.to_vec()))
        .all(db)
        .await?;
    if mappings.is_empty() {
        return Ok(Vec::new());
    }

    let purpose_ids: Vec<String> = mappings.iter().map(|m| m.purpose_id.clone()).collect();
    let names: HashMap<String, String> = consent_purpose::Entity::find()
        .filter(consent_purpose::Column::OrgId.eq(org_id))
        .filter(consent_purpose::Column::Id.is_in(purpose_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id, p.name))
        .collect();

    let mut links: Vec<PurposeLink> = mappings
        .into_iter()
        .filter_map(|m| {
            let name = names.get(&m.purpose_id)?.clone();
            Some(PurposeLink {
                consent_id: m.consent_id,
                purpose_id: m.purpose_id,
                name,
                value: m.value,
                is_user_approved: m.is_user_approved,
                is_mandatory: m.is_mandatory,
            })
        })
        .collect();
    links.sort_by(|a, b| a.consent_id.cmp(&b.consent_id).then(a.name.cmp(&b.name)));
    Ok(links)
}

pub async fn count_purpose_mappings<C: ConnectionTrait>(
    db: &C,
    purpose_id: &str,
    org_id: &str,
) -> Result<u64, AssentError> {
    use entities::consent_purpose_mapping::{Column, Entity};

    Ok(Entity::find()
        .filter(Column::PurposeId.eq(purpose_id))
        .filter(Column::OrgId.eq(org_id))
        .count(db)
        .await?)
}

pub async fn delete_purpose_mappings<C: ConnectionTrait>(
    db: &C,
    consent_id: &str,
    org_id: &str,
) -> Result<u64, AssentError> {
    use entities::consent_purpose_mapping::{Column, Entity};

    let result = Entity::delete_many()
        .filter(Column::ConsentId.eq(consent_id))
        .filter(Column::OrgId.eq(org_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{Database, DatabaseConnection, TransactionTrait};
    use sea_orm_migration::MigratorTrait;
    use tempfile::NamedTempFile;

    /// Test database helper that keeps temp file alive
    struct TestDb {
        connection: DatabaseConnection,
        _temp_file: NamedTempFile,
    }

    impl TestDb {
        async fn new() -> Self {
            let temp_file = NamedTempFile::new().expect("Failed to create temp file");
            let db_path = temp_file.path().to_str().expect("Invalid temp file path");
            let db_url = format!("sqlite://{}?mode=rwc", db_path);

            let connection = Database::connect(&db_url)
                .await
                .expect("Failed to connect to test database");

            migration::Migrator::up(&connection, None)
                .await
                .expect("Failed to run migrations");

            Self {
                connection,
                _temp_file: temp_file,
            }
        }

        fn connection(&self) -> &DatabaseConnection {
            &self.connection
        }
    }

    fn consent(consent_id: &str, org_id: &str, created_time: i64) -> entities::consent::Model {
        entities::consent::Model {
            consent_id: consent_id.to_string(),
            org_id: org_id.to_string(),
            client_id: "client-1".to_string(),
            consent_type: "accounts".to_string(),
            current_status: "AWAITING_AUTHORIZATION".to_string(),
            consent_frequency: None,
            validity_time: None,
            recurring_indicator: None,
            data_access_validity_duration: None,
            created_time,
            updated_time: created_time,
        }
    }

    fn purpose(name: &str, org_id: &str) -> entities::consent_purpose::Model {
        entities::consent_purpose::Model {
            id: new_id(),
            org_id: org_id.to_string(),
            name: name.to_string(),
            description: None,
            r#type: "string".to_string(),
            value: Some(name.to_string()),
            created_time: 1,
            updated_time: 1,
        }
    }

    // ============================================================================
    // Consent Operations Tests
    // ============================================================================

    #[tokio::test]
    async fn test_insert_and_get_consent() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        insert_consent(db, consent("c-1", "org-1", 100))
            .await
            .expect("Failed to insert consent");

        let found = get_consent(db, "c-1", "org-1")
            .await
            .expect("Query failed")
            .expect("Consent not found");
        assert_eq!(found.consent_type, "accounts");
    }

    #[tokio::test]
    async fn test_consent_is_scoped_by_org() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        insert_consent(db, consent("c-1", "org-1", 100)).await.unwrap();

        let other_org = get_consent(db, "c-1", "org-2").await.expect("Query failed");
        assert!(other_org.is_none());
    }

    #[tokio::test]
    async fn test_update_consent_status() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        insert_consent(db, consent("c-1", "org-1", 100)).await.unwrap();
        let rows = update_consent_status(db, "c-1", "org-1", "ACTIVE", 200)
            .await
            .unwrap();
        assert_eq!(rows, 1);

        let found = get_consent(db, "c-1", "org-1").await.unwrap().unwrap();
        assert_eq!(found.current_status, "ACTIVE");
        assert_eq!(found.updated_time, 200);
        assert_eq!(found.created_time, 100);
    }

    #[tokio::test]
    async fn test_transition_requires_expected_status() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        insert_consent(db, consent("c-1", "org-1", 100)).await.unwrap();

        let rows = transition_consent_status(db, "c-1", "org-1", "ACTIVE", "EXPIRED", 200)
            .await
            .unwrap();
        assert_eq!(rows, 0);

        let rows = transition_consent_status(
            db,
            "c-1",
            "org-1",
            "AWAITING_AUTHORIZATION",
            "EXPIRED",
            300,
        )
        .await
        .unwrap();
        assert_eq!(rows, 1);

        let found = get_consent(db, "c-1", "org-1").await.unwrap().unwrap();
        assert_eq!(found.current_status, "EXPIRED");
        assert_eq!(found.updated_time, 300);
    }

    #[tokio::test]
    async fn test_search_pagination_and_total() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        for i in 0..5 {
            insert_consent(db, consent(&format!("c-{i}"), "org-1", 100 + i))
                .await
                .unwrap();
        }
        insert_consent(db, consent("other", "org-2", 100)).await.unwrap();

        let (page, total) = search_consents(db, "org-1", &ConsentSearchFilter::default(), 2, 1)
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        // Newest first
        assert_eq!(page[0].consent_id, "c-3");
        assert_eq!(page[1].consent_id, "c-2");
    }

    #[tokio::test]
    async fn test_search_time_range_is_inclusive() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        for (id, t) in [("a", 100), ("b", 200), ("c", 300)] {
            insert_consent(db, consent(id, "org-1", t)).await.unwrap();
        }

        let filter = ConsentSearchFilter {
            from_time: Some(100),
            to_time: Some(200),
            ..Default::default()
        };
        let (rows, total) = search_consents(db, "org-1", &filter, 10, 0).await.unwrap();
        assert_eq!(total, 2);
        let ids: Vec<_> = rows.iter().map(|r| r.consent_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_search_by_user_id() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        insert_consent(db, consent("c-1", "org-1", 100)).await.unwrap();
        insert_consent(db, consent("c-2", "org-1", 200)).await.unwrap();
        let auth = AuthorizationRequest {
            auth_type: "authorization".into(),
            status: "authorized".into(),
            user_id: Some("alice".into()),
            resources: None,
            approved_purpose_details: None,
        };
        insert_auth_resources(db, "c-1", "org-1", &[auth], 100)
            .await
            .unwrap();

        let filter = ConsentSearchFilter {
            user_ids: vec!["alice".into()],
            ..Default::default()
        };
        let (rows, total) = search_consents(db, "org-1", &filter, 10, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].consent_id, "c-1");
    }

    // ============================================================================
    // Attribute Operations Tests
    // ============================================================================

    #[tokio::test]
    async fn test_find_consent_ids_by_attribute() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let mut a = BTreeMap::new();
        a.insert("channel".to_string(), "web".to_string());
        let mut b = BTreeMap::new();
        b.insert("channel".to_string(), "mobile".to_string());

        insert_attributes(db, "c-2", "org-1", &a).await.unwrap();
        insert_attributes(db, "c-1", "org-1", &b).await.unwrap();
        insert_attributes(db, "c-9", "org-2", &a).await.unwrap();

        let by_key = find_consent_ids_by_attribute(db, "org-1", "channel", None)
            .await
            .unwrap();
        assert_eq!(by_key, vec!["c-1".to_string(), "c-2".to_string()]);

        let by_value = find_consent_ids_by_attribute(db, "org-1", "channel", Some("web"))
            .await
            .unwrap();
        assert_eq!(by_value, vec!["c-2".to_string()]);

        let missing = find_consent_ids_by_attribute(db, "org-1", "nope", None)
            .await
            .unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn test_attributes_grouped_by_consent() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let mut attrs = BTreeMap::new();
        attrs.insert("k1".to_string(), "v1".to_string());
        attrs.insert("k2".to_string(), "v2".to_string());
        insert_attributes(db, "c-1", "org-1", &attrs).await.unwrap();

        let grouped = get_attributes_for(db, "org-1", &["c-1".to_string(), "c-2".to_string()])
            .await
            .unwrap();
        assert_eq!(grouped.get("c-1"), Some(&attrs));
        assert!(grouped.get("c-2").is_none());
    }

    // ============================================================================
    // Authorization Operations Tests
    // ============================================================================

    #[tokio::test]
    async fn test_auth_payload_stored_as_json() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let auth = AuthorizationRequest {
            auth_type: "authorization".into(),
            status: "created".into(),
            user_id: None,
            resources: Some(serde_json::json!({"accounts": ["a1", "a2"]})),
            approved_purpose_details: None,
        };
        let inserted = insert_auth_resources(db, "c-1", "org-1", &[auth], 10)
            .await
            .unwrap();
        assert_eq!(inserted.len(), 1);

        let stored = get_auth_resource(db, "c-1", &inserted[0].auth_id, "org-1")
            .await
            .unwrap()
            .expect("Authorization not found");
        assert_eq!(
            stored.resources.as_deref(),
            Some(r#"{"accounts":["a1","a2"]}"#)
        );
    }

    #[tokio::test]
    async fn test_update_auth_statuses_cascades() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let auth = |status: &str| AuthorizationRequest {
            auth_type: "authorization".into(),
            status: status.into(),
            user_id: None,
            resources: None,
            approved_purpose_details: None,
        };
        insert_auth_resources(db, "c-1", "org-1", &[auth("authorized"), auth("created")], 10)
            .await
            .unwrap();

        let rows = update_auth_statuses(db, "c-1", "org-1", "SYS_REVOKED", 20)
            .await
            .unwrap();
        assert_eq!(rows, 2);

        let auths = get_auth_resources(db, "c-1", "org-1").await.unwrap();
        assert!(auths.iter().all(|a| a.auth_status == "SYS_REVOKED"));
    }

    // ============================================================================
    // Purpose Operations Tests
    // ============================================================================

    #[tokio::test]
    async fn test_purpose_mappings_resolve_names() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        insert_purpose(db, purpose("marketing", "org-1")).await.unwrap();

        let items = vec![PurposeRequestItem {
            name: "marketing".into(),
            value: Some("email".into()),
            is_user_approved: true,
            is_mandatory: false,
        }];
        insert_purpose_mappings(db, "c-1", "org-1", &items)
            .await
            .expect("Failed to link purposes");

        let links = get_purpose_links(db, "org-1", &["c-1".to_string()])
            .await
            .unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].name, "marketing");
        assert_eq!(links[0].value.as_deref(), Some("email"));
        assert!(links[0].is_user_approved);
    }

    #[tokio::test]
    async fn test_purpose_mappings_fail_on_unknown_names() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        insert_purpose(db, purpose("marketing", "org-1")).await.unwrap();
        // Same name in another org must not resolve
        insert_purpose(db, purpose("analytics", "org-2")).await.unwrap();

        let items: Vec<PurposeRequestItem> = ["marketing", "analytics", "profiling"]
            .iter()
            .map(|n| PurposeRequestItem {
                name: n.to_string(),
                value: None,
                is_user_approved: false,
                is_mandatory: false,
            })
            .collect();

        let err = insert_purpose_mappings(db, "c-1", "org-1", &items)
            .await
            .unwrap_err();
        match err {
            AssentError::Validation(msg) => {
                assert!(msg.contains("analytics"));
                assert!(msg.contains("profiling"));
                assert!(!msg.contains("marketing"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let links = get_purpose_links(db, "org-1", &["c-1".to_string()])
            .await
            .unwrap();
        assert!(links.is_empty());
    }

    #[tokio::test]
    async fn test_purpose_mappings_trim_names() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        insert_purpose(db, purpose("marketing", "org-1")).await.unwrap();

        let items = vec![PurposeRequestItem {
            name: " marketing ".into(),
            value: None,
            is_user_approved: true,
            is_mandatory: false,
        }];
        insert_purpose_mappings(db, "c-1", "org-1", &items)
            .await
            .expect("Padded name should resolve");

        let links = get_purpose_links(db, "org-1", &["c-1".to_string()])
            .await
            .unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].name, "marketing");
    }

    #[tokio::test]
    async fn test_duplicate_purpose_name_is_conflict() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        insert_purpose(db, purpose("marketing", "org-1")).await.unwrap();
        let err = insert_purpose(db, purpose("marketing", "org-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AssentError::Conflict(_)), "got {err:?}");

        let mut other = purpose("analytics", "org-1");
        insert_purpose(db, other.clone()).await.unwrap();
        other.name = "marketing".to_string();
        let err = save_purpose(db, &other).await.unwrap_err();
        assert!(matches!(err, AssentError::Conflict(_)), "got {err:?}");

        // Same name in another org is fine
        insert_purpose(db, purpose("marketing", "org-2")).await.unwrap();
    }

    #[tokio::test]
    async fn test_rolled_back_transaction_leaves_no_rows() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let txn = db.begin().await.unwrap();
        insert_consent(&txn, consent("c-1", "org-1", 100)).await.unwrap();
        txn.rollback().await.unwrap();

        assert!(get_consent(db, "c-1", "org-1").await.unwrap().is_none());
    }
}
