//! Consent lifecycle: transactional create, update, revoke and delete,
//! status derivation, the lazy expiration check, and the purpose catalog.
//!
//! Reads run directly on the pool. Every multi-table write opens one
//! transaction, runs its steps through the generic store functions, and
//! commits only when all of them succeeded.
//!
//! There is no optimistic locking: two concurrent updates of the same
//! consent can overwrite each other's non-collection fields.

use crate::entities;
use crate::errors::AssentError;
use crate::models::{
    AttributeSearchResponse, AuthorizationResponse, AuthorizationUpdateRequest,
    ConsentCreateRequest, ConsentResponse, ConsentSearchFilter, ConsentSummary,
    ConsentUpdateRequest, Page, PageMetadata, PurposeCreateRequest, PurposeResponse,
    PurposeUpdateRequest, RevokeRequest, RevokeResponse, StatusAuditResponse, ValidateRequest,
    ValidateResponse,
};
use crate::purpose_types::PurposeTypeRegistry;
use crate::settings::ConsentSettings;
use crate::status::StatusPolicy;
use crate::storage::{self, NewStatusAudit};
use crate::validation;
use sea_orm::{ConnectionTrait, DatabaseConnection, DatabaseTransaction, TransactionTrait};
use std::collections::HashMap;

pub const CONSENT_NOT_FOUND: &str = "CONSENT_NOT_FOUND";
pub const INVALID_CONSENT_STATUS: &str = "INVALID_CONSENT_STATUS";

const SYSTEM_ACTOR: &str = "SYSTEM";
const EXPIRY_REASON: &str = "expired based on validityTime";

/// Validity times below this are epoch seconds, at or above it epoch millis.
const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Deadline of a consent in epoch millis, or `None` when it never expires.
pub fn validity_deadline_millis(validity_time: Option<i64>) -> Option<i64> {
    match validity_time {
        Some(t) if t <= 0 => None,
        Some(t) if t < MILLIS_THRESHOLD => Some(t.saturating_mul(1000)),
        Some(t) => Some(t),
        None => None,
    }
}

/// Commit on success; roll back and log on failure.
async fn finish<T>(
    txn: DatabaseTransaction,
    operation: &str,
    result: Result<T, AssentError>,
) -> Result<T, AssentError> {
    match result {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(e) => {
            tracing::warn!(operation, error = %e, "rolling back transaction");
            if let Err(rb) = txn.rollback().await {
                tracing::warn!(operation, error = %rb, "rollback failed");
            }
            Err(e)
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsentService {
    db: DatabaseConnection,
    consent: ConsentSettings,
    policy: StatusPolicy,
    purpose_types: PurposeTypeRegistry,
}

impl ConsentService {
    pub fn new(db: DatabaseConnection, consent: ConsentSettings) -> Self {
        let policy = StatusPolicy::from_settings(&consent);
        Self {
            db,
            consent,
            policy,
            purpose_types: PurposeTypeRegistry::default(),
        }
    }

    pub fn with_purpose_types(mut self, purpose_types: PurposeTypeRegistry) -> Self {
        self.purpose_types = purpose_types;
        self
    }

    fn page_bounds(&self, limit: Option<i64>, offset: Option<i64>) -> (u64, u64) {
        let limit = match limit {
            Some(l) if l > 0 => l as u64,
            _ => self.consent.default_page_size,
        };
        let offset = match offset {
            Some(o) if o > 0 => o as u64,
            _ => 0,
        };
        (limit, offset)
    }

    async fn require_consent<C: ConnectionTrait>(
        db: &C,
        consent_id: &str,
        org_id: &str,
    ) -> Result<entities::consent::Model, AssentError> {
        storage::get_consent(db, consent_id, org_id)
            .await?
            .ok_or_else(|| AssentError::not_found(format!("Consent {consent_id}")))
    }

    /// Load the child collections of one consent and build its response.
    async fn assemble<C: ConnectionTrait>(
        db: &C,
        consent: entities::consent::Model,
    ) -> Result<ConsentResponse, AssentError> {
        let (id, org) = (consent.consent_id.clone(), consent.org_id.clone());
        let attributes = storage::get_attributes(db, &id, &org).await?;
        let authorizations = storage::get_auth_resources(db, &id, &org).await?;
        let purposes = storage::get_purpose_links(db, &org, std::slice::from_ref(&id)).await?;
        Ok(ConsentResponse::assemble(
            consent,
            attributes,
            authorizations,
            purposes,
        ))
    }

    // ------------------------------------------------------------------
    // Consents
    // ------------------------------------------------------------------

    pub async fn create_consent(
        &self,
        org_id: &str,
        client_id: &str,
        req: ConsentCreateRequest,
    ) -> Result<ConsentResponse, AssentError> {
        validation::validate_org_id(org_id)?;
        validation::validate_client_id(client_id)?;
        validation::validate_create_request(&req)?;

        let authorizations = req.authorizations.unwrap_or_default();
        let statuses: Vec<&str> = authorizations.iter().map(|a| a.status.as_str()).collect();
        let status = self.policy.derive(&statuses);
        let now = storage::now_millis();

        let consent = entities::consent::Model {
            consent_id: storage::new_id(),
            org_id: org_id.to_string(),
            client_id: client_id.to_string(),
            consent_type: req.consent_type,
            current_status: status,
            consent_frequency: req.frequency,
            validity_time: req.validity_time,
            recurring_indicator: req.recurring_indicator,
            data_access_validity_duration: req.data_access_validity_duration,
            created_time: now,
            updated_time: now,
        };
        let consent_id = consent.consent_id.clone();
        let attributes = req.attributes.unwrap_or_default();
        let purposes = req.purposes.unwrap_or_default();

        let txn = self.db.begin().await?;
        let result = async {
            storage::insert_consent(&txn, consent.clone()).await?;
            storage::insert_attributes(&txn, &consent_id, org_id, &attributes).await?;
            storage::insert_status_audit(
                &txn,
                NewStatusAudit {
                    consent_id: &consent_id,
                    org_id,
                    current_status: &consent.current_status,
                    previous_status: None,
                    action_time: now,
                    action_by: Some(client_id),
                    reason: None,
                },
            )
            .await?;
            storage::insert_auth_resources(&txn, &consent_id, org_id, &authorizations, now)
                .await?;
            storage::insert_purpose_mappings(&txn, &consent_id, org_id, &purposes).await?;
            Ok::<_, AssentError>(())
        }
        .await;
        finish(txn, "create_consent", result).await?;

        tracing::info!(
            consent_id = %consent_id,
            org_id,
            status = %consent.current_status,
            "created consent"
        );
        Self::assemble(&self.db, consent).await
    }

    pub async fn get_consent(
        &self,
        org_id: &str,
        consent_id: &str,
    ) -> Result<ConsentResponse, AssentError> {
        validation::validate_org_id(org_id)?;
        let consent = Self::require_consent(&self.db, consent_id, org_id).await?;
        let consent = self.expire_if_due(consent).await?;
        tracing::debug!(consent_id, org_id, "fetched consent");
        Self::assemble(&self.db, consent).await
    }

    pub async fn list_consents(
        &self,
        org_id: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Page<ConsentSummary>, AssentError> {
        self.search_consents(org_id, &ConsentSearchFilter::default(), limit, offset)
            .await
    }

    pub async fn search_consents(
        &self,
        org_id: &str,
        filter: &ConsentSearchFilter,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Page<ConsentSummary>, AssentError> {
        validation::validate_org_id(org_id)?;
        let (limit, offset) = self.page_bounds(limit, offset);
        let (rows, total) = storage::search_consents(&self.db, org_id, filter, limit, offset).await?;
        tracing::debug!(org_id, total, returned = rows.len(), "searched consents");

        Ok(Page {
            data: rows.into_iter().map(ConsentSummary::from).collect(),
            metadata: PageMetadata {
                total,
                limit,
                offset,
            },
        })
    }

    /// Search returning full consents. Children for the whole page are
    /// fetched in one query per table.
    pub async fn search_consents_detailed(
        &self,
        org_id: &str,
        filter: &ConsentSearchFilter,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Page<ConsentResponse>, AssentError> {
        validation::validate_org_id(org_id)?;
        let (limit, offset) = self.page_bounds(limit, offset);
        let (rows, total) = storage::search_consents(&self.db, org_id, filter, limit, offset).await?;

        let ids: Vec<String> = rows.iter().map(|c| c.consent_id.clone()).collect();
        let mut authorizations = storage::get_auth_resources_for(&self.db, org_id, &ids).await?;
        let mut attributes = storage::get_attributes_for(&self.db, org_id, &ids).await?;
        let mut purposes: HashMap<String, Vec<_>> = HashMap::new();
        for link in storage::get_purpose_links(&self.db, org_id, &ids).await? {
            purposes.entry(link.consent_id.clone()).or_default().push(link);
        }

        let data = rows
            .into_iter()
            .map(|consent| {
                let id = consent.consent_id.clone();
                ConsentResponse::assemble(
                    consent,
                    attributes.remove(&id).unwrap_or_default(),
                    authorizations.remove(&id).unwrap_or_default(),
                    purposes.remove(&id).unwrap_or_default(),
                )
            })
            .collect();

        Ok(Page {
            data,
            metadata: PageMetadata {
                total,
                limit,
                offset,
            },
        })
    }

    pub async fn update_consent(
        &self,
        org_id: &str,
        consent_id: &str,
        req: ConsentUpdateRequest,
    ) -> Result<ConsentResponse, AssentError> {
        validation::validate_org_id(org_id)?;
        validation::validate_update_request(&req)?;

        let txn = self.db.begin().await?;
        let result = async {
            let mut consent = Self::require_consent(&txn, consent_id, org_id).await?;
            let previous_status = consent.current_status.clone();
            let now = storage::now_millis();

            if let Some(consent_type) = req.consent_type {
                consent.consent_type = consent_type;
            }
            if let Some(validity_time) = req.validity_time {
                consent.validity_time = Some(validity_time);
            }
            if let Some(recurring) = req.recurring_indicator {
                consent.recurring_indicator = Some(recurring);
            }
            if let Some(frequency) = req.frequency {
                consent.consent_frequency = Some(frequency);
            }
            if let Some(duration) = req.data_access_validity_duration {
                consent.data_access_validity_duration = Some(duration);
            }
            if let Some(authorizations) = &req.authorizations {
                let statuses: Vec<&str> =
                    authorizations.iter().map(|a| a.status.as_str()).collect();
                consent.current_status = self.policy.derive(&statuses);
            }
            consent.updated_time = now;
            storage::save_consent(&txn, &consent).await?;

            if consent.current_status != previous_status {
                storage::insert_status_audit(
                    &txn,
                    NewStatusAudit {
                        consent_id,
                        org_id,
                        current_status: &consent.current_status,
                        previous_status: Some(&previous_status),
                        action_time: now,
                        action_by: Some(&consent.client_id),
                        reason: None,
                    },
                )
                .await?;
            }

            if let Some(attributes) = &req.attributes {
                storage::delete_attributes(&txn, consent_id, org_id).await?;
                storage::insert_attributes(&txn, consent_id, org_id, attributes).await?;
            }
            if let Some(authorizations) = &req.authorizations {
                storage::delete_auth_resources(&txn, consent_id, org_id).await?;
                storage::insert_auth_resources(&txn, consent_id, org_id, authorizations, now)
                    .await?;
            }
            if let Some(purposes) = &req.purposes {
                storage::delete_purpose_mappings(&txn, consent_id, org_id).await?;
                storage::insert_purpose_mappings(&txn, consent_id, org_id, purposes).await?;
            }
            Ok::<_, AssentError>(consent)
        }
        .await;
        let consent = finish(txn, "update_consent", result).await?;

        tracing::info!(
            consent_id,
            org_id,
            status = %consent.current_status,
            "updated consent"
        );
        Self::assemble(&self.db, consent).await
    }

    pub async fn revoke_consent(
        &self,
        org_id: &str,
        consent_id: &str,
        req: RevokeRequest,
    ) -> Result<RevokeResponse, AssentError> {
        validation::validate_org_id(org_id)?;
        let action_by = validation::validate_revoke_request(&req)?;
        let revoked = &self.consent.status.revoked;
        let now = storage::now_millis();

        let txn = self.db.begin().await?;
        let result = async {
            let consent = Self::require_consent(&txn, consent_id, org_id).await?;
            storage::update_consent_status(&txn, consent_id, org_id, revoked, now).await?;
            storage::update_auth_statuses(
                &txn,
                consent_id,
                org_id,
                &self.consent.auth_status.system_revoked,
                now,
            )
            .await?;
            storage::insert_status_audit(
                &txn,
                NewStatusAudit {
                    consent_id,
                    org_id,
                    current_status: revoked,
                    previous_status: Some(&consent.current_status),
                    action_time: now,
                    action_by: Some(&action_by),
                    reason: req.revocation_reason.as_deref(),
                },
            )
            .await?;
            Ok::<_, AssentError>(())
        }
        .await;
        finish(txn, "revoke_consent", result).await?;

        tracing::info!(consent_id, org_id, action_by = %action_by, "revoked consent");
        Ok(RevokeResponse {
            action_time: now / 1000,
            action_by,
            revocation_reason: req.revocation_reason,
        })
    }

    /// Check whether a consent may be used right now. Never fails for an
    /// unknown or inactive consent; the outcome is carried in the response.
    pub async fn validate_consent(
        &self,
        org_id: &str,
        req: &ValidateRequest,
    ) -> Result<ValidateResponse, AssentError> {
        validation::validate_org_id(org_id)?;

        let consent = if req.consent_id.trim().is_empty() {
            None
        } else {
            storage::get_consent(&self.db, &req.consent_id, org_id).await?
        };
        let Some(consent) = consent else {
            tracing::debug!(consent_id = %req.consent_id, org_id, "validation of unknown consent");
            return Ok(ValidateResponse {
                is_valid: false,
                error_code: Some(CONSENT_NOT_FOUND.to_string()),
                error_message: Some("Consent not found".to_string()),
                error_description: Some(format!(
                    "no consent with id '{}' exists for this organization",
                    req.consent_id
                )),
                consent_information: None,
            });
        };

        let consent = self.expire_if_due(consent).await?;
        let active = &self.consent.status.active;
        let status_ok = consent.current_status.eq_ignore_ascii_case(active);
        let status = consent.current_status.clone();

        let mut info = Self::assemble(&self.db, consent).await?;
        let names: Vec<String> = info.purposes.iter().map(|p| p.name.clone()).collect();
        let catalog: HashMap<String, entities::consent_purpose::Model> =
            storage::get_purposes_by_names(&self.db, org_id, &names)
                .await?
                .into_iter()
                .map(|p| (p.name.clone(), p))
                .collect();
        for item in &mut info.purposes {
            if let Some(entry) = catalog.get(&item.name) {
                item.purpose_type = Some(entry.r#type.clone());
                item.description = entry.description.clone();
                item.catalog_value = entry.value.clone();
            }
        }

        let mut response = ValidateResponse {
            is_valid: status_ok,
            error_code: None,
            error_message: None,
            error_description: None,
            consent_information: Some(info),
        };
        if !status_ok {
            response.error_code = Some(INVALID_CONSENT_STATUS.to_string());
            response.error_message = Some("Consent is not active".to_string());
            response.error_description = Some(format!(
                "consent status is '{status}', expected '{active}'"
            ));
        }
        tracing::debug!(consent_id = %req.consent_id, org_id, valid = status_ok, "validated consent");
        Ok(response)
    }

    pub async fn search_consents_by_attribute(
        &self,
        org_id: &str,
        key: Option<&str>,
        value: Option<&str>,
    ) -> Result<AttributeSearchResponse, AssentError> {
        validation::validate_org_id(org_id)?;
        let key = key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AssentError::validation("attribute key is required"))?;
        let value = value.filter(|v| !v.is_empty());

        let consent_ids =
            storage::find_consent_ids_by_attribute(&self.db, org_id, key, value).await?;
        Ok(AttributeSearchResponse {
            count: consent_ids.len(),
            consent_ids,
        })
    }

    pub async fn delete_consent(&self, org_id: &str, consent_id: &str) -> Result<(), AssentError> {
        validation::validate_org_id(org_id)?;

        let txn = self.db.begin().await?;
        let result = async {
            Self::require_consent(&txn, consent_id, org_id).await?;
            storage::delete_purpose_mappings(&txn, consent_id, org_id).await?;
            storage::delete_auth_resources(&txn, consent_id, org_id).await?;
            storage::delete_attributes(&txn, consent_id, org_id).await?;
            storage::delete_status_audits(&txn, consent_id, org_id).await?;
            storage::delete_consent(&txn, consent_id, org_id).await?;
            Ok::<_, AssentError>(())
        }
        .await;
        finish(txn, "delete_consent", result).await?;

        tracing::info!(consent_id, org_id, "deleted consent");
        Ok(())
    }

    pub async fn get_status_history(
        &self,
        org_id: &str,
        consent_id: &str,
    ) -> Result<Vec<StatusAuditResponse>, AssentError> {
        validation::validate_org_id(org_id)?;
        Self::require_consent(&self.db, consent_id, org_id).await?;
        let audits = storage::get_status_audits(&self.db, consent_id, org_id).await?;
        Ok(audits.into_iter().map(Into::into).collect())
    }

    // ------------------------------------------------------------------
    // Expiration
    // ------------------------------------------------------------------

    /// Flip a consent past its validity deadline to the expired status.
    /// Returns the consent as it stands afterwards.
    pub async fn expire_if_due(
        &self,
        consent: entities::consent::Model,
    ) -> Result<entities::consent::Model, AssentError> {
        let expired = &self.consent.status.expired;
        let now = storage::now_millis();
        let due = validity_deadline_millis(consent.validity_time).is_some_and(|d| d < now);
        if !due || consent.current_status.eq_ignore_ascii_case(expired) {
            return Ok(consent);
        }

        let (consent_id, org_id) = (consent.consent_id.as_str(), consent.org_id.as_str());
        let txn = self.db.begin().await?;
        let result = async {
            // Only the reader that still sees the old status records the transition
            let rows = storage::transition_consent_status(
                &txn,
                consent_id,
                org_id,
                &consent.current_status,
                expired,
                now,
            )
            .await?;
            if rows != 1 {
                return Ok::<_, AssentError>(false);
            }
            storage::update_auth_statuses(
                &txn,
                consent_id,
                org_id,
                &self.consent.auth_status.system_expired,
                now,
            )
            .await?;
            storage::insert_status_audit(
                &txn,
                NewStatusAudit {
                    consent_id,
                    org_id,
                    current_status: expired,
                    previous_status: Some(&consent.current_status),
                    action_time: now,
                    action_by: Some(SYSTEM_ACTOR),
                    reason: Some(EXPIRY_REASON),
                },
            )
            .await?;
            Ok(true)
        }
        .await;

        if finish(txn, "expire_consent", result).await? {
            tracing::info!(consent_id, org_id, "consent expired");
            return Ok(entities::consent::Model {
                current_status: expired.clone(),
                updated_time: now,
                ..consent
            });
        }

        tracing::debug!(consent_id, org_id, "consent changed concurrently, re-reading");
        Self::require_consent(&self.db, consent_id, org_id).await
    }

    // ------------------------------------------------------------------
    // Single authorizations
    // ------------------------------------------------------------------

    pub async fn get_authorization(
        &self,
        org_id: &str,
        consent_id: &str,
        auth_id: &str,
    ) -> Result<AuthorizationResponse, AssentError> {
        validation::validate_org_id(org_id)?;
        let auth = storage::get_auth_resource(&self.db, consent_id, auth_id, org_id)
            .await?
            .ok_or_else(|| AssentError::not_found(format!("Authorization {auth_id}")))?;
        Ok(auth.into())
    }

    /// Update one authorization. A status change re-derives the consent
    /// status from all of its authorizations.
    pub async fn update_authorization(
        &self,
        org_id: &str,
        consent_id: &str,
        auth_id: &str,
        req: AuthorizationUpdateRequest,
    ) -> Result<AuthorizationResponse, AssentError> {
        validation::validate_org_id(org_id)?;
        validation::validate_authorization_update(&req)?;

        let txn = self.db.begin().await?;
        let result = async {
            let consent = Self::require_consent(&txn, consent_id, org_id).await?;
            let mut auth = storage::get_auth_resource(&txn, consent_id, auth_id, org_id)
                .await?
                .ok_or_else(|| AssentError::not_found(format!("Authorization {auth_id}")))?;
            let now = storage::now_millis();
            let status_changed = req
                .status
                .as_deref()
                .is_some_and(|s| s != auth.auth_status);

            if let Some(auth_type) = req.auth_type {
                auth.auth_type = auth_type;
            }
            if let Some(status) = req.status {
                auth.auth_status = status;
            }
            if let Some(user_id) = req.user_id {
                auth.user_id = Some(user_id);
            }
            if let Some(resources) = &req.resources {
                auth.resources = Some(serde_json::to_string(resources)?);
            }
            if let Some(details) = &req.approved_purpose_details {
                auth.approved_purpose_details = Some(serde_json::to_string(details)?);
            }
            auth.updated_time = now;
            storage::save_auth_resource(&txn, &auth).await?;

            if status_changed {
                let statuses: Vec<String> = storage::get_auth_resources(&txn, consent_id, org_id)
                    .await?
                    .into_iter()
                    .map(|a| a.auth_status)
                    .collect();
                let derived = self.policy.derive(&statuses);
                if derived != consent.current_status {
                    storage::update_consent_status(&txn, consent_id, org_id, &derived, now)
                        .await?;
                    storage::insert_status_audit(
                        &txn,
                        NewStatusAudit {
                            consent_id,
                            org_id,
                            current_status: &derived,
                            previous_status: Some(&consent.current_status),
                            action_time: now,
                            action_by: auth.user_id.as_deref(),
                            reason: None,
                        },
                    )
                    .await?;
                    tracing::info!(consent_id, org_id, status = %derived, "consent status changed");
                }
            }
            Ok::<_, AssentError>(auth)
        }
        .await;
        let auth = finish(txn, "update_authorization", result).await?;

        tracing::info!(consent_id, auth_id, org_id, "updated authorization");
        Ok(auth.into())
    }

    // ------------------------------------------------------------------
    // Purpose catalog
    // ------------------------------------------------------------------

    pub async fn create_purpose(
        &self,
        org_id: &str,
        req: PurposeCreateRequest,
    ) -> Result<PurposeResponse, AssentError> {
        validation::validate_org_id(org_id)?;
        validation::validate_purpose_create(&req)?;
        let value = self
            .purpose_types
            .validate(&req.purpose_type, req.value.as_deref())?;
        let name = req.name.trim().to_string();

        if storage::get_purpose_by_name(&self.db, org_id, &name)
            .await?
            .is_some()
        {
            return Err(AssentError::Conflict(format!(
                "purpose '{name}' already exists"
            )));
        }

        let now = storage::now_millis();
        let purpose = entities::consent_purpose::Model {
            id: storage::new_id(),
            org_id: org_id.to_string(),
            name,
            description: req.description,
            r#type: req.purpose_type,
            value,
            created_time: now,
            updated_time: now,
        };
        storage::insert_purpose(&self.db, purpose.clone()).await?;

        tracing::info!(purpose_id = %purpose.id, org_id, name = %purpose.name, "created purpose");
        Ok(purpose.into())
    }

    pub async fn get_purpose(
        &self,
        org_id: &str,
        purpose_id: &str,
    ) -> Result<PurposeResponse, AssentError> {
        validation::validate_org_id(org_id)?;
        storage::get_purpose(&self.db, purpose_id, org_id)
            .await?
            .map(Into::into)
            .ok_or_else(|| AssentError::not_found(format!("Purpose {purpose_id}")))
    }

    pub async fn list_purposes(
        &self,
        org_id: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Page<PurposeResponse>, AssentError> {
        validation::validate_org_id(org_id)?;
        let (limit, offset) = self.page_bounds(limit, offset);
        let (rows, total) = storage::list_purposes(&self.db, org_id, limit, offset).await?;
        Ok(Page {
            data: rows.into_iter().map(Into::into).collect(),
            metadata: PageMetadata {
                total,
                limit,
                offset,
            },
        })
    }

    pub async fn update_purpose(
        &self,
        org_id: &str,
        purpose_id: &str,
        req: PurposeUpdateRequest,
    ) -> Result<PurposeResponse, AssentError> {
        validation::validate_org_id(org_id)?;
        validation::validate_purpose_update(&req)?;

        let mut purpose = storage::get_purpose(&self.db, purpose_id, org_id)
            .await?
            .ok_or_else(|| AssentError::not_found(format!("Purpose {purpose_id}")))?;

        if let Some(name) = req.name.as_deref().map(str::trim) {
            if name != purpose.name {
                let taken = storage::get_purpose_by_name(&self.db, org_id, name).await?;
                if taken.is_some_and(|p| p.id != purpose.id) {
                    return Err(AssentError::Conflict(format!(
                        "purpose '{name}' already exists"
                    )));
                }
                purpose.name = name.to_string();
            }
        }
        if let Some(description) = req.description {
            purpose.description = Some(description);
        }
        if req.purpose_type.is_some() || req.value.is_some() {
            let purpose_type = req.purpose_type.unwrap_or(purpose.r#type);
            let raw = req.value.or(purpose.value);
            purpose.value = self.purpose_types.validate(&purpose_type, raw.as_deref())?;
            purpose.r#type = purpose_type;
        }
        purpose.updated_time = storage::now_millis();
        storage::save_purpose(&self.db, &purpose).await?;

        tracing::info!(purpose_id, org_id, "updated purpose");
        Ok(purpose.into())
    }

    pub async fn delete_purpose(&self, org_id: &str, purpose_id: &str) -> Result<(), AssentError> {
        validation::validate_org_id(org_id)?;

        let txn = self.db.begin().await?;
        let result = async {
            storage::get_purpose(&txn, purpose_id, org_id)
                .await?
                .ok_or_else(|| AssentError::not_found(format!("Purpose {purpose_id}")))?;
            let linked = storage::count_purpose_mappings(&txn, purpose_id, org_id).await?;
            if linked > 0 {
                return Err(AssentError::Conflict(format!(
                    "purpose is linked to {linked} consent(s)"
                )));
            }
            storage::delete_purpose(&txn, purpose_id, org_id).await?;
            Ok::<_, AssentError>(())
        }
        .await;
        finish(txn, "delete_purpose", result).await?;

        tracing::info!(purpose_id, org_id, "deleted purpose");
        Ok(())
    }
}
