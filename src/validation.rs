//! Request shape checks run before the service touches the store.

use crate::errors::AssentError;
use crate::models::{
    AuthorizationRequest, AuthorizationUpdateRequest, ConsentCreateRequest, ConsentUpdateRequest,
    PurposeCreateRequest, PurposeRequestItem, PurposeUpdateRequest, RevokeRequest,
};
use std::collections::{BTreeMap, HashSet};

const MAX_ID_LEN: usize = 255;
const MAX_TYPE_LEN: usize = 64;
const MAX_ATTRIBUTE_VALUE_LEN: usize = 1024;

fn require(field: &str, value: &str, max: usize) -> Result<(), AssentError> {
    if value.trim().is_empty() {
        return Err(AssentError::validation(format!("{field} is required")));
    }
    if value.len() > max {
        return Err(AssentError::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

pub fn validate_org_id(org_id: &str) -> Result<(), AssentError> {
    require("organization id", org_id, MAX_ID_LEN)
}

pub fn validate_client_id(client_id: &str) -> Result<(), AssentError> {
    require("client id", client_id, MAX_ID_LEN)
}

pub fn validate_consent_id(consent_id: &str) -> Result<(), AssentError> {
    require("consent id", consent_id, MAX_ID_LEN)
}

fn validate_duration(duration: Option<i64>) -> Result<(), AssentError> {
    match duration {
        Some(d) if d < 0 => Err(AssentError::validation(
            "dataAccessValidityDuration must be zero or positive",
        )),
        _ => Ok(()),
    }
}

fn validate_numbers(
    validity_time: Option<i64>,
    frequency: Option<i32>,
    duration: Option<i64>,
) -> Result<(), AssentError> {
    if matches!(validity_time, Some(t) if t < 0) {
        return Err(AssentError::validation("validityTime must not be negative"));
    }
    if matches!(frequency, Some(f) if f < 0) {
        return Err(AssentError::validation("frequency must not be negative"));
    }
    validate_duration(duration)
}

fn validate_attributes(attributes: &BTreeMap<String, String>) -> Result<(), AssentError> {
    for (key, value) in attributes {
        require("attribute key", key, MAX_ID_LEN)?;
        if value.len() > MAX_ATTRIBUTE_VALUE_LEN {
            return Err(AssentError::validation(format!(
                "attribute '{key}' value must be at most {MAX_ATTRIBUTE_VALUE_LEN} characters"
            )));
        }
    }
    Ok(())
}

fn validate_authorizations(authorizations: &[AuthorizationRequest]) -> Result<(), AssentError> {
    for auth in authorizations {
        require("authorization type", &auth.auth_type, MAX_TYPE_LEN)?;
        require("authorization status", &auth.status, MAX_TYPE_LEN)?;
        if let Some(user_id) = &auth.user_id {
            require("authorization userId", user_id, MAX_ID_LEN)?;
        }
    }
    Ok(())
}

fn validate_purposes(purposes: &[PurposeRequestItem]) -> Result<(), AssentError> {
    let mut seen = HashSet::new();
    for purpose in purposes {
        require("purpose name", &purpose.name, MAX_ID_LEN)?;
        // Names resolve trimmed, so " a" and "a" are the same purpose
        let name = purpose.name.trim();
        if !seen.insert(name) {
            return Err(AssentError::validation(format!(
                "purpose '{name}' is listed more than once"
            )));
        }
    }
    Ok(())
}

pub fn validate_create_request(req: &ConsentCreateRequest) -> Result<(), AssentError> {
    require("type", &req.consent_type, MAX_TYPE_LEN)?;
    validate_numbers(
        req.validity_time,
        req.frequency,
        req.data_access_validity_duration,
    )?;
    if let Some(attributes) = &req.attributes {
        validate_attributes(attributes)?;
    }
    if let Some(authorizations) = &req.authorizations {
        validate_authorizations(authorizations)?;
    }
    if let Some(purposes) = &req.purposes {
        validate_purposes(purposes)?;
    }
    Ok(())
}

pub fn validate_update_request(req: &ConsentUpdateRequest) -> Result<(), AssentError> {
    if let Some(consent_type) = &req.consent_type {
        require("type", consent_type, MAX_TYPE_LEN)?;
    }
    validate_numbers(
        req.validity_time,
        req.frequency,
        req.data_access_validity_duration,
    )?;
    if let Some(attributes) = &req.attributes {
        validate_attributes(attributes)?;
    }
    if let Some(authorizations) = &req.authorizations {
        validate_authorizations(authorizations)?;
    }
    if let Some(purposes) = &req.purposes {
        validate_purposes(purposes)?;
    }
    Ok(())
}

pub fn validate_authorization_update(req: &AuthorizationUpdateRequest) -> Result<(), AssentError> {
    if let Some(auth_type) = &req.auth_type {
        require("authorization type", auth_type, MAX_TYPE_LEN)?;
    }
    if let Some(status) = &req.status {
        require("authorization status", status, MAX_TYPE_LEN)?;
    }
    if let Some(user_id) = &req.user_id {
        require("authorization userId", user_id, MAX_ID_LEN)?;
    }
    Ok(())
}

/// Returns the validated actor.
pub fn validate_revoke_request(req: &RevokeRequest) -> Result<String, AssentError> {
    let action_by = req.action_by.as_deref().unwrap_or_default();
    require("actionBy", action_by, MAX_ID_LEN)?;
    Ok(action_by.trim().to_string())
}

pub fn validate_purpose_create(req: &PurposeCreateRequest) -> Result<(), AssentError> {
    require("purpose name", &req.name, MAX_ID_LEN)?;
    require("purpose type", &req.purpose_type, MAX_TYPE_LEN)
}

pub fn validate_purpose_update(req: &PurposeUpdateRequest) -> Result<(), AssentError> {
    if let Some(name) = &req.name {
        require("purpose name", name, MAX_ID_LEN)?;
    }
    if let Some(purpose_type) = &req.purpose_type {
        require("purpose type", purpose_type, MAX_TYPE_LEN)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request() -> ConsentCreateRequest {
        ConsentCreateRequest {
            consent_type: "accounts".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_negative_duration_rejected() {
        let req = ConsentCreateRequest {
            data_access_validity_duration: Some(-1),
            ..create_request()
        };
        assert!(matches!(
            validate_create_request(&req),
            Err(AssentError::Validation(_))
        ));

        let update = ConsentUpdateRequest {
            data_access_validity_duration: Some(-1),
            ..Default::default()
        };
        assert!(validate_update_request(&update).is_err());
    }

    #[test]
    fn test_zero_and_positive_duration_accepted() {
        for d in [0, 1, 86_400] {
            let req = ConsentCreateRequest {
                data_access_validity_duration: Some(d),
                ..create_request()
            };
            assert!(validate_create_request(&req).is_ok());
        }
    }

    #[test]
    fn test_missing_type_rejected() {
        let req = ConsentCreateRequest::default();
        let err = validate_create_request(&req).unwrap_err();
        assert!(err.to_string().contains("type is required"));
    }

    #[test]
    fn test_duplicate_purpose_names_rejected() {
        let item = PurposeRequestItem {
            name: "marketing".into(),
            value: None,
            is_user_approved: false,
            is_mandatory: false,
        };
        let req = ConsentCreateRequest {
            purposes: Some(vec![item.clone(), item]),
            ..create_request()
        };
        assert!(validate_create_request(&req).is_err());
    }

    #[test]
    fn test_padded_purpose_names_count_as_duplicates() {
        let item = |name: &str| PurposeRequestItem {
            name: name.into(),
            value: None,
            is_user_approved: false,
            is_mandatory: false,
        };
        let req = ConsentCreateRequest {
            purposes: Some(vec![item("marketing"), item(" marketing ")]),
            ..create_request()
        };
        let err = validate_create_request(&req).unwrap_err();
        assert!(err.to_string().contains("'marketing'"));
    }

    #[test]
    fn test_revoke_requires_actor() {
        assert!(validate_revoke_request(&RevokeRequest::default()).is_err());
        let req = RevokeRequest {
            action_by: Some(" admin ".into()),
            revocation_reason: None,
        };
        assert_eq!(validate_revoke_request(&req).unwrap(), "admin");
    }

    #[test]
    fn test_blank_org_id_rejected() {
        assert!(validate_org_id("").is_err());
        assert!(validate_org_id("   ").is_err());
        assert!(validate_org_id("org-1").is_ok());
    }
}
