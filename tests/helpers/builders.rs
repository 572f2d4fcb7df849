use assent::models::{
    AuthorizationRequest, ConsentCreateRequest, ConsentResponse, PurposeCreateRequest,
    PurposeRequestItem, PurposeResponse,
};
use assent::service::ConsentService;
use serde_json::Value;
use std::collections::BTreeMap;

/// Builder for authorization entries of a consent request
pub struct AuthorizationBuilder {
    status: String,
    auth_type: String,
    user_id: Option<String>,
    resources: Option<Value>,
}

impl AuthorizationBuilder {
    pub fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
            auth_type: "authorization".to_string(),
            user_id: None,
            resources: None,
        }
    }

    pub fn for_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn with_resources(mut self, resources: Value) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn build(self) -> AuthorizationRequest {
        AuthorizationRequest {
            auth_type: self.auth_type,
            status: self.status,
            user_id: self.user_id,
            resources: self.resources,
            approved_purpose_details: None,
        }
    }
}

/// Builder for consent creation requests
pub struct ConsentRequestBuilder {
    request: ConsentCreateRequest,
}

impl ConsentRequestBuilder {
    pub fn new(consent_type: &str) -> Self {
        Self {
            request: ConsentCreateRequest {
                consent_type: consent_type.to_string(),
                ..Default::default()
            },
        }
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.request
            .attributes
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_authorization(mut self, auth: AuthorizationBuilder) -> Self {
        self.request
            .authorizations
            .get_or_insert_with(Vec::new)
            .push(auth.build());
        self
    }

    pub fn with_purpose(mut self, name: &str, approved: bool) -> Self {
        self.request
            .purposes
            .get_or_insert_with(Vec::new)
            .push(PurposeRequestItem {
                name: name.to_string(),
                value: None,
                is_user_approved: approved,
                is_mandatory: false,
            });
        self
    }

    pub fn validity_time(mut self, validity_time: i64) -> Self {
        self.request.validity_time = Some(validity_time);
        self
    }

    pub fn access_duration(mut self, duration: i64) -> Self {
        self.request.data_access_validity_duration = Some(duration);
        self
    }

    pub fn build(self) -> ConsentCreateRequest {
        self.request
    }

    pub async fn create(self, service: &ConsentService, org_id: &str) -> ConsentResponse {
        service
            .create_consent(org_id, super::CLIENT, self.request)
            .await
            .expect("Failed to create test consent")
    }
}

/// Builder for purpose catalog entries
pub struct PurposeBuilder {
    request: PurposeCreateRequest,
}

impl PurposeBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            request: PurposeCreateRequest {
                name: name.to_string(),
                description: None,
                purpose_type: "string".to_string(),
                value: Some(name.to_string()),
            },
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.request.description = Some(description.to_string());
        self
    }

    pub fn json_schema(mut self, schema: &str) -> Self {
        self.request.purpose_type = "json-schema".to_string();
        self.request.value = Some(schema.to_string());
        self
    }

    pub fn build(self) -> PurposeCreateRequest {
        self.request
    }

    pub async fn create(self, service: &ConsentService, org_id: &str) -> PurposeResponse {
        service
            .create_purpose(org_id, self.request)
            .await
            .expect("Failed to create test purpose")
    }
}
