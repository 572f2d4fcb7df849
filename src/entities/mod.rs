pub mod consent;
pub mod consent_attribute;
pub mod consent_auth_resource;
pub mod consent_purpose;
pub mod consent_purpose_mapping;
pub mod consent_status_audit;

pub use consent::Entity as Consent;
pub use consent_attribute::Entity as ConsentAttribute;
pub use consent_auth_resource::Entity as ConsentAuthResource;
pub use consent_purpose::Entity as ConsentPurpose;
pub use consent_purpose_mapping::Entity as ConsentPurposeMapping;
pub use consent_status_audit::Entity as ConsentStatusAudit;
