use crate::errors::AssentError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub const STRING_TYPE: &str = "string";
pub const JSON_SCHEMA_TYPE: &str = "json-schema";

/// Validates and normalizes the value of a purpose of one type.
pub trait PurposeTypeHandler: Send + Sync {
    fn validate(&self, value: Option<&str>) -> Result<Option<String>, AssentError>;
}

struct StringPurpose;

impl PurposeTypeHandler for StringPurpose {
    fn validate(&self, value: Option<&str>) -> Result<Option<String>, AssentError> {
        match value.map(str::trim) {
            None => Ok(None),
            Some("") => Err(AssentError::validation(
                "purpose value must not be blank for type 'string'",
            )),
            Some(v) => Ok(Some(v.to_string())),
        }
    }
}

struct JsonSchemaPurpose;

impl PurposeTypeHandler for JsonSchemaPurpose {
    fn validate(&self, value: Option<&str>) -> Result<Option<String>, AssentError> {
        let raw = value.ok_or_else(|| {
            AssentError::validation("purpose value is required for type 'json-schema'")
        })?;
        let parsed: Value = serde_json::from_str(raw).map_err(|e| {
            AssentError::validation(format!("purpose value is not valid JSON: {e}"))
        })?;
        if !parsed.is_object() {
            return Err(AssentError::validation(
                "purpose value for type 'json-schema' must be a JSON object",
            ));
        }
        Ok(Some(serde_json::to_string(&parsed)?))
    }
}

/// Purpose type handlers keyed by type string.
#[derive(Clone)]
pub struct PurposeTypeRegistry {
    handlers: HashMap<String, Arc<dyn PurposeTypeHandler>>,
}

impl PurposeTypeRegistry {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, type_name: &str, handler: Arc<dyn PurposeTypeHandler>) {
        self.handlers.insert(type_name.to_string(), handler);
    }

    pub fn supports(&self, type_name: &str) -> bool {
        self.handlers.contains_key(type_name)
    }

    pub fn validate(
        &self,
        type_name: &str,
        value: Option<&str>,
    ) -> Result<Option<String>, AssentError> {
        let handler = self.handlers.get(type_name).ok_or_else(|| {
            let mut known: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
            known.sort_unstable();
            AssentError::validation(format!(
                "unsupported purpose type '{}', expected one of: {}",
                type_name,
                known.join(", ")
            ))
        })?;
        handler.validate(value)
    }
}

impl Default for PurposeTypeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(STRING_TYPE, Arc::new(StringPurpose));
        registry.register(JSON_SCHEMA_TYPE, Arc::new(JsonSchemaPurpose));
        registry
    }
}

impl std::fmt::Debug for PurposeTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PurposeTypeRegistry")
            .field("types", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_type() {
        let registry = PurposeTypeRegistry::default();
        assert_eq!(
            registry.validate("string", Some("  marketing emails ")).unwrap(),
            Some("marketing emails".to_string())
        );
        assert_eq!(registry.validate("string", None).unwrap(), None);
        assert!(registry.validate("string", Some("   ")).is_err());
    }

    #[test]
    fn test_json_schema_type_normalizes() {
        let registry = PurposeTypeRegistry::default();
        let value = registry
            .validate("json-schema", Some(r#"{ "type": "object" }"#))
            .unwrap();
        assert_eq!(value, Some(r#"{"type":"object"}"#.to_string()));
    }

    #[test]
    fn test_json_schema_type_rejects_non_objects() {
        let registry = PurposeTypeRegistry::default();
        assert!(registry.validate("json-schema", Some("[1,2]")).is_err());
        assert!(registry.validate("json-schema", Some("{not json")).is_err());
        assert!(registry.validate("json-schema", None).is_err());
    }

    #[test]
    fn test_unknown_type() {
        let registry = PurposeTypeRegistry::default();
        assert!(!registry.supports("xml"));
        let err = registry.validate("xml", Some("<a/>")).unwrap_err();
        assert!(err.to_string().contains("json-schema, string"));
    }
}
