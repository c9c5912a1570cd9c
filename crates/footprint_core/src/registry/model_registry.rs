//! In-process model registry and schema manifest loading.

use crate::model::schema::{ModelDef, ModelValidationError};
use log::info;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::Arc;

/// Model registration and manifest loading errors.
#[derive(Debug)]
pub enum RegistryError {
    InvalidModel(ModelValidationError),
    DuplicateModel(String),
    UnknownReferenceTarget {
        model: String,
        field: String,
        target: String,
    },
    ManifestIo(std::io::Error),
    ManifestParse(serde_json::Error),
}

impl RegistryError {
    /// Stable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidModel(_) => "invalid_model",
            Self::DuplicateModel(_) => "duplicate_model",
            Self::UnknownReferenceTarget { .. } => "unknown_reference_target",
            Self::ManifestIo(_) => "manifest_io",
            Self::ManifestParse(_) => "manifest_parse",
        }
    }
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidModel(err) => write!(f, "{err}"),
            Self::DuplicateModel(name) => write!(f, "model already registered: {name}"),
            Self::UnknownReferenceTarget {
                model,
                field,
                target,
            } => write!(
                f,
                "reference {model}.{field} points to unregistered model {target}"
            ),
            Self::ManifestIo(err) => write!(f, "failed to read schema manifest: {err}"),
            Self::ManifestParse(err) => write!(f, "invalid schema manifest: {err}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidModel(err) => Some(err),
            Self::ManifestIo(err) => Some(err),
            Self::ManifestParse(err) => Some(err),
            Self::DuplicateModel(_) | Self::UnknownReferenceTarget { .. } => None,
        }
    }
}

impl From<ModelValidationError> for RegistryError {
    fn from(value: ModelValidationError) -> Self {
        Self::InvalidModel(value)
    }
}

/// On-disk schema manifest shape: `{ "models": [...] }`.
#[derive(Debug, Deserialize)]
struct SchemaManifest {
    models: Vec<ModelDef>,
}

/// Name → model definition registry.
///
/// Populated once at startup, then shared read-only (usually behind `Arc`).
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, Arc<ModelDef>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a JSON schema manifest.
    ///
    /// Every model is validated, and every reference must target a model
    /// declared in the same manifest.
    pub fn from_schema_json(text: &str) -> Result<Self, RegistryError> {
        let manifest: SchemaManifest =
            serde_json::from_str(text).map_err(RegistryError::ManifestParse)?;

        let mut registry = Self::new();
        for model in manifest.models {
            registry.register(model)?;
        }
        registry.validate_references()?;

        info!(
            "event=registry_load module=registry status=ok models={}",
            registry.len()
        );
        Ok(registry)
    }

    /// Reads and loads a JSON schema manifest file.
    pub fn from_schema_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let text = std::fs::read_to_string(path).map_err(RegistryError::ManifestIo)?;
        Self::from_schema_json(&text)
    }

    /// Registers one model definition.
    pub fn register(&mut self, model: ModelDef) -> Result<(), RegistryError> {
        model.validate()?;
        if self.models.contains_key(model.name.as_str()) {
            return Err(RegistryError::DuplicateModel(model.name));
        }

        self.models.insert(model.name.clone(), Arc::new(model));
        Ok(())
    }

    /// Checks that every declared reference targets a registered model.
    pub fn validate_references(&self) -> Result<(), RegistryError> {
        for model in self.models.values() {
            for reference in model.references() {
                if !self.models.contains_key(reference.target) {
                    return Err(RegistryError::UnknownReferenceTarget {
                        model: model.name.clone(),
                        field: reference.name.to_string(),
                        target: reference.target.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Exact, case-sensitive lookup.
    pub fn get(&self, name: &str) -> Option<Arc<ModelDef>> {
        self.models.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Returns sorted model names.
    pub fn model_names(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    /// Iterates over registered models in name order.
    pub fn models(&self) -> impl Iterator<Item = &ModelDef> {
        self.models.values().map(|model| model.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::{ModelRegistry, RegistryError};
    use crate::model::schema::{Cardinality, FieldDef, ModelDef};

    fn user() -> ModelDef {
        ModelDef::new("User")
            .with_field(FieldDef::attribute("username"))
            .with_field(FieldDef::reference("roles", "Role", Cardinality::Many))
    }

    #[test]
    fn registers_and_looks_up_models() {
        let mut registry = ModelRegistry::new();
        registry.register(user()).expect("user should register");
        registry
            .register(ModelDef::new("Role"))
            .expect("role should register");

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.model_names(), vec!["Role", "User"]);
        assert_eq!(registry.get("User").expect("user").name, "User");
        registry
            .validate_references()
            .expect("all targets registered");
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let mut registry = ModelRegistry::new();
        registry.register(user()).expect("user should register");

        assert!(registry.get("user").is_none());
        assert!(registry.get(" User").is_none());
        assert!(registry.get("").is_none());
    }

    #[test]
    fn rejects_duplicate_or_invalid_models() {
        let mut registry = ModelRegistry::new();
        registry.register(user()).expect("first user should register");

        let duplicate = registry.register(user());
        assert!(matches!(duplicate, Err(RegistryError::DuplicateModel(_))));

        let invalid = registry.register(ModelDef::new("not a model"));
        assert!(matches!(invalid, Err(RegistryError::InvalidModel(_))));
    }

    #[test]
    fn validate_references_reports_missing_target() {
        let mut registry = ModelRegistry::new();
        registry.register(user()).expect("user should register");

        let err = registry
            .validate_references()
            .expect_err("Role is not registered");
        match err {
            RegistryError::UnknownReferenceTarget {
                model,
                field,
                target,
            } => {
                assert_eq!(model, "User");
                assert_eq!(field, "roles");
                assert_eq!(target, "Role");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn loads_schema_manifest() {
        let registry = ModelRegistry::from_schema_json(
            r#"{
                "models": [
                    { "name": "Role", "fields": [{ "name": "name", "type": "attribute" }] },
                    { "name": "User", "fields": [
                        { "name": "roles", "type": "reference", "target": "Role" }
                    ] }
                ]
            }"#,
        )
        .expect("manifest should load");

        let user = registry.get("User").expect("user registered");
        assert_eq!(user.reference("roles").map(|r| r.target), Some("Role"));
    }

    #[test]
    fn manifest_parse_error_is_reported() {
        let err = ModelRegistry::from_schema_json("{ \"models\": 3 }").unwrap_err();
        assert_eq!(err.code(), "manifest_parse");
    }
}
