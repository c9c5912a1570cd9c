//! Model schema declarations and validation.
//!
//! # Responsibility
//! - Describe a model as a named list of fields.
//! - Mark relation fields explicitly so reference lookup needs no introspection.
//! - Validate declaration-level invariants before registry insertion.
//!
//! # Invariants
//! - Model names are `PascalCase`-style identifiers (`^[A-Z][A-Za-z0-9_]*$`).
//! - Field names are unique within one model.
//! - Reference targets are non-blank model names.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

static MODEL_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Za-z0-9_]*$").expect("valid model name regex"));
static FIELD_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid field name regex"));

/// How many child records one parent may link through a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// At most one linked child; a new link replaces the previous one.
    One,
    /// Any number of linked children.
    Many,
}

impl Cardinality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::One => "one",
            Self::Many => "many",
        }
    }
}

/// Declared type of one model field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// Plain attribute stored inline on the record.
    Attribute,
    /// Relation to records of another model.
    Reference {
        /// Target model name.
        target: String,
        #[serde(default = "default_cardinality")]
        cardinality: Cardinality,
    },
}

fn default_cardinality() -> Cardinality {
    Cardinality::Many
}

/// One named field of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldDef {
    pub fn attribute(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Attribute,
        }
    }

    pub fn reference(
        name: impl Into<String>,
        target: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Reference {
                target: target.into(),
                cardinality,
            },
        }
    }

    /// Returns `(target, cardinality)` when this field is a relation.
    pub fn reference_target(&self) -> Option<(&str, Cardinality)> {
        match &self.kind {
            FieldKind::Reference {
                target,
                cardinality,
            } => Some((target.as_str(), *cardinality)),
            FieldKind::Attribute => None,
        }
    }
}

/// Resolved reference: the relation field plus its target model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceDef<'m> {
    pub name: &'m str,
    pub target: &'m str,
    pub cardinality: Cardinality,
}

/// Declared model schema.
///
/// `Default` yields an empty, invalid definition (blank name, no fields).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDef {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl ModelDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style field append.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Whether this definition names a model at all.
    pub fn is_defined(&self) -> bool {
        !self.name.trim().is_empty()
    }

    /// Looks up a declared relation field by exact name.
    ///
    /// Attribute fields with the same name do not match.
    pub fn reference(&self, name: &str) -> Option<ReferenceDef<'_>> {
        self.fields.iter().find_map(|field| {
            if field.name != name {
                return None;
            }
            field
                .reference_target()
                .map(|(target, cardinality)| ReferenceDef {
                    name: field.name.as_str(),
                    target,
                    cardinality,
                })
        })
    }

    /// Iterates over every declared relation field in declaration order.
    pub fn references(&self) -> impl Iterator<Item = ReferenceDef<'_>> {
        self.fields.iter().filter_map(|field| {
            field
                .reference_target()
                .map(|(target, cardinality)| ReferenceDef {
                    name: field.name.as_str(),
                    target,
                    cardinality,
                })
        })
    }

    /// Validates declaration-level invariants.
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.name.trim().is_empty() {
            return Err(ModelValidationError::EmptyName);
        }
        if !MODEL_NAME_RE.is_match(&self.name) {
            return Err(ModelValidationError::InvalidName(self.name.clone()));
        }

        let mut seen = BTreeSet::<&str>::new();
        for field in &self.fields {
            if !FIELD_NAME_RE.is_match(&field.name) {
                return Err(ModelValidationError::InvalidFieldName {
                    model: self.name.clone(),
                    field: field.name.clone(),
                });
            }
            if !seen.insert(field.name.as_str()) {
                return Err(ModelValidationError::DuplicateField {
                    model: self.name.clone(),
                    field: field.name.clone(),
                });
            }
            if let Some((target, _)) = field.reference_target() {
                if target.trim().is_empty() {
                    return Err(ModelValidationError::EmptyReferenceTarget {
                        model: self.name.clone(),
                        field: field.name.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Model declaration validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    EmptyName,
    InvalidName(String),
    InvalidFieldName { model: String, field: String },
    DuplicateField { model: String, field: String },
    EmptyReferenceTarget { model: String, field: String },
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "model name must not be empty"),
            Self::InvalidName(value) => write!(f, "model name is invalid: {value}"),
            Self::InvalidFieldName { model, field } => {
                write!(f, "field name is invalid: {model}.{field}")
            }
            Self::DuplicateField { model, field } => {
                write!(f, "field is declared twice: {model}.{field}")
            }
            Self::EmptyReferenceTarget { model, field } => {
                write!(f, "reference has no target model: {model}.{field}")
            }
        }
    }
}

impl Error for ModelValidationError {}

#[cfg(test)]
mod tests {
    use super::{Cardinality, FieldDef, FieldKind, ModelDef, ModelValidationError};

    fn user_model() -> ModelDef {
        ModelDef::new("User")
            .with_field(FieldDef::attribute("username"))
            .with_field(FieldDef::reference("roles", "Role", Cardinality::Many))
            .with_field(FieldDef::reference("profile", "Profile", Cardinality::One))
    }

    #[test]
    fn validates_well_formed_model() {
        assert!(user_model().validate().is_ok());
    }

    #[test]
    fn reference_lookup_ignores_attribute_fields() {
        let model = user_model();
        assert!(model.reference("username").is_none());

        let roles = model.reference("roles").expect("roles is declared");
        assert_eq!(roles.target, "Role");
        assert_eq!(roles.cardinality, Cardinality::Many);
    }

    #[test]
    fn references_keep_declaration_order() {
        let model = user_model();
        let names: Vec<_> = model.references().map(|r| r.name).collect();
        assert_eq!(names, vec!["roles", "profile"]);
    }

    #[test]
    fn rejects_invalid_model_name() {
        let err = ModelDef::new("user account").validate().unwrap_err();
        assert!(matches!(err, ModelValidationError::InvalidName(_)));

        let err = ModelDef::default().validate().unwrap_err();
        assert_eq!(err, ModelValidationError::EmptyName);
    }

    #[test]
    fn rejects_duplicate_field() {
        let model = user_model().with_field(FieldDef::attribute("roles"));
        let err = model.validate().unwrap_err();
        assert_eq!(
            err,
            ModelValidationError::DuplicateField {
                model: "User".to_string(),
                field: "roles".to_string(),
            }
        );
    }

    #[test]
    fn rejects_blank_reference_target() {
        let model = ModelDef::new("User").with_field(FieldDef::reference(
            "roles",
            " ",
            Cardinality::Many,
        ));
        assert!(matches!(
            model.validate(),
            Err(ModelValidationError::EmptyReferenceTarget { .. })
        ));
    }

    #[test]
    fn deserializes_tagged_field_kinds() {
        let json = r#"{
            "name": "User",
            "fields": [
                { "name": "username", "type": "attribute" },
                { "name": "roles", "type": "reference", "target": "Role" },
                { "name": "profile", "type": "reference", "target": "Profile", "cardinality": "one" }
            ]
        }"#;
        let model: ModelDef = serde_json::from_str(json).expect("valid model json");

        assert_eq!(model.fields[0].kind, FieldKind::Attribute);
        assert_eq!(
            model.fields[1].reference_target(),
            Some(("Role", Cardinality::Many))
        );
        assert_eq!(
            model.fields[2].reference_target(),
            Some(("Profile", Cardinality::One))
        );
    }
}
