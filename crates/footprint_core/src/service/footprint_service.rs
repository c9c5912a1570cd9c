//! Footprint use-case service.
//!
//! # Responsibility
//! - Resolve model names and reference fields against the model registry.
//! - Expose generic CRUD and association entry points for callers such as an
//!   HTTP routing layer.
//! - Delegate persistence to a `RecordStore` implementation.
//!
//! # Invariants
//! - Resolution failures are reported before the store is touched, except
//!   the parent-record check, which needs one store read.
//! - The four resolution failures carry fixed messages that callers match on.
//! - Store errors are surfaced unchanged inside `FootprintError::Store`.
//! - Log events carry model/reference names and counts, never attribute values.

use crate::model::record::{Attributes, Criteria, QueryOptions, Record, RecordId};
use crate::model::schema::{Cardinality, ModelDef};
use crate::registry::model_registry::ModelRegistry;
use crate::repo::record_repo::{LinkRef, RecordStore, RepoError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

pub const MODEL_NOT_FOUND_MESSAGE: &str = "No model found";
pub const MISSING_PARENT_ID_MESSAGE: &str = "No parentId provided";
pub const REFERENCE_NOT_FOUND_MESSAGE: &str = "No such reference exist";
pub const PARENT_NOT_FOUND_MESSAGE: &str = "No parent record found";

pub type FootprintResult<T> = Result<T, FootprintError>;

/// Service error for footprint operations.
#[derive(Debug)]
pub enum FootprintError {
    /// Model name is not registered.
    ModelNotFound(String),
    /// Association call without a parent identifier.
    MissingParentId,
    /// Reference name is not a declared relation on the parent model.
    ReferenceNotFound { model: String, reference: String },
    /// Parent record does not exist in the store.
    ParentNotFound { model: String, id: RecordId },
    /// Persistence-layer failure.
    Store(RepoError),
}

impl FootprintError {
    /// Caller-facing message; fixed literals for the resolution failures.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Stable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ModelNotFound(_) => "model_not_found",
            Self::MissingParentId => "missing_parent_id",
            Self::ReferenceNotFound { .. } => "reference_not_found",
            Self::ParentNotFound { .. } => "parent_not_found",
            Self::Store(err) => err.code(),
        }
    }
}

impl Display for FootprintError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ModelNotFound(_) => f.write_str(MODEL_NOT_FOUND_MESSAGE),
            Self::MissingParentId => f.write_str(MISSING_PARENT_ID_MESSAGE),
            Self::ReferenceNotFound { .. } => f.write_str(REFERENCE_NOT_FOUND_MESSAGE),
            Self::ParentNotFound { .. } => f.write_str(PARENT_NOT_FOUND_MESSAGE),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for FootprintError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for FootprintError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

/// Order of the parent-record and reference checks for association calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckOrder {
    /// create: reference name, then parent record.
    ReferenceFirst,
    /// find/update/destroy: parent record, then reference name.
    ParentFirst,
}

/// Fully resolved association target.
#[derive(Debug)]
struct Association {
    parent_model: String,
    parent_id: RecordId,
    reference: String,
    target: String,
    cardinality: Cardinality,
}

impl Association {
    fn link(&self) -> LinkRef<'_> {
        LinkRef {
            parent_model: self.parent_model.as_str(),
            parent_id: &self.parent_id,
            reference: self.reference.as_str(),
        }
    }

    /// The store re-checks the parent inside its write transaction; a parent
    /// removed after resolution surfaces as `ParentNotFound`.
    fn store_error(&self, err: RepoError) -> FootprintError {
        match err {
            RepoError::NotFound(id) if id == self.parent_id => FootprintError::ParentNotFound {
                model: self.parent_model.clone(),
                id,
            },
            other => FootprintError::Store(other),
        }
    }
}

/// Returns the target model name of a declared reference.
///
/// `None` when `model` has no name, `reference` is blank, or `reference`
/// is not a relation field of `model`.
pub fn reference_model_name<'m>(model: &'m ModelDef, reference: &str) -> Option<&'m str> {
    if !model.is_defined() || reference.trim().is_empty() {
        return None;
    }
    model.reference(reference).map(|resolved| resolved.target)
}

/// Footprint service facade over a model registry and a record store.
pub struct FootprintService<S: RecordStore> {
    registry: Arc<ModelRegistry>,
    store: S,
}

impl<S: RecordStore> FootprintService<S> {
    pub fn new(registry: Arc<ModelRegistry>, store: S) -> Self {
        Self { registry, store }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Creates one record of `model_name`.
    pub fn create(&self, model_name: &str, attributes: &Attributes) -> FootprintResult<Record> {
        self.observe("create", model_name, || {
            let model = self.resolve_model(model_name)?;
            Ok(self.store.insert_record(&model.name, attributes)?)
        })
    }

    /// Finds records of `model_name`; an empty result is not an error.
    pub fn find(
        &self,
        model_name: &str,
        criteria: &Criteria,
        options: &QueryOptions,
    ) -> FootprintResult<Vec<Record>> {
        self.observe("find", model_name, || {
            let model = self.resolve_model(model_name)?;
            Ok(self.store.find_records(&model.name, criteria, options)?)
        })
    }

    /// Merges `changes` into matching records and returns them.
    pub fn update(
        &self,
        model_name: &str,
        criteria: &Criteria,
        changes: &Attributes,
    ) -> FootprintResult<Vec<Record>> {
        self.observe("update", model_name, || {
            let model = self.resolve_model(model_name)?;
            Ok(self.store.update_records(&model.name, criteria, changes)?)
        })
    }

    /// Removes matching records and returns them.
    pub fn destroy(&self, model_name: &str, criteria: &Criteria) -> FootprintResult<Vec<Record>> {
        self.observe("destroy", model_name, || {
            let model = self.resolve_model(model_name)?;
            Ok(self.store.delete_records(&model.name, criteria)?)
        })
    }

    /// Creates a child record through `reference` of an existing parent.
    ///
    /// # Contract
    /// - Checks, in order: parent model, parent id, reference, parent record.
    /// - Returns the created child record.
    pub fn create_association(
        &self,
        parent_model: &str,
        parent_id: &str,
        reference: &str,
        attributes: &Attributes,
    ) -> FootprintResult<Record> {
        self.observe("create_association", parent_model, || {
            let association = self.resolve_association(
                parent_model,
                parent_id,
                reference,
                CheckOrder::ReferenceFirst,
            )?;
            self.store
                .insert_linked_record(
                    association.link(),
                    association.cardinality,
                    &association.target,
                    attributes,
                )
                .map_err(|err| association.store_error(err))
        })
    }

    /// Finds child records linked to a parent through `reference`.
    ///
    /// # Contract
    /// - Checks, in order: parent model, parent id, parent record, reference.
    pub fn find_association(
        &self,
        parent_model: &str,
        parent_id: &str,
        reference: &str,
        criteria: &Criteria,
        options: &QueryOptions,
    ) -> FootprintResult<Vec<Record>> {
        self.observe("find_association", parent_model, || {
            let association = self.resolve_association(
                parent_model,
                parent_id,
                reference,
                CheckOrder::ParentFirst,
            )?;
            self.store
                .find_linked_records(association.link(), &association.target, criteria, options)
                .map_err(|err| association.store_error(err))
        })
    }

    /// Merges `changes` into linked child records matching `criteria`.
    ///
    /// Same check order as [`Self::find_association`].
    pub fn update_association(
        &self,
        parent_model: &str,
        parent_id: &str,
        reference: &str,
        criteria: &Criteria,
        changes: &Attributes,
    ) -> FootprintResult<Vec<Record>> {
        self.observe("update_association", parent_model, || {
            let association = self.resolve_association(
                parent_model,
                parent_id,
                reference,
                CheckOrder::ParentFirst,
            )?;
            self.store
                .update_linked_records(association.link(), &association.target, criteria, changes)
                .map_err(|err| association.store_error(err))
        })
    }

    /// Removes linked child records matching `criteria` and returns them.
    ///
    /// Same check order as [`Self::find_association`].
    pub fn destroy_association(
        &self,
        parent_model: &str,
        parent_id: &str,
        reference: &str,
        criteria: &Criteria,
    ) -> FootprintResult<Vec<Record>> {
        self.observe("destroy_association", parent_model, || {
            let association = self.resolve_association(
                parent_model,
                parent_id,
                reference,
                CheckOrder::ParentFirst,
            )?;
            self.store
                .delete_linked_records(association.link(), &association.target, criteria)
                .map_err(|err| association.store_error(err))
        })
    }

    fn resolve_model(&self, name: &str) -> FootprintResult<Arc<ModelDef>> {
        self.registry
            .get(name)
            .ok_or_else(|| FootprintError::ModelNotFound(name.to_string()))
    }

    fn resolve_association(
        &self,
        parent_model: &str,
        parent_id: &str,
        reference: &str,
        order: CheckOrder,
    ) -> FootprintResult<Association> {
        let model = self.resolve_model(parent_model)?;
        let parent_id = RecordId::parse(parent_id).ok_or(FootprintError::MissingParentId)?;

        if order == CheckOrder::ParentFirst {
            self.require_parent(&model, &parent_id)?;
        }
        let (target, cardinality) = match model.reference(reference) {
            Some(resolved) => (resolved.target.to_string(), resolved.cardinality),
            None => {
                return Err(FootprintError::ReferenceNotFound {
                    model: model.name.clone(),
                    reference: reference.to_string(),
                });
            }
        };
        if order == CheckOrder::ReferenceFirst {
            self.require_parent(&model, &parent_id)?;
        }

        // Manifests are reference-checked on load; hand-built registries may not be.
        let target = self.resolve_model(&target)?;

        Ok(Association {
            parent_model: model.name.clone(),
            parent_id,
            reference: reference.to_string(),
            target: target.name.clone(),
            cardinality,
        })
    }

    fn require_parent(&self, model: &ModelDef, parent_id: &RecordId) -> FootprintResult<()> {
        match self.store.get_record(&model.name, parent_id)? {
            Some(_) => Ok(()),
            None => Err(FootprintError::ParentNotFound {
                model: model.name.clone(),
                id: parent_id.clone(),
            }),
        }
    }

    fn observe<T: Outcome>(
        &self,
        op: &'static str,
        model: &str,
        run: impl FnOnce() -> FootprintResult<T>,
    ) -> FootprintResult<T> {
        let started_at = Instant::now();
        let result = run();
        match &result {
            Ok(value) => info!(
                "event=footprint_op module=service op={} model={} status=ok records={} duration_ms={}",
                op,
                model,
                value.record_count(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=footprint_op module=service op={} model={} status=error error_code={} duration_ms={}",
                op,
                model,
                err.code(),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }
}

/// Record count reported in operation log events.
trait Outcome {
    fn record_count(&self) -> usize;
}

impl Outcome for Record {
    fn record_count(&self) -> usize {
        1
    }
}

impl Outcome for Vec<Record> {
    fn record_count(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{reference_model_name, Association, FootprintError};
    use crate::model::record::RecordId;
    use crate::model::schema::{Cardinality, FieldDef, ModelDef};
    use crate::repo::record_repo::RepoError;

    fn user_model() -> ModelDef {
        ModelDef::new("User")
            .with_field(FieldDef::attribute("username"))
            .with_field(FieldDef::reference("roles", "Role", Cardinality::Many))
    }

    #[test]
    fn resolution_errors_render_fixed_messages() {
        assert_eq!(
            FootprintError::ModelNotFound("Something".to_string()).message(),
            "No model found"
        );
        assert_eq!(FootprintError::MissingParentId.message(), "No parentId provided");
        assert_eq!(
            FootprintError::ReferenceNotFound {
                model: "User".to_string(),
                reference: "nonExisting".to_string(),
            }
            .message(),
            "No such reference exist"
        );
    }

    #[test]
    fn store_errors_keep_their_own_message_and_code() {
        let err = FootprintError::from(RepoError::InvalidData("bad row".to_string()));
        assert_eq!(err.code(), "invalid_data");
        assert!(err.message().contains("bad row"));
    }

    #[test]
    fn parent_removed_during_linked_write_maps_to_parent_not_found() {
        let association = Association {
            parent_model: "User".to_string(),
            parent_id: RecordId::parse("parent-1").unwrap(),
            reference: "roles".to_string(),
            target: "Role".to_string(),
            cardinality: Cardinality::Many,
        };

        let parent_id = RecordId::parse("parent-1").unwrap();
        let err = association.store_error(RepoError::NotFound(parent_id));
        assert_eq!(err.code(), "parent_not_found");
        assert_eq!(err.message(), "No parent record found");

        let child_id = RecordId::parse("child-9").unwrap();
        let err = association.store_error(RepoError::NotFound(child_id));
        assert_eq!(err.code(), "record_not_found");
    }

    #[test]
    fn reference_model_name_resolves_declared_relation() {
        let user = user_model();
        assert_eq!(reference_model_name(&user, "roles"), Some("Role"));
    }

    #[test]
    fn reference_model_name_rejects_missing_inputs() {
        let user = user_model();

        assert_eq!(reference_model_name(&ModelDef::default(), "roles"), None);
        assert_eq!(reference_model_name(&user, ""), None);
        assert_eq!(reference_model_name(&user, "   "), None);
        assert_eq!(reference_model_name(&user, "username"), None);
        assert_eq!(reference_model_name(&user, "nonExisting"), None);
    }
}
