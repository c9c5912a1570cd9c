//! Core footprint logic: model registry, record store and the footprint
//! service that resolves models and references before touching storage.

pub mod db;
pub mod logging;
pub mod model;
pub mod registry;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::record::{Attributes, Criteria, QueryOptions, Record, RecordId};
pub use model::schema::{
    Cardinality, FieldDef, FieldKind, ModelDef, ModelValidationError, ReferenceDef,
};
pub use registry::model_registry::{ModelRegistry, RegistryError};
pub use repo::record_repo::{LinkRef, RecordStore, RepoError, RepoResult, SqliteRecordStore};
pub use service::footprint_service::{
    reference_model_name, FootprintError, FootprintResult, FootprintService,
    MISSING_PARENT_ID_MESSAGE, MODEL_NOT_FOUND_MESSAGE, PARENT_NOT_FOUND_MESSAGE,
    REFERENCE_NOT_FOUND_MESSAGE,
};

/// Minimal health-check API for linkage probes.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
