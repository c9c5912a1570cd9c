//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the record store driver contract used by services.
//! - Isolate SQLite query details from footprint orchestration.
//!
//! # Invariants
//! - The store knows nothing about the model registry; callers resolve
//!   models and references before delegating.
//! - Store APIs return semantic errors (`NotFound`, `InvalidData`) in
//!   addition to DB transport errors.

pub mod record_repo;
