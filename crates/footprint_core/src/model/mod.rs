//! Model schemas and record shapes.
//!
//! # Responsibility
//! - Define model declarations with explicit relation fields.
//! - Define the generic record envelope every model persists as.
//!
//! # Invariants
//! - Every record is identified by a non-blank `RecordId`.
//! - Relations are declared per field; nothing is inferred at runtime.

pub mod record;
pub mod schema;
