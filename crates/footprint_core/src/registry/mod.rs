//! Model registry.
//!
//! # Responsibility
//! - Map model names to validated model declarations.
//! - Load declarations from a JSON schema manifest at startup.
//!
//! # Invariants
//! - Lookups are exact and case-sensitive.
//! - The registry is not mutated once shared with services.

pub mod model_registry;
