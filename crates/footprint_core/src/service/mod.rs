//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate registry resolution and store calls into use-case APIs.
//! - Keep routing/transport layers decoupled from storage details.

pub mod footprint_service;
