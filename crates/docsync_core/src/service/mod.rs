//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate catalog, reconciler and repository calls into the
//!   caller-facing document operations.
//! - Map every failure onto one typed error taxonomy.

pub mod document_service;
