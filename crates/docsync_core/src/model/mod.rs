//! Domain model for document templates and their materialized documents.
//!
//! # Responsibility
//! - Define the catalog shapes (type → section → subsection).
//! - Define documents, content cells and the canonical content payload.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Nothing in this subsystem is ever hard-deleted.

pub mod catalog;
pub mod document;
