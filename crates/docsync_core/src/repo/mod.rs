//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from catalog/service orchestration.
//!
//! # Invariants
//! - Repository APIs return `Option` for absent rows and reserve
//!   `RepoError::NotFound` for writes that address a missing row.

pub mod catalog_repo;
pub mod document_repo;
