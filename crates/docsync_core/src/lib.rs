//! Core domain logic for docsync.
//! Keeps per-project documents in sync with their document type's content
//! slots and applies partial content updates.

pub mod catalog;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod reconcile;
pub mod repo;
pub mod service;

pub use catalog::cache::CatalogCache;
pub use catalog::{CatalogError, SchemaCatalog, SeedReport};
pub use config::{
    load_catalog_seed, load_config, AppConfig, CatalogSeed, ConfigError, DuplicateCreatePolicy,
};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::catalog::{
    DocumentType, DocumentTypeDefinition, DocumentTypeId, DocumentTypeRef, Section,
    SectionDefinition, SectionId, Subsection, SubsectionId,
};
pub use model::document::{
    AnnotatedCell, ContentCell, ContentCellId, ContentItem, ContentValidationError, Document,
    DocumentContent, DocumentContents, DocumentId, Project, ProjectId, SubsectionRef,
};
pub use reconcile::{plan_upserts, ReconcileError};
pub use repo::catalog_repo::{
    CatalogRepository, NewSubsection, RepoError, RepoResult, SqliteCatalogRepository,
};
pub use repo::document_repo::{
    CellUpsert, CreatedDocument, DocumentRepository, SqliteDocumentRepository,
};
pub use service::document_service::{DocumentService, ErrorKind, ServiceError, ServiceResult};

/// Minimal liveness check for wiring.
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
