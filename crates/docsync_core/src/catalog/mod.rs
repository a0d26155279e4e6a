//! Schema catalog: cached lookup of document type definitions.
//!
//! # Responsibility
//! - Resolve a document type (by name or id) to its ordered sections and
//!   subsections.
//! - Serve repeated lookups from an injected, bounded TTL cache.
//! - Import administrative catalog seeds.
//!
//! # Invariants
//! - A miss is never cached; unknown types are re-queried every time.
//! - Seeds are validated before the first write.

pub mod cache;

use crate::config::CatalogSeed;
use crate::model::catalog::{
    DocumentTypeDefinition, DocumentTypeId, DocumentTypeRef, SectionDefinition,
};
use crate::repo::catalog_repo::{CatalogRepository, RepoError};
use cache::CatalogCache;
use log::{debug, info};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Errors from catalog lookups and seeding.
#[derive(Debug)]
pub enum CatalogError {
    DocumentTypeNotFound(DocumentTypeRef),
    InvalidSeed(String),
    Repo(RepoError),
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DocumentTypeNotFound(lookup) => write!(f, "document type not found: {lookup}"),
            Self::InvalidSeed(message) => write!(f, "invalid catalog seed: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CatalogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CatalogError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Outcome of a seed import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub created: Vec<String>,
    /// Names that already existed and were left untouched.
    pub skipped: Vec<String>,
}

pub struct SchemaCatalog<R: CatalogRepository> {
    repo: R,
    cache: CatalogCache,
}

impl<R: CatalogRepository> SchemaCatalog<R> {
    pub fn new(repo: R, cache: CatalogCache) -> Self {
        Self { repo, cache }
    }

    pub fn cache(&self) -> &CatalogCache {
        &self.cache
    }

    /// Resolves a document type with its sections and subsections.
    pub fn resolve_document_type(
        &self,
        lookup: &DocumentTypeRef,
    ) -> Result<Arc<DocumentTypeDefinition>, CatalogError> {
        let lookup = &lookup.normalized();
        if let Some(hit) = self.cache.get(lookup) {
            debug!("event=catalog_lookup module=catalog status=ok cache=hit lookup={lookup}");
            return Ok(hit);
        }

        let document_type = self
            .repo
            .find_document_type(lookup)?
            .ok_or_else(|| CatalogError::DocumentTypeNotFound(lookup.clone()))?;
        let sections = self.repo.list_sections(document_type.id)?;
        let definition = Arc::new(DocumentTypeDefinition {
            document_type,
            sections,
        });

        self.cache.insert(lookup, Arc::clone(&definition));
        debug!(
            "event=catalog_lookup module=catalog status=ok cache=miss lookup={lookup} subsections={}",
            definition.subsection_count()
        );
        Ok(definition)
    }

    /// Lists sections of one type straight from storage.
    pub fn list_sections(
        &self,
        document_type_id: DocumentTypeId,
    ) -> Result<Vec<SectionDefinition>, CatalogError> {
        Ok(self.repo.list_sections(document_type_id)?)
    }

    pub fn invalidate(&self, lookup: &DocumentTypeRef) {
        self.cache.invalidate(&lookup.normalized());
    }

    /// Imports document types that do not exist yet; existing names are
    /// skipped, never merged.
    pub fn apply_seed(&self, seed: &CatalogSeed) -> Result<SeedReport, CatalogError> {
        validate_seed(seed)?;

        let mut report = SeedReport::default();
        for type_seed in &seed.document_types {
            let name = type_seed.name.trim();
            let lookup = DocumentTypeRef::name(name);
            if self.repo.find_document_type(&lookup)?.is_some() {
                report.skipped.push(name.to_string());
                continue;
            }

            self.repo.insert_type_seed(type_seed)?;
            self.cache.invalidate(&lookup);
            report.created.push(name.to_string());
        }

        info!(
            "event=catalog_seed module=catalog status=ok created={} skipped={}",
            report.created.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}

fn validate_seed(seed: &CatalogSeed) -> Result<(), CatalogError> {
    let mut type_names = HashSet::new();
    for type_seed in &seed.document_types {
        let type_name = type_seed.name.trim();
        if type_name.is_empty() {
            return Err(CatalogError::InvalidSeed(
                "document type name must not be blank".to_string(),
            ));
        }
        if !type_names.insert(type_name) {
            return Err(CatalogError::InvalidSeed(format!(
                "document type `{type_name}` is declared twice"
            )));
        }

        let mut subsection_names = HashSet::new();
        for section in &type_seed.sections {
            if section.name.trim().is_empty() {
                return Err(CatalogError::InvalidSeed(format!(
                    "section name must not be blank in `{type_name}`"
                )));
            }
            for subsection in &section.subsections {
                let subsection_name = subsection.name.trim();
                if subsection_name.is_empty() {
                    return Err(CatalogError::InvalidSeed(format!(
                        "subsection name must not be blank in `{type_name}`"
                    )));
                }
                // Names address subsections across the whole type.
                if !subsection_names.insert(subsection_name) {
                    return Err(CatalogError::InvalidSeed(format!(
                        "subsection `{subsection_name}` is declared twice in `{type_name}`"
                    )));
                }
            }
        }
    }
    Ok(())
}
