//! Bounded, time-expiring cache of document type definitions.
//!
//! # Invariants
//! - Entries are keyed by the lookup used to fetch them (`name:` / `id:`).
//! - A cached definition is served until it expires or is invalidated;
//!   catalog edits are not observed before that.
//! - Clones share the same entries.

use crate::model::catalog::{DocumentTypeDefinition, DocumentTypeRef};
use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_CACHE_CAPACITY: u64 = 12;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct CatalogCache {
    inner: Cache<String, Arc<DocumentTypeDefinition>>,
}

impl CatalogCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub fn get(&self, lookup: &DocumentTypeRef) -> Option<Arc<DocumentTypeDefinition>> {
        self.inner.get(&lookup.cache_key())
    }

    pub fn insert(&self, lookup: &DocumentTypeRef, definition: Arc<DocumentTypeDefinition>) {
        self.inner.insert(lookup.cache_key(), definition);
    }

    /// Drops one lookup key.
    pub fn invalidate(&self, lookup: &DocumentTypeRef) {
        self.inner.invalidate(&lookup.cache_key());
    }

    /// Drops every key that could serve this definition.
    pub fn invalidate_definition(&self, definition: &DocumentTypeDefinition) {
        self.invalidate(&DocumentTypeRef::Id(definition.document_type.id));
        self.invalidate(&DocumentTypeRef::Name(
            definition.document_type.name.clone(),
        ));
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL)
    }
}
