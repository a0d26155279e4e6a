//! Catalog domain model: document types, sections and subsections.
//!
//! # Responsibility
//! - Describe the named content slots a document type requires.
//! - Provide the lookup key used to address a document type.
//!
//! # Invariants
//! - `DocumentType.name` is unique across the catalog.
//! - Sections and subsections are ordered by `order`; equal values are
//!   broken by id so listings stay deterministic.
//! - Catalog rows are read-only from the reconciliation path.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type DocumentTypeId = Uuid;
pub type SectionId = Uuid;
pub type SubsectionId = Uuid;

/// Named template describing the sections a class of document requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentType {
    pub id: DocumentTypeId,
    pub name: String,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

/// Ordered structural unit of a document type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub document_type_id: DocumentTypeId,
    pub name: String,
    /// Display/processing sequence key. Not unique.
    pub order: i64,
}

/// Smallest addressable content slot of a document type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subsection {
    pub id: SubsectionId,
    pub section_id: SectionId,
    pub name: String,
    /// Sort key within the parent section. Not unique.
    pub order: i64,
    /// Weight carried for callers; not interpreted here.
    pub priority: i64,
    /// Free-form tag describing the expected content.
    pub content_type: String,
}

/// One section together with its ordered subsections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDefinition {
    #[serde(flatten)]
    pub section: Section,
    pub subsections: Vec<Subsection>,
}

/// Full definition of a document type as served by the schema catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTypeDefinition {
    #[serde(flatten)]
    pub document_type: DocumentType,
    pub sections: Vec<SectionDefinition>,
}

impl DocumentTypeDefinition {
    /// Iterates subsections in section order, then subsection order.
    pub fn subsections(&self) -> impl Iterator<Item = &Subsection> {
        self.sections
            .iter()
            .flat_map(|section| section.subsections.iter())
    }

    /// Number of content slots a fully materialized document holds.
    pub fn subsection_count(&self) -> usize {
        self.sections
            .iter()
            .map(|section| section.subsections.len())
            .sum()
    }
}

/// Address of a document type: by unique name or by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentTypeRef {
    Name(String),
    Id(DocumentTypeId),
}

impl DocumentTypeRef {
    /// Name lookup; surrounding whitespace is not part of a type name.
    pub fn name(value: impl AsRef<str>) -> Self {
        Self::Name(value.as_ref().trim().to_string())
    }

    /// Parses user input: a UUID addresses by id, anything else by name.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        match Uuid::parse_str(trimmed) {
            Ok(id) => Self::Id(id),
            Err(_) => Self::name(trimmed),
        }
    }

    /// Same lookup with the name trimmed, as stored and cached.
    pub fn normalized(&self) -> Self {
        match self {
            Self::Name(name) => Self::name(name),
            Self::Id(id) => Self::Id(*id),
        }
    }

    /// Cache key for this lookup.
    pub fn cache_key(&self) -> String {
        match self {
            Self::Name(name) => format!("name:{name}"),
            Self::Id(id) => format!("id:{id}"),
        }
    }
}

impl Display for DocumentTypeRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DocumentTypeRef;
    use uuid::Uuid;

    #[test]
    fn parse_prefers_uuid_and_falls_back_to_name() {
        let id = Uuid::new_v4();
        assert_eq!(
            DocumentTypeRef::parse(&id.to_string()),
            DocumentTypeRef::Id(id)
        );
        assert_eq!(
            DocumentTypeRef::parse(" business-plan "),
            DocumentTypeRef::Name("business-plan".to_string())
        );
    }

    #[test]
    fn names_are_trimmed_on_construction_and_normalization() {
        assert_eq!(
            DocumentTypeRef::name("  pitch "),
            DocumentTypeRef::Name("pitch".to_string())
        );
        let raw = DocumentTypeRef::Name(" pitch\t".to_string());
        assert_eq!(raw.normalized().cache_key(), "name:pitch");
    }

    #[test]
    fn cache_keys_do_not_collide_between_name_and_id() {
        let id = Uuid::new_v4();
        let by_id = DocumentTypeRef::Id(id).cache_key();
        let by_name = DocumentTypeRef::Name(id.to_string()).cache_key();
        assert_ne!(by_id, by_name);
    }
}
