//! Content reconciliation: turns incoming content items into an upsert batch.
//!
//! # Responsibility
//! - Resolve each item's subsection (by name or id) against the document
//!   type definition.
//! - Match resolved subsections to existing cells so updates keep cell ids.
//!
//! # Invariants
//! - Planning is all-or-nothing: one unresolvable item fails the whole batch
//!   before anything is written.
//! - At most one entry per subsection; the last occurrence of a subsection
//!   in the input wins, at the position of its first occurrence.
//! - No I/O happens here.

use crate::model::catalog::{DocumentTypeDefinition, SubsectionId};
use crate::model::document::{ContentCell, ContentCellId, ContentItem, DocumentId, SubsectionRef};
use crate::repo::document_repo::CellUpsert;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// Identifier does not name a subsection of the target document type.
    UnknownSubsection(SubsectionRef),
    /// Name matches subsections in more than one section.
    AmbiguousSubsection(String),
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownSubsection(identifier) => {
                write!(f, "subsection not found in document type: {identifier}")
            }
            Self::AmbiguousSubsection(name) => {
                write!(f, "subsection name matches more than one subsection: {name}")
            }
        }
    }
}

impl Error for ReconcileError {}

/// Lookup of one document type's subsections by id and by name.
pub struct SubsectionIndex<'a> {
    by_id: HashMap<SubsectionId, &'a str>,
    by_name: HashMap<&'a str, Vec<SubsectionId>>,
}

impl<'a> SubsectionIndex<'a> {
    pub fn new(definition: &'a DocumentTypeDefinition) -> Self {
        let mut by_id = HashMap::new();
        let mut by_name: HashMap<&'a str, Vec<SubsectionId>> = HashMap::new();
        for subsection in definition.subsections() {
            by_id.insert(subsection.id, subsection.name.as_str());
            by_name
                .entry(subsection.name.as_str())
                .or_default()
                .push(subsection.id);
        }
        Self { by_id, by_name }
    }

    pub fn resolve(&self, identifier: &SubsectionRef) -> Result<SubsectionId, ReconcileError> {
        match identifier {
            SubsectionRef::Id(id) => {
                if self.by_id.contains_key(id) {
                    Ok(*id)
                } else {
                    Err(ReconcileError::UnknownSubsection(identifier.clone()))
                }
            }
            SubsectionRef::Name(name) => match self.by_name.get(name.trim()).map(Vec::as_slice) {
                Some([id]) => Ok(*id),
                Some([]) | None => Err(ReconcileError::UnknownSubsection(identifier.clone())),
                Some(_) => Err(ReconcileError::AmbiguousSubsection(name.clone())),
            },
        }
    }
}

/// Plans the upsert batch for `items` against a document's current cells.
pub fn plan_upserts<'c>(
    definition: &DocumentTypeDefinition,
    document_id: DocumentId,
    existing_cells: impl IntoIterator<Item = &'c ContentCell>,
    items: &[ContentItem],
) -> Result<Vec<CellUpsert>, ReconcileError> {
    let index = SubsectionIndex::new(definition);

    let mut existing: HashMap<SubsectionId, ContentCellId> = HashMap::new();
    for cell in existing_cells {
        existing.entry(cell.subsection_id).or_insert(cell.id);
    }

    let mut batch: Vec<CellUpsert> = Vec::with_capacity(items.len());
    let mut positions: HashMap<SubsectionId, usize> = HashMap::new();
    for item in items {
        let subsection_id = index.resolve(&item.identifier)?;
        let entry = CellUpsert {
            cell_id: existing.get(&subsection_id).copied(),
            document_id,
            subsection_id,
            content: item.content.clone(),
        };

        match positions.get(&subsection_id) {
            Some(position) => batch[*position] = entry,
            None => {
                positions.insert(subsection_id, batch.len());
                batch.push(entry);
            }
        }
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::{plan_upserts, ReconcileError};
    use crate::model::catalog::{
        DocumentType, DocumentTypeDefinition, Section, SectionDefinition, Subsection,
    };
    use crate::model::document::{ContentCell, ContentItem, DocumentContent, SubsectionRef};
    use uuid::Uuid;

    fn subsection(section_id: Uuid, name: &str, order: i64) -> Subsection {
        Subsection {
            id: Uuid::new_v4(),
            section_id,
            name: name.to_string(),
            order,
            priority: 0,
            content_type: "text".to_string(),
        }
    }

    fn definition(sections: &[(&str, &[&str])]) -> DocumentTypeDefinition {
        let type_id = Uuid::new_v4();
        DocumentTypeDefinition {
            document_type: DocumentType {
                id: type_id,
                name: "business-plan".to_string(),
                created_at: 0,
                updated_at: 0,
            },
            sections: sections
                .iter()
                .enumerate()
                .map(|(order, (name, subsections))| {
                    let section_id = Uuid::new_v4();
                    SectionDefinition {
                        section: Section {
                            id: section_id,
                            document_type_id: type_id,
                            name: name.to_string(),
                            order: order as i64,
                        },
                        subsections: subsections
                            .iter()
                            .enumerate()
                            .map(|(index, sub)| subsection(section_id, sub, index as i64))
                            .collect(),
                    }
                })
                .collect(),
        }
    }

    fn empty_cell(document_id: Uuid, subsection_id: Uuid) -> ContentCell {
        ContentCell {
            id: Uuid::new_v4(),
            document_id,
            subsection_id,
            content: DocumentContent::empty(),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn matched_subsection_carries_existing_cell_id() {
        let def = definition(&[("Overview", &["summary"])]);
        let document_id = Uuid::new_v4();
        let summary_id = def.sections[0].subsections[0].id;
        let cell = empty_cell(document_id, summary_id);

        let batch = plan_upserts(
            &def,
            document_id,
            [&cell],
            &[ContentItem::by_name("summary", DocumentContent::text("Our mission..."))],
        )
        .unwrap();

        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].cell_id, Some(cell.id));
        assert_eq!(batch[0].subsection_id, summary_id);
        assert_eq!(batch[0].content, DocumentContent::text("Our mission..."));
    }

    #[test]
    fn unmatched_subsection_plans_insert() {
        let def = definition(&[("Overview", &["summary", "market"])]);
        let document_id = Uuid::new_v4();
        let summary = empty_cell(document_id, def.sections[0].subsections[0].id);

        let batch = plan_upserts(
            &def,
            document_id,
            [&summary],
            &[ContentItem::by_name("market", DocumentContent::text("B2B"))],
        )
        .unwrap();

        assert_eq!(batch[0].cell_id, None);
        assert_eq!(batch[0].subsection_id, def.sections[0].subsections[1].id);
    }

    #[test]
    fn duplicate_identifiers_keep_last_content_at_first_position() {
        let def = definition(&[("Overview", &["summary", "market"])]);
        let document_id = Uuid::new_v4();
        let summary_id = def.sections[0].subsections[0].id;

        let batch = plan_upserts(
            &def,
            document_id,
            std::iter::empty(),
            &[
                ContentItem::by_name("summary", DocumentContent::text("A")),
                ContentItem::by_name("market", DocumentContent::text("M")),
                ContentItem::by_id(summary_id, DocumentContent::text("B")),
            ],
        )
        .unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].subsection_id, summary_id);
        assert_eq!(batch[0].content, DocumentContent::text("B"));
        assert_eq!(batch[1].content, DocumentContent::text("M"));
    }

    #[test]
    fn unknown_name_or_foreign_id_fails_whole_batch() {
        let def = definition(&[("Overview", &["summary"])]);
        let other = definition(&[("Other", &["summary"])]);
        let document_id = Uuid::new_v4();

        let err = plan_upserts(
            &def,
            document_id,
            std::iter::empty(),
            &[
                ContentItem::by_name("summary", DocumentContent::text("ok")),
                ContentItem::by_name("missing", DocumentContent::text("x")),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ReconcileError::UnknownSubsection(SubsectionRef::Name("missing".to_string()))
        );

        let foreign_id = other.sections[0].subsections[0].id;
        let err = plan_upserts(
            &def,
            document_id,
            std::iter::empty(),
            &[ContentItem::by_id(foreign_id, DocumentContent::text("x"))],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ReconcileError::UnknownSubsection(SubsectionRef::Id(foreign_id))
        );
    }

    #[test]
    fn name_shared_by_two_sections_is_ambiguous() {
        let def = definition(&[("Overview", &["notes"]), ("Finance", &["notes"])]);

        let err = plan_upserts(
            &def,
            Uuid::new_v4(),
            std::iter::empty(),
            &[ContentItem::by_name("notes", DocumentContent::text("x"))],
        )
        .unwrap_err();
        assert_eq!(err, ReconcileError::AmbiguousSubsection("notes".to_string()));

        let by_id = def.sections[1].subsections[0].id;
        let batch = plan_upserts(
            &def,
            Uuid::new_v4(),
            std::iter::empty(),
            &[ContentItem::by_id(by_id, DocumentContent::text("x"))],
        )
        .unwrap();
        assert_eq!(batch[0].subsection_id, by_id);
    }
}
