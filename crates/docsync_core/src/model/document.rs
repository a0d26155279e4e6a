//! Document domain model: projects, documents and content cells.
//!
//! # Responsibility
//! - Define the per-project document and its per-subsection content cells.
//! - Define the canonical content payload and caller-facing update items.
//!
//! # Invariants
//! - At most one `Document` exists per `(project_id, document_type_id)`.
//! - A materialized document holds exactly one `ContentCell` per subsection
//!   of its type; cells start as `DocumentContent::empty()`.
//! - Structured content is always a JSON object or array.

use crate::model::catalog::{DocumentTypeId, Subsection, SubsectionId};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type ProjectId = Uuid;
pub type DocumentId = Uuid;
pub type ContentCellId = Uuid;

/// Owner of documents. Created out-of-band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One concrete document of a given type for a given project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub project_id: ProjectId,
    pub document_type_id: DocumentTypeId,
    pub title: String,
    pub published: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Canonical content payload, serialized as `{"kind": ..., "value": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DocumentContent {
    /// Plain or markdown text.
    Text(String),
    /// JSON object or array.
    Structured(serde_json::Value),
}

impl DocumentContent {
    /// Placeholder stored in freshly materialized cells.
    pub fn empty() -> Self {
        Self::Text(String::new())
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Builds structured content, rejecting scalar JSON values.
    pub fn structured(value: serde_json::Value) -> Result<Self, ContentValidationError> {
        let content = Self::Structured(value);
        content.validate()?;
        Ok(content)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(value) => value.is_empty(),
            Self::Structured(serde_json::Value::Object(map)) => map.is_empty(),
            Self::Structured(serde_json::Value::Array(items)) => items.is_empty(),
            Self::Structured(_) => false,
        }
    }

    /// Storage tag written to `document_content.content_kind`.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Structured(_) => "structured",
        }
    }

    pub fn validate(&self) -> Result<(), ContentValidationError> {
        match self {
            Self::Text(_) => Ok(()),
            Self::Structured(serde_json::Value::Object(_))
            | Self::Structured(serde_json::Value::Array(_)) => Ok(()),
            Self::Structured(_) => Err(ContentValidationError::StructuredNotContainer),
        }
    }
}

impl Default for DocumentContent {
    fn default() -> Self {
        Self::empty()
    }
}

/// Stored content value for one subsection within one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentCell {
    pub id: ContentCellId,
    pub document_id: DocumentId,
    pub subsection_id: SubsectionId,
    pub content: DocumentContent,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Content cell joined with the subsection it fills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedCell {
    #[serde(flatten)]
    pub cell: ContentCell,
    pub section_name: String,
    pub subsection: Subsection,
}

/// Read model: one document with all of its cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentContents {
    #[serde(flatten)]
    pub document: Document,
    /// Ordered by section order, then subsection order.
    pub cells: Vec<AnnotatedCell>,
}

impl DocumentContents {
    /// Finds the cell filling the named subsection.
    pub fn cell_for(&self, subsection_name: &str) -> Option<&AnnotatedCell> {
        self.cells
            .iter()
            .find(|entry| entry.subsection.name == subsection_name)
    }
}

/// Target of an incoming content update.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubsectionRef {
    Name(String),
    Id(SubsectionId),
}

impl Display for SubsectionRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}

/// One `{identifier, content}` pair submitted by a caller.
///
/// Wire shape: `{"subsection_name": "summary", "content": {"kind": "text",
/// "value": "..."}}` or the same with `subsection_id`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawContentItem")]
pub struct ContentItem {
    pub identifier: SubsectionRef,
    pub content: DocumentContent,
}

impl ContentItem {
    pub fn by_name(name: impl Into<String>, content: DocumentContent) -> Self {
        Self {
            identifier: SubsectionRef::Name(name.into()),
            content,
        }
    }

    pub fn by_id(id: SubsectionId, content: DocumentContent) -> Self {
        Self {
            identifier: SubsectionRef::Id(id),
            content,
        }
    }

    pub fn validate(&self) -> Result<(), ContentValidationError> {
        if let SubsectionRef::Name(name) = &self.identifier {
            if name.trim().is_empty() {
                return Err(ContentValidationError::BlankSubsectionName);
            }
        }
        self.content.validate()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawContentItem {
    #[serde(default)]
    subsection_name: Option<String>,
    #[serde(default)]
    subsection_id: Option<SubsectionId>,
    content: DocumentContent,
}

impl TryFrom<RawContentItem> for ContentItem {
    type Error = ContentValidationError;

    fn try_from(raw: RawContentItem) -> Result<Self, Self::Error> {
        let identifier = match (raw.subsection_name, raw.subsection_id) {
            (Some(name), None) => SubsectionRef::Name(name),
            (None, Some(id)) => SubsectionRef::Id(id),
            (None, None) => return Err(ContentValidationError::MissingIdentifier),
            (Some(_), Some(_)) => return Err(ContentValidationError::ConflictingIdentifier),
        };
        let item = Self {
            identifier,
            content: raw.content,
        };
        item.validate()?;
        Ok(item)
    }
}

/// Malformed caller input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentValidationError {
    BlankSubsectionName,
    MissingIdentifier,
    ConflictingIdentifier,
    StructuredNotContainer,
}

impl Display for ContentValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankSubsectionName => write!(f, "subsection name must not be blank"),
            Self::MissingIdentifier => {
                write!(f, "content item needs `subsection_name` or `subsection_id`")
            }
            Self::ConflictingIdentifier => write!(
                f,
                "content item must not set both `subsection_name` and `subsection_id`"
            ),
            Self::StructuredNotContainer => {
                write!(f, "structured content must be a JSON object or array")
            }
        }
    }
}

impl Error for ContentValidationError {}

#[cfg(test)]
mod tests {
    use super::{ContentItem, ContentValidationError, DocumentContent, SubsectionRef};
    use serde_json::json;

    #[test]
    fn content_serializes_with_kind_tag() {
        let text = serde_json::to_value(DocumentContent::text("Our mission")).unwrap();
        assert_eq!(text, json!({"kind": "text", "value": "Our mission"}));

        let structured =
            serde_json::to_value(DocumentContent::structured(json!({"rows": [1, 2]})).unwrap())
                .unwrap();
        assert_eq!(
            structured,
            json!({"kind": "structured", "value": {"rows": [1, 2]}})
        );
    }

    #[test]
    fn structured_content_rejects_scalars() {
        let err = DocumentContent::structured(json!(42)).unwrap_err();
        assert_eq!(err, ContentValidationError::StructuredNotContainer);
    }

    #[test]
    fn content_item_parses_name_or_id() {
        let item: ContentItem = serde_json::from_value(json!({
            "subsection_name": "summary",
            "content": {"kind": "text", "value": "A"}
        }))
        .unwrap();
        assert_eq!(item.identifier, SubsectionRef::Name("summary".to_string()));

        let id = uuid::Uuid::new_v4();
        let item: ContentItem = serde_json::from_value(json!({
            "subsection_id": id,
            "content": {"kind": "structured", "value": ["x"]}
        }))
        .unwrap();
        assert_eq!(item.identifier, SubsectionRef::Id(id));
    }

    #[test]
    fn content_item_rejects_missing_blank_or_double_identifier() {
        let missing = serde_json::from_value::<ContentItem>(json!({
            "content": {"kind": "text", "value": "A"}
        }));
        assert!(missing.is_err());

        let blank = serde_json::from_value::<ContentItem>(json!({
            "subsection_name": "   ",
            "content": {"kind": "text", "value": "A"}
        }));
        assert!(blank.is_err());

        let both = serde_json::from_value::<ContentItem>(json!({
            "subsection_name": "summary",
            "subsection_id": uuid::Uuid::new_v4(),
            "content": {"kind": "text", "value": "A"}
        }));
        assert!(both.is_err());
    }

    #[test]
    fn empty_content_is_blank_text() {
        assert!(DocumentContent::empty().is_empty());
        assert_eq!(DocumentContent::empty().kind_str(), "text");
        assert!(!DocumentContent::text("x").is_empty());
    }
}
