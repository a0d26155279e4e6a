//! Document store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist projects, documents and their content cells.
//! - Assemble the annotated contents read model in display order.
//! - Apply upsert batches produced by the reconciler.
//!
//! # Invariants
//! - Document creation is an atomic insert-or-ignore on
//!   `(project_id, document_type_id)`; empty cells are inserted in the same
//!   transaction, so concurrent first writers observe one fully
//!   materialized document.
//! - Cell writes are atomic insert-or-update on `(document_id,
//!   subsection_id)`; a subsection never gets a second cell.
//! - Batches run in one `IMMEDIATE` transaction and are applied in order.

use crate::model::catalog::{DocumentTypeId, Subsection, SubsectionId};
use crate::model::document::{
    AnnotatedCell, ContentCell, ContentCellId, Document, DocumentContent, DocumentId, Project,
    ProjectId,
};
use crate::repo::catalog_repo::{ensure_schema_ready, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::BTreeSet;
use uuid::Uuid;

const DOCUMENT_SELECT_SQL: &str = "SELECT
    id,
    project_id,
    document_type_id,
    title,
    published,
    created_at,
    updated_at
FROM documents";

/// One entry of an upsert batch.
///
/// `cell_id` is the existing cell's id when the reconciler matched one;
/// `None` means a new cell with a fresh id.
#[derive(Debug, Clone, PartialEq)]
pub struct CellUpsert {
    pub cell_id: Option<ContentCellId>,
    pub document_id: DocumentId,
    pub subsection_id: SubsectionId,
    pub content: DocumentContent,
}

/// Outcome of a create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedDocument {
    pub document: Document,
    /// `false` when the pair already had a document and nothing was written.
    pub created: bool,
}

/// Repository interface for the document store.
pub trait DocumentRepository {
    /// Creates one project row.
    fn insert_project(&self, id: ProjectId, title: &str) -> RepoResult<Project>;
    /// Loads one project by id.
    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>>;
    /// Cheap read proving the store answers queries.
    fn health_check(&self) -> RepoResult<()>;
    /// Loads the document of one project for one type.
    fn get_document(
        &self,
        project_id: ProjectId,
        document_type_id: DocumentTypeId,
    ) -> RepoResult<Option<Document>>;
    /// Creates the document for a pair, with one empty cell per subsection.
    ///
    /// Returns the existing document untouched when the pair already has one.
    fn create_document(
        &self,
        project_id: ProjectId,
        document_type_id: DocumentTypeId,
        title: &str,
        subsections: &[SubsectionId],
    ) -> RepoResult<CreatedDocument>;
    /// Inserts empty cells for subsections that have none yet.
    ///
    /// Returns how many cells were inserted; repeat calls insert nothing.
    fn materialize_empty_cells(
        &self,
        document_id: DocumentId,
        subsections: &[SubsectionId],
    ) -> RepoResult<usize>;
    /// Loads all cells of one document, annotated with their subsection.
    fn get_contents(&self, document_id: DocumentId) -> RepoResult<Vec<AnnotatedCell>>;
    /// Applies one upsert batch in array order.
    fn upsert_cells(&self, batch: &[CellUpsert]) -> RepoResult<()>;
}

/// SQLite-backed document store.
pub struct SqliteDocumentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl DocumentRepository for SqliteDocumentRepository<'_> {
    fn insert_project(&self, id: ProjectId, title: &str) -> RepoResult<Project> {
        self.conn.execute(
            "INSERT INTO projects (id, title) VALUES (?1, ?2);",
            params![id.to_string(), title],
        )?;
        self.get_project(id)?.ok_or(RepoError::NotFound {
            entity: "project",
            id,
        })
    }

    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, title, created_at, updated_at FROM projects WHERE id = ?1;",
                [id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>("id")?,
                        row.get::<_, String>("title")?,
                        row.get::<_, i64>("created_at")?,
                        row.get::<_, i64>("updated_at")?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, title, created_at, updated_at)| {
            Ok(Project {
                id: parse_uuid(&id, "projects.id")?,
                title,
                created_at,
                updated_at,
            })
        })
        .transpose()
    }

    fn health_check(&self) -> RepoResult<()> {
        self.conn
            .query_row("SELECT COUNT(*) FROM document_types;", [], |row| {
                row.get::<_, i64>(0)
            })?;
        Ok(())
    }

    fn get_document(
        &self,
        project_id: ProjectId,
        document_type_id: DocumentTypeId,
    ) -> RepoResult<Option<Document>> {
        load_document(self.conn, project_id, document_type_id)
    }

    fn create_document(
        &self,
        project_id: ProjectId,
        document_type_id: DocumentTypeId,
        title: &str,
        subsections: &[SubsectionId],
    ) -> RepoResult<CreatedDocument> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let inserted = tx.execute(
            "INSERT INTO documents (id, project_id, document_type_id, title)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(project_id, document_type_id) DO NOTHING;",
            params![
                Uuid::new_v4().to_string(),
                project_id.to_string(),
                document_type_id.to_string(),
                title,
            ],
        )?;

        let document = load_document(&tx, project_id, document_type_id)?.ok_or_else(|| {
            RepoError::InvalidData(format!(
                "document for project {project_id} and type {document_type_id} vanished after insert"
            ))
        })?;

        let created = inserted == 1;
        if created {
            insert_empty_cells(&tx, document.id, subsections)?;
        }
        tx.commit()?;

        Ok(CreatedDocument { document, created })
    }

    fn materialize_empty_cells(
        &self,
        document_id: DocumentId,
        subsections: &[SubsectionId],
    ) -> RepoResult<usize> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let inserted = insert_empty_cells(&tx, document_id, subsections)?;
        tx.commit()?;
        Ok(inserted)
    }

    fn get_contents(&self, document_id: DocumentId) -> RepoResult<Vec<AnnotatedCell>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                c.id AS id,
                c.document_id AS document_id,
                c.subsection_id AS subsection_id,
                c.content_kind AS content_kind,
                c.content AS content,
                c.created_at AS created_at,
                c.updated_at AS updated_at,
                s.name AS section_name,
                sub.section_id AS sub_section_id,
                sub.name AS sub_name,
                sub.sort_order AS sub_order,
                sub.priority AS sub_priority,
                sub.content_type AS sub_content_type
             FROM document_content c
             INNER JOIN document_subsections sub ON sub.id = c.subsection_id
             INNER JOIN document_sections s ON s.id = sub.section_id
             WHERE c.document_id = ?1
             ORDER BY
                s.sort_order ASC,
                s.id ASC,
                sub.sort_order ASC,
                sub.id ASC,
                c.created_at ASC,
                c.id ASC;",
        )?;

        let mut rows = stmt.query([document_id.to_string()])?;
        let mut cells = Vec::new();
        while let Some(row) = rows.next()? {
            cells.push(parse_annotated_cell_row(row)?);
        }
        Ok(cells)
    }

    fn upsert_cells(&self, batch: &[CellUpsert]) -> RepoResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut touched_documents = BTreeSet::new();
        for entry in batch {
            let encoded = encode_content(&entry.content)?;
            tx.execute(
                "INSERT INTO document_content (
                    id,
                    document_id,
                    subsection_id,
                    content_kind,
                    content
                ) VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(document_id, subsection_id) DO UPDATE SET
                    content_kind = excluded.content_kind,
                    content = excluded.content,
                    updated_at = (strftime('%s', 'now') * 1000);",
                params![
                    entry.cell_id.unwrap_or_else(Uuid::new_v4).to_string(),
                    entry.document_id.to_string(),
                    entry.subsection_id.to_string(),
                    entry.content.kind_str(),
                    encoded,
                ],
            )?;
            touched_documents.insert(entry.document_id);
        }

        for document_id in touched_documents {
            tx.execute(
                "UPDATE documents
                 SET updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;",
                [document_id.to_string()],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

fn load_document(
    conn: &Connection,
    project_id: ProjectId,
    document_type_id: DocumentTypeId,
) -> RepoResult<Option<Document>> {
    let mut stmt = conn.prepare(&format!(
        "{DOCUMENT_SELECT_SQL}
         WHERE project_id = ?1
           AND document_type_id = ?2;"
    ))?;
    let mut rows = stmt.query(params![
        project_id.to_string(),
        document_type_id.to_string()
    ])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_document_row(row)?));
    }
    Ok(None)
}

fn insert_empty_cells(
    conn: &Connection,
    document_id: DocumentId,
    subsections: &[SubsectionId],
) -> RepoResult<usize> {
    let mut inserted = 0;
    for subsection_id in subsections {
        inserted += conn.execute(
            "INSERT INTO document_content (
                id,
                document_id,
                subsection_id,
                content_kind,
                content
            ) VALUES (?1, ?2, ?3, 'text', '')
            ON CONFLICT(document_id, subsection_id) DO NOTHING;",
            params![
                Uuid::new_v4().to_string(),
                document_id.to_string(),
                subsection_id.to_string(),
            ],
        )?;
    }
    Ok(inserted)
}

fn parse_document_row(row: &Row<'_>) -> RepoResult<Document> {
    let id: String = row.get("id")?;
    let project_id: String = row.get("project_id")?;
    let document_type_id: String = row.get("document_type_id")?;
    let published = match row.get::<_, i64>("published")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid published value `{other}` in documents.published"
            )));
        }
    };

    Ok(Document {
        id: parse_uuid(&id, "documents.id")?,
        project_id: parse_uuid(&project_id, "documents.project_id")?,
        document_type_id: parse_uuid(&document_type_id, "documents.document_type_id")?,
        title: row.get("title")?,
        published,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_annotated_cell_row(row: &Row<'_>) -> RepoResult<AnnotatedCell> {
    let id: String = row.get("id")?;
    let document_id: String = row.get("document_id")?;
    let subsection_id: String = row.get("subsection_id")?;
    let section_id: String = row.get("sub_section_id")?;
    let kind: String = row.get("content_kind")?;
    let raw_content: String = row.get("content")?;

    let subsection_id = parse_uuid(&subsection_id, "document_content.subsection_id")?;
    let cell = ContentCell {
        id: parse_uuid(&id, "document_content.id")?,
        document_id: parse_uuid(&document_id, "document_content.document_id")?,
        subsection_id,
        content: decode_content(&kind, raw_content)?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };

    Ok(AnnotatedCell {
        cell,
        section_name: row.get("section_name")?,
        subsection: Subsection {
            id: subsection_id,
            section_id: parse_uuid(&section_id, "document_subsections.section_id")?,
            name: row.get("sub_name")?,
            order: row.get("sub_order")?,
            priority: row.get("sub_priority")?,
            content_type: row.get("sub_content_type")?,
        },
    })
}

fn encode_content(content: &DocumentContent) -> RepoResult<String> {
    match content {
        DocumentContent::Text(value) => Ok(value.clone()),
        DocumentContent::Structured(value) => serde_json::to_string(value)
            .map_err(|err| RepoError::InvalidData(format!("unencodable structured content: {err}"))),
    }
}

fn decode_content(kind: &str, raw: String) -> RepoResult<DocumentContent> {
    match kind {
        "text" => Ok(DocumentContent::Text(raw)),
        "structured" => {
            let value: serde_json::Value = serde_json::from_str(&raw).map_err(|err| {
                RepoError::InvalidData(format!(
                    "invalid structured json in document_content.content: {err}"
                ))
            })?;
            let content = DocumentContent::Structured(value);
            content.validate().map_err(|err| {
                RepoError::InvalidData(format!("document_content.content: {err}"))
            })?;
            Ok(content)
        }
        other => Err(RepoError::InvalidData(format!(
            "invalid content kind `{other}` in document_content.content_kind"
        ))),
    }
}
