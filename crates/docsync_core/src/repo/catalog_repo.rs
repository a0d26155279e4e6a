//! Catalog repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Look up document types by name or id.
//! - Load a type's sections with their subsections in display order.
//! - Provide administrative inserts used by seeding; a seeded type is
//!   written in one transaction.
//!
//! # Invariants
//! - Listings are deterministic: `sort_order ASC, id ASC` at both levels.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::config::DocumentTypeSeed;
use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::catalog::{
    DocumentType, DocumentTypeId, DocumentTypeRef, Section, SectionDefinition, SectionId,
    Subsection,
};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const REQUIRED_TABLES: &[&str] = &[
    "projects",
    "document_types",
    "document_sections",
    "document_subsections",
    "documents",
    "document_content",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by catalog and document persistence.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Row addressed by id does not exist.
    NotFound { entity: &'static str, id: Uuid },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "document store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "document store requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Input for administrative subsection inserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubsection {
    pub section_id: SectionId,
    pub name: String,
    pub order: i64,
    pub priority: i64,
    pub content_type: String,
}

/// Repository interface for the schema catalog.
pub trait CatalogRepository {
    /// Loads one document type by name or id.
    fn find_document_type(&self, lookup: &DocumentTypeRef) -> RepoResult<Option<DocumentType>>;
    /// Loads sections of one type, each with its ordered subsections.
    fn list_sections(&self, document_type_id: DocumentTypeId)
        -> RepoResult<Vec<SectionDefinition>>;
    /// Creates one document type.
    fn insert_document_type(&self, name: &str) -> RepoResult<DocumentType>;
    /// Creates one section under a document type.
    fn insert_section(
        &self,
        document_type_id: DocumentTypeId,
        name: &str,
        order: i64,
    ) -> RepoResult<Section>;
    /// Creates one subsection under a section.
    fn insert_subsection(&self, subsection: &NewSubsection) -> RepoResult<Subsection>;
    /// Creates a document type with all of its sections and subsections in
    /// one transaction; a failed insert leaves nothing behind.
    fn insert_type_seed(&self, seed: &DocumentTypeSeed) -> RepoResult<DocumentType>;
}

/// SQLite-backed catalog repository.
pub struct SqliteCatalogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCatalogRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl CatalogRepository for SqliteCatalogRepository<'_> {
    fn find_document_type(&self, lookup: &DocumentTypeRef) -> RepoResult<Option<DocumentType>> {
        let row = match lookup {
            DocumentTypeRef::Name(name) => self
                .conn
                .query_row(
                    "SELECT id, name, created_at, updated_at
                     FROM document_types
                     WHERE name = ?1;",
                    [name.as_str()],
                    read_document_type_columns,
                )
                .optional()?,
            DocumentTypeRef::Id(id) => self
                .conn
                .query_row(
                    "SELECT id, name, created_at, updated_at
                     FROM document_types
                     WHERE id = ?1;",
                    [id.to_string()],
                    read_document_type_columns,
                )
                .optional()?,
        };

        row.map(|(id, name, created_at, updated_at)| {
            Ok(DocumentType {
                id: parse_uuid(&id, "document_types.id")?,
                name,
                created_at,
                updated_at,
            })
        })
        .transpose()
    }

    fn list_sections(
        &self,
        document_type_id: DocumentTypeId,
    ) -> RepoResult<Vec<SectionDefinition>> {
        let type_id = document_type_id.to_string();

        let mut stmt = self.conn.prepare(
            "SELECT id, document_type_id, name, sort_order
             FROM document_sections
             WHERE document_type_id = ?1
             ORDER BY sort_order ASC, id ASC;",
        )?;
        let mut rows = stmt.query([type_id.as_str()])?;
        let mut sections = Vec::new();
        let mut positions: HashMap<SectionId, usize> = HashMap::new();
        while let Some(row) = rows.next()? {
            let section = parse_section_row(row)?;
            positions.insert(section.id, sections.len());
            sections.push(SectionDefinition {
                section,
                subsections: Vec::new(),
            });
        }

        let mut stmt = self.conn.prepare(
            "SELECT
                sub.id AS id,
                sub.section_id AS section_id,
                sub.name AS name,
                sub.sort_order AS sort_order,
                sub.priority AS priority,
                sub.content_type AS content_type
             FROM document_subsections sub
             INNER JOIN document_sections s ON s.id = sub.section_id
             WHERE s.document_type_id = ?1
             ORDER BY sub.sort_order ASC, sub.id ASC;",
        )?;
        let mut rows = stmt.query([type_id.as_str()])?;
        while let Some(row) = rows.next()? {
            let subsection = parse_subsection_row(row)?;
            let position = positions.get(&subsection.section_id).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "subsection {} points at unknown section {}",
                    subsection.id, subsection.section_id
                ))
            })?;
            sections[*position].subsections.push(subsection);
        }

        Ok(sections)
    }

    fn insert_document_type(&self, name: &str) -> RepoResult<DocumentType> {
        insert_document_type_row(self.conn, name)
    }

    fn insert_section(
        &self,
        document_type_id: DocumentTypeId,
        name: &str,
        order: i64,
    ) -> RepoResult<Section> {
        insert_section_row(self.conn, document_type_id, name, order)
    }

    fn insert_subsection(&self, subsection: &NewSubsection) -> RepoResult<Subsection> {
        insert_subsection_row(self.conn, subsection)
    }

    fn insert_type_seed(&self, seed: &DocumentTypeSeed) -> RepoResult<DocumentType> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let document_type = insert_document_type_row(&tx, seed.name.trim())?;
        for (section_index, section_seed) in seed.sections.iter().enumerate() {
            let section = insert_section_row(
                &tx,
                document_type.id,
                section_seed.name.trim(),
                section_seed.order.unwrap_or(section_index as i64),
            )?;
            for (index, subsection_seed) in section_seed.subsections.iter().enumerate() {
                insert_subsection_row(
                    &tx,
                    &NewSubsection {
                        section_id: section.id,
                        name: subsection_seed.name.trim().to_string(),
                        order: subsection_seed.order.unwrap_or(index as i64),
                        priority: subsection_seed.priority,
                        content_type: subsection_seed.content_type.clone(),
                    },
                )?;
            }
        }
        tx.commit()?;
        Ok(document_type)
    }
}

fn insert_document_type_row(conn: &Connection, name: &str) -> RepoResult<DocumentType> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO document_types (id, name) VALUES (?1, ?2);",
        params![id.to_string(), name],
    )?;
    let (id_text, name, created_at, updated_at) = conn.query_row(
        "SELECT id, name, created_at, updated_at
         FROM document_types
         WHERE id = ?1;",
        [id.to_string()],
        read_document_type_columns,
    )?;
    Ok(DocumentType {
        id: parse_uuid(&id_text, "document_types.id")?,
        name,
        created_at,
        updated_at,
    })
}

fn insert_section_row(
    conn: &Connection,
    document_type_id: DocumentTypeId,
    name: &str,
    order: i64,
) -> RepoResult<Section> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO document_sections (id, document_type_id, name, sort_order)
         VALUES (?1, ?2, ?3, ?4);",
        params![id.to_string(), document_type_id.to_string(), name, order],
    )?;
    Ok(Section {
        id,
        document_type_id,
        name: name.to_string(),
        order,
    })
}

fn insert_subsection_row(conn: &Connection, subsection: &NewSubsection) -> RepoResult<Subsection> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO document_subsections (
            id,
            section_id,
            name,
            sort_order,
            priority,
            content_type
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        params![
            id.to_string(),
            subsection.section_id.to_string(),
            subsection.name.as_str(),
            subsection.order,
            subsection.priority,
            subsection.content_type.as_str(),
        ],
    )?;
    Ok(Subsection {
        id,
        section_id: subsection.section_id,
        name: subsection.name.clone(),
        order: subsection.order,
        priority: subsection.priority,
        content_type: subsection.content_type.clone(),
    })
}

fn read_document_type_columns(row: &Row<'_>) -> rusqlite::Result<(String, String, i64, i64)> {
    Ok((
        row.get("id")?,
        row.get("name")?,
        row.get("created_at")?,
        row.get("updated_at")?,
    ))
}

fn parse_section_row(row: &Row<'_>) -> RepoResult<Section> {
    let id: String = row.get("id")?;
    let document_type_id: String = row.get("document_type_id")?;
    Ok(Section {
        id: parse_uuid(&id, "document_sections.id")?,
        document_type_id: parse_uuid(&document_type_id, "document_sections.document_type_id")?,
        name: row.get("name")?,
        order: row.get("sort_order")?,
    })
}

fn parse_subsection_row(row: &Row<'_>) -> RepoResult<Subsection> {
    let id: String = row.get("id")?;
    let section_id: String = row.get("section_id")?;
    Ok(Subsection {
        id: parse_uuid(&id, "document_subsections.id")?,
        section_id: parse_uuid(&section_id, "document_subsections.section_id")?,
        name: row.get("name")?,
        order: row.get("sort_order")?,
        priority: row.get("priority")?,
        content_type: row.get("content_type")?,
    })
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

/// Verifies the connection is migrated and carries every required table.
pub(crate) fn ensure_schema_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in REQUIRED_TABLES {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
