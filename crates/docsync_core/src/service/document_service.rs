//! Document use-case service.
//!
//! # Responsibility
//! - Read type definitions and document contents.
//! - Create a project's document for a type, materialized with empty cells.
//! - Apply partial content updates through the reconciler.
//!
//! # Invariants
//! - Inputs are validated and every item resolved before any write.
//! - Results are re-read from storage after writes, so ids and timestamps
//!   are the stored ones.
//! - Storage failures are surfaced unchanged as `ServiceError::Upstream`;
//!   nothing is retried.

use crate::catalog::{CatalogError, SchemaCatalog};
use crate::config::DuplicateCreatePolicy;
use crate::model::catalog::{DocumentTypeDefinition, DocumentTypeRef};
use crate::model::document::{
    ContentItem, ContentValidationError, Document, DocumentContents, DocumentId, Project,
    ProjectId, SubsectionRef,
};
use crate::reconcile::{plan_upserts, ReconcileError};
use crate::repo::catalog_repo::{CatalogRepository, RepoError};
use crate::repo::document_repo::DocumentRepository;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

/// Coarse error class callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    UpstreamUnavailable,
    Validation,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::Validation => "validation",
        }
    }
}

/// Errors from document service operations.
#[derive(Debug)]
pub enum ServiceError {
    DocumentTypeNotFound(DocumentTypeRef),
    ProjectNotFound(ProjectId),
    DocumentNotFound {
        project_id: ProjectId,
        document_type: String,
    },
    /// Identifier does not name a subsection of the document's type.
    SubsectionNotFound(SubsectionRef),
    /// Document exists and the create policy is `Reject`.
    DocumentAlreadyExists {
        project_id: ProjectId,
        document_id: DocumentId,
    },
    AmbiguousSubsection(String),
    InvalidContent(ContentValidationError),
    InvalidTitle,
    InvalidSeed(String),
    /// Storage-level failure.
    Upstream(RepoError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DocumentTypeNotFound(_)
            | Self::ProjectNotFound(_)
            | Self::DocumentNotFound { .. }
            | Self::SubsectionNotFound(_) => ErrorKind::NotFound,
            Self::DocumentAlreadyExists { .. } => ErrorKind::Conflict,
            Self::AmbiguousSubsection(_)
            | Self::InvalidContent(_)
            | Self::InvalidTitle
            | Self::InvalidSeed(_) => ErrorKind::Validation,
            Self::Upstream(_) => ErrorKind::UpstreamUnavailable,
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DocumentTypeNotFound(lookup) => write!(f, "document type not found: {lookup}"),
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::DocumentNotFound {
                project_id,
                document_type,
            } => write!(
                f,
                "document {document_type} for project {project_id} not found"
            ),
            Self::SubsectionNotFound(identifier) => {
                write!(f, "subsection not found in document type: {identifier}")
            }
            Self::DocumentAlreadyExists {
                project_id,
                document_id,
            } => write!(
                f,
                "document already exists for project {project_id}: {document_id}"
            ),
            Self::AmbiguousSubsection(name) => {
                write!(f, "subsection name matches more than one subsection: {name}")
            }
            Self::InvalidContent(err) => write!(f, "{err}"),
            Self::InvalidTitle => write!(f, "document title must not be blank"),
            Self::InvalidSeed(message) => write!(f, "invalid catalog seed: {message}"),
            Self::Upstream(err) => write!(f, "storage failure: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidContent(err) => Some(err),
            Self::Upstream(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Upstream(value)
    }
}

impl From<CatalogError> for ServiceError {
    fn from(value: CatalogError) -> Self {
        match value {
            CatalogError::DocumentTypeNotFound(lookup) => Self::DocumentTypeNotFound(lookup),
            CatalogError::InvalidSeed(message) => Self::InvalidSeed(message),
            CatalogError::Repo(err) => Self::Upstream(err),
        }
    }
}

impl From<ReconcileError> for ServiceError {
    fn from(value: ReconcileError) -> Self {
        match value {
            ReconcileError::UnknownSubsection(identifier) => Self::SubsectionNotFound(identifier),
            ReconcileError::AmbiguousSubsection(name) => Self::AmbiguousSubsection(name),
        }
    }
}

impl From<ContentValidationError> for ServiceError {
    fn from(value: ContentValidationError) -> Self {
        Self::InvalidContent(value)
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Document service facade over the schema catalog and the document store.
pub struct DocumentService<C: CatalogRepository, D: DocumentRepository> {
    catalog: SchemaCatalog<C>,
    documents: D,
    duplicate_create: DuplicateCreatePolicy,
}

impl<C: CatalogRepository, D: DocumentRepository> DocumentService<C, D> {
    /// Creates a service with the default `ReturnExisting` create policy.
    pub fn new(catalog: SchemaCatalog<C>, documents: D) -> Self {
        Self {
            catalog,
            documents,
            duplicate_create: DuplicateCreatePolicy::default(),
        }
    }

    pub fn with_duplicate_create(mut self, policy: DuplicateCreatePolicy) -> Self {
        self.duplicate_create = policy;
        self
    }

    pub fn catalog(&self) -> &SchemaCatalog<C> {
        &self.catalog
    }

    pub fn health_check(&self) -> ServiceResult<()> {
        observe("health_check", || Ok(self.documents.health_check()?))
    }

    pub fn get_project(&self, project_id: ProjectId) -> ServiceResult<Project> {
        observe("get_project", || self.require_project(project_id))
    }

    /// Returns a document type with its ordered sections and subsections.
    pub fn get_document_type(
        &self,
        lookup: &DocumentTypeRef,
    ) -> ServiceResult<Arc<DocumentTypeDefinition>> {
        observe("get_document_type", || {
            Ok(self.catalog.resolve_document_type(lookup)?)
        })
    }

    /// Returns a project's document of the given type with all its cells.
    pub fn get_document_contents(
        &self,
        project_id: ProjectId,
        lookup: &DocumentTypeRef,
    ) -> ServiceResult<DocumentContents> {
        observe("get_document_contents", || {
            let definition = self.catalog.resolve_document_type(lookup)?;
            let document = self.require_document(project_id, &definition)?;
            self.load_contents(document)
        })
    }

    /// Creates a project's document of the given type.
    ///
    /// # Contract
    /// - New documents get one empty cell per subsection of the type.
    /// - `title = None` derives `"{project title} {type name}"`.
    /// - An existing document is returned unchanged under
    ///   `DuplicateCreatePolicy::ReturnExisting`, or rejected with
    ///   `DocumentAlreadyExists` under `Reject`.
    pub fn create_document(
        &self,
        project_id: ProjectId,
        lookup: &DocumentTypeRef,
        title: Option<&str>,
    ) -> ServiceResult<DocumentContents> {
        observe("create_document", || {
            let title = match title {
                Some(value) if value.trim().is_empty() => return Err(ServiceError::InvalidTitle),
                Some(value) => Some(value.trim().to_string()),
                None => None,
            };

            let definition = self.catalog.resolve_document_type(lookup)?;
            let project = self.require_project(project_id)?;
            let title = title.unwrap_or_else(|| {
                format!("{} {}", project.title, definition.document_type.name)
            });
            let subsections: Vec<_> = definition.subsections().map(|sub| sub.id).collect();

            let outcome = self.documents.create_document(
                project_id,
                definition.document_type.id,
                &title,
                &subsections,
            )?;

            if !outcome.created && self.duplicate_create == DuplicateCreatePolicy::Reject {
                return Err(ServiceError::DocumentAlreadyExists {
                    project_id,
                    document_id: outcome.document.id,
                });
            }

            info!(
                "event=document_create module=service status=ok created={} document_id={} cells={}",
                outcome.created,
                outcome.document.id,
                subsections.len()
            );
            self.load_contents(outcome.document)
        })
    }

    /// Applies `{identifier, content}` items onto the document's cells.
    ///
    /// # Contract
    /// - Matched cells keep their id; only content and `updated_at` change.
    /// - Subsections without a cell get a new one.
    /// - Repeated identifiers: the last occurrence wins.
    /// - Any unresolvable identifier fails the call with no cell modified.
    pub fn update_content(
        &self,
        project_id: ProjectId,
        lookup: &DocumentTypeRef,
        items: &[ContentItem],
    ) -> ServiceResult<DocumentContents> {
        observe("update_content", || {
            for item in items {
                item.validate()?;
            }

            let definition = self.catalog.resolve_document_type(lookup)?;
            let document = self.require_document(project_id, &definition)?;
            let current = self.documents.get_contents(document.id)?;

            let batch = plan_upserts(
                &definition,
                document.id,
                current.iter().map(|entry| &entry.cell),
                items,
            )?;
            let inserts = batch.iter().filter(|entry| entry.cell_id.is_none()).count();
            self.documents.upsert_cells(&batch)?;

            info!(
                "event=document_update module=service status=ok document_id={} items={} upserts={} inserts={}",
                document.id,
                items.len(),
                batch.len(),
                inserts
            );

            let refreshed = self.require_document(project_id, &definition)?;
            self.load_contents(refreshed)
        })
    }

    fn require_project(&self, project_id: ProjectId) -> ServiceResult<Project> {
        self.documents
            .get_project(project_id)?
            .ok_or(ServiceError::ProjectNotFound(project_id))
    }

    fn require_document(
        &self,
        project_id: ProjectId,
        definition: &DocumentTypeDefinition,
    ) -> ServiceResult<Document> {
        self.documents
            .get_document(project_id, definition.document_type.id)?
            .ok_or_else(|| ServiceError::DocumentNotFound {
                project_id,
                document_type: definition.document_type.name.clone(),
            })
    }

    fn load_contents(&self, document: Document) -> ServiceResult<DocumentContents> {
        let cells = self.documents.get_contents(document.id)?;
        Ok(DocumentContents { document, cells })
    }
}

fn observe<T>(
    operation: &'static str,
    run: impl FnOnce() -> ServiceResult<T>,
) -> ServiceResult<T> {
    let started_at = Instant::now();
    let result = run();
    match &result {
        Ok(_) => info!(
            "event={operation} module=service status=ok duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event={operation} module=service status=error duration_ms={} error_code={} error={}",
            started_at.elapsed().as_millis(),
            err.kind().as_str(),
            err
        ),
    }
    result
}
