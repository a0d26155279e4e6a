//! TOML configuration and catalog seed files.
//!
//! # Responsibility
//! - Load runtime settings (database, logging, catalog cache, create policy).
//! - Load administrative catalog seeds (document type → sections →
//!   subsections).
//!
//! # Invariants
//! - Every section has defaults, so an empty file is a valid config.
//! - Cache capacity and TTL must be non-zero.

use crate::catalog::cache::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_DB_FILE_NAME: &str = "docsync.sqlite3";

/// Errors from reading or validating config and seed files.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid toml: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub db: DbConfig,
    pub logging: LoggingConfig,
    pub catalog: CatalogConfig,
    pub documents: DocumentsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_FILE_NAME),
        }
    }
}

/// Logging is enabled only when `dir` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub cache_capacity: u64,
    pub cache_ttl_secs: u64,
}

impl CatalogConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
        }
    }
}

/// What `create_document` does when the pair already has a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateCreatePolicy {
    /// Return the existing document unchanged.
    #[default]
    ReturnExisting,
    /// Fail with a conflict error.
    Reject,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    pub duplicate_create: DuplicateCreatePolicy,
}

impl AppConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catalog.cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "catalog.cache_capacity must be greater than zero".to_string(),
            ));
        }
        if self.catalog.cache_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "catalog.cache_ttl_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reads and validates a config file.
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    AppConfig::from_toml_str(&read_file(path.as_ref())?)
}

/// Administrative catalog definition.
///
/// ```toml
/// [[document_type]]
/// name = "business-plan"
///
/// [[document_type.section]]
/// name = "Overview"
///
/// [[document_type.section.subsection]]
/// name = "summary"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CatalogSeed {
    #[serde(default, rename = "document_type")]
    pub document_types: Vec<DocumentTypeSeed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DocumentTypeSeed {
    pub name: String,
    #[serde(default, rename = "section")]
    pub sections: Vec<SectionSeed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SectionSeed {
    pub name: String,
    /// Defaults to the position within the seed file.
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default, rename = "subsection")]
    pub subsections: Vec<SubsectionSeed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubsectionSeed {
    pub name: String,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_content_type() -> String {
    "text".to_string()
}

impl CatalogSeed {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }
}

/// Reads a catalog seed file.
pub fn load_catalog_seed(path: impl AsRef<Path>) -> Result<CatalogSeed, ConfigError> {
    CatalogSeed::from_toml_str(&read_file(path.as_ref())?)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
