//! Typed errors for the failures callers branch on.
//!
//! Systemic failures (no corpus root, unwritable database) travel as
//! `anyhow::Error` and abort the run. The enums here are the recoverable
//! ones: a bad corpus file is skipped, a failed conversion is counted, and a
//! duplicate collection name is reported as such rather than as a generic
//! database failure.

use std::fmt;
use std::path::PathBuf;

/// A corpus file that could not contribute records.
#[derive(Debug)]
pub enum SourceError {
    /// The file vanished between cataloging and loading.
    Missing(PathBuf),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Invalid JSON, or JSON whose shape does not match the corpus type.
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl SourceError {
    pub fn path(&self) -> &PathBuf {
        match self {
            SourceError::Missing(path) => path,
            SourceError::Io { path, .. } => path,
            SourceError::Parse { path, .. } => path,
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Missing(path) => write!(f, "file not found: {}", path.display()),
            SourceError::Io { path, source } => {
                write!(f, "cannot read {}: {}", path.display(), source)
            }
            SourceError::Parse { path, source } => {
                write!(f, "cannot parse {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Missing(_) => None,
            SourceError::Io { source, .. } => Some(source),
            SourceError::Parse { source, .. } => Some(source),
        }
    }
}

/// A single file that failed the script conversion pass.
#[derive(Debug)]
pub enum ConversionError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::Read { path, source } => {
                write!(f, "cannot read {}: {}", path.display(), source)
            }
            ConversionError::Parse { path, source } => {
                write!(f, "cannot parse {}: {}", path.display(), source)
            }
            ConversionError::Write { path, source } => {
                write!(f, "cannot write {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConversionError {}

/// Failures of collection operations.
#[derive(Debug)]
pub enum CollectionError {
    /// A collection with this name already exists (unique constraint).
    NameExists(String),
    CollectionNotFound(i64),
    PoemNotFound(i64),
    /// The default collection cannot be deleted.
    DefaultProtected,
    Database(sqlx::Error),
}

impl fmt::Display for CollectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionError::NameExists(name) => {
                write!(f, "a collection named '{}' already exists", name)
            }
            CollectionError::CollectionNotFound(id) => write!(f, "collection {} not found", id),
            CollectionError::PoemNotFound(id) => write!(f, "poem {} not found", id),
            CollectionError::DefaultProtected => {
                write!(f, "the default collection cannot be deleted")
            }
            CollectionError::Database(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for CollectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectionError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for CollectionError {
    fn from(e: sqlx::Error) -> Self {
        CollectionError::Database(e)
    }
}
