//! Error types surfaced to callers of the catalog

use std::path::PathBuf;
use thiserror::Error;

use crate::catalog::CatalogError;

/// Every failure a catalog operation can report.
///
/// Each variant maps to a stable identifier through [`SheetError::kind`] so
/// an API layer can translate failures without matching on messages.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SheetError {
    /// Wrong number of root folders, an escaping entry, or an unreadable archive
    #[error("Invalid archive structure: {0}")]
    InvalidArchiveStructure(String),
    /// Sprite name already taken
    #[error("A sprite named '{0}' already exists")]
    DuplicateSpriteName(String),
    /// PNG that fails to decode
    #[error("Unreadable image '{}': {reason}", path.display())]
    UnreadableImage { path: PathBuf, reason: String },
    /// Missing animation, sprite or stored file
    #[error("Asset not found: {0}")]
    AssetNotFound(String),
    /// Copy, move or delete against the permanent store failed
    #[error("Storage I/O failure while {action}: {source}")]
    StorageIo {
        action: String,
        #[source]
        source: std::io::Error,
    },
    /// Catalog metadata could not be read or written
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// Rejected arguments (empty names, non-positive scale)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl SheetError {
    /// Stable identifier for the calling layer
    pub fn kind(&self) -> &'static str {
        match self {
            SheetError::InvalidArchiveStructure(_) => "invalid_archive_structure",
            SheetError::DuplicateSpriteName(_) => "duplicate_sprite_name",
            SheetError::UnreadableImage { .. } => "unreadable_image",
            SheetError::AssetNotFound(_) => "asset_not_found",
            SheetError::StorageIo { .. } => "storage_io_failure",
            SheetError::Catalog(_) => "catalog_failure",
            SheetError::InvalidRequest(_) => "invalid_request",
        }
    }

    pub(crate) fn storage(action: impl Into<String>, source: std::io::Error) -> Self {
        SheetError::StorageIo { action: action.into(), source }
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        SheetError::UnreadableImage { path: path.into(), reason: reason.to_string() }
    }
}
