//! Error types for the revision-tree store
//!
//! Conflict-class errors (`is_conflict`) are expected under concurrent use
//! and safe to retry with a fresh winner. Corruption-class errors
//! (`is_corruption`) indicate an inconsistent revision graph and must not be
//! retried.

use thiserror::Error;

/// Result type for revision-tree operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the revision-tree store
#[derive(Debug, Error)]
pub enum Error {
    /// No record stored under the requested key
    #[error("not found: {0}")]
    NotFound(String),

    /// The revision being updated has already been superseded
    #[error("document update conflict: {id}@{rev} is not a leaf")]
    UpdateConflict { id: String, rev: String },

    /// Lost a race: the parent revision vanished from the open set
    #[error("parent revision {rev} not in open revisions for {id}")]
    ParentNotLeaf { id: String, rev: String },

    /// A node record already exists under the target key
    #[error("revision {rev} already exists for {id}")]
    DuplicateRevision { id: String, rev: String },

    /// Replicator-mode write without id, revision, or lineage
    #[error("replicator write requires _id, _rev and a consistent _revisions lineage")]
    InvalidReplicatorInput,

    /// Leaf set exists but is empty; the revision graph is inconsistent
    #[error("no open revisions for {0}")]
    NoOpenRevisions(String),

    /// A leaf node has no ancestry record; the revision graph is inconsistent
    #[error("ancestry record missing for {id}@{rev}")]
    AncestryMissing { id: String, rev: String },

    /// Document id is empty or contains the key separator
    #[error("invalid document id {0:?}")]
    InvalidDocumentId(String),

    /// Revision string does not parse as `<generation>-<digest>`
    #[error("invalid revision id {0:?}")]
    InvalidRevision(String),

    /// A document carrying _rev must also carry _id
    #[error("a document with _rev must also carry _id")]
    MissingDocumentId,

    /// Fjall storage error
    #[error("storage error: {0}")]
    Storage(#[from] fjall::Error),

    /// Serialization error
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Filesystem error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Expected under concurrent use; retry with the current winner.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Error::UpdateConflict { .. }
                | Error::ParentNotLeaf { .. }
                | Error::DuplicateRevision { .. }
        )
    }

    /// The stored revision graph is inconsistent; do not retry.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::NoOpenRevisions(_) | Error::AncestryMissing { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Encoding(e.to_string())
    }
}
