//! Document store with explicit revision trees
//!
//! Each logical document is a chain of immutable, content-addressed revisions.
//! Concurrent edits of the same revision are kept as branches rather than
//! rejected, and a deterministic resolver picks the winning leaf when a plain
//! read-by-id is served. It supports:
//! - Optimistic concurrency via a leaf-membership check on update
//! - Tombstone deletes that ride the ordinary update path
//! - Replicator-style ingest of externally determined revision lineages
//! - All-or-nothing multi-document writes via a single atomic batch
//!
//! # Architecture
//!
//! Three record families share one Fjall partition, separated by key prefix:
//! per-revision node records (leaf flag + body), per-revision ancestry records
//! (generation + digest chain back to the root), and a per-document leaf set
//! (the open revisions). Every mutation re-reads what it needs from the
//! partition, stages put operations, and commits them in one batch; the engine
//! holds no state outside the keyspace.

pub mod config;
pub mod document;
pub mod error;
pub mod records;
pub mod revision;
pub mod storage;

mod keys;
mod mutation;

// Re-export main types
pub use config::StorageConfig;
pub use document::{Document, DocumentMeta};
pub use error::{Error, Result};
pub use records::{LeafSet, NodeRecord};
pub use revision::{RevisionId, RevisionLog};
pub use storage::RevTreeStore;
