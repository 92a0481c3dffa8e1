//! The open document schema
//!
//! A document is a schema-free map of field names to JSON values plus the
//! reserved fields `_id`, `_rev`, `_deleted` and (replicator only)
//! `_revisions`, serialized CouchDB-style. User fields live in a `BTreeMap`
//! so serialization order, and therefore the content digest, is
//! deterministic.

use crate::revision::{RevisionId, RevisionLog};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn is_false(b: &bool) -> bool {
    !*b
}

/// A single document: reserved fields plus arbitrary user fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable logical identifier; minted by the store when absent on create
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Current revision; set by the store, supplied by the caller on update
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<RevisionId>,

    /// Tombstone marker; a deleted document is still a leaf
    #[serde(rename = "_deleted", default, skip_serializing_if = "is_false")]
    pub deleted: bool,

    /// Externally determined lineage, required for replicator-mode writes
    #[serde(rename = "_revisions", skip_serializing_if = "Option::is_none")]
    pub revisions: Option<RevisionLog>,

    /// User fields
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl Document {
    /// Empty document with no id; the store mints one on create
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the logical id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set a user field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Look up a user field
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }
}

/// Identity of a written revision, returned from every write path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub id: String,
    pub rev: RevisionId,
}
