//! Persisted record types
//!
//! A node record carries the leaf flag and, while the revision is a leaf, the
//! document body. The leaf set is the one record rewritten in place: the open
//! revisions of a document, from which the deterministic winner is resolved.
//! Ancestry records reuse [`RevisionLog`](crate::revision::RevisionLog).

use crate::document::Document;
use crate::error::{Error, Result};
use crate::revision::RevisionId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// One revision in the graph: leaf flag plus body
///
/// The body is dropped when the node is superseded; the flag flips exactly
/// once, from leaf to non-leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub leaf: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Document>,
}

impl NodeRecord {
    /// A fresh leaf carrying its body
    pub fn leaf(body: Document) -> Self {
        Self {
            leaf: true,
            body: Some(body),
        }
    }

    /// A superseded node: flag cleared, body dropped
    pub fn superseded() -> Self {
        Self {
            leaf: false,
            body: None,
        }
    }
}

/// The open revisions of one document id
///
/// A revision is in the set iff no other revision claims it as parent.
/// Insertion order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeafSet {
    pub open_revs: Vec<RevisionId>,
}

impl LeafSet {
    /// Leaf set of a freshly created document
    pub fn single(rev: RevisionId) -> Self {
        Self {
            open_revs: vec![rev],
        }
    }

    pub fn contains(&self, rev: &RevisionId) -> bool {
        self.open_revs.contains(rev)
    }

    /// Remove a superseded parent; false if it was not open
    pub fn remove(&mut self, rev: &RevisionId) -> bool {
        match self.open_revs.iter().position(|r| r == rev) {
            Some(index) => {
                self.open_revs.remove(index);
                true
            }
            None => false,
        }
    }

    /// Open a new branch tip
    pub fn insert(&mut self, rev: RevisionId) {
        self.open_revs.push(rev);
    }

    /// Resolve the winning revision: highest generation, ties broken by the
    /// lexicographically larger digest. Total and deterministic, so every
    /// replica picks the same winner without coordination.
    pub fn winner(&self, id: &str) -> Result<&RevisionId> {
        self.open_revs
            .iter()
            .max()
            .ok_or_else(|| Error::NoOpenRevisions(id.to_string()))
    }
}

/// Serialize a record for storage
pub(crate) fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(record)?)
}

/// Deserialize a stored record
pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}
