//! Revision identity
//!
//! A revision id is `<generation>-<digest>`: a positive generation counter
//! that increments by one along any edit chain, and a SHA-256 digest of the
//! serialized document at creation time. The digest is computed *before* the
//! new revision id is assigned into the document, so the id is reproducible
//! from content plus generation alone.
//!
//! The derived `Ord` (generation first, then digest lexicographically) is the
//! total order used for winner resolution: the maximum of a leaf set is the
//! winning revision on every replica, with no coordination.

use crate::document::Document;
use crate::error::{Error, Result};
use crate::keys::SEPARATOR;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of one immutable document revision
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RevisionId {
    generation: u64,
    digest: String,
}

impl RevisionId {
    /// Derive the revision id for a document at the given generation.
    ///
    /// The document must not yet carry the revision being derived; on the
    /// update path it still holds the parent revision, which feeds the digest
    /// and keeps sibling branches content-distinct.
    pub fn derive(generation: u64, doc: &Document) -> Result<Self> {
        let bytes = serde_json::to_vec(doc)?;
        Ok(Self {
            generation,
            digest: hex::encode(Sha256::digest(&bytes)),
        })
    }

    /// Reassemble from parts already validated elsewhere
    pub fn new(generation: u64, digest: String) -> Result<Self> {
        if generation == 0 || digest.is_empty() || digest.contains(SEPARATOR) {
            return Err(Error::InvalidRevision(format!("{}-{}", generation, digest)));
        }
        Ok(Self { generation, digest })
    }

    /// Position along the edit chain, starting at 1
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Content digest portion
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.generation, self.digest)
    }
}

impl FromStr for RevisionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (gen_str, digest) = s
            .split_once('-')
            .ok_or_else(|| Error::InvalidRevision(s.to_string()))?;
        let generation: u64 = gen_str
            .parse()
            .map_err(|_| Error::InvalidRevision(s.to_string()))?;
        // The key separator may not ride in via replicator-supplied digests
        if generation == 0 || digest.is_empty() || digest.contains(SEPARATOR) {
            return Err(Error::InvalidRevision(s.to_string()));
        }
        Ok(Self {
            generation,
            digest: digest.to_string(),
        })
    }
}

impl TryFrom<String> for RevisionId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<RevisionId> for String {
    fn from(rev: RevisionId) -> Self {
        rev.to_string()
    }
}

/// Ancestry of one revision: its own digest plus the digests of every
/// ancestor back to the root, newest first.
///
/// `start` is the generation of the revision the log belongs to, and
/// `ids.len() == start` whenever the chain reaches the root. Stored verbatim
/// for replicator-ingested revisions, whose chains may be rootless stubs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionLog {
    pub start: u64,
    pub ids: Vec<String>,
}

impl RevisionLog {
    /// Lineage of a first-generation revision
    pub fn root(digest: String) -> Self {
        Self {
            start: 1,
            ids: vec![digest],
        }
    }

    /// Lineage of a child revision: the child's digest prepended to this log
    pub fn extend(&self, digest: String) -> Self {
        let mut ids = Vec::with_capacity(self.ids.len() + 1);
        ids.push(digest);
        ids.extend(self.ids.iter().cloned());
        Self {
            start: self.start + 1,
            ids,
        }
    }
}

/// Mint a document id for callers that supplied none.
///
/// A fresh UUIDv4 passed through SHA-256, so minted ids are hard to predict
/// and share the alphabet of revision digests.
pub fn mint_document_id() -> String {
    hex::encode(Sha256::digest(Uuid::new_v4().as_bytes()))
}
