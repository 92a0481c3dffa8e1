//! The revision-tree store
//!
//! Owns a Fjall keyspace with a single data partition shared by the three
//! record families. Reads are point gets; every mutation commits through one
//! atomic [`fjall::Batch`], so readers never observe a node without its
//! matching ancestry and leaf-set update. There is no cached state outside
//! the keyspace and no cross-call transaction.

use crate::config::StorageConfig;
use crate::document::{Document, DocumentMeta};
use crate::error::{Error, Result};
use crate::keys::{self, KeyFamily};
use crate::records::{self, LeafSet, NodeRecord};
use crate::revision::{RevisionId, RevisionLog};
use fjall::{Keyspace, Partition, PartitionCreateOptions};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;

/// Document store with explicit revision trees
pub struct RevTreeStore {
    keyspace: Keyspace,
    partition: Partition,
    persist_mode: fjall::PersistMode,
}

impl RevTreeStore {
    /// Open (or create) a store under the configured data directory
    pub fn open(config: StorageConfig) -> Result<Self> {
        Self::open_at_path(&config.data_dir.clone(), config)
    }

    /// Open storage at a specific path
    pub fn open_at_path(path: &Path, config: StorageConfig) -> Result<Self> {
        // Ensure directory exists
        std::fs::create_dir_all(path)?;

        let keyspace = fjall::Config::new(path).open()?;

        let partition = keyspace.open_partition(
            &config.partition_name,
            PartitionCreateOptions::default().compression(config.compression),
        )?;

        Ok(Self {
            keyspace,
            partition,
            persist_mode: config.persist_mode,
        })
    }

    /// Write one document; create when it carries no revision, update when
    /// it names the leaf being extended.
    pub fn write(&self, doc: &Document) -> Result<DocumentMeta> {
        self.bulk_write(std::slice::from_ref(doc), true)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                // Unreachable: every staged document emits exactly one leaf node put
                Error::NotFound("staged write emitted no leaf node".to_string())
            })
    }

    /// Tombstone a document: an ordinary update whose body carries the
    /// deleted marker. The tombstone stays a leaf and may be extended again.
    pub fn delete(&self, doc: &Document) -> Result<DocumentMeta> {
        let mut tombstone = doc.clone();
        tombstone.deleted = true;
        self.write(&tombstone)
    }

    /// Write a mixed list of documents as one atomic batch.
    ///
    /// Each document is classified and staged in order; the first failure
    /// aborts the whole call before anything is committed, so either every
    /// document's ops land together or none do. Results are extracted from
    /// the staged node puts, one `{id, rev}` per document.
    ///
    /// `new_edits = false` selects replicator mode for every document in the
    /// list: revision ids and lineages are taken verbatim and merged into the
    /// existing trees as (possibly conflicting) branches.
    pub fn bulk_write(&self, docs: &[Document], new_edits: bool) -> Result<Vec<DocumentMeta>> {
        let mut ops = Vec::new();
        let mut results = Vec::new();

        // Leaf sets as staged so far in this call, so several documents
        // touching one id compose instead of clobbering each other
        let mut pending: BTreeMap<String, LeafSet> = BTreeMap::new();

        for doc in docs {
            let staged = self.stage(doc, new_edits, &pending)?;

            // The freshly written revision is the one node put that is still
            // a leaf; the rewritten parent of an update is skipped
            for op in &staged.ops {
                let Some(parsed) = keys::parse(&op.key) else {
                    continue;
                };
                if parsed.family != KeyFamily::Node {
                    continue;
                }
                let node: NodeRecord = records::decode(&op.value)?;
                if !node.leaf {
                    continue;
                }
                let Some(rev) = parsed.rev else { continue };
                results.push(DocumentMeta {
                    id: parsed.id,
                    rev: rev.parse()?,
                });
            }

            pending.insert(staged.id, staged.leaves);
            ops.extend(staged.ops);
        }

        let mut batch = self.keyspace.batch();
        for op in ops {
            batch.insert(&self.partition, op.key, op.value);
        }
        batch.commit()?;
        self.keyspace.persist(self.persist_mode)?;

        tracing::debug!("committed batch of {} document(s)", docs.len());
        Ok(results)
    }

    /// Read the current winner for a document id.
    ///
    /// The winner is resolved deterministically from the open revisions;
    /// a tombstone winner is returned as-is, deleted marker and all.
    pub fn read(&self, id: &str) -> Result<Document> {
        let leaves = self.get_leaves(id)?;
        let winner = leaves.winner(id)?.clone();
        self.read_revision(id, &winner)
    }

    /// Read one exact revision; `NotFound` once it has been superseded and
    /// its body dropped.
    pub fn read_revision(&self, id: &str, rev: &RevisionId) -> Result<Document> {
        let node = self.get_node(id, rev)?;
        node.body
            .ok_or_else(|| Error::NotFound(format!("{}@{} has been superseded", id, rev)))
    }

    /// The open revisions (conflict branches included) for a document id
    pub fn get_leaves(&self, id: &str) -> Result<LeafSet> {
        self.fetch(&keys::leaf_set_key(id))
    }

    /// The stored ancestry chain of one revision
    pub fn get_ancestry(&self, id: &str, rev: &RevisionId) -> Result<RevisionLog> {
        self.fetch(&keys::ancestry_key(id, &rev.to_string()))
    }

    pub(crate) fn get_node(&self, id: &str, rev: &RevisionId) -> Result<NodeRecord> {
        self.fetch(&keys::node_key(id, &rev.to_string()))
    }

    pub(crate) fn key_exists(&self, key: &[u8]) -> Result<bool> {
        Ok(self.partition.get(key)?.is_some())
    }

    fn fetch<T: DeserializeOwned>(&self, key: &[u8]) -> Result<T> {
        match self.partition.get(key)? {
            Some(bytes) => records::decode(&bytes),
            None => Err(Error::NotFound(String::from_utf8_lossy(key).into_owned())),
        }
    }
}

impl Drop for RevTreeStore {
    fn drop(&mut self) {
        // Ensure data is persisted on drop
        let _ = self.keyspace.persist(fjall::PersistMode::SyncAll);
    }
}
