//! Mutation staging: the create / update / replicator-ingest transitions
//!
//! Each mutation re-reads what it needs from the partition, validates the
//! revision-graph invariants, and emits put operations. Nothing is written
//! here; the bulk coordinator in [`storage`](crate::storage) folds the staged
//! ops of a whole call into one atomic batch. A mutation that fails therefore
//! leaves the store untouched.
//!
//! When several documents in one call touch the same id, later mutations must
//! see the leaf set as the earlier ones left it, not the pre-batch snapshot —
//! otherwise the last leaf-set put would clobber the others and orphan their
//! leaves. The coordinator threads that pending state through `stage`.

use crate::document::Document;
use crate::error::{Error, Result};
use crate::keys;
use crate::records::{self, LeafSet, NodeRecord};
use crate::revision::{mint_document_id, RevisionId, RevisionLog};
use crate::storage::RevTreeStore;
use std::collections::BTreeMap;

/// One staged put against the shared partition
#[derive(Debug, Clone)]
pub(crate) struct BatchOp {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl BatchOp {
    fn put(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self { key, value }
    }
}

/// The staged ops of one document plus the leaf set they leave behind,
/// which later documents of the same call stage against
pub(crate) struct StagedWrite {
    pub ops: Vec<BatchOp>,
    pub id: String,
    pub leaves: LeafSet,
}

impl RevTreeStore {
    /// Route a document to the right transition.
    ///
    /// With `new_edits`: id + rev means update, a missing rev means create
    /// (minting an id if needed). Without `new_edits` every write is a
    /// replicator-mode create and must carry id, rev and lineage.
    ///
    /// `pending` holds the leaf sets already staged by earlier documents of
    /// the same call, keyed by id; it takes precedence over the stored set.
    pub(crate) fn stage(
        &self,
        doc: &Document,
        new_edits: bool,
        pending: &BTreeMap<String, LeafSet>,
    ) -> Result<StagedWrite> {
        let mut doc = doc.clone();
        if !new_edits {
            if doc.id.is_none() || doc.rev.is_none() || doc.revisions.is_none() {
                return Err(Error::InvalidReplicatorInput);
            }
            return self.stage_create(doc, false, pending);
        }

        if doc.rev.is_some() {
            if doc.id.is_none() {
                return Err(Error::MissingDocumentId);
            }
            return self.stage_update(doc, pending);
        }

        if doc.id.is_none() {
            doc.id = Some(mint_document_id());
        }
        self.stage_create(doc, true, pending)
    }

    /// Stage a first revision, or ingest a replicated one.
    ///
    /// Emits three puts: the node, its ancestry, and the leaf set. In
    /// replicator mode the supplied lineage is stored verbatim and the new
    /// revision is merged into any leaf set already present for the id, which
    /// is how conflicting branches enter the store.
    fn stage_create(
        &self,
        mut doc: Document,
        new_edits: bool,
        pending: &BTreeMap<String, LeafSet>,
    ) -> Result<StagedWrite> {
        let id = match doc.id.clone() {
            Some(id) => id,
            None => return Err(Error::MissingDocumentId),
        };
        keys::validate_id(&id)?;

        let (rev, log, leaves) = if new_edits {
            // Digest over the body before the revision is assigned into it
            let rev = RevisionId::derive(1, &doc)?;
            if pending.contains_key(&id) {
                // An earlier document of this call already claimed the id;
                // committing a second fresh leaf set would orphan its leaves
                return Err(Error::UpdateConflict {
                    id,
                    rev: rev.to_string(),
                });
            }
            doc.rev = Some(rev.clone());
            let log = RevisionLog::root(rev.digest().to_string());
            (rev.clone(), log, LeafSet::single(rev))
        } else {
            let Some(rev) = doc.rev.clone() else {
                return Err(Error::InvalidReplicatorInput);
            };
            let Some(log) = doc.revisions.take() else {
                return Err(Error::InvalidReplicatorInput);
            };
            if log.start != rev.generation()
                || log.ids.first().map(String::as_str) != Some(rev.digest())
            {
                return Err(Error::InvalidReplicatorInput);
            }

            // Merge into the open set as this call has staged it so far;
            // a brand-new id starts fresh
            let mut leaves = match pending.get(&id) {
                Some(set) => set.clone(),
                None => match self.get_leaves(&id) {
                    Ok(set) => set,
                    Err(Error::NotFound(_)) => LeafSet::default(),
                    Err(e) => return Err(e),
                },
            };
            if leaves.contains(&rev) {
                return Err(Error::DuplicateRevision {
                    id,
                    rev: rev.to_string(),
                });
            }
            leaves.insert(rev.clone());
            (rev, log, leaves)
        };

        let rev_str = rev.to_string();
        let node_key = keys::node_key(&id, &rev_str);
        if self.key_exists(&node_key)? {
            return Err(Error::DuplicateRevision { id, rev: rev_str });
        }

        tracing::debug!("create {}@{} (new_edits: {})", id, rev_str, new_edits);
        let ops = vec![
            BatchOp::put(node_key, records::encode(&NodeRecord::leaf(doc))?),
            BatchOp::put(keys::ancestry_key(&id, &rev_str), records::encode(&log)?),
            BatchOp::put(keys::leaf_set_key(&id), records::encode(&leaves)?),
        ];
        Ok(StagedWrite { ops, id, leaves })
    }

    /// Stage an update of the revision named by `doc.rev`.
    ///
    /// Only a current leaf may be extended. Emits four puts: the new leaf
    /// node, the parent rewritten as superseded with its body dropped, the
    /// extended ancestry chain, and the rewritten leaf set. A tombstone
    /// (`_deleted`) rides this exact path.
    fn stage_update(
        &self,
        mut doc: Document,
        pending: &BTreeMap<String, LeafSet>,
    ) -> Result<StagedWrite> {
        let (id, parent_rev) = match (doc.id.clone(), doc.rev.clone()) {
            (Some(id), Some(rev)) => (id, rev),
            _ => return Err(Error::MissingDocumentId),
        };
        keys::validate_id(&id)?;

        let parent = self.get_node(&id, &parent_rev)?;
        if !parent.leaf {
            tracing::warn!("update conflict: {}@{} already superseded", id, parent_rev);
            return Err(Error::UpdateConflict {
                id,
                rev: parent_rev.to_string(),
            });
        }

        // The body still carries the parent revision here, so sibling edits
        // of the same content hash apart
        let new_rev = RevisionId::derive(parent_rev.generation() + 1, &doc)?;
        doc.rev = Some(new_rev.clone());

        // Every leaf must have ancestry; a miss here is graph corruption
        let parent_log = match self.get_ancestry(&id, &parent_rev) {
            Ok(log) => log,
            Err(Error::NotFound(_)) => {
                return Err(Error::AncestryMissing {
                    id,
                    rev: parent_rev.to_string(),
                });
            }
            Err(e) => return Err(e),
        };
        let log = parent_log.extend(new_rev.digest().to_string());

        let mut leaves = match pending.get(&id) {
            Some(set) => set.clone(),
            None => self.get_leaves(&id)?,
        };
        if !leaves.remove(&parent_rev) {
            // The node said leaf but the open set disagrees: another update
            // consumed this parent between our reads
            tracing::warn!("lost leaf race on {}@{}", id, parent_rev);
            return Err(Error::ParentNotLeaf {
                id,
                rev: parent_rev.to_string(),
            });
        }
        leaves.insert(new_rev.clone());

        let new_rev_str = new_rev.to_string();
        tracing::debug!("update {}: {} -> {}", id, parent_rev, new_rev_str);
        let ops = vec![
            BatchOp::put(
                keys::node_key(&id, &new_rev_str),
                records::encode(&NodeRecord::leaf(doc))?,
            ),
            BatchOp::put(
                keys::node_key(&id, &parent_rev.to_string()),
                records::encode(&NodeRecord::superseded())?,
            ),
            BatchOp::put(
                keys::ancestry_key(&id, &new_rev_str),
                records::encode(&log)?,
            ),
            BatchOp::put(keys::leaf_set_key(&id), records::encode(&leaves)?),
        ];
        Ok(StagedWrite { ops, id, leaves })
    }
}
