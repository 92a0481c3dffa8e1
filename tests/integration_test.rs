//! Integration tests for the revision-tree store

use revtree::{
    Document, Error, LeafSet, RevTreeStore, RevisionId, RevisionLog, StorageConfig,
};

fn open_store() -> (tempfile::TempDir, RevTreeStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = RevTreeStore::open(StorageConfig::new(dir.path().to_path_buf())).unwrap();
    (dir, store)
}

fn rev(s: &str) -> RevisionId {
    s.parse().unwrap()
}

/// A replicator-mode document: id, rev, and a lineage consistent with the rev
fn replicated(id: &str, rev_str: &str, ancestors: &[&str]) -> Document {
    let r = rev(rev_str);
    let mut ids = vec![r.digest().to_string()];
    ids.extend(ancestors.iter().map(|a| a.to_string()));
    let mut doc = Document::new().with_id(id).with_field("origin", "remote");
    doc.rev = Some(r.clone());
    doc.revisions = Some(RevisionLog {
        start: r.generation(),
        ids,
    });
    doc
}

// ============================================================================
// Write / Read Round-Trips
// ============================================================================

#[test]
fn test_write_then_read_round_trip() {
    let (_dir, store) = open_store();

    let doc = Document::new()
        .with_field("title", "soda bread")
        .with_field("servings", 4);
    let meta = store.write(&doc).unwrap();
    assert_eq!(meta.rev.generation(), 1);
    // Minted id: 64 hex chars
    assert_eq!(meta.id.len(), 64);
    assert!(meta.id.chars().all(|c| c.is_ascii_hexdigit()));

    // Winner read and exact read agree
    let by_winner = store.read(&meta.id).unwrap();
    let by_rev = store.read_revision(&meta.id, &meta.rev).unwrap();
    assert_eq!(by_winner, by_rev);

    // Original fields survive, with id and rev assigned
    assert_eq!(by_winner.id.as_deref(), Some(meta.id.as_str()));
    assert_eq!(by_winner.rev.as_ref(), Some(&meta.rev));
    assert_eq!(by_winner.field("title"), doc.field("title"));
    assert_eq!(by_winner.field("servings"), doc.field("servings"));
}

#[test]
fn test_read_missing_document() {
    let (_dir, store) = open_store();
    assert!(matches!(store.read("nope"), Err(Error::NotFound(_))));
}

#[test]
fn test_superseded_revision_is_unreadable() {
    let (_dir, store) = open_store();
    let meta = store
        .write(&Document::new().with_id("a").with_field("n", 1))
        .unwrap();

    let mut doc = store.read("a").unwrap();
    doc.fields.insert("n".to_string(), 2.into());
    store.write(&doc).unwrap();

    // The parent's body was dropped when it was superseded
    let err = store.read_revision("a", &meta.rev).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

// ============================================================================
// Generation Monotonicity & Ancestry
// ============================================================================

#[test]
fn test_generation_increments_along_edit_chain() {
    let (_dir, store) = open_store();
    let mut meta = store
        .write(&Document::new().with_id("chain").with_field("n", 0))
        .unwrap();

    let mut digests = vec![meta.rev.digest().to_string()];
    for n in 1..=4 {
        let mut doc = store.read("chain").unwrap();
        doc.fields.insert("n".to_string(), n.into());
        let next = store.write(&doc).unwrap();
        assert_eq!(next.rev.generation(), meta.rev.generation() + 1);
        digests.push(next.rev.digest().to_string());
        meta = next;
    }

    // Content addressing: every revision along the chain hashes differently
    let unique: std::collections::BTreeSet<_> = digests.iter().collect();
    assert_eq!(unique.len(), digests.len());

    // The ancestry record reconstructs the full lineage, self-first
    let log = store.get_ancestry("chain", &meta.rev).unwrap();
    assert_eq!(log.start, 5);
    assert_eq!(log.ids.len(), 5);
    assert_eq!(log.ids[0], meta.rev.digest());
    let mut reversed = digests.clone();
    reversed.reverse();
    assert_eq!(log.ids, reversed);
}

// ============================================================================
// Leaf Invariant & Conflict Detection
// ============================================================================

#[test]
fn test_leaves_track_the_branch_tips() {
    let (_dir, store) = open_store();
    let first = store
        .write(&Document::new().with_id("a").with_field("n", 1))
        .unwrap();

    let leaves = store.get_leaves("a").unwrap();
    assert_eq!(leaves.open_revs, vec![first.rev.clone()]);

    let mut doc = store.read("a").unwrap();
    doc.fields.insert("n".to_string(), 2.into());
    let second = store.write(&doc).unwrap();

    // The update consumed its parent and opened exactly one new leaf
    let leaves = store.get_leaves("a").unwrap();
    assert_eq!(leaves.open_revs, vec![second.rev]);
}

#[test]
fn test_update_of_non_leaf_fails_and_changes_nothing() {
    let (_dir, store) = open_store();
    let stale = store
        .write(&Document::new().with_id("a").with_field("n", 1))
        .unwrap();

    let mut doc = store.read("a").unwrap();
    doc.fields.insert("n".to_string(), 2.into());
    let current = store.write(&doc).unwrap();

    // Re-using the consumed revision is the classic lost update
    let mut racer = Document::new().with_id("a").with_field("n", 99);
    racer.rev = Some(stale.rev.clone());
    let err = store.write(&racer).unwrap_err();
    assert!(matches!(err, Error::UpdateConflict { .. }));
    assert!(err.is_conflict());

    // Nothing moved: same winner, same single leaf
    let after = store.read("a").unwrap();
    assert_eq!(after.rev.as_ref(), Some(&current.rev));
    assert_eq!(after.field("n"), Some(&2.into()));
    assert_eq!(store.get_leaves("a").unwrap().open_revs, vec![current.rev]);
}

#[test]
fn test_duplicate_create_is_rejected() {
    let (_dir, store) = open_store();
    let doc = Document::new().with_id("a").with_field("n", 1);
    store.write(&doc).unwrap();

    // Identical content at generation 1 derives the identical revision
    let err = store.write(&doc).unwrap_err();
    assert!(matches!(err, Error::DuplicateRevision { .. }));
    assert!(err.is_conflict());
}

// ============================================================================
// Winner Resolution
// ============================================================================

#[test]
fn test_winner_is_deterministic() {
    let leaves = LeafSet {
        open_revs: vec![rev("2-aaa"), rev("2-zzz"), rev("1-bbb")],
    };
    assert_eq!(leaves.winner("d").unwrap(), &rev("2-zzz"));
}

#[test]
fn test_id_read_resolves_the_winner() {
    let (_dir, store) = open_store();

    // Three replicated branches of one document
    store
        .bulk_write(&[replicated("d", "1-bbb", &[])], false)
        .unwrap();
    store
        .bulk_write(&[replicated("d", "2-aaa", &["bbb"])], false)
        .unwrap();
    store
        .bulk_write(&[replicated("d", "2-zzz", &["bbb"])], false)
        .unwrap();

    let leaves = store.get_leaves("d").unwrap();
    assert_eq!(leaves.open_revs.len(), 3);
    assert_eq!(leaves.winner("d").unwrap(), &rev("2-zzz"));

    // Higher generation beats digest; among equals the larger digest wins
    let winner = store.read("d").unwrap();
    assert_eq!(winner.rev, Some(rev("2-zzz")));
}

// ============================================================================
// Replicator Ingest
// ============================================================================

#[test]
fn test_branch_ingest_adds_a_conflict_leaf() {
    let (_dir, store) = open_store();
    store
        .write(&Document::new().with_id("a").with_field("n", 1))
        .unwrap();
    assert_eq!(store.get_leaves("a").unwrap().open_revs.len(), 1);

    // An independent lineage for the same id does not replace the local
    // leaf; it lands next to it
    store
        .bulk_write(&[replicated("a", "1-ffff", &[])], false)
        .unwrap();

    let leaves = store.get_leaves("a").unwrap();
    assert_eq!(leaves.open_revs.len(), 2);
    assert!(leaves.contains(&rev("1-ffff")));
}

#[test]
fn test_replicator_ingest_of_unknown_id() {
    let (_dir, store) = open_store();
    let metas = store
        .bulk_write(&[replicated("new-doc", "3-abc", &["p2", "p1"])], false)
        .unwrap();
    assert_eq!(metas.len(), 1);
    assert_eq!(metas[0].rev, rev("3-abc"));

    // Lineage is stored verbatim
    let log = store.get_ancestry("new-doc", &rev("3-abc")).unwrap();
    assert_eq!(log.start, 3);
    assert_eq!(log.ids, vec!["abc", "p2", "p1"]);

    let doc = store.read("new-doc").unwrap();
    assert_eq!(doc.field("origin"), Some(&"remote".into()));
}

#[test]
fn test_replicator_requires_id_rev_and_lineage() {
    let (_dir, store) = open_store();
    let doc = Document::new().with_id("a").with_field("n", 1);
    let err = store.bulk_write(&[doc], false).unwrap_err();
    assert!(matches!(err, Error::InvalidReplicatorInput));
}

#[test]
fn test_replicator_ingest_is_idempotent_at_most_once() {
    let (_dir, store) = open_store();
    store
        .bulk_write(&[replicated("a", "1-ffff", &[])], false)
        .unwrap();
    let err = store
        .bulk_write(&[replicated("a", "1-ffff", &[])], false)
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateRevision { .. }));

    // The same revision twice within one call is caught as well
    let err = store
        .bulk_write(
            &[replicated("b", "1-cccc", &[]), replicated("b", "1-cccc", &[])],
            false,
        )
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateRevision { .. }));
}

#[test]
fn test_sibling_branches_in_one_batch_keep_every_leaf() {
    let (_dir, store) = open_store();

    // Two branches of one document ingested in a single call, the usual
    // shape of a replicator batch
    let metas = store
        .bulk_write(
            &[replicated("a", "1-aaaa", &[]), replicated("a", "1-bbbb", &[])],
            false,
        )
        .unwrap();
    assert_eq!(metas.len(), 2);

    // Neither leaf-set put clobbered the other
    let leaves = store.get_leaves("a").unwrap();
    assert_eq!(leaves.open_revs.len(), 2);
    assert!(leaves.contains(&rev("1-aaaa")));
    assert!(leaves.contains(&rev("1-bbbb")));

    // Both revisions are live leaves, and the winner resolves among them
    assert!(store.read_revision("a", &rev("1-aaaa")).is_ok());
    assert!(store.read_revision("a", &rev("1-bbbb")).is_ok());
    assert_eq!(store.read("a").unwrap().rev, Some(rev("1-bbbb")));
}

// ============================================================================
// Tombstones
// ============================================================================

#[test]
fn test_delete_is_a_leaf_with_a_marker() {
    let (_dir, store) = open_store();
    store
        .write(&Document::new().with_id("a").with_field("n", 1))
        .unwrap();

    let doc = store.read("a").unwrap();
    let tombstone = store.delete(&doc).unwrap();
    assert_eq!(tombstone.rev.generation(), 2);

    // The tombstone is the winner and still an open leaf
    let current = store.read("a").unwrap();
    assert!(current.deleted);
    assert_eq!(store.get_leaves("a").unwrap().open_revs, vec![tombstone.rev]);

    // A tombstone may be extended like any other leaf
    let mut revived = store.read("a").unwrap();
    revived.deleted = false;
    revived.fields.insert("n".to_string(), 2.into());
    let meta = store.write(&revived).unwrap();
    assert_eq!(meta.rev.generation(), 3);
    assert!(!store.read("a").unwrap().deleted);
}

// ============================================================================
// Bulk Writes & Atomicity
// ============================================================================

#[test]
fn test_bulk_write_returns_one_meta_per_document() {
    let (_dir, store) = open_store();
    let metas = store
        .bulk_write(
            &[
                Document::new().with_id("x").with_field("n", 1),
                Document::new().with_id("y").with_field("n", 2),
                Document::new().with_field("n", 3),
            ],
            true,
        )
        .unwrap();
    assert_eq!(metas.len(), 3);
    assert_eq!(metas[0].id, "x");
    assert_eq!(metas[1].id, "y");
    assert_eq!(metas[2].rev.generation(), 1);

    assert_eq!(store.read("x").unwrap().field("n"), Some(&1.into()));
    assert_eq!(store.read("y").unwrap().field("n"), Some(&2.into()));
}

#[test]
fn test_duplicate_id_creates_in_one_call_are_a_conflict() {
    let (_dir, store) = open_store();

    // Two fresh creates of one id cannot both hold the single leaf
    let err = store
        .bulk_write(
            &[
                Document::new().with_id("a").with_field("n", 1),
                Document::new().with_id("a").with_field("n", 2),
            ],
            true,
        )
        .unwrap_err();
    assert!(matches!(err, Error::UpdateConflict { .. }));
    assert!(err.is_conflict());

    // The call aborted before commit
    assert!(matches!(store.read("a"), Err(Error::NotFound(_))));
}

#[test]
fn test_two_branches_extended_in_one_call() {
    let (_dir, store) = open_store();
    store
        .bulk_write(
            &[replicated("a", "1-aaaa", &[]), replicated("a", "1-bbbb", &[])],
            false,
        )
        .unwrap();

    // Extend both conflict branches in a single batch
    let mut left = store.read_revision("a", &rev("1-aaaa")).unwrap();
    left.fields.insert("side".to_string(), "left".into());
    let mut right = store.read_revision("a", &rev("1-bbbb")).unwrap();
    right.fields.insert("side".to_string(), "right".into());

    let metas = store.bulk_write(&[left, right], true).unwrap();
    assert_eq!(metas.len(), 2);

    let leaves = store.get_leaves("a").unwrap();
    assert_eq!(leaves.open_revs.len(), 2);
    assert!(leaves.contains(&metas[0].rev));
    assert!(leaves.contains(&metas[1].rev));
    assert_eq!(metas[0].rev.generation(), 2);
    assert_eq!(metas[1].rev.generation(), 2);
}

#[test]
fn test_failed_bulk_write_commits_nothing() {
    let (_dir, store) = open_store();

    // Second document updates a revision that was never written
    let good = Document::new().with_id("fresh").with_field("n", 1);
    let mut bad = Document::new().with_id("ghost").with_field("n", 2);
    bad.rev = Some(rev("1-deadbeef"));

    let err = store.bulk_write(&[good, bad], true).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    // The first document's staged ops never reached the store
    assert!(matches!(store.read("fresh"), Err(Error::NotFound(_))));
    assert!(matches!(store.get_leaves("fresh"), Err(Error::NotFound(_))));
}

#[test]
fn test_store_reopens_with_data_intact() {
    let dir = tempfile::tempdir().unwrap();
    let meta = {
        let store =
            RevTreeStore::open(StorageConfig::new(dir.path().to_path_buf())).unwrap();
        store
            .write(&Document::new().with_id("persist").with_field("n", 1))
            .unwrap()
    };

    let store = RevTreeStore::open(StorageConfig::new(dir.path().to_path_buf())).unwrap();
    let doc = store.read("persist").unwrap();
    assert_eq!(doc.rev, Some(meta.rev));
    assert_eq!(doc.field("n"), Some(&1.into()));
}
