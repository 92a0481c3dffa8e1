//! Key codec for the three record families
//!
//! All records share one partition; `doc!`, `revs!` and `leaves!` prefixes
//! keep the families apart under lexicographic ordering. The `!` separator is
//! forbidden inside document ids (validated on write) and rejected by
//! revision-id parsing, so every key parses back unambiguously.

use crate::error::{Error, Result};

pub(crate) const SEPARATOR: char = '!';

const NODE_PREFIX: &str = "doc";
const ANCESTRY_PREFIX: &str = "revs";
const LEAF_SET_PREFIX: &str = "leaves";

/// Which record family a key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Node,
    Ancestry,
    LeafSet,
}

/// A key split back into its components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    pub family: KeyFamily,
    pub id: String,
    pub rev: Option<String>,
}

/// Key of the node record for `(id, rev)`
pub fn node_key(id: &str, rev: &str) -> Vec<u8> {
    format!("{NODE_PREFIX}{SEPARATOR}{id}{SEPARATOR}{rev}").into_bytes()
}

/// Key of the ancestry record for `(id, rev)`
pub fn ancestry_key(id: &str, rev: &str) -> Vec<u8> {
    format!("{ANCESTRY_PREFIX}{SEPARATOR}{id}{SEPARATOR}{rev}").into_bytes()
}

/// Key of the leaf-set record for `id`
pub fn leaf_set_key(id: &str) -> Vec<u8> {
    format!("{LEAF_SET_PREFIX}{SEPARATOR}{id}").into_bytes()
}

/// Reject ids that would make keys ambiguous
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id.contains(SEPARATOR) {
        return Err(Error::InvalidDocumentId(id.to_string()));
    }
    Ok(())
}

/// Split a stored key back into `(family, id, rev)`
pub fn parse(key: &[u8]) -> Option<ParsedKey> {
    let key = std::str::from_utf8(key).ok()?;
    let mut parts = key.splitn(3, SEPARATOR);
    let prefix = parts.next()?;
    let id = parts.next()?.to_string();
    let rev = parts.next().map(str::to_string);

    let family = match (prefix, rev.is_some()) {
        (NODE_PREFIX, true) => KeyFamily::Node,
        (ANCESTRY_PREFIX, true) => KeyFamily::Ancestry,
        (LEAF_SET_PREFIX, false) => KeyFamily::LeafSet,
        _ => return None,
    };

    Some(ParsedKey { family, id, rev })
}
