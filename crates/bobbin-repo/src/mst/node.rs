//! MST node wire format

use bytes::Bytes;
use cid::Cid as IpldCid;

use crate::error::{MstError, RepoError};

/// Wire format entry (prefix-compressed leaf with optional subtree pointer)
///
/// Fields are declared in DAG-CBOR canonical order (k, p, t, v).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TreeEntry {
    /// Key suffix after the shared prefix
    ///
    /// Encoded as a CBOR byte string, not an array of integers.
    #[serde(rename = "k", with = "crate::commit::serde_bytes_helper")]
    pub key_suffix: Bytes,

    /// Number of leading bytes shared with the previous key
    #[serde(rename = "p")]
    pub prefix_len: u32,

    /// Subtree holding keys between this entry and the next
    #[serde(rename = "t")]
    pub tree: Option<IpldCid>,

    /// CID of the record value
    #[serde(rename = "v")]
    pub value: IpldCid,
}

/// Wire format node data (serialized as DAG-CBOR)
///
/// Absent subtree pointers are written as explicit `null`, never skipped:
/// the encoding has to be deterministic for CIDs to match across
/// implementations.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct NodeData {
    /// Left-most subtree pointer
    #[serde(rename = "l")]
    pub left: Option<IpldCid>,

    /// Entries in this node, sorted by full key
    #[serde(rename = "e")]
    pub entries: Vec<TreeEntry>,
}

impl NodeData {
    /// Decode a node block
    pub fn from_cbor(cid: &IpldCid, data: &[u8]) -> Result<Self, MstError> {
        serde_ipld_dagcbor::from_slice(data).map_err(|e| MstError::InvalidNode {
            cid: *cid,
            source: Box::new(e),
        })
    }

    /// Encode to DAG-CBOR
    pub fn to_cbor(&self) -> crate::error::Result<Vec<u8>> {
        serde_ipld_dagcbor::to_vec(self).map_err(RepoError::serialization)
    }

    /// Whether the node has neither entries nor a left subtree
    pub fn is_empty(&self) -> bool {
        self.left.is_none() && self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{DAG_CBOR, compute_cid};
    use ipld_core::ipld::Ipld;

    #[test]
    fn test_null_pointers_are_explicit() {
        let value = compute_cid(DAG_CBOR, b"record").unwrap();
        let node = NodeData {
            left: None,
            entries: vec![TreeEntry {
                key_suffix: Bytes::from_static(b"app.bsky.feed.post/abc123"),
                prefix_len: 0,
                tree: None,
                value,
            }],
        };

        let cbor = node.to_cbor().unwrap();
        let generic: Ipld = serde_ipld_dagcbor::from_slice(&cbor).unwrap();
        let Ipld::Map(map) = generic else {
            panic!("node should encode as a map");
        };
        assert_eq!(map.get("l"), Some(&Ipld::Null));

        let cid = compute_cid(DAG_CBOR, &cbor).unwrap();
        assert_eq!(NodeData::from_cbor(&cid, &cbor).unwrap(), node);
    }

    #[test]
    fn test_key_suffix_is_byte_string() {
        let node = NodeData {
            left: None,
            entries: vec![TreeEntry {
                key_suffix: Bytes::from_static(b"k"),
                prefix_len: 3,
                tree: None,
                value: compute_cid(DAG_CBOR, b"v").unwrap(),
            }],
        };
        let cbor = node.to_cbor().unwrap();
        let generic: Ipld = serde_ipld_dagcbor::from_slice(&cbor).unwrap();
        let Ipld::Map(map) = generic else {
            panic!("node should encode as a map");
        };
        let Some(Ipld::List(entries)) = map.get("e") else {
            panic!("entries should encode as a list");
        };
        let Ipld::Map(entry) = &entries[0] else {
            panic!("entry should encode as a map");
        };
        assert_eq!(entry.get("k"), Some(&Ipld::Bytes(b"k".to_vec())));
        assert_eq!(entry.get("p"), Some(&Ipld::Integer(3)));
    }

    #[test]
    fn test_non_node_block_is_invalid() {
        let data = serde_ipld_dagcbor::to_vec(&vec![1u8, 2, 3]).unwrap();
        let cid = compute_cid(DAG_CBOR, &data).unwrap();
        assert!(matches!(
            NodeData::from_cbor(&cid, &data),
            Err(MstError::InvalidNode { .. })
        ));
    }
}
