//! In-memory block storage implementation

use crate::block::verify_block;
use crate::error::{RepoError, Result};
use bytes::Bytes;
use cid::Cid as IpldCid;
use std::collections::BTreeMap;

/// In-memory block storage using BTreeMap
///
/// Built once per archive by the CAR decoder and then only read. Reads take
/// `&self`, so a finished store can be shared across threads by reference.
///
/// Uses `Bytes` for efficient reference-counted storage with cheap cloning.
///
/// # Example
///
/// ```rust
/// use bobbin_repo::block::{compute_cid, DAG_CBOR};
/// use bobbin_repo::storage::MemoryBlockStore;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut store = MemoryBlockStore::new();
///
/// let data = b"hello world";
/// let cid = compute_cid(DAG_CBOR, data)?;
/// store.insert(cid, &data[..])?;
///
/// assert_eq!(store.get(&cid)?.as_ref(), data);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBlockStore {
    blocks: BTreeMap<IpldCid, Bytes>,
}

impl MemoryBlockStore {
    /// Create new empty memory store
    pub fn new() -> Self {
        Self {
            blocks: BTreeMap::new(),
        }
    }

    /// Insert a block after checking that its bytes hash to `cid`
    ///
    /// Inserting a block that is already present is a no-op (the bytes are
    /// necessarily identical, having passed verification).
    pub fn insert(&mut self, cid: IpldCid, data: impl Into<Bytes>) -> Result<()> {
        let data = data.into();
        verify_block(&cid, &data)?;
        self.blocks.entry(cid).or_insert(data);
        Ok(())
    }

    /// Get a block by CID
    pub fn get(&self, cid: &IpldCid) -> Result<&Bytes> {
        self.blocks
            .get(cid)
            .ok_or_else(|| RepoError::not_found("block", cid))
    }

    /// Check if a block exists without retrieving it
    pub fn contains(&self, cid: &IpldCid) -> bool {
        self.blocks.contains_key(cid)
    }

    /// Get number of blocks stored
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Check if store is empty
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterate over all blocks in ascending CID order
    pub fn iter(&self) -> impl Iterator<Item = (&IpldCid, &Bytes)> {
        self.blocks.iter()
    }
}
