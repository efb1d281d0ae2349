//! In-order MST walker

use bytes::Bytes;
use cid::Cid as IpldCid;
use smol_str::SmolStr;

use super::node::{NodeData, TreeEntry};
use crate::error::{MstError, Result};
use crate::storage::MemoryBlockStore;

enum Step {
    /// Node not yet loaded
    Visit(IpldCid),
    /// Remaining entries of a loaded node
    Entries(std::vec::IntoIter<TreeEntry>),
}

/// Lazy in-order iterator over the `(key, value CID)` leaves of an MST
///
/// Nodes are loaded from the store only when the walk descends into them.
/// The walk uses an explicit stack, so tree depth does not grow the call
/// stack. Keys come out in strictly ascending order; any violation, and any
/// missing or undecodable node, yields one `CorruptTree` error after which
/// the iterator is fused.
///
/// # Example
///
/// ```rust,ignore
/// for entry in MstWalker::new(&car.blocks, *commit.data()) {
///     let (key, cid) = entry?;
///     println!("{key} -> {cid}");
/// }
/// ```
pub struct MstWalker<'a> {
    store: &'a MemoryBlockStore,
    stack: Vec<Step>,
    last_key: Option<Vec<u8>>,
    done: bool,
}

impl<'a> MstWalker<'a> {
    /// Start a walk at the given root node
    pub fn new(store: &'a MemoryBlockStore, root: IpldCid) -> Self {
        Self {
            store,
            stack: vec![Step::Visit(root)],
            last_key: None,
            done: false,
        }
    }

    fn load(&self, cid: &IpldCid) -> std::result::Result<NodeData, MstError> {
        let block = self
            .store
            .get(cid)
            .map_err(|_| MstError::MissingNode { cid: *cid })?;
        NodeData::from_cbor(cid, block)
    }

    /// Rebuild a full key from the previously emitted key and check ordering
    fn next_key(&self, prefix_len: u32, suffix: &Bytes) -> std::result::Result<Vec<u8>, MstError> {
        let previous = self.last_key.as_deref().unwrap_or_default();
        let prefix_len = prefix_len as usize;
        if prefix_len > previous.len() {
            return Err(MstError::PrefixOverflow {
                prefix_len,
                previous_len: previous.len(),
            });
        }

        let mut key = Vec::with_capacity(prefix_len + suffix.len());
        key.extend_from_slice(&previous[..prefix_len]);
        key.extend_from_slice(suffix);

        if self.last_key.is_some() {
            if key.as_slice() == previous {
                return Err(MstError::DuplicateKey {
                    key: String::from_utf8_lossy(&key).into_owned(),
                });
            }
            if key.as_slice() < previous {
                return Err(MstError::OutOfOrder {
                    key: String::from_utf8_lossy(&key).into_owned(),
                    previous: String::from_utf8_lossy(previous).into_owned(),
                });
            }
        }

        Ok(key)
    }

    fn step(&mut self) -> std::result::Result<Option<(SmolStr, IpldCid)>, MstError> {
        while let Some(step) = self.stack.pop() {
            match step {
                Step::Visit(cid) => {
                    let node = self.load(&cid)?;
                    self.stack.push(Step::Entries(node.entries.into_iter()));
                    if let Some(left) = node.left {
                        self.stack.push(Step::Visit(left));
                    }
                }
                Step::Entries(mut entries) => {
                    let Some(entry) = entries.next() else {
                        continue;
                    };
                    self.stack.push(Step::Entries(entries));
                    if let Some(tree) = entry.tree {
                        self.stack.push(Step::Visit(tree));
                    }

                    let key = self.next_key(entry.prefix_len, &entry.key_suffix)?;
                    let text = String::from_utf8(key.clone()).map_err(MstError::InvalidUtf8)?;
                    self.last_key = Some(key);
                    return Ok(Some((SmolStr::new(text), entry.value)));
                }
            }
        }
        Ok(None)
    }
}

impl Iterator for MstWalker<'_> {
    type Item = Result<(SmolStr, IpldCid)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(leaf)) => Some(Ok(leaf)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                self.stack.clear();
                Some(Err(e.into()))
            }
        }
    }
}

/// Collect every leaf under `root`, failing on the first error
pub fn walk_all(store: &MemoryBlockStore, root: IpldCid) -> Result<Vec<(SmolStr, IpldCid)>> {
    MstWalker::new(store, root).collect()
}
