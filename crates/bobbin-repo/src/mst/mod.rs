//! Merkle Search Tree traversal
//!
//! Repository records are indexed by an MST whose nodes are DAG-CBOR blocks in
//! the archive. Extraction only ever reads the tree, so this module holds the
//! wire format and an in-order walker, nothing that mutates or re-hashes.

pub mod node;
pub mod walker;

pub use node::{NodeData, TreeEntry};
pub use walker::{MstWalker, walk_all};
