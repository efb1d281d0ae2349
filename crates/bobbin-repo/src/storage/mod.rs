//! Block storage for decoded archives
//!
//! Blocks are verified against their CID as they are inserted, so anything a
//! reader gets back out of a store is known to match its content address.

pub mod memory;

pub use memory::MemoryBlockStore;
