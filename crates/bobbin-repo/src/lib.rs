//! Read-side AT Protocol repository primitives
//!
//! Everything needed to turn a repository archive into records, without a
//! network or a writable tree:
//!
//! - **CAR decoding**: CARv1 containers with every block checked against its CID
//! - **Storage**: an in-memory, content-verified block store
//! - **Commits**: locating the signed commit and checking its signature
//! - **MST traversal**: a lazy in-order walk of the record index
//! - **Records**: schema-free decoding of record blocks to JSON-ready values
//!
//! # Example
//!
//! ```rust,ignore
//! use bobbin_repo::{parse_car, locate_commit, MstWalker, resolve_record, RecordOutcome};
//!
//! # fn example(bytes: bytes::Bytes) -> bobbin_repo::Result<()> {
//! let car = parse_car(bytes)?;
//! let located = locate_commit(&car)?;
//!
//! for leaf in MstWalker::new(&car.blocks, *located.commit.data()) {
//!     let (key, cid) = leaf?;
//!     if let RecordOutcome::Ok(record) = resolve_record(&car.blocks, &key, &cid) {
//!         println!("{}: {:?}", record.path, record.value.type_name());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

/// CID computation and block verification
pub mod block;
/// CAR (Content Addressable aRchive) utilities
pub mod car;
/// Commit structures and signature verification
pub mod commit;
pub mod error;
/// Merkle Search Tree traversal
pub mod mst;
pub mod record;
/// Block storage
pub mod storage;
/// Unsigned LEB128 varints
pub mod varint;

pub use block::{DAG_CBOR, RAW, SHA2_256, compute_cid, verify_block};
pub use car::{ParsedCar, parse_car, parse_car_bytes, read_car, write_car, write_car_bytes};
pub use commit::{Commit, KeyCodec, LocatedCommit, PublicKey, Trust, locate_commit};
pub use error::{RepoError, RepoErrorKind, Result};
pub use mst::{MstWalker, NodeData, TreeEntry, walk_all};
pub use record::{Record, RecordOutcome, RecordPath, RecordValue, SkippedRecord, resolve_record};
pub use storage::MemoryBlockStore;

pub use cid::Cid;
