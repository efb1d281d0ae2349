//! CAR (Content Addressable aRchive) file I/O
//!
//! Repositories are exported from a PDS as CARv1 files: a DAG-CBOR header
//! naming the root commit, followed by varint-framed `(CID, bytes)` sections.
//!
//! # Examples
//!
//! Decoding an archive fetched over the network:
//! ```ignore
//! use bobbin_repo::car::parse_car;
//!
//! let parsed = parse_car(bytes)?;
//! println!("{} blocks, root {:?}", parsed.blocks.len(), parsed.root());
//! ```
//!
//! Re-encoding a decoded block store:
//! ```ignore
//! use bobbin_repo::car::write_car_bytes;
//!
//! let car = write_car_bytes(parsed.roots.clone(), &parsed.blocks).await?;
//! ```

pub mod reader;
pub mod writer;

// Re-export commonly used functions and types
pub use reader::{ParsedCar, parse_car, parse_car_bytes, read_car};
pub use writer::{write_car, write_car_bytes};
