//! CAR file decoding
//!
//! Decodes a whole CARv1 archive into a verified [`MemoryBlockStore`]. The
//! archive is fully materialized: repositories are bounded in size, and every
//! later stage (commit lookup, MST traversal, record resolution) wants random
//! access to blocks anyway.

use crate::error::{CarError, RepoError, Result};
use crate::storage::MemoryBlockStore;
use crate::varint::decode_uvarint;
use bytes::Bytes;
use cid::Cid as IpldCid;
use std::path::Path;

/// Parsed CAR file data
#[derive(Debug, Clone)]
pub struct ParsedCar {
    /// Root CIDs from the CAR header, in declared order (never empty)
    pub roots: Vec<IpldCid>,
    /// All blocks in the CAR file, verified against their CIDs
    pub blocks: MemoryBlockStore,
}

impl ParsedCar {
    /// The first declared root
    ///
    /// Always present for archives from [`parse_car`]; a hand-built value may
    /// have none.
    pub fn root(&self) -> Option<&IpldCid> {
        self.roots.first()
    }
}

#[derive(Debug, serde::Deserialize)]
struct CarHeader {
    version: u64,
    #[serde(default)]
    roots: Vec<IpldCid>,
}

/// Decode CAR bytes into roots and a verified block store
///
/// Fails with a `MalformedContainer` error if the framing is broken anywhere,
/// and with an `Integrity` error if any block's bytes do not match its CID.
/// Block payloads are zero-copy slices of `data`.
pub fn parse_car(data: Bytes) -> Result<ParsedCar> {
    if data.is_empty() {
        return Err(CarError::Empty.into());
    }

    let mut offset = 0;
    let (_, header_bytes) = next_section(&data, &mut offset)?.ok_or(CarError::Empty)?;
    let header: CarHeader = serde_ipld_dagcbor::from_slice(&header_bytes)
        .map_err(|e| CarError::InvalidHeader(Box::new(e)))?;

    if header.version != 1 {
        return Err(CarError::UnsupportedVersion(header.version).into());
    }
    if header.roots.is_empty() {
        return Err(CarError::NoRoots.into());
    }

    let mut blocks = MemoryBlockStore::new();
    while let Some((section_offset, section)) = next_section(&data, &mut offset)? {
        let mut reader: &[u8] = &section;
        let cid = IpldCid::read_bytes(&mut reader).map_err(|source| CarError::InvalidCid {
            offset: section_offset,
            source,
        })?;
        let cid_len = section.len() - reader.len();
        blocks.insert(cid, section.slice(cid_len..))?;
    }

    tracing::debug!(roots = header.roots.len(), blocks = blocks.len(), "decoded CAR");

    Ok(ParsedCar {
        roots: header.roots,
        blocks,
    })
}

/// Decode borrowed CAR bytes
///
/// Copies the input once; prefer [`parse_car`] when the bytes are already owned.
pub fn parse_car_bytes(data: &[u8]) -> Result<ParsedCar> {
    parse_car(Bytes::copy_from_slice(data))
}

/// Read and decode a CAR file from disk
pub async fn read_car(path: impl AsRef<Path>) -> Result<ParsedCar> {
    let data = tokio::fs::read(path).await.map_err(RepoError::io)?;
    parse_car(Bytes::from(data))
}

/// Read the next varint-framed section, advancing `offset` past it
///
/// Returns `None` at a clean end of input, along with the section's starting
/// offset otherwise.
fn next_section(data: &Bytes, offset: &mut usize) -> Result<Option<(usize, Bytes)>> {
    let start = *offset;
    if start >= data.len() {
        return Ok(None);
    }

    let (declared, prefix_len) =
        decode_uvarint(&data[start..]).ok_or(CarError::BadVarint { offset: start })?;
    if declared == 0 {
        return Err(CarError::EmptySection { offset: start }.into());
    }

    let body_start = start + prefix_len;
    let remaining = data.len() - body_start;
    let len = usize::try_from(declared)
        .ok()
        .filter(|len| *len <= remaining)
        .ok_or(CarError::Truncated {
            offset: start,
            declared,
            remaining,
        })?;

    *offset = body_start + len;
    Ok(Some((start, data.slice(body_start..body_start + len))))
}
