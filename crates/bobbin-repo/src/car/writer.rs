//! CAR file writing utilities
//!
//! Re-encodes a decoded block store as a CARv1 archive. Extraction never
//! mutates repositories; this exists so a decoded archive can be written back
//! out (and so tests can build archives).

use crate::error::{RepoError, Result};
use crate::storage::MemoryBlockStore;
use cid::Cid as IpldCid;
use iroh_car::CarWriter;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Write blocks to CAR bytes (in-memory)
///
/// Blocks are written in sorted CID order for determinism.
pub async fn write_car_bytes(roots: Vec<IpldCid>, blocks: &MemoryBlockStore) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let header = iroh_car::CarHeader::new_v1(roots);
    let mut writer = CarWriter::new(header, &mut buffer);

    for (cid, data) in blocks.iter() {
        writer
            .write(*cid, data.as_ref())
            .await
            .map_err(RepoError::serialization)?;
    }

    writer.finish().await.map_err(RepoError::serialization)?;

    buffer.flush().await.map_err(RepoError::io)?;

    Ok(buffer)
}

/// Write blocks to a CAR file
///
/// Like [`write_car_bytes`] but writes the result to `path`.
pub async fn write_car(
    path: impl AsRef<Path>,
    roots: Vec<IpldCid>,
    blocks: &MemoryBlockStore,
) -> Result<()> {
    let bytes = write_car_bytes(roots, blocks).await?;
    tokio::fs::write(path, bytes).await.map_err(RepoError::io)
}
