//! Content identifiers: computing and verifying block CIDs

use crate::error::{RepoError, Result};
use cid::Cid as IpldCid;
use sha2::{Digest, Sha256};

/// DAG-CBOR codec identifier for CIDs (0x71)
pub const DAG_CBOR: u64 = 0x71;

/// Raw codec identifier for CIDs (0x55), used by blobs
pub const RAW: u64 = 0x55;

/// SHA2-256 multihash code (0x12)
pub const SHA2_256: u64 = 0x12;

/// Compute a CIDv1 for `data` under the given codec
///
/// Uses SHA-256, the only hash function AT Protocol repositories use.
pub fn compute_cid(codec: u64, data: &[u8]) -> Result<IpldCid> {
    let hash = Sha256::digest(data);
    let mh = multihash::Multihash::<64>::wrap(SHA2_256, hash.as_slice())
        .map_err(|e| RepoError::integrity(e.to_string()))?;
    Ok(IpldCid::new_v1(codec, mh))
}

/// Check that `data` hashes to the digest declared by `cid`
///
/// Fails with an integrity error on a digest mismatch, or when the CID declares
/// a hash function other than SHA2-256 (which could not be checked).
pub fn verify_block(cid: &IpldCid, data: &[u8]) -> Result<()> {
    let declared = cid.hash();
    if declared.code() != SHA2_256 {
        return Err(RepoError::integrity(format!(
            "unsupported multihash 0x{:x}",
            declared.code()
        ))
        .with_context(format!("block {}", cid)));
    }

    let actual = Sha256::digest(data);
    if declared.digest() != actual.as_slice() {
        return Err(RepoError::integrity("digest mismatch").with_context(format!("block {}", cid)));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RepoErrorKind;

    #[test]
    fn test_compute_cid_known_digest() {
        let cid = compute_cid(RAW, b"hello world").unwrap();
        assert_eq!(cid.codec(), RAW);
        assert_eq!(
            hex::encode(cid.hash().digest()),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_verify_block_accepts_matching_bytes() {
        let cid = compute_cid(DAG_CBOR, b"block").unwrap();
        assert!(verify_block(&cid, b"block").is_ok());
    }

    #[test]
    fn test_verify_block_rejects_mismatch() {
        let cid = compute_cid(DAG_CBOR, b"block").unwrap();
        let err = verify_block(&cid, b"other").unwrap_err();
        assert_eq!(err.kind(), &RepoErrorKind::Integrity);
    }

    #[test]
    fn test_verify_block_rejects_unknown_hash() {
        // identity multihash (0x00) cannot be checked against SHA-256
        let mh = multihash::Multihash::<64>::wrap(0x00, b"block").unwrap();
        let cid = IpldCid::new_v1(DAG_CBOR, mh);
        let err = verify_block(&cid, b"block").unwrap_err();
        assert_eq!(err.kind(), &RepoErrorKind::Integrity);
    }
}
