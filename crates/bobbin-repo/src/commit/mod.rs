//! Commit structures and signature verification for AT Protocol repositories.
//!
//! A repository CAR names its current commit as the header root. The commit
//! points at the MST root (`data`) and carries a detached signature over its own
//! DAG-CBOR encoding without the `sig` field.

pub mod crypto;
pub(crate) mod serde_bytes_helper;

use crate::car::ParsedCar;
use crate::error::{CommitError, RepoError, Result};
use bytes::Bytes;
use cid::Cid as IpldCid;
use smol_str::SmolStr;

pub use crypto::{KeyCodec, PublicKey};

/// Repository commit object
///
/// Fields are declared in DAG-CBOR canonical key order (shorter keys first,
/// then bytewise), so re-encoding reproduces the signed bytes.
///
/// **Version compatibility**: v2 and v3 commits share this shape. Legacy v2
/// commits may lack `rev`, which is why it is optional and skipped when absent.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Commit {
    /// Repository DID
    pub did: SmolStr,

    /// Revision TID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<SmolStr>,

    /// Signature bytes
    #[serde(with = "serde_bytes_helper")]
    pub sig: Bytes,

    /// MST root CID
    pub data: IpldCid,

    /// Previous commit CID (None for initial commit)
    #[serde(default)]
    pub prev: Option<IpldCid>,

    /// Commit version (2 or 3)
    pub version: i64,
}

/// The signed portion of a commit: every field except `sig`
#[derive(serde::Serialize)]
struct UnsignedCommit<'a> {
    did: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    rev: Option<&'a str>,
    data: &'a IpldCid,
    prev: &'a Option<IpldCid>,
    version: i64,
}

/// Trust annotation for a located commit
///
/// Signature checking is advisory: a commit is exported whatever its trust.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trust {
    /// Signature checked against the repository's signing key
    Verified,
    /// No signing key was available to check against
    Unverified,
    /// Signature check failed
    Invalid(String),
}

impl Trust {
    /// Short label for logs and reports
    pub fn label(&self) -> &'static str {
        match self {
            Trust::Verified => "verified",
            Trust::Unverified => "unverified",
            Trust::Invalid(_) => "invalid",
        }
    }
}

impl Commit {
    /// Get the repository DID
    pub fn did(&self) -> &str {
        &self.did
    }

    /// Get the MST root CID
    pub fn data(&self) -> &IpldCid {
        &self.data
    }

    /// Get the revision TID
    pub fn rev(&self) -> Option<&str> {
        self.rev.as_deref()
    }

    /// Get the previous commit CID
    pub fn prev(&self) -> Option<&IpldCid> {
        self.prev.as_ref()
    }

    /// Get the signature bytes
    pub fn sig(&self) -> &Bytes {
        &self.sig
    }

    /// Deserialize from DAG-CBOR, checking the commit shape
    pub fn from_cbor(data: &[u8]) -> std::result::Result<Self, CommitError> {
        let commit: Commit = serde_ipld_dagcbor::from_slice(data)
            .map_err(|e| CommitError::Serialization(Box::new(e)))?;

        if !matches!(commit.version, 2 | 3) {
            return Err(CommitError::InvalidVersion(commit.version));
        }
        if !commit.did.starts_with("did:") {
            return Err(CommitError::InvalidDid(commit.did.to_string()));
        }

        Ok(commit)
    }

    /// Serialize to DAG-CBOR
    pub fn to_cbor(&self) -> std::result::Result<Vec<u8>, CommitError> {
        serde_ipld_dagcbor::to_vec(self).map_err(|e| CommitError::Serialization(Box::new(e)))
    }

    /// Get unsigned commit bytes (for signature verification)
    pub fn unsigned_bytes(&self) -> std::result::Result<Vec<u8>, CommitError> {
        let unsigned = UnsignedCommit {
            did: &self.did,
            rev: self.rev.as_deref(),
            data: &self.data,
            prev: &self.prev,
            version: self.version,
        };
        serde_ipld_dagcbor::to_vec(&unsigned).map_err(|e| CommitError::Serialization(Box::new(e)))
    }

    /// Verify signature against a public key from a DID document.
    ///
    /// The key type is inferred from the PublicKey codec.
    pub fn verify(&self, pubkey: &PublicKey) -> std::result::Result<(), CommitError> {
        let unsigned = self.unsigned_bytes()?;
        pubkey.verify(&unsigned, &self.sig)
    }

    /// Check the signature if a key is available, never failing
    pub fn trust(&self, pubkey: Option<&PublicKey>) -> Trust {
        match pubkey {
            None => Trust::Unverified,
            Some(key) => match self.verify(key) {
                Ok(()) => Trust::Verified,
                Err(e) => Trust::Invalid(e.to_string()),
            },
        }
    }
}

/// A commit found in an archive, with the CID it was stored under
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedCommit {
    /// CID of the commit block
    pub cid: IpldCid,
    /// Decoded commit
    pub commit: Commit,
}

/// Find the repository's signed commit among an archive's roots
///
/// Roots are tried in declared order and the first one whose block decodes as
/// a commit wins. Fails with an `InvalidCommit` error if none does.
pub fn locate_commit(car: &ParsedCar) -> Result<LocatedCommit> {
    let mut last_error = None;

    for root in &car.roots {
        let Ok(block) = car.blocks.get(root) else {
            last_error = Some(format!("root block {} is not in the archive", root));
            continue;
        };

        match Commit::from_cbor(block) {
            Ok(commit) => {
                tracing::debug!(cid = %root, did = %commit.did, rev = ?commit.rev, "located commit");
                return Ok(LocatedCommit {
                    cid: *root,
                    commit,
                });
            }
            Err(e) => last_error = Some(format!("root {}: {}", root, e)),
        }
    }

    Err(RepoError::invalid_commit(
        last_error.unwrap_or_else(|| "archive declares no roots".to_string()),
    )
    .with_help("the CAR root must point at a signed commit with did, version, data and sig"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{DAG_CBOR, compute_cid};
    use crate::error::RepoErrorKind;
    use crate::storage::MemoryBlockStore;

    fn unsigned_commit() -> Commit {
        Commit {
            did: "did:plc:abc123".into(),
            rev: Some("3l5yhcgz7y42y".into()),
            sig: Bytes::new(),
            data: compute_cid(DAG_CBOR, b"mst root").unwrap(),
            prev: None,
            version: 3,
        }
    }

    fn car_with_root(data: Vec<u8>) -> ParsedCar {
        let cid = compute_cid(DAG_CBOR, &data).unwrap();
        let mut blocks = MemoryBlockStore::new();
        blocks.insert(cid, data).unwrap();
        ParsedCar {
            roots: vec![cid],
            blocks,
        }
    }

    #[test]
    fn test_commit_roundtrip() {
        let commit = unsigned_commit();
        let cbor = commit.to_cbor().unwrap();
        let decoded = Commit::from_cbor(&cbor).unwrap();
        assert_eq!(decoded, commit);
    }

    #[test]
    fn test_locate_commit() {
        let commit = unsigned_commit();
        let car = car_with_root(commit.to_cbor().unwrap());

        let located = locate_commit(&car).unwrap();
        assert_eq!(located.cid, car.roots[0]);
        assert_eq!(located.commit.did(), "did:plc:abc123");
        assert_eq!(located.commit.data(), commit.data());
    }

    #[test]
    fn test_locate_commit_skips_non_commit_roots() {
        let commit = unsigned_commit();
        let mut car = car_with_root(serde_ipld_dagcbor::to_vec(&"not a commit").unwrap());
        let commit_cbor = commit.to_cbor().unwrap();
        let commit_cid = compute_cid(DAG_CBOR, &commit_cbor).unwrap();
        car.blocks.insert(commit_cid, commit_cbor).unwrap();
        car.roots.push(commit_cid);

        let located = locate_commit(&car).unwrap();
        assert_eq!(located.cid, commit_cid);
    }

    #[test]
    fn test_wrong_shape_is_invalid_commit() {
        #[derive(serde::Serialize)]
        struct NotACommit {
            did: &'static str,
            version: i64,
        }
        let car = car_with_root(
            serde_ipld_dagcbor::to_vec(&NotACommit {
                did: "did:plc:abc123",
                version: 3,
            })
            .unwrap(),
        );

        let err = locate_commit(&car).unwrap_err();
        assert_eq!(err.kind(), &RepoErrorKind::InvalidCommit);
    }

    #[test]
    fn test_bad_version_is_invalid_commit() {
        let mut commit = unsigned_commit();
        commit.version = 9;
        let car = car_with_root(commit.to_cbor().unwrap());

        let err = locate_commit(&car).unwrap_err();
        assert_eq!(err.kind(), &RepoErrorKind::InvalidCommit);
    }

    #[test]
    fn test_bad_did_is_invalid_commit() {
        let mut commit = unsigned_commit();
        commit.did = "alice.example.com".into();
        let car = car_with_root(commit.to_cbor().unwrap());

        let err = locate_commit(&car).unwrap_err();
        assert_eq!(err.kind(), &RepoErrorKind::InvalidCommit);
    }

    #[test]
    fn test_missing_root_block_is_invalid_commit() {
        let car = ParsedCar {
            roots: vec![compute_cid(DAG_CBOR, b"absent").unwrap()],
            blocks: MemoryBlockStore::new(),
        };

        let err = locate_commit(&car).unwrap_err();
        assert_eq!(err.kind(), &RepoErrorKind::InvalidCommit);
    }

    #[test]
    fn test_unsigned_bytes_omit_sig() {
        let mut commit = unsigned_commit();
        let before = commit.unsigned_bytes().unwrap();
        commit.sig = Bytes::from_static(&[1, 2, 3]);
        assert_eq!(commit.unsigned_bytes().unwrap(), before);
        assert_ne!(commit.to_cbor().unwrap(), before);
    }

    #[test]
    fn test_trust_annotations() {
        use k256::ecdsa::{Signature, SigningKey, signature::Signer};

        let sk = SigningKey::from_slice(&[9u8; 32]).unwrap();
        let point = sk.verifying_key().to_encoded_point(true);
        let key = PublicKey {
            codec: KeyCodec::Secp256k1,
            bytes: Bytes::copy_from_slice(point.as_bytes()),
        };

        let mut commit = unsigned_commit();
        let sig: Signature = sk.sign(&commit.unsigned_bytes().unwrap());
        commit.sig = Bytes::copy_from_slice(&sig.to_bytes());

        assert_eq!(commit.trust(None), Trust::Unverified);
        assert_eq!(commit.trust(Some(&key)), Trust::Verified);

        commit.rev = Some("3l5yhcgz7y43a".into());
        assert!(matches!(commit.trust(Some(&key)), Trust::Invalid(_)));
    }

    #[test]
    fn test_p256_commit_signature() {
        use p256::ecdsa::{Signature, SigningKey, signature::Signer};

        let sk = SigningKey::from_slice(&[5u8; 32]).unwrap();
        let point = sk.verifying_key().to_encoded_point(false);
        let key = PublicKey {
            codec: KeyCodec::P256,
            bytes: Bytes::copy_from_slice(point.as_bytes()),
        };

        let mut commit = unsigned_commit();
        let sig: Signature = sk.sign(&commit.unsigned_bytes().unwrap());
        commit.sig = Bytes::copy_from_slice(&sig.to_bytes());

        assert!(commit.verify(&key).is_ok());
    }
}
