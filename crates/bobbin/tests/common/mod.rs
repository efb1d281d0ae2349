//! Mock collaborators and in-test repository builders

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use bobbin::{BlobPage, BlobTransport, RepoTransport, TransportError};
use bobbin_identity::{IdentityError, IdentityResolver, ResolvedIdentity};
use bobbin_repo::{
    Cid, Commit, DAG_CBOR, KeyCodec, MemoryBlockStore, NodeData, PublicKey, RAW, TreeEntry,
    compute_cid, write_car_bytes,
};
use bytes::Bytes;
use ipld_core::ipld::Ipld;
use k256::ecdsa::{Signature, SigningKey, signature::Signer};
use smol_str::SmolStr;
use url::Url;

pub fn identity(did: &str) -> ResolvedIdentity {
    ResolvedIdentity {
        did: did.into(),
        handle: None,
        pds: Url::parse("https://pds.example.com").unwrap(),
        signing_key: None,
    }
}

pub fn signing_key() -> SigningKey {
    SigningKey::from_slice(&[11u8; 32]).unwrap()
}

pub fn public_key() -> PublicKey {
    let point = signing_key().verifying_key().to_encoded_point(true);
    PublicKey {
        codec: KeyCodec::Secp256k1,
        bytes: Bytes::copy_from_slice(point.as_bytes()),
    }
}

pub fn post(text: &str) -> Ipld {
    let mut map = BTreeMap::new();
    map.insert("$type".to_string(), Ipld::String("app.bsky.feed.post".into()));
    map.insert("text".to_string(), Ipld::String(text.into()));
    Ipld::Map(map)
}

/// Builds a signed single-node repository archive
pub struct RepoBuilder {
    did: String,
    store: MemoryBlockStore,
    leaves: Vec<(String, Cid)>,
}

impl RepoBuilder {
    pub fn new(did: &str) -> Self {
        Self {
            did: did.to_string(),
            store: MemoryBlockStore::new(),
            leaves: Vec::new(),
        }
    }

    fn put<T: serde::Serialize>(&mut self, value: &T) -> Cid {
        let data = serde_ipld_dagcbor::to_vec(value).unwrap();
        let cid = compute_cid(DAG_CBOR, &data).unwrap();
        self.store.insert(cid, data).unwrap();
        cid
    }

    /// Add a record; keys must be added in ascending order
    pub fn record(mut self, key: &str, value: Ipld) -> Self {
        let cid = self.put(&value);
        self.leaves.push((key.to_string(), cid));
        self
    }

    /// Add a leaf whose block is not DAG-CBOR
    pub fn garbage_record(mut self, key: &str) -> Self {
        let data = vec![0xff, 0xfe, 0xfd];
        let cid = compute_cid(RAW, &data).unwrap();
        self.store.insert(cid, data).unwrap();
        self.leaves.push((key.to_string(), cid));
        self
    }

    /// Add a leaf whose block is left out of the archive
    pub fn missing_record(mut self, key: &str) -> Self {
        let cid = compute_cid(DAG_CBOR, key.as_bytes()).unwrap();
        self.leaves.push((key.to_string(), cid));
        self
    }

    pub async fn build(mut self) -> Bytes {
        let mut entries = Vec::new();
        let mut previous = String::new();
        for (key, value) in &self.leaves {
            let shared = previous
                .bytes()
                .zip(key.bytes())
                .take_while(|(a, b)| a == b)
                .count();
            entries.push(TreeEntry {
                key_suffix: Bytes::copy_from_slice(key[shared..].as_bytes()),
                prefix_len: shared as u32,
                tree: None,
                value: *value,
            });
            previous = key.clone();
        }
        let data = self.put(&NodeData {
            left: None,
            entries,
        });

        let mut commit = Commit {
            did: self.did.as_str().into(),
            rev: Some("3l5yhcgz7y42y".into()),
            sig: Bytes::new(),
            data,
            prev: None,
            version: 3,
        };
        let sig: Signature = signing_key().sign(&commit.unsigned_bytes().unwrap());
        commit.sig = Bytes::copy_from_slice(&sig.to_bytes());
        let root = self.put(&commit);

        Bytes::from(write_car_bytes(vec![root], &self.store).await.unwrap())
    }
}

/// Resolver answering from a fixed table; unknown identifiers fail
#[derive(Default)]
pub struct MockResolver {
    pub identities: HashMap<String, ResolvedIdentity>,
    pub calls: AtomicUsize,
}

impl MockResolver {
    pub fn with(mut self, identifier: &str, ident: ResolvedIdentity) -> Self {
        self.identities.insert(identifier.to_string(), ident);
        self
    }
}

impl IdentityResolver for MockResolver {
    async fn resolve(&self, identifier: &str) -> Result<ResolvedIdentity, IdentityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.identities
            .get(identifier)
            .cloned()
            .ok_or_else(|| IdentityError::UnresolvedHandle(identifier.to_string()))
    }
}

/// PDS serving fixed archives and paginated blob listings
#[derive(Default)]
pub struct MockPds {
    pub archives: HashMap<String, Bytes>,
    /// Listing pages in order; page `n` is served for cursor `"n"`
    pub pages: Vec<Vec<String>>,
    pub blobs: HashMap<String, Bytes>,
    pub archive_fetches: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub blob_fetches: AtomicUsize,
}

impl MockPds {
    pub fn archive(mut self, did: &str, car: Bytes) -> Self {
        self.archives.insert(did.to_string(), car);
        self
    }

    /// Add a page of blobs, returning their CIDs
    pub fn blob_page(mut self, contents: &[&str]) -> Self {
        let mut page = Vec::new();
        for data in contents {
            let cid = compute_cid(RAW, data.as_bytes()).unwrap().to_string();
            self.blobs
                .insert(cid.clone(), Bytes::copy_from_slice(data.as_bytes()));
            page.push(cid);
        }
        self.pages.push(page);
        self
    }

    /// Serve the wrong bytes for a listed blob
    pub fn corrupt(mut self, cid: &str) -> Self {
        self.blobs
            .insert(cid.to_string(), Bytes::from_static(b"not the blob you asked for"));
        self
    }

    pub fn fetches(&self) -> usize {
        self.blob_fetches.load(Ordering::SeqCst)
    }
}

impl RepoTransport for MockPds {
    async fn fetch_archive(&self, _endpoint: &Url, did: &str) -> Result<Bytes, TransportError> {
        self.archive_fetches.fetch_add(1, Ordering::SeqCst);
        self.archives.get(did).cloned().ok_or(TransportError::Xrpc {
            method: "com.atproto.sync.getRepo",
            status: 400,
            message: "RepoNotFound".into(),
        })
    }
}

impl BlobTransport for MockPds {
    async fn list_blobs(
        &self,
        _endpoint: &Url,
        _did: &str,
        cursor: Option<&str>,
        _limit: u32,
    ) -> Result<BlobPage, TransportError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let index: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
        let cids: Vec<SmolStr> = self
            .pages
            .get(index)
            .map(|p| p.iter().map(|c| c.as_str().into()).collect())
            .unwrap_or_default();
        let cursor: Option<SmolStr> = if index + 1 < self.pages.len() {
            Some((index + 1).to_string().into())
        } else {
            None
        };
        Ok(BlobPage { cids, cursor })
    }

    async fn fetch_blob(&self, _endpoint: &Url, _did: &str, cid: &str) -> Result<Bytes, TransportError> {
        self.blob_fetches.fetch_add(1, Ordering::SeqCst);
        self.blobs.get(cid).cloned().ok_or(TransportError::Xrpc {
            method: "com.atproto.sync.getBlob",
            status: 404,
            message: "BlobNotFound".into(),
        })
    }
}
