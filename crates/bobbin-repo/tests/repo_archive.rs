//! End-to-end reads of whole repository archives built in-test

use std::collections::BTreeMap;

use bobbin_repo::{
    Commit, DAG_CBOR, KeyCodec, MemoryBlockStore, MstWalker, NodeData, PublicKey, RecordOutcome,
    RepoErrorKind, TreeEntry, Trust, compute_cid, locate_commit, parse_car, parse_car_bytes,
    resolve_record, walk_all, write_car_bytes,
};
use bytes::Bytes;
use cid::Cid;
use ipld_core::ipld::Ipld;
use k256::ecdsa::{Signature, SigningKey, signature::Signer};

const DID: &str = "did:plc:testrepo";

struct Fixture {
    store: MemoryBlockStore,
    commit_cid: Cid,
    key: PublicKey,
}

fn put<T: serde::Serialize>(store: &mut MemoryBlockStore, value: &T) -> Cid {
    let data = serde_ipld_dagcbor::to_vec(value).unwrap();
    let cid = compute_cid(DAG_CBOR, &data).unwrap();
    store.insert(cid, data).unwrap();
    cid
}

fn post(text: &str) -> Ipld {
    let mut map = BTreeMap::new();
    map.insert("$type".to_string(), Ipld::String("app.bsky.feed.post".into()));
    map.insert("text".to_string(), Ipld::String(text.into()));
    Ipld::Map(map)
}

/// Build a signed repository with the given sorted keys in a single MST node
fn build_repo(keys: &[&str]) -> Fixture {
    let mut store = MemoryBlockStore::new();

    let mut entries = Vec::new();
    let mut previous = "";
    for key in keys {
        let value = put(&mut store, &post(key));
        let shared = previous
            .bytes()
            .zip(key.bytes())
            .take_while(|(a, b)| a == b)
            .count();
        entries.push(TreeEntry {
            key_suffix: Bytes::copy_from_slice(key[shared..].as_bytes()),
            prefix_len: shared as u32,
            tree: None,
            value,
        });
        previous = *key;
    }
    let data = put(&mut store, &NodeData { left: None, entries });

    let sk = SigningKey::from_slice(&[42u8; 32]).unwrap();
    let mut commit = Commit {
        did: DID.into(),
        rev: Some("3l5yhcgz7y42y".into()),
        sig: Bytes::new(),
        data,
        prev: None,
        version: 3,
    };
    let sig: Signature = sk.sign(&commit.unsigned_bytes().unwrap());
    commit.sig = Bytes::copy_from_slice(&sig.to_bytes());
    let commit_cid = put(&mut store, &commit);

    let point = sk.verifying_key().to_encoded_point(true);
    Fixture {
        store,
        commit_cid,
        key: PublicKey {
            codec: KeyCodec::Secp256k1,
            bytes: Bytes::copy_from_slice(point.as_bytes()),
        },
    }
}

#[tokio::test]
async fn test_archive_to_records() {
    let keys = [
        "app.bsky.actor.profile/self",
        "app.bsky.feed.post/3k2a",
        "app.bsky.feed.post/3k2b",
        "app.bsky.graph.follow/3k3a",
    ];
    let fixture = build_repo(&keys);
    let bytes = write_car_bytes(vec![fixture.commit_cid], &fixture.store)
        .await
        .unwrap();

    let car = parse_car(Bytes::from(bytes)).unwrap();
    let located = locate_commit(&car).unwrap();
    assert_eq!(located.cid, fixture.commit_cid);
    assert_eq!(located.commit.did(), DID);
    assert_eq!(located.commit.trust(Some(&fixture.key)), Trust::Verified);

    let mut exported = Vec::new();
    for leaf in MstWalker::new(&car.blocks, *located.commit.data()) {
        let (key, cid) = leaf.unwrap();
        match resolve_record(&car.blocks, &key, &cid) {
            RecordOutcome::Ok(record) => exported.push(record),
            RecordOutcome::Skipped(s) => panic!("unexpected skip: {:?}", s),
        }
    }

    let paths: Vec<_> = exported.iter().map(|r| r.path.to_string()).collect();
    assert_eq!(paths, keys);
    assert_eq!(exported[1].path.collection(), Some("app.bsky.feed.post"));
    assert_eq!(exported[1].value.type_name(), Some("app.bsky.feed.post"));
}

#[tokio::test]
async fn test_decode_encode_decode_is_lossless() {
    let fixture = build_repo(&["app.bsky.feed.post/a", "app.bsky.feed.post/b"]);
    let first = write_car_bytes(vec![fixture.commit_cid], &fixture.store)
        .await
        .unwrap();

    let decoded = parse_car_bytes(&first).unwrap();
    let second = write_car_bytes(decoded.roots.clone(), &decoded.blocks)
        .await
        .unwrap();
    let redecoded = parse_car_bytes(&second).unwrap();

    assert_eq!(redecoded.roots, decoded.roots);
    assert_eq!(redecoded.blocks.len(), fixture.store.len());
    for (cid, data) in fixture.store.iter() {
        assert_eq!(redecoded.blocks.get(cid).unwrap(), data);
    }
}

#[tokio::test]
async fn test_empty_tree_has_commit_and_no_records() {
    let fixture = build_repo(&[]);
    let bytes = write_car_bytes(vec![fixture.commit_cid], &fixture.store)
        .await
        .unwrap();

    let car = parse_car_bytes(&bytes).unwrap();
    let located = locate_commit(&car).unwrap();
    assert!(walk_all(&car.blocks, *located.commit.data()).unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_record_block_is_skipped_not_fatal() {
    let keys = ["app.bsky.feed.post/a", "app.bsky.feed.post/b", "app.bsky.feed.post/c"];
    let fixture = build_repo(&keys);

    // Drop the record block behind the second key
    let leaves = walk_all(&fixture.store, {
        let commit = Commit::from_cbor(fixture.store.get(&fixture.commit_cid).unwrap()).unwrap();
        *commit.data()
    })
    .unwrap();
    let dropped = leaves[1].1;
    let mut pruned = MemoryBlockStore::new();
    for (cid, data) in fixture.store.iter().filter(|(cid, _)| **cid != dropped) {
        pruned.insert(*cid, data.clone()).unwrap();
    }

    let bytes = write_car_bytes(vec![fixture.commit_cid], &pruned).await.unwrap();
    let car = parse_car_bytes(&bytes).unwrap();
    let located = locate_commit(&car).unwrap();

    let outcomes: Vec<_> = walk_all(&car.blocks, *located.commit.data())
        .unwrap()
        .into_iter()
        .map(|(key, cid)| resolve_record(&car.blocks, &key, &cid))
        .collect();
    assert!(matches!(outcomes[0], RecordOutcome::Ok(_)));
    assert!(matches!(&outcomes[1], RecordOutcome::Skipped(s) if s.key == "app.bsky.feed.post/b"));
    assert!(matches!(outcomes[2], RecordOutcome::Ok(_)));
}

#[tokio::test]
async fn test_missing_tree_node_is_corrupt() {
    let fixture = build_repo(&["app.bsky.feed.post/a"]);
    let commit = Commit::from_cbor(fixture.store.get(&fixture.commit_cid).unwrap()).unwrap();
    let mut pruned = MemoryBlockStore::new();
    for (cid, data) in fixture.store.iter().filter(|(cid, _)| *cid != commit.data()) {
        pruned.insert(*cid, data.clone()).unwrap();
    }

    let bytes = write_car_bytes(vec![fixture.commit_cid], &pruned).await.unwrap();
    let car = parse_car_bytes(&bytes).unwrap();
    let located = locate_commit(&car).unwrap();
    let err = walk_all(&car.blocks, *located.commit.data()).unwrap_err();
    assert_eq!(err.kind(), &RepoErrorKind::CorruptTree);
}

#[tokio::test]
async fn test_tampered_block_is_integrity_error() {
    let fixture = build_repo(&["app.bsky.feed.post/a"]);
    let bytes = write_car_bytes(vec![fixture.commit_cid], &fixture.store)
        .await
        .unwrap();

    // Flip the last payload byte of the final section
    let mut tampered = bytes.clone();
    let last = tampered.len() - 1;
    tampered[last] ^= 0x01;

    let err = parse_car_bytes(&tampered).unwrap_err();
    assert_eq!(err.kind(), &RepoErrorKind::Integrity);
}
