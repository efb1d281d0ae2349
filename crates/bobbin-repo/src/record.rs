//! Record resolution and the generic record value model
//!
//! Records are exported schema-free: whatever DAG-CBOR value sits behind an
//! MST leaf is converted into a [`RecordValue`] and written as JSON using the
//! AT Protocol conventions for binary data (`{"$bytes": ...}`) and links
//! (`{"$link": ...}`).

use std::collections::BTreeMap;
use std::fmt;

use base64::{Engine, prelude::BASE64_STANDARD};
use bytes::Bytes;
use cid::Cid as IpldCid;
use ipld_core::ipld::Ipld;
use serde::{Serialize, Serializer, ser::SerializeMap};
use smol_str::SmolStr;

use crate::error::{RepoError, Result};
use crate::storage::MemoryBlockStore;

/// A decoded record in the IPLD data model
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// Null
    Null,
    /// Boolean
    Boolean(bool),
    /// Integer (DAG-CBOR allows the full 64-bit signed and unsigned ranges)
    Integer(i128),
    /// Float
    Float(f64),
    /// String
    String(SmolStr),
    /// Raw bytes
    Bytes(Bytes),
    /// CID link
    Link(IpldCid),
    /// Array
    Array(Vec<RecordValue>),
    /// Map with string keys
    Object(BTreeMap<SmolStr, RecordValue>),
}

impl RecordValue {
    /// Decode a DAG-CBOR block
    pub fn from_cbor(data: &[u8]) -> Result<Self> {
        let ipld: Ipld = serde_ipld_dagcbor::from_slice(data).map_err(RepoError::serialization)?;
        Ok(ipld.into())
    }

    /// The record's `$type`, if it is an object carrying one
    pub fn type_name(&self) -> Option<&str> {
        match self {
            RecordValue::Object(map) => match map.get("$type") {
                Some(RecordValue::String(t)) => Some(t.as_str()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Pretty-printed JSON bytes
    pub fn to_json_pretty(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(RepoError::serialization)
    }
}

impl From<Ipld> for RecordValue {
    fn from(ipld: Ipld) -> Self {
        match ipld {
            Ipld::Null => RecordValue::Null,
            Ipld::Bool(b) => RecordValue::Boolean(b),
            Ipld::Integer(i) => RecordValue::Integer(i),
            Ipld::Float(f) => RecordValue::Float(f),
            Ipld::String(s) => RecordValue::String(s.into()),
            Ipld::Bytes(b) => RecordValue::Bytes(Bytes::from(b)),
            Ipld::List(items) => RecordValue::Array(items.into_iter().map(Into::into).collect()),
            Ipld::Map(map) => RecordValue::Object(
                map.into_iter()
                    .map(|(k, v)| (SmolStr::from(k), v.into()))
                    .collect(),
            ),
            Ipld::Link(cid) => RecordValue::Link(cid),
        }
    }
}

impl Serialize for RecordValue {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            RecordValue::Null => serializer.serialize_none(),
            RecordValue::Boolean(b) => serializer.serialize_bool(*b),
            RecordValue::Integer(i) => {
                if let Ok(i) = i64::try_from(*i) {
                    serializer.serialize_i64(i)
                } else if let Ok(u) = u64::try_from(*i) {
                    serializer.serialize_u64(u)
                } else {
                    serializer.serialize_i128(*i)
                }
            }
            RecordValue::Float(f) => serializer.serialize_f64(*f),
            RecordValue::String(s) => serializer.serialize_str(s),
            RecordValue::Bytes(bytes) => {
                if serializer.is_human_readable() {
                    // JSON: {"$bytes": "base64 string"}
                    let mut map = serializer.serialize_map(Some(1))?;
                    map.serialize_entry("$bytes", &BASE64_STANDARD.encode(bytes))?;
                    map.end()
                } else {
                    serializer.serialize_bytes(bytes)
                }
            }
            RecordValue::Link(cid) => {
                if serializer.is_human_readable() {
                    // JSON: {"$link": "cid_string"}
                    let mut map = serializer.serialize_map(Some(1))?;
                    map.serialize_entry("$link", &cid.to_string())?;
                    map.end()
                } else {
                    cid.serialize(serializer)
                }
            }
            RecordValue::Array(items) => items.serialize(serializer),
            RecordValue::Object(map) => map.serialize(serializer),
        }
    }
}

/// Logical location of a record: `<collection>/<rkey>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordPath {
    key: SmolStr,
    split: Option<usize>,
}

impl RecordPath {
    /// Split an MST key into collection and record key
    ///
    /// Keys that are not exactly `collection/rkey` with both parts non-empty
    /// are kept as-is with no collection.
    pub fn parse(key: impl Into<SmolStr>) -> Self {
        let key = key.into();
        let split = match key.split_once('/') {
            Some((collection, rkey))
                if !collection.is_empty() && !rkey.is_empty() && !rkey.contains('/') =>
            {
                Some(collection.len())
            }
            _ => None,
        };
        Self { key, split }
    }

    /// The full key
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Collection NSID, if the key has one
    pub fn collection(&self) -> Option<&str> {
        self.split.map(|i| &self.key[..i])
    }

    /// Record key (the whole key when there is no collection)
    pub fn rkey(&self) -> &str {
        match self.split {
            Some(i) => &self.key[i + 1..],
            None => &self.key,
        }
    }
}

impl fmt::Display for RecordPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// A resolved record
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Where the record lives in the repository
    pub path: RecordPath,
    /// CID of the record block
    pub cid: IpldCid,
    /// Decoded value
    pub value: RecordValue,
}

/// A record that could not be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    /// MST key of the record
    pub key: SmolStr,
    /// CID the tree points at
    pub cid: IpldCid,
    /// Why it was skipped
    pub reason: String,
}

/// Result of resolving one MST leaf
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Record decoded
    Ok(Record),
    /// Record missing or undecodable; extraction continues without it
    Skipped(SkippedRecord),
}

/// Look up and decode the record behind an MST leaf
///
/// Never fails: a missing block or a payload that is not DAG-CBOR produces
/// [`RecordOutcome::Skipped`].
pub fn resolve_record(store: &MemoryBlockStore, key: &str, cid: &IpldCid) -> RecordOutcome {
    let skipped = |reason: String| {
        RecordOutcome::Skipped(SkippedRecord {
            key: SmolStr::new(key),
            cid: *cid,
            reason,
        })
    };

    let block = match store.get(cid) {
        Ok(block) => block,
        Err(_) => return skipped("record block not in archive".to_string()),
    };

    match RecordValue::from_cbor(block) {
        Ok(value) => RecordOutcome::Ok(Record {
            path: RecordPath::parse(key),
            cid: *cid,
            value,
        }),
        Err(e) => skipped(format!("undecodable record: {}", e)),
    }
}
