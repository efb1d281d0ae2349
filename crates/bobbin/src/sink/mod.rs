//! Output sinks: where archives, records and blobs end up
//!
//! Extraction addresses its output as `(namespace, key)` units. A sink decides
//! the physical naming; [`FsSink`] lays units out as files, [`MemorySink`]
//! keeps them in a map.

pub mod fs;
pub mod memory;

use std::fmt;

use bytes::Bytes;
use smol_str::SmolStr;

use crate::error::SinkError;

pub use fs::FsSink;
pub use memory::MemorySink;

/// Logical output area a unit belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    /// Raw repository archives, keyed `<did>.car`
    Archives,
    /// Commit and records of one repository
    Repo(SmolStr),
    /// Blobs of one repository, keyed by CID
    Blobs(SmolStr),
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Archives => f.write_str("archives"),
            Namespace::Repo(did) => write!(f, "repo:{did}"),
            Namespace::Blobs(did) => write!(f, "blobs:{did}"),
        }
    }
}

/// Destination for extracted units
///
/// Writes are whole-unit: a reader never observes a partially written unit.
/// Implementations must accept concurrent writes to distinct keys.
#[trait_variant::make(Send)]
pub trait OutputSink {
    /// Store `bytes` under `key`, replacing any previous content
    async fn write_unit(&self, namespace: &Namespace, key: &str, bytes: Bytes)
    -> Result<(), SinkError>;

    /// Whether a unit is already present under `key`
    async fn exists(&self, namespace: &Namespace, key: &str) -> Result<bool, SinkError>;
}

/// Check that a key is a relative, '/'-separated name that stays inside its
/// namespace
pub fn validate_key(key: &str) -> Result<(), SinkError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.contains('\0')
        || key
            .split('/')
            .any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        Err(SinkError::InvalidKey(key.to_string()))
    } else {
        Ok(())
    }
}

/// A namespace's DID must be usable as a single path component
pub(crate) fn validate_component(component: &str) -> Result<(), SinkError> {
    validate_key(component)?;
    if component.contains('/') {
        return Err(SinkError::InvalidKey(component.to_string()));
    }
    Ok(())
}
