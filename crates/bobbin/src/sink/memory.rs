//! In-memory sink

use std::collections::BTreeMap;

use bytes::Bytes;
use tokio::sync::Mutex;

use super::{Namespace, OutputSink, validate_component, validate_key};
use crate::error::SinkError;

#[derive(Debug, Default)]
struct Inner {
    units: BTreeMap<(Namespace, String), Bytes>,
    log: Vec<(Namespace, String)>,
}

/// Sink that keeps every unit in memory, remembering write order
///
/// Applies the same key rules as [`FsSink`](super::FsSink).
#[derive(Debug, Default)]
pub struct MemorySink {
    inner: Mutex<Inner>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Content of a unit
    pub async fn get(&self, namespace: &Namespace, key: &str) -> Option<Bytes> {
        let inner = self.inner.lock().await;
        inner.units.get(&(namespace.clone(), key.to_string())).cloned()
    }

    /// Keys present in a namespace, in ascending order
    pub async fn keys(&self, namespace: &Namespace) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner
            .units
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, key)| key.clone())
            .collect()
    }

    /// Every write in the order it happened, including overwrites
    pub async fn write_log(&self) -> Vec<(Namespace, String)> {
        self.inner.lock().await.log.clone()
    }

    /// Number of distinct units stored
    pub async fn len(&self) -> usize {
        self.inner.lock().await.units.len()
    }

    /// Whether nothing has been stored
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.units.is_empty()
    }
}

fn check(namespace: &Namespace, key: &str) -> Result<(), SinkError> {
    validate_key(key)?;
    match namespace {
        Namespace::Archives => validate_component(key),
        Namespace::Repo(did) => validate_component(did),
        Namespace::Blobs(did) => {
            validate_component(did)?;
            validate_component(key)
        }
    }
}

impl OutputSink for MemorySink {
    async fn write_unit(
        &self,
        namespace: &Namespace,
        key: &str,
        bytes: Bytes,
    ) -> Result<(), SinkError> {
        check(namespace, key)?;
        let mut inner = self.inner.lock().await;
        inner.log.push((namespace.clone(), key.to_string()));
        inner.units.insert((namespace.clone(), key.to_string()), bytes);
        Ok(())
    }

    async fn exists(&self, namespace: &Namespace, key: &str) -> Result<bool, SinkError> {
        check(namespace, key)?;
        let inner = self.inner.lock().await;
        Ok(inner.units.contains_key(&(namespace.clone(), key.to_string())))
    }
}
