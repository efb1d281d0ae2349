//! Fetching repositories and blobs from a PDS
//!
//! The extraction pipeline only sees the [`RepoTransport`] and
//! [`BlobTransport`] traits. [`XrpcClient`] implements both over plain HTTPS
//! XRPC calls (`com.atproto.sync.*`, unauthenticated).

use bytes::Bytes;
use serde::Deserialize;
use smol_str::SmolStr;
use url::Url;

use crate::error::TransportError;

/// One page of a blob listing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlobPage {
    /// Blob CIDs, as listed
    pub cids: Vec<SmolStr>,
    /// Cursor for the next page; `None` or empty when done
    pub cursor: Option<SmolStr>,
}

impl BlobPage {
    /// Cursor to continue from, if there are more pages
    pub fn next_cursor(&self) -> Option<&str> {
        self.cursor.as_deref().filter(|c| !c.is_empty())
    }
}

/// Source of repository archives
#[trait_variant::make(Send)]
pub trait RepoTransport {
    /// Fetch the full repository of `did` as CAR bytes
    async fn fetch_archive(&self, endpoint: &Url, did: &str) -> Result<Bytes, TransportError>;
}

/// Source of blobs
#[trait_variant::make(Send)]
pub trait BlobTransport {
    /// List one page of blob CIDs
    async fn list_blobs(
        &self,
        endpoint: &Url,
        did: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<BlobPage, TransportError>;

    /// Fetch the bytes of one blob
    async fn fetch_blob(&self, endpoint: &Url, did: &str, cid: &str)
    -> Result<Bytes, TransportError>;
}

/// XRPC error body
#[derive(Debug, Deserialize)]
struct XrpcErrorBody {
    error: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListBlobsOutput {
    #[serde(default)]
    cursor: Option<SmolStr>,
    cids: Vec<SmolStr>,
}

/// Unauthenticated XRPC client for the sync endpoints
#[derive(Debug, Clone, Default)]
pub struct XrpcClient {
    http: reqwest::Client,
}

impl XrpcClient {
    /// Wrap an HTTP client
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// URL of an XRPC method on `endpoint`
    pub fn method_url(endpoint: &Url, method: &str) -> Result<Url, TransportError> {
        if endpoint.cannot_be_a_base() {
            return Err(TransportError::InvalidRequest(format!(
                "{} is not a usable PDS endpoint",
                endpoint
            )));
        }
        let mut url = endpoint.clone();
        url.set_path(&format!("/xrpc/{method}"));
        url.set_query(None);
        Ok(url)
    }

    async fn get(&self, method: &'static str, url: Url) -> Result<Bytes, TransportError> {
        tracing::debug!(%url, "xrpc request");
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;

        if status.is_success() {
            return Ok(body);
        }

        let message = match serde_json::from_slice::<XrpcErrorBody>(&body) {
            Ok(XrpcErrorBody { error, message }) => match (error, message) {
                (Some(e), Some(m)) => format!("{e}: {m}"),
                (Some(e), None) => e,
                (None, Some(m)) => m,
                (None, None) => String::new(),
            },
            Err(_) => String::from_utf8_lossy(&body).chars().take(200).collect(),
        };
        Err(TransportError::Xrpc {
            method,
            status: status.as_u16(),
            message,
        })
    }
}

impl RepoTransport for XrpcClient {
    async fn fetch_archive(&self, endpoint: &Url, did: &str) -> Result<Bytes, TransportError> {
        const METHOD: &str = "com.atproto.sync.getRepo";
        let mut url = Self::method_url(endpoint, METHOD)?;
        url.query_pairs_mut().append_pair("did", did);
        self.get(METHOD, url).await
    }
}

impl BlobTransport for XrpcClient {
    async fn list_blobs(
        &self,
        endpoint: &Url,
        did: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<BlobPage, TransportError> {
        const METHOD: &str = "com.atproto.sync.listBlobs";
        let mut url = Self::method_url(endpoint, METHOD)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("did", did);
            query.append_pair("limit", &limit.to_string());
            if let Some(cursor) = cursor.filter(|c| !c.is_empty()) {
                query.append_pair("cursor", cursor);
            }
        }

        let body = self.get(METHOD, url).await?;
        let output: ListBlobsOutput =
            serde_json::from_slice(&body).map_err(|e| TransportError::Decode {
                method: METHOD,
                source: Box::new(e),
            })?;
        Ok(BlobPage {
            cids: output.cids,
            cursor: output.cursor,
        })
    }

    async fn fetch_blob(&self, endpoint: &Url, did: &str, cid: &str) -> Result<Bytes, TransportError> {
        const METHOD: &str = "com.atproto.sync.getBlob";
        let mut url = Self::method_url(endpoint, METHOD)?;
        url.query_pairs_mut()
            .append_pair("did", did)
            .append_pair("cid", cid);
        self.get(METHOD, url).await
    }
}
