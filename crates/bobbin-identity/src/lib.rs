//! Identity resolution for the AT Protocol
//!
//! Turns the identifiers in a batch file (DIDs or handles) into the PDS
//! endpoint that serves each repository, plus the key its commits are signed
//! with.
//!
//! ## Quick start
//!
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use bobbin_identity::{PublicResolver, resolver::IdentityResolver};
//!
//! let resolver = PublicResolver::default();
//! let ident = resolver.resolve("alice.bsky.social").await?;
//! println!("{} is hosted at {}", ident.did, ident.pds);
//! # Ok(())
//! # }
//! ```
//!
//! ## Resolution fallback order
//!
//! **Handle → DID**:
//! 1. HTTPS well-known at `https://{handle}/.well-known/atproto-did`
//! 2. Public API fallback (`https://public.api.bsky.app`)
//!
//! **DID → Document**:
//! 1. `did:web` HTTPS well-known
//! 2. PLC directory HTTP (for `did:plc`)

pub mod did_doc;
pub mod resolver;

use bytes::Bytes;
use percent_encoding::percent_decode_str;
use reqwest::StatusCode;
use smol_str::SmolStr;
use url::Url;

use crate::did_doc::DidDocument;
use crate::resolver::AtIdentifier;

pub use crate::resolver::{IdentityError, IdentityResolver, ResolvedIdentity, ResolverOptions};

/// Resolver backed by public HTTPS endpoints
#[derive(Clone)]
pub struct PublicResolver {
    http: reqwest::Client,
    opts: ResolverOptions,
}

impl PublicResolver {
    /// Create a resolver with the given HTTP client and options
    pub fn new(http: reqwest::Client, opts: ResolverOptions) -> Self {
        tracing::debug!(
            plc_directory = %opts.plc_directory,
            public_api = ?opts.public_api.as_ref().map(Url::as_str),
            "identity resolver created"
        );
        Self { http, opts }
    }

    /// Resolver options
    pub fn options(&self) -> &ResolverOptions {
        &self.opts
    }

    /// Construct the well-known HTTPS URL for a `did:web` DID.
    ///
    /// - `did:web:example.com` → `https://example.com/.well-known/did.json`
    /// - `did:web:example.com:user:alice` → `https://example.com/user/alice/did.json`
    pub fn did_web_url(did: &str) -> resolver::Result<Url> {
        let rest = did
            .strip_prefix("did:web:")
            .ok_or_else(|| IdentityError::UnsupportedDidMethod(did.to_string()))?;
        let mut parts = rest.split(':');
        let host = parts
            .next()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| IdentityError::InvalidIdentifier(did.to_string()))?;
        // ports are percent-encoded in the method-specific id
        let host = percent_decode_str(host).decode_utf8_lossy();
        let mut url = Url::parse(&format!("https://{host}/"))?;
        let path: Vec<&str> = parts.collect();
        if path.is_empty() {
            url.set_path(".well-known/did.json");
        } else {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| IdentityError::Url(url::ParseError::SetHostOnCannotBeABaseUrl))?;
            segments.pop_if_empty();
            for seg in path {
                let decoded = percent_decode_str(seg).decode_utf8_lossy();
                segments.push(&decoded);
            }
            segments.push("did.json");
        }
        Ok(url)
    }

    /// URL of a did:plc document in the configured directory
    pub fn plc_url(&self, did: &str) -> resolver::Result<Url> {
        // Url::join would read the DID as an absolute URL with scheme "did"
        let base = self.opts.plc_directory.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{did}"))?)
    }

    async fn get_bytes(&self, url: Url) -> resolver::Result<(Bytes, StatusCode)> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        let buf = resp.bytes().await?;
        Ok((buf, status))
    }

    fn parse_atproto_did_body(body: &str) -> Option<SmolStr> {
        let line = body.lines().find(|l| !l.trim().is_empty())?;
        match AtIdentifier::parse(line).ok()? {
            AtIdentifier::Did(did) => Some(did),
            AtIdentifier::Handle(_) => None,
        }
    }

    /// Resolve a handle to a DID
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn resolve_handle(&self, handle: &str) -> resolver::Result<SmolStr> {
        let well_known = Url::parse(&format!("https://{handle}/.well-known/atproto-did"))?;
        match self.get_bytes(well_known).await {
            Ok((buf, status)) if status.is_success() => {
                if let Some(did) = Self::parse_atproto_did_body(&String::from_utf8_lossy(&buf)) {
                    return Ok(did);
                }
            }
            Ok((_, status)) => tracing::debug!(%status, "well-known handle lookup failed"),
            Err(e) => tracing::debug!(error = %e, "well-known handle lookup failed"),
        }

        if let Some(base) = &self.opts.public_api {
            let mut url = base.join("xrpc/com.atproto.identity.resolveHandle")?;
            url.query_pairs_mut().append_pair("handle", handle);
            let (buf, status) = self.get_bytes(url).await?;
            if status.is_success() {
                let val: serde_json::Value = serde_json::from_slice(&buf)?;
                if let Some(Ok(AtIdentifier::Did(did))) =
                    val.get("did").and_then(|v| v.as_str()).map(AtIdentifier::parse)
                {
                    return Ok(did);
                }
            }
        }

        Err(IdentityError::UnresolvedHandle(handle.to_string()))
    }

    /// Fetch and parse the DID document for `did`
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn resolve_did_doc(&self, did: &str) -> resolver::Result<DidDocument> {
        let url = if did.starts_with("did:web:") {
            Self::did_web_url(did)?
        } else if did.starts_with("did:plc:") {
            self.plc_url(did)?
        } else {
            return Err(IdentityError::UnsupportedDidMethod(did.to_string()));
        };

        let (buf, status) = self.get_bytes(url).await?;
        if !status.is_success() {
            return Err(IdentityError::HttpStatus(status));
        }
        Ok(serde_json::from_slice(&buf)?)
    }
}

impl Default for PublicResolver {
    fn default() -> Self {
        Self::new(reqwest::Client::new(), ResolverOptions::default())
    }
}

impl IdentityResolver for PublicResolver {
    async fn resolve(&self, identifier: &str) -> resolver::Result<ResolvedIdentity> {
        let (did, requested_handle) = match AtIdentifier::parse(identifier)? {
            AtIdentifier::Did(did) => (did, None),
            AtIdentifier::Handle(handle) => (self.resolve_handle(&handle).await?, Some(handle)),
        };

        let doc = self.resolve_did_doc(&did).await?;
        let mut ident = ResolvedIdentity::from_document(&did, &doc)?;

        if let Some(handle) = requested_handle {
            if !doc.handles().contains(&handle) {
                tracing::warn!(%did, %handle, "DID document does not claim the requested handle");
            }
            ident.handle = Some(handle);
        }

        tracing::debug!(did = %ident.did, pds = %ident.pds, "resolved identity");
        Ok(ident)
    }
}
