//! Identity resolution: identifier → DID → document → PDS endpoint and key.
//!
//! Fallback order:
//! - Handle → DID: HTTPS well-known → public API `resolveHandle`
//! - DID → Doc: did:web well-known, or the PLC directory for did:plc
//!
//! The document `id` must match the DID it was fetched for.

use std::fmt;

use bobbin_repo::PublicKey;
use miette::Diagnostic;
use reqwest::StatusCode;
use smol_str::SmolStr;
use thiserror::Error;
use url::Url;

use crate::did_doc::DidDocument;

/// Errors that can occur during identity resolution.
#[derive(Debug, Error, Diagnostic)]
#[allow(missing_docs)]
pub enum IdentityError {
    #[error("invalid identifier {0:?}")]
    #[diagnostic(
        code(bobbin_identity::invalid_identifier),
        help("identifiers are DIDs (did:plc:..., did:web:...) or handles (alice.example.com)")
    )]
    InvalidIdentifier(String),
    #[error("unsupported DID method: {0}")]
    #[diagnostic(
        code(bobbin_identity::unsupported_did_method),
        help("supported DID methods: did:web, did:plc")
    )]
    UnsupportedDidMethod(String),
    #[error("could not resolve handle {0}")]
    #[diagnostic(
        code(bobbin_identity::unresolved_handle),
        help("check the handle's /.well-known/atproto-did or that it is registered")
    )]
    UnresolvedHandle(String),
    #[error("missing PDS endpoint in DID document")]
    #[diagnostic(code(bobbin_identity::missing_pds_endpoint))]
    MissingPdsEndpoint,
    #[error("HTTP error: {0}")]
    #[diagnostic(
        code(bobbin_identity::http),
        help("check network connectivity and TLS configuration")
    )]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {0}")]
    #[diagnostic(code(bobbin_identity::http_status))]
    HttpStatus(StatusCode),
    #[error("URL parse error: {0}")]
    #[diagnostic(code(bobbin_identity::url))]
    Url(#[from] url::ParseError),
    #[error("serialize/deserialize error: {0}")]
    #[diagnostic(code(bobbin_identity::serde))]
    Serde(#[from] serde_json::Error),
    /// DID document id did not match requested DID
    #[error("DID doc id mismatch: expected {expected}, got {actual}")]
    #[diagnostic(
        code(bobbin_identity::doc_id_mismatch),
        help("document id differs from requested DID; do not trust this document")
    )]
    DocIdMismatch { expected: SmolStr, actual: SmolStr },
}

/// Result type for identity resolution
pub type Result<T> = std::result::Result<T, IdentityError>;

/// A repository identifier as written by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtIdentifier {
    /// `did:plc:...` or `did:web:...`
    Did(SmolStr),
    /// Domain handle, lowercased
    Handle(SmolStr),
}

impl AtIdentifier {
    /// Parse a DID or handle, tolerating a leading `@` or `at://`
    pub fn parse(input: &str) -> Result<Self> {
        let s = input.trim();
        let s = s.strip_prefix("at://").unwrap_or(s);
        let s = s.strip_prefix('@').unwrap_or(s);

        if s.starts_with("did:") {
            let mut parts = s.splitn(3, ':');
            let (_, method, rest) = (parts.next(), parts.next(), parts.next());
            match (method, rest) {
                (Some(m), Some(r))
                    if !m.is_empty()
                        && m.chars().all(|c| c.is_ascii_lowercase())
                        && !r.is_empty() =>
                {
                    Ok(AtIdentifier::Did(SmolStr::new(s)))
                }
                _ => Err(IdentityError::InvalidIdentifier(input.to_string())),
            }
        } else if is_handle(s) {
            Ok(AtIdentifier::Handle(SmolStr::new(s.to_ascii_lowercase())))
        } else {
            Err(IdentityError::InvalidIdentifier(input.to_string()))
        }
    }

    /// The identifier string
    pub fn as_str(&self) -> &str {
        match self {
            AtIdentifier::Did(s) | AtIdentifier::Handle(s) => s,
        }
    }
}

impl fmt::Display for AtIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_handle(s: &str) -> bool {
    let labels: Vec<&str> = s.split('.').collect();
    s.len() <= 253
        && labels.len() >= 2
        && labels.iter().all(|l| {
            !l.is_empty()
                && l.len() <= 63
                && !l.starts_with('-')
                && !l.ends_with('-')
                && l.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
        && labels
            .last()
            .and_then(|tld| tld.chars().next())
            .is_some_and(|c| c.is_ascii_alphabetic())
}

/// Everything extraction needs to know about an account
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIdentity {
    /// Account DID
    pub did: SmolStr,
    /// Handle, if the document declares one
    pub handle: Option<SmolStr>,
    /// PDS endpoint serving the repository
    pub pds: Url,
    /// Repository signing key, if the document declares a usable one
    pub signing_key: Option<PublicKey>,
}

impl ResolvedIdentity {
    /// Build from a fetched document, checking it belongs to `did`
    pub fn from_document(did: &str, doc: &DidDocument) -> Result<Self> {
        if doc.id != did {
            return Err(IdentityError::DocIdMismatch {
                expected: SmolStr::new(did),
                actual: doc.id.clone(),
            });
        }
        let pds = doc.pds_endpoint().ok_or(IdentityError::MissingPdsEndpoint)?;
        let signing_key = match doc.signing_key() {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(did, error = %e, "unusable signing key in DID document");
                None
            }
        };
        Ok(Self {
            did: doc.id.clone(),
            handle: doc.handles().into_iter().next(),
            pds,
            signing_key,
        })
    }
}

/// Options controlling where documents and handles are looked up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    /// PLC directory base URL
    pub plc_directory: Url,
    /// Unauthenticated AppView used as the last handle fallback
    pub public_api: Option<Url>,
}

impl ResolverOptions {
    /// Options with the given PLC directory and the default public API
    pub fn with_plc_directory(plc_directory: Url) -> Self {
        Self {
            plc_directory,
            ..Default::default()
        }
    }
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            plc_directory: Url::parse("https://plc.directory/").expect("valid url"),
            public_api: Some(Url::parse("https://public.api.bsky.app/").expect("valid url")),
        }
    }
}

/// Trait for identity resolution, for pluggable implementations.
///
/// The provided [`PublicResolver`](crate::PublicResolver) talks to the public
/// network. Tests and offline tools can supply their own.
#[trait_variant::make(Send)]
pub trait IdentityResolver {
    /// Resolve a DID or handle to its PDS endpoint and signing key
    async fn resolve(&self, identifier: &str) -> Result<ResolvedIdentity>;
}
