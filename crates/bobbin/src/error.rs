//! Error types for extraction runs

use bobbin_identity::IdentityError;
use bobbin_repo::RepoError;
use smol_str::SmolStr;

/// Boxed error type for error sources
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Network-level errors talking to a PDS
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum TransportError {
    /// Failed to establish connection to server
    #[error("connection error: {0}")]
    #[diagnostic(code(bobbin::transport::connect))]
    Connect(String),

    /// Request timed out
    #[error("request timeout")]
    #[diagnostic(code(bobbin::transport::timeout))]
    Timeout,

    /// Request construction failed (malformed URL, query, etc.)
    #[error("invalid request: {0}")]
    #[diagnostic(code(bobbin::transport::invalid_request))]
    InvalidRequest(String),

    /// Server answered with an error
    #[error("XRPC {method} failed with HTTP {status}: {message}")]
    #[diagnostic(
        code(bobbin::transport::xrpc),
        help("RepoNotFound or RepoTakendown mean the account is gone from this PDS")
    )]
    Xrpc {
        /// XRPC method name
        method: &'static str,
        /// HTTP status code
        status: u16,
        /// Error name and message from the response body, if any
        message: String,
    },

    /// Response body was not what the method returns
    #[error("malformed {method} response")]
    #[diagnostic(code(bobbin::transport::decode))]
    Decode {
        /// XRPC method name
        method: &'static str,
        /// Decoder error
        #[source]
        source: BoxError,
    },

    /// Other transport error
    #[error("transport error: {0}")]
    #[diagnostic(code(bobbin::transport::other))]
    Other(#[source] BoxError),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_builder() {
            TransportError::InvalidRequest(e.to_string())
        } else {
            TransportError::Other(Box::new(e))
        }
    }
}

/// Output sink errors
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum SinkError {
    /// Key would escape its namespace or is otherwise unusable as a name
    #[error("invalid output key {0:?}")]
    #[diagnostic(
        code(bobbin::sink::invalid_key),
        help("keys are relative '/'-separated names without '.', '..' or '\\' components")
    )]
    InvalidKey(String),

    /// Filesystem failure
    #[error("I/O error writing {path}: {source}")]
    #[diagnostic(code(bobbin::sink::io))]
    Io {
        /// Path being written or checked
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Configuration errors, fatal to the whole run
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ConfigError {
    /// A numeric option is out of range
    #[error("{name} must be at least 1")]
    #[diagnostic(code(bobbin::config::zero))]
    Zero {
        /// Option name
        name: &'static str,
    },

    /// Blob page size above what PDSes accept
    #[error("blob page size {0} exceeds the maximum of 1000")]
    #[diagnostic(code(bobbin::config::page_size))]
    PageSize(u32),

    /// The PLC directory URL cannot be used as a base
    #[error("invalid PLC directory URL {0}")]
    #[diagnostic(code(bobbin::config::plc_directory))]
    PlcDirectory(String),

    /// Identifier list could not be read
    #[error("cannot read identifier list {path}")]
    #[diagnostic(code(bobbin::config::identifiers))]
    Identifiers {
        /// Path of the list
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Output root could not be created
    #[error("cannot create output directory {path}")]
    #[diagnostic(code(bobbin::config::output_root))]
    OutputRoot {
        /// Directory path
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Per-identifier extraction failure
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ExtractError {
    /// Identity could not be resolved to a PDS
    #[error(transparent)]
    #[diagnostic(code(bobbin::extract::identity))]
    Identity(#[from] IdentityError),

    /// Fetching from the PDS failed
    #[error(transparent)]
    #[diagnostic(code(bobbin::extract::transport))]
    Transport(#[from] TransportError),

    /// Archive, commit or tree could not be trusted
    #[error(transparent)]
    #[diagnostic(code(bobbin::extract::repo))]
    Repo(#[from] RepoError),

    /// Writing output failed
    #[error(transparent)]
    #[diagnostic(code(bobbin::extract::sink))]
    Sink(#[from] SinkError),

    /// Fetched blob bytes do not hash to the listed CID
    #[error("blob {cid} does not match its content")]
    #[diagnostic(code(bobbin::extract::blob_integrity))]
    BlobIntegrity {
        /// Listed blob CID
        cid: SmolStr,
        /// Verification error
        #[source]
        source: RepoError,
    },

    /// Listed blob CID does not parse
    #[error("listed blob CID {0:?} is not a CID")]
    #[diagnostic(code(bobbin::extract::blob_cid))]
    InvalidBlobCid(String),

    /// Run was cancelled before this identifier finished
    #[error("cancelled")]
    #[diagnostic(code(bobbin::extract::cancelled))]
    Cancelled,
}

impl ExtractError {
    /// Whether this failure is a cancellation rather than a fault
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExtractError::Cancelled)
    }
}

/// Result type alias for extraction
pub type Result<T> = std::result::Result<T, ExtractError>;

#[cfg(test)]
mod tests {
    use super::*;
    use bobbin_repo::{RAW, compute_cid, verify_block};
    use std::error::Error;

    #[test]
    fn wrapped_errors_do_not_repeat_their_cause() {
        let inner = IdentityError::UnresolvedHandle("alice.example.com".into());
        let message = inner.to_string();
        let err = ExtractError::from(inner);
        assert_eq!(err.to_string(), message);
        assert!(err.source().is_none());

        let err = ExtractError::from(SinkError::InvalidKey("../x".into()));
        assert_eq!(err.to_string(), "invalid output key \"../x\"");
    }

    #[test]
    fn blob_integrity_keeps_cause_as_source() {
        let cid = compute_cid(RAW, b"listed").unwrap();
        let source = verify_block(&cid, b"served").unwrap_err();
        let cause = source.to_string();
        let err = ExtractError::BlobIntegrity {
            cid: cid.to_string().into(),
            source,
        };
        assert!(!err.to_string().contains(&cause));
        assert_eq!(err.source().map(|s| s.to_string()), Some(cause));
    }
}
