//! Error types for repository extraction

use std::error::Error;
use std::fmt;

/// Boxed error type for error sources
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Result type alias for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;

/// Repository extraction error with rich diagnostics
///
/// Every variant of [`RepoErrorKind`] except [`RepoErrorKind::NotFound`] means the
/// archive as a whole can no longer be trusted.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub struct RepoError {
    kind: RepoErrorKind,
    #[source]
    source: Option<BoxError>,
    #[help]
    help: Option<String>,
    context: Option<String>,
}

/// Error categories for repository extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoErrorKind {
    /// Block bytes do not hash to their declared CID
    Integrity,
    /// Block is not present in the store
    NotFound,
    /// CAR container is truncated or structurally invalid
    MalformedContainer,
    /// Root block is not a well-formed signed commit
    InvalidCommit,
    /// MST structure violates its invariants
    CorruptTree,
    /// Serialization/deserialization failed
    Serialization,
    /// Cryptographic operation failed
    Crypto,
    /// I/O error
    Io,
}

impl RepoError {
    /// Create a new error with the given kind and optional source
    pub fn new(kind: RepoErrorKind, source: Option<BoxError>) -> Self {
        Self {
            kind,
            source,
            help: None,
            context: None,
        }
    }

    /// Add a help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Add context information to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> &RepoErrorKind {
        &self.kind
    }

    /// Create an integrity error
    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::new(RepoErrorKind::Integrity, Some(msg.into().into()))
            .with_help("block CIDs must be the SHA2-256 digest of the block bytes")
    }

    /// Create a not found error
    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        Self::new(RepoErrorKind::NotFound, None)
            .with_context(format!("{} not found: {}", resource, id))
    }

    /// Create a malformed container error
    pub fn malformed_container(source: impl Error + Send + Sync + 'static) -> Self {
        Self::new(RepoErrorKind::MalformedContainer, Some(Box::new(source)))
            .with_context("failed to parse CAR container")
    }

    /// Create an invalid commit error
    pub fn invalid_commit(msg: impl Into<String>) -> Self {
        Self::new(RepoErrorKind::InvalidCommit, Some(msg.into().into()))
    }

    /// Create a corrupt tree error
    pub fn corrupt_tree(msg: impl Into<String>) -> Self {
        Self::new(RepoErrorKind::CorruptTree, Some(msg.into().into()))
            .with_help("MST keys must be strictly increasing and every node must be present")
    }

    /// Create a serialization error
    pub fn serialization(source: impl Error + Send + Sync + 'static) -> Self {
        Self::new(RepoErrorKind::Serialization, Some(Box::new(source)))
    }

    /// Create a crypto error
    pub fn crypto(source: impl Error + Send + Sync + 'static) -> Self {
        Self::new(RepoErrorKind::Crypto, Some(Box::new(source)))
    }

    /// Create an I/O error
    pub fn io(source: impl Error + Send + Sync + 'static) -> Self {
        Self::new(RepoErrorKind::Io, Some(Box::new(source)))
    }
}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;

        if let Some(ctx) = &self.context {
            write!(f, ": {}", ctx)?;
        }

        if let Some(src) = &self.source {
            write!(f, ": {}", src)?;
        }

        Ok(())
    }
}

// Internal granular errors

/// CAR container errors
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum CarError {
    /// Input ended before the header
    #[error("empty CAR input")]
    Empty,

    /// A length prefix was cut off or longer than 64 bits
    #[error("truncated or overlong varint at offset {offset}")]
    BadVarint {
        /// Byte offset of the varint
        offset: usize,
    },

    /// A section declares more bytes than remain
    #[error("section at offset {offset} declares {declared} bytes, only {remaining} remain")]
    Truncated {
        /// Byte offset of the section
        offset: usize,
        /// Declared section length
        declared: u64,
        /// Bytes left in the input
        remaining: usize,
    },

    /// A zero-length section
    #[error("zero-length section at offset {offset}")]
    EmptySection {
        /// Byte offset of the section
        offset: usize,
    },

    /// Header body could not be decoded
    #[error("invalid CAR header")]
    InvalidHeader(#[source] BoxError),

    /// Header version other than 1
    #[error("unsupported CAR version {0}")]
    #[diagnostic(help("only CARv1 archives are supported"))]
    UnsupportedVersion(u64),

    /// Header declares no roots
    #[error("CAR header declares no roots")]
    NoRoots,

    /// Section CID could not be parsed
    #[error("invalid CID in section at offset {offset}")]
    InvalidCid {
        /// Byte offset of the section
        offset: usize,
        /// Underlying CID error
        #[source]
        source: cid::Error,
    },
}

impl From<CarError> for RepoError {
    fn from(e: CarError) -> Self {
        RepoError::malformed_container(e)
    }
}

/// MST-specific errors
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum MstError {
    /// Prefix length runs past the previous key
    #[error("prefix length {prefix_len} exceeds previous key length {previous_len}")]
    PrefixOverflow {
        /// Declared shared-prefix length
        prefix_len: usize,
        /// Length of the previous key in bytes
        previous_len: usize,
    },

    /// Key bytes are not UTF-8
    #[error("key is not valid UTF-8")]
    InvalidUtf8(#[source] std::string::FromUtf8Error),

    /// Key equal to the previous key
    #[error("duplicate key: {key}")]
    DuplicateKey {
        /// The repeated key
        key: String,
    },

    /// Key sorts before the previous key
    #[error("key {key} sorts before previous key {previous}")]
    OutOfOrder {
        /// The offending key
        key: String,
        /// The key emitted before it
        previous: String,
    },

    /// Node block referenced but absent
    #[error("missing MST node block {cid}")]
    MissingNode {
        /// CID of the missing node
        cid: cid::Cid,
    },

    /// Node block does not decode as an MST node
    #[error("MST node {cid} is not decodable")]
    InvalidNode {
        /// CID of the node
        cid: cid::Cid,
        /// Decoder error
        #[source]
        source: BoxError,
    },
}

impl From<MstError> for RepoError {
    fn from(e: MstError) -> Self {
        RepoError::new(RepoErrorKind::CorruptTree, Some(Box::new(e)))
            .with_help("MST keys must be strictly increasing and every node must be present")
    }
}

/// Commit-specific errors
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum CommitError {
    /// Invalid commit version
    #[error("invalid commit version: {0}")]
    InvalidVersion(i64),

    /// DID field is not a DID
    #[error("invalid repository DID: {0}")]
    InvalidDid(String),

    /// Invalid signature format
    #[error("invalid signature format: {0}")]
    InvalidSignature(String),

    /// Signature verification failed
    #[error("signature verification failed")]
    SignatureVerificationFailed,

    /// Invalid key format
    #[error("invalid key format: {0}")]
    InvalidKey(String),

    /// Unsupported key type
    #[error("unsupported key type: 0x{0:x}")]
    UnsupportedKeyType(u64),

    /// Serialization failed
    #[error("serialization failed")]
    Serialization(#[source] BoxError),
}

impl From<CommitError> for RepoError {
    fn from(e: CommitError) -> Self {
        match e {
            CommitError::InvalidVersion(v) => {
                RepoError::invalid_commit(format!("unsupported version {}", v))
            }
            CommitError::InvalidDid(did) => {
                RepoError::invalid_commit(format!("invalid DID {:?}", did))
            }
            CommitError::Serialization(e) => {
                RepoError::new(RepoErrorKind::InvalidCommit, Some(e))
                    .with_context("commit block does not decode as a signed commit")
            }
            other => RepoError::crypto(other),
        }
    }
}
