//! Bulk export of AT Protocol repositories
//!
//! For each identifier in a list, bobbin resolves the account's PDS, fetches
//! the repository archive, checks it block by block, and writes the signed
//! commit plus every record as JSON. Optionally it mirrors the account's blobs.
//! Archives already on disk can be unpacked the same way with [`unpack_car`].
//!
//! ```no_run
//! # async fn example() -> miette::Result<()> {
//! use bobbin::{Config, Extractor, FsSink, XrpcClient, run_batch};
//! use bobbin_identity::{PublicResolver, ResolverOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = Config::default();
//! let extractor = Extractor::new(
//!     PublicResolver::new(reqwest::Client::new(), ResolverOptions::default()),
//!     XrpcClient::default(),
//!     FsSink::new(&config.cars_dir, &config.records_dir),
//!     (&config).into(),
//! );
//! let ids = vec!["did:plc:ewvi7nxzyoun6zhxrhs64oiz".to_string()];
//! let report = run_batch(&extractor, ids, &(&config).into(), &CancellationToken::new()).await;
//! println!("{} exported", report.succeeded());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod batch;
pub mod blobs;
pub mod config;
pub mod error;
pub mod extract;
pub mod sink;
pub mod transport;

pub use batch::{
    BatchOptions, BatchReport, IdentifierResult, RepoSummary, parse_identifiers,
    read_identifiers, run_batch,
};
pub use blobs::BlobReport;
pub use config::Config;
pub use error::{ConfigError, ExtractError, SinkError, TransportError};
pub use extract::{COMMIT_KEY, ExtractOptions, ExtractReport, Extractor, unpack_car};
pub use sink::{FsSink, MemorySink, Namespace, OutputSink};
pub use transport::{BlobPage, BlobTransport, RepoTransport, XrpcClient};
