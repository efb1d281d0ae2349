//! Run configuration

use std::path::PathBuf;

use bobbin_identity::ResolverOptions;
use url::Url;

use crate::error::ConfigError;

/// Default blob listing page size
pub const DEFAULT_BLOB_PAGE_SIZE: u32 = 500;

/// Largest page size `com.atproto.sync.listBlobs` accepts
pub const MAX_BLOB_PAGE_SIZE: u32 = 1000;

/// Settings for one extraction run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Where raw repository archives are kept
    pub cars_dir: PathBuf,
    /// Where records, commits and blobs are written
    pub records_dir: PathBuf,
    /// Keep each fetched archive as `<did>.car`
    pub archive: bool,
    /// Also mirror each repository's blobs
    pub download_blobs: bool,
    /// Blob listing page size
    pub blob_page_size: u32,
    /// Identifiers processed at once
    pub concurrency: usize,
    /// PLC directory used to resolve did:plc
    pub plc_directory: Url,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cars_dir: PathBuf::from("cars"),
            records_dir: PathBuf::from("records"),
            archive: true,
            download_blobs: false,
            blob_page_size: DEFAULT_BLOB_PAGE_SIZE,
            concurrency: 1,
            plc_directory: ResolverOptions::default().plc_directory,
        }
    }
}

impl Config {
    /// Check option ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Zero {
                name: "concurrency",
            });
        }
        if self.blob_page_size == 0 {
            return Err(ConfigError::Zero {
                name: "blob page size",
            });
        }
        if self.blob_page_size > MAX_BLOB_PAGE_SIZE {
            return Err(ConfigError::PageSize(self.blob_page_size));
        }
        if self.plc_directory.cannot_be_a_base() {
            return Err(ConfigError::PlcDirectory(self.plc_directory.to_string()));
        }
        Ok(())
    }
}
