//! Per-identifier extraction: archive → commit → records

use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;

use bobbin_identity::{IdentityResolver, ResolvedIdentity};
use bobbin_repo::{
    Cid, MstWalker, ParsedCar, PublicKey, RecordOutcome, RecordValue, RepoError, SkippedRecord,
    Trust, locate_commit, parse_car, read_car, resolve_record,
};
use bytes::Bytes;
use smol_str::SmolStr;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, DEFAULT_BLOB_PAGE_SIZE};
use crate::error::{ExtractError, Result};
use crate::sink::{Namespace, OutputSink, validate_key};
use crate::transport::{BlobTransport, RepoTransport};

/// Key of the commit unit in a repository namespace
pub const COMMIT_KEY: &str = "_commit";

/// Options for the extraction pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Keep the raw archive in the `Archives` namespace
    pub archive: bool,
    /// Page size for blob listings
    pub blob_page_size: u32,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            archive: true,
            blob_page_size: DEFAULT_BLOB_PAGE_SIZE,
        }
    }
}

impl From<&Config> for ExtractOptions {
    fn from(config: &Config) -> Self {
        Self {
            archive: config.archive,
            blob_page_size: config.blob_page_size,
        }
    }
}

/// Summary of one repository export
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractReport {
    /// DID the repository was fetched for
    pub did: SmolStr,
    /// CID of the exported commit
    pub commit_cid: Cid,
    /// Commit revision
    pub rev: Option<SmolStr>,
    /// Outcome of the signature check
    pub trust: Trust,
    /// Size of the fetched archive
    pub archive_bytes: usize,
    /// Records written
    pub records_written: usize,
    /// Records written per collection; `None` collects keys without one
    pub collections: BTreeMap<Option<SmolStr>, usize>,
    /// Records that could not be exported
    pub skipped: Vec<SkippedRecord>,
}

/// Race a fallible future against cancellation
pub(crate) async fn cancellable<T, E, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: Into<ExtractError>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ExtractError::Cancelled),
        res = fut => res.map_err(Into::into),
    }
}

/// Drives extraction for one identifier at a time
///
/// Holds the three collaborators: identity resolution, PDS transport, and
/// the output sink. One extractor is shared by every identifier in a batch.
#[derive(Debug)]
pub struct Extractor<R, T, S> {
    resolver: R,
    transport: T,
    sink: S,
    options: ExtractOptions,
}

impl<R, T, S> Extractor<R, T, S> {
    /// Create an extractor
    pub fn new(resolver: R, transport: T, sink: S, options: ExtractOptions) -> Self {
        Self {
            resolver,
            transport,
            sink,
            options,
        }
    }

    /// The identity resolver
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// The PDS transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The output sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Pipeline options
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }
}

impl<R, T, S> Extractor<R, T, S>
where
    R: IdentityResolver + Sync,
    T: RepoTransport + BlobTransport + Sync,
    S: OutputSink + Sync,
{
    /// Resolve an identifier to its DID, PDS and signing key
    pub async fn resolve(
        &self,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Result<ResolvedIdentity> {
        cancellable(cancel, self.resolver.resolve(identifier)).await
    }

    /// Fetch, decode and export one repository
    ///
    /// The commit unit is written before any record, and records are written
    /// in ascending key order. Records that cannot be resolved are skipped
    /// and listed in the report; anything wrong with the archive, commit or
    /// tree fails the whole repository.
    #[tracing::instrument(level = "info", skip_all, fields(did = %ident.did))]
    pub async fn extract_repo(
        &self,
        ident: &ResolvedIdentity,
        cancel: &CancellationToken,
    ) -> Result<ExtractReport> {
        let did = ident.did.clone();

        let bytes = cancellable(cancel, self.transport.fetch_archive(&ident.pds, &did)).await?;
        let archive_bytes = bytes.len();
        tracing::debug!(bytes = archive_bytes, pds = %ident.pds, "fetched archive");

        if self.options.archive {
            self.sink
                .write_unit(&Namespace::Archives, &format!("{did}.car"), bytes.clone())
                .await?;
        }

        let car = parse_car(bytes)?;
        let mut report = export_repo(
            &self.sink,
            &car,
            Some(did.as_str()),
            ident.signing_key.as_ref(),
            cancel,
        )
        .await?;
        report.archive_bytes = archive_bytes;
        Ok(report)
    }
}

/// Unpack a repository archive already on disk
///
/// The commit's own DID names the output namespace and the signature is not
/// checked. Nothing is written to the `Archives` namespace.
#[tracing::instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub async fn unpack_car<S>(
    sink: &S,
    path: impl AsRef<Path>,
    cancel: &CancellationToken,
) -> Result<ExtractReport>
where
    S: OutputSink + Sync,
{
    let path = path.as_ref();
    let archive_bytes = tokio::fs::metadata(path)
        .await
        .map_err(RepoError::io)?
        .len();
    let car = read_car(path).await?;

    let mut report = export_repo(sink, &car, None, None, cancel).await?;
    report.archive_bytes = archive_bytes as usize;
    Ok(report)
}

/// Reason a record key can't be exported, if any
///
/// Keys starting with `_` share the repository namespace with the commit unit
/// and the blob directory, so records may not use them.
fn unusable_key(key: &str) -> Option<String> {
    if key.starts_with('_') {
        return Some(format!("key {key:?} is reserved for repository metadata"));
    }
    validate_key(key).err().map(|e| e.to_string())
}

/// Write the commit, then every record, of a decoded archive
///
/// `did` is the identity the archive was fetched for; when absent the
/// commit's own DID is used. `archive_bytes` is left at zero for the caller.
async fn export_repo<S>(
    sink: &S,
    car: &ParsedCar,
    did: Option<&str>,
    signing_key: Option<&PublicKey>,
    cancel: &CancellationToken,
) -> Result<ExtractReport>
where
    S: OutputSink + Sync,
{
    let located = locate_commit(car)?;
    let commit = &located.commit;

    let did = match did {
        Some(did) => {
            if commit.did() != did {
                tracing::warn!(commit_did = commit.did(), "commit DID differs from resolved DID");
            }
            SmolStr::new(did)
        }
        None => commit.did.clone(),
    };
    let repo_ns = Namespace::Repo(did.clone());

    let trust = commit.trust(signing_key);
    match &trust {
        Trust::Verified => tracing::debug!("commit signature verified"),
        Trust::Unverified => tracing::debug!("no signing key, commit signature not checked"),
        Trust::Invalid(reason) => {
            tracing::warn!(%reason, "commit signature does not verify")
        }
    }

    let commit_json = RecordValue::from_cbor(car.blocks.get(&located.cid)?)?.to_json_pretty()?;
    sink.write_unit(&repo_ns, COMMIT_KEY, Bytes::from(commit_json))
        .await?;
    tracing::debug!(cid = %located.cid, rev = ?commit.rev(), "wrote commit");

    let mut report = ExtractReport {
        did,
        commit_cid: located.cid,
        rev: commit.rev.clone(),
        trust,
        archive_bytes: 0,
        records_written: 0,
        collections: BTreeMap::new(),
        skipped: Vec::new(),
    };

    for leaf in MstWalker::new(&car.blocks, *commit.data()) {
        if cancel.is_cancelled() {
            return Err(ExtractError::Cancelled);
        }
        let (key, cid) = leaf?;

        if let Some(reason) = unusable_key(&key) {
            tracing::warn!(%key, %cid, %reason, "skipping record with unusable key");
            report.skipped.push(SkippedRecord { key, cid, reason });
            continue;
        }

        let record = match resolve_record(&car.blocks, &key, &cid) {
            RecordOutcome::Ok(record) => record,
            RecordOutcome::Skipped(skipped) => {
                tracing::warn!(key = %skipped.key, cid = %skipped.cid, reason = %skipped.reason, "skipping record");
                report.skipped.push(skipped);
                continue;
            }
        };

        let json = record.value.to_json_pretty()?;
        sink.write_unit(&repo_ns, record.path.as_str(), Bytes::from(json))
            .await?;
        tracing::trace!(path = %record.path, "wrote record");

        report.records_written += 1;
        *report
            .collections
            .entry(record.path.collection().map(SmolStr::new))
            .or_default() += 1;
    }

    tracing::info!(
        commit = %report.commit_cid,
        rev = ?report.rev,
        trust = report.trust.label(),
        records = report.records_written,
        skipped = report.skipped.len(),
        "exported repository"
    );
    Ok(report)
}
