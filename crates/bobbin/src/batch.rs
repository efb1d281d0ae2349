//! Batch driver: many identifiers, one failure at a time

use std::path::Path;

use bobbin_identity::{IdentityResolver, ResolvedIdentity};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::blobs::BlobReport;
use crate::config::Config;
use crate::error::{ConfigError, ExtractError, Result};
use crate::extract::{ExtractReport, Extractor};
use crate::sink::OutputSink;
use crate::transport::{BlobTransport, RepoTransport};

/// Parse an identifier list: one per line, blanks and `#` comments ignored
///
/// Duplicates are kept; each occurrence is processed.
pub fn parse_identifiers(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

/// Read and parse an identifier list file
pub async fn read_identifiers(path: impl AsRef<Path>) -> std::result::Result<Vec<String>, ConfigError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Identifiers {
            path: path.display().to_string(),
            source,
        })?;
    Ok(parse_identifiers(&text))
}

/// Batch-level options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Mirror blobs after each repository export
    pub download_blobs: bool,
    /// Identifiers in flight at once
    pub concurrency: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            download_blobs: false,
            concurrency: 1,
        }
    }
}

impl From<&Config> for BatchOptions {
    fn from(config: &Config) -> Self {
        Self {
            download_blobs: config.download_blobs,
            concurrency: config.concurrency,
        }
    }
}

/// What was exported for one identifier
#[derive(Debug)]
pub struct RepoSummary {
    /// Resolved identity
    pub identity: ResolvedIdentity,
    /// Repository export summary
    pub extract: ExtractReport,
    /// Blob sync outcome, when blobs were requested
    ///
    /// A failed blob sync leaves the exported records in place.
    pub blobs: Option<Result<BlobReport>>,
}

/// Outcome for one identifier, in input order
#[derive(Debug)]
pub struct IdentifierResult {
    /// Identifier as listed
    pub identifier: String,
    /// Export summary or the error that stopped it
    pub outcome: Result<RepoSummary>,
}

/// Results of a whole batch
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One entry per input identifier, in input order
    pub results: Vec<IdentifierResult>,
}

impl BatchReport {
    /// Identifiers whose repository was exported
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_ok()).count()
    }

    /// Identifiers that failed for a reason other than cancellation
    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(&r.outcome, Err(e) if !e.is_cancelled()))
            .count()
    }

    /// Identifiers aborted by cancellation
    pub fn cancelled(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(&r.outcome, Err(e) if e.is_cancelled()))
            .count()
    }

    /// Exported identifiers whose blob sync failed
    pub fn blob_failures(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(&r.outcome, Ok(s) if matches!(s.blobs, Some(Err(_)))))
            .count()
    }
}

async fn process_one<R, T, S>(
    extractor: &Extractor<R, T, S>,
    identifier: &str,
    options: &BatchOptions,
    cancel: &CancellationToken,
) -> Result<RepoSummary>
where
    R: IdentityResolver + Sync,
    T: RepoTransport + BlobTransport + Sync,
    S: OutputSink + Sync,
{
    if cancel.is_cancelled() {
        return Err(ExtractError::Cancelled);
    }

    let identity = extractor.resolve(identifier, cancel).await?;
    let extract = extractor.extract_repo(&identity, cancel).await?;

    let blobs = if options.download_blobs {
        match extractor.sync_blobs(&identity, cancel).await {
            Err(ExtractError::Cancelled) => return Err(ExtractError::Cancelled),
            Err(e) => {
                tracing::error!(%identifier, error = %e, "blob sync failed");
                Some(Err(e))
            }
            Ok(report) => Some(Ok(report)),
        }
    } else {
        None
    };

    Ok(RepoSummary {
        identity,
        extract,
        blobs,
    })
}

/// Export every identifier, isolating failures per identifier
///
/// At most `options.concurrency` identifiers are in flight. Once `cancel`
/// fires no new identifier starts, in-flight network calls are abandoned, and
/// the affected identifiers are reported as cancelled.
pub async fn run_batch<R, T, S>(
    extractor: &Extractor<R, T, S>,
    identifiers: Vec<String>,
    options: &BatchOptions,
    cancel: &CancellationToken,
) -> BatchReport
where
    R: IdentityResolver + Sync,
    T: RepoTransport + BlobTransport + Sync,
    S: OutputSink + Sync,
{
    let total = identifiers.len();
    tracing::info!(total, concurrency = options.concurrency, "starting batch");

    let mut indexed: Vec<(usize, IdentifierResult)> = futures::stream::iter(
        identifiers.into_iter().enumerate(),
    )
    .map(|(index, identifier)| async move {
        tracing::info!(%identifier, "processing ({}/{})", index + 1, total);
        let outcome = process_one(extractor, &identifier, options, cancel).await;
        match &outcome {
            Ok(_) => {}
            Err(e) if e.is_cancelled() => tracing::warn!(%identifier, "cancelled"),
            Err(e) => tracing::error!(%identifier, error = %e, "extraction failed"),
        }
        (index, IdentifierResult { identifier, outcome })
    })
    .buffer_unordered(options.concurrency.max(1))
    .collect()
    .await;

    indexed.sort_by_key(|(index, _)| *index);
    let report = BatchReport {
        results: indexed.into_iter().map(|(_, result)| result).collect(),
    };

    tracing::info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        cancelled = report.cancelled(),
        blob_failures = report.blob_failures(),
        "batch finished"
    );
    report
}
