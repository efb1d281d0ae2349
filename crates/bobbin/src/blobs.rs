//! Blob mirroring: paginated listing plus fetch-if-absent

use std::collections::HashSet;

use bobbin_identity::{IdentityResolver, ResolvedIdentity};
use bobbin_repo::{Cid, verify_block};
use smol_str::SmolStr;
use tokio_util::sync::CancellationToken;

use crate::error::{ExtractError, Result};
use crate::extract::{Extractor, cancellable};
use crate::sink::{Namespace, OutputSink};
use crate::transport::{BlobTransport, RepoTransport};

/// Summary of one blob sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlobReport {
    /// CIDs listed by the PDS, duplicates included
    pub listed: usize,
    /// Blobs fetched and written
    pub downloaded: usize,
    /// Blobs already present in the sink
    pub existing: usize,
    /// Listing pages requested
    pub pages: usize,
}

impl<R, T, S> Extractor<R, T, S>
where
    R: IdentityResolver + Sync,
    T: RepoTransport + BlobTransport + Sync,
    S: OutputSink + Sync,
{
    /// Download every listed blob not already in the sink
    ///
    /// Each CID is fetched at most once per call. Blobs already present are
    /// trusted without re-reading them; freshly fetched bytes must hash to
    /// their CID. The first fetch, verification or write failure ends the
    /// sync with an error; blobs written before it stay written.
    #[tracing::instrument(level = "info", skip_all, fields(did = %ident.did))]
    pub async fn sync_blobs(
        &self,
        ident: &ResolvedIdentity,
        cancel: &CancellationToken,
    ) -> Result<BlobReport> {
        let ns = Namespace::Blobs(ident.did.clone());
        let page_size = self.options().blob_page_size;
        let mut seen: HashSet<SmolStr> = HashSet::new();
        let mut cursor: Option<SmolStr> = None;
        let mut report = BlobReport::default();

        loop {
            let page = cancellable(
                cancel,
                self.transport()
                    .list_blobs(&ident.pds, &ident.did, cursor.as_deref(), page_size),
            )
            .await?;
            report.pages += 1;
            tracing::debug!(page = report.pages, cids = page.cids.len(), "listed blobs");

            for listed in &page.cids {
                report.listed += 1;
                if !seen.insert(listed.clone()) {
                    continue;
                }

                let cid = Cid::try_from(listed.as_str())
                    .map_err(|_| ExtractError::InvalidBlobCid(listed.to_string()))?;

                if self.sink().exists(&ns, listed).await? {
                    report.existing += 1;
                    continue;
                }

                let bytes = cancellable(
                    cancel,
                    self.transport().fetch_blob(&ident.pds, &ident.did, listed),
                )
                .await?;
                verify_block(&cid, &bytes).map_err(|source| ExtractError::BlobIntegrity {
                    cid: listed.clone(),
                    source,
                })?;

                self.sink().write_unit(&ns, listed, bytes).await?;
                report.downloaded += 1;
                tracing::trace!(cid = %listed, "wrote blob");
            }

            match page.next_cursor() {
                Some(next) if cursor.as_deref() == Some(next) => {
                    tracing::warn!(cursor = next, "blob listing cursor did not advance");
                    break;
                }
                Some(next) => cursor = Some(SmolStr::new(next)),
                None => break,
            }
        }

        tracing::info!(
            listed = report.listed,
            downloaded = report.downloaded,
            existing = report.existing,
            pages = report.pages,
            "synced blobs"
        );
        Ok(report)
    }
}
