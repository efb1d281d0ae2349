use std::path::PathBuf;
use std::time::Duration;

use bobbin::{BatchOptions, Config, ExtractOptions, Extractor, FsSink, XrpcClient};
use bobbin_identity::{PublicResolver, ResolverOptions};
use clap::Parser;
use miette::{IntoDiagnostic, Result, WrapErr};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about = "Export AT Protocol repositories: archives, records and blobs")]
struct Args {
    /// File with one DID or handle per line (`#` starts a comment)
    #[arg(env = "DIDS_FILE", required_unless_present = "unpack")]
    dids_file: Option<PathBuf>,

    /// Unpack a local CAR file instead of fetching (repeatable)
    #[arg(long, value_name = "CAR")]
    unpack: Vec<PathBuf>,

    /// Also download each repository's blobs
    #[arg(long, env = "DOWNLOAD_BLOBS")]
    download_blobs: bool,

    /// Directory for raw repository archives
    #[arg(long, default_value = "cars")]
    cars_dir: PathBuf,

    /// Directory for records, commits and blobs
    #[arg(long, default_value = "records")]
    records_dir: PathBuf,

    /// Don't keep fetched archives
    #[arg(long)]
    no_archive: bool,

    /// Blob listing page size
    #[arg(long, default_value_t = bobbin::config::DEFAULT_BLOB_PAGE_SIZE)]
    blob_page_size: u32,

    /// Repositories processed at once
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// PLC directory for did:plc resolution
    #[arg(long, default_value = "https://plc.directory")]
    plc_directory: Url,

    /// HTTP timeout per request, in seconds
    #[arg(long, default_value_t = 300)]
    timeout: u64,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            cars_dir: self.cars_dir.clone(),
            records_dir: self.records_dir.clone(),
            archive: !self.no_archive,
            download_blobs: self.download_blobs,
            blob_page_size: self.blob_page_size,
            concurrency: self.concurrency,
            plc_directory: self.plc_directory.clone(),
        }
    }
}

/// Local archives are named explicitly, so any failure ends the run
async fn unpack_all(sink: &FsSink, paths: &[PathBuf], cancel: &CancellationToken) -> Result<()> {
    for path in paths {
        let report = bobbin::unpack_car(sink, path, cancel)
            .await
            .wrap_err_with(|| format!("failed to unpack {}", path.display()))?;
        println!(
            "ok      {} ({}): {} records, {} skipped",
            path.display(),
            report.did,
            report.records_written,
            report.skipped.len()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_env_filter(
            EnvFilter::try_from_env("BOBBIN_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = args.config();
    config.validate()?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, finishing in-flight writes");
                cancel.cancel();
            }
        }
    });

    let sink = FsSink::new(&config.cars_dir, &config.records_dir);

    if !args.unpack.is_empty() {
        sink.create_roots().await?;
        return unpack_all(&sink, &args.unpack, &cancel).await;
    }

    let Some(dids_file) = &args.dids_file else {
        return Err(miette::miette!("no identifier list given"));
    };
    let identifiers = bobbin::read_identifiers(dids_file).await?;
    sink.create_roots().await?;

    let http = reqwest::Client::builder()
        .user_agent(concat!("bobbin/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(args.timeout))
        .build()
        .into_diagnostic()
        .wrap_err("failed to build HTTP client")?;

    let extractor = Extractor::new(
        PublicResolver::new(
            http.clone(),
            ResolverOptions::with_plc_directory(config.plc_directory.clone()),
        ),
        XrpcClient::new(http),
        sink,
        ExtractOptions::from(&config),
    );

    let report = bobbin::run_batch(
        &extractor,
        identifiers,
        &BatchOptions::from(&config),
        &cancel,
    )
    .await;

    for result in &report.results {
        match &result.outcome {
            Ok(summary) => {
                let blobs = match &summary.blobs {
                    None => String::new(),
                    Some(Ok(b)) => format!(", {} blobs fetched, {} present", b.downloaded, b.existing),
                    Some(Err(e)) => format!(", blob sync failed: {e}"),
                };
                println!(
                    "ok      {} ({}): {} records, {} skipped, commit {}{}",
                    result.identifier,
                    summary.identity.did,
                    summary.extract.records_written,
                    summary.extract.skipped.len(),
                    summary.extract.trust.label(),
                    blobs
                );
            }
            Err(e) => println!("failed  {}: {e}", result.identifier),
        }
    }
    println!(
        "{} exported, {} failed, {} cancelled",
        report.succeeded(),
        report.failed(),
        report.cancelled()
    );

    Ok(())
}
