//! msglog-timestamper - RFC 3161 timestamping for the message log

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use msglog_timestamper::anchoring::{AsyncRfc3161Client, PinnedTrustStore, TsaService};
use msglog_timestamper::background::{BackgroundConfig, BackgroundJobRunner};
use msglog_timestamper::signature::XadesSignatureCodec;
use msglog_timestamper::{MessageLogConfig, SqliteStore, TimestampCoordinator};

#[derive(Parser, Debug)]
#[command(name = "msglog-timestamper")]
#[command(about = "Seals logged messages with RFC 3161 timestamps")]
struct Args {
    /// Path to SQLite database
    #[arg(long, env = "MSGLOG_DATABASE_PATH", default_value = "./messagelog.db")]
    database: String,

    /// Comma-separated list of RFC 3161 TSA URLs (tried in order with fallback)
    #[arg(long, env = "MSGLOG_TSA_URLS")]
    tsa_urls: Option<String>,

    /// PEM file with the trusted TSA signing certificates
    #[arg(long, env = "MSGLOG_TSA_TRUSTED_CERTS")]
    trusted_certs: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "MSGLOG_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Flush pending records once, print diagnostics and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&args.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting msglog-timestamper v{}", env!("CARGO_PKG_VERSION"));

    let mut config = MessageLogConfig::from_env();
    config.database_path = args.database.clone();
    config.log_level = args.log_level.clone();
    if let Some(urls) = &args.tsa_urls {
        config.tsa.urls = urls
            .split(',')
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .collect();
    }
    if args.trusted_certs.is_some() {
        config.tsa.trusted_certs = args.trusted_certs.clone();
    }

    tracing::info!(
        database = %config.database_path,
        tsa_urls = ?config.tsa.urls,
        digest = %config.digest_algorithm,
        immediate = config.timestamp_immediately,
        records_limit = config.records_limit,
        "Configuration loaded"
    );

    let store = Arc::new(
        SqliteStore::new(&config.database_path)
            .with_context(|| format!("failed to open {}", config.database_path))?,
    );

    let trust = match &config.tsa.trusted_certs {
        Some(path) => {
            let trust = PinnedTrustStore::from_pem_file(path)
                .with_context(|| format!("failed to load TSA certificates from {}", path.display()))?;
            tracing::info!(certificates = trust.len(), "Pinned TSA certificates loaded");
            trust
        }
        None => {
            tracing::warn!("No MSGLOG_TSA_TRUSTED_CERTS configured, every TSA will be untrusted");
            PinnedTrustStore::default()
        }
    };

    let client = AsyncRfc3161Client::with_config(&config.tsa, config.digest_algorithm, Arc::new(trust))
        .context("failed to create TSA client")?;
    let service = TsaService::new(Arc::new(client), config.tsa.urls.clone());

    let coordinator = Arc::new(TimestampCoordinator::new(
        config,
        store.clone(),
        Arc::new(XadesSignatureCodec),
        service,
    ));

    if args.once {
        let summary = coordinator.flush().await;
        tracing::info!(
            sealed = summary.sealed_records,
            timestamps = summary.timestamp_records,
            "Single flush finished"
        );
        print_diagnostics(&coordinator)?;
        return match summary.failure {
            Some(failure) => Err(anyhow::anyhow!("flush stopped: {}", failure)),
            None => Ok(()),
        };
    }

    let runner = BackgroundJobRunner::new(coordinator.clone(), BackgroundConfig::from_env())?;
    let handles = runner.start().await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    runner.shutdown();
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Background job panicked");
        }
    }

    match store.stats() {
        Ok(stats) => tracing::info!(
            messages = stats.message_count,
            pending = stats.pending_count,
            timestamps = stats.timestamp_count,
            "Record store state"
        ),
        Err(e) => tracing::warn!(error = %e, "Failed to read record store stats"),
    }
    print_diagnostics(&coordinator)?;

    Ok(())
}

fn print_diagnostics(coordinator: &TimestampCoordinator) -> anyhow::Result<()> {
    let diagnostics = serde_json::to_string_pretty(&coordinator.diagnostics())?;
    println!("{}", diagnostics);
    Ok(())
}
