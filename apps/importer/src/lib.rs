pub mod clipboard;
pub mod config;
pub mod error;
pub mod importer;
pub mod record;
pub mod sink;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::clipboard::{ClipboardSource, SystemClipboard};
use crate::config::{Cli, Config};
use crate::importer::Importer;
use crate::sink::AnkiConnect;

pub use crate::error::{ConfigError, SinkError};
pub use crate::importer::{ImportStats, ImportStatus, TickOutcome};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| cli.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let source: Arc<dyn ClipboardSource> = Arc::new(SystemClipboard::new());
    if cli.test {
        clipboard::probe(source, 10, Duration::from_secs(3)).await;
        return Ok(());
    }

    let config = Config::try_from(cli)?;
    tracing::info!(
        deck = %config.deck,
        model = %config.mcq_model,
        url = %config.anki_url,
        "Starting clipboard importer"
    );

    let sink = Arc::new(AnkiConnect::new(config.anki_url.clone()));
    let mut importer = Importer::new(&config, source, sink);
    importer.preflight().await?;

    let stats = importer.run(shutdown_signal()).await;
    println!(
        "Imported {} cards ({} distinct clips processed)",
        stats.imported, stats.distinct
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
