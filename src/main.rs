use std::sync::Arc;

use config::Config;
use data::{MemoryStore, Postgres, TransactionStore};
use import::{DeduplicatingImporter, FileImporter};
use ingest::{BatchFinisher, DirectoryWatcher, IngestionQueue};
use statement_parsing::ParserRegistry;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod config;
pub mod data;
pub mod error;
pub mod import;
pub mod ingest;
pub mod statement_parsing;
mod utils;

#[tokio::main]
async fn main() {
    let service_name = env!("CARGO_CRATE_NAME");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{service_name}=debug,sqlx=info").into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(false)
                .with_line_number(false),
        )
        .init();

    let config = Config::new().expect("config");

    let store: Arc<dyn TransactionStore> = match &config.database_url {
        Some(url) if !config.dry_run => {
            let postgres = Postgres::new(url).await.expect("data");
            postgres.ensure_schema().await.expect("schema");
            Arc::new(postgres)
        }
        _ => {
            tracing::warn!("dry run, imported transactions are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let registry = Arc::new(ParserRegistry::new(config.parsers.clone()));
    let importer = FileImporter::new(
        registry,
        DeduplicatingImporter::new(store, config.store_timeout),
    );
    let finisher = BatchFinisher::new(
        config.watch_dir.clone(),
        config.processed_dir.clone(),
        config.archive_processed,
    );

    let queue = IngestionQueue::start(
        Arc::new(importer),
        Arc::new(finisher),
        config.settle_debounce,
    );

    let cancel = CancellationToken::new();
    let watcher = DirectoryWatcher::new(
        config.watch_dir.clone(),
        config.processed_dir.clone(),
        config.watch_poll,
        config.write_settle,
        queue.handle(),
        cancel.clone(),
    );

    let stop_all = cancel.clone();
    let watching = tokio::spawn(async move {
        let watched = watcher.run().await;
        stop_all.cancel();
        watched
    });

    tokio::select! {
        _ = shutdown_signal() => tracing::info!("shutting down"),
        _ = cancel.cancelled() => {},
    }
    cancel.cancel();

    let watched = watching.await;
    match watched {
        Ok(Err(err)) => tracing::error!("watcher failed: {err:#}"),
        Err(err) => tracing::error!("watcher task failed: {err}"),
        Ok(Ok(())) => {}
    }

    queue.shutdown().await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("error installing ctrl+c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("error installing signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
