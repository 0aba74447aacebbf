//! # WFA Hub Worker
//!
//! Background sender for bulk email campaigns.
//!
//! ## Architecture
//!
//! The worker:
//! - Requeues campaigns a previous worker left in `sending`
//! - Polls PostgreSQL for due campaigns (several workers can share a database)
//! - Sends each recipient through the campaign's SMTP configuration
//! - Retries transient SMTP failures with backoff
//! - Releases unfinished campaigns on shutdown
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://... cargo run -p wfahub-worker
//! ```

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wfahub_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool, DatabaseConfig},
};
use wfahub_shared::pdf::PdfRenderer;
use wfahub_worker::config::WorkerConfig;
use wfahub_worker::orchestrator::WorkerOrchestrator;
use wfahub_worker::queue::CampaignQueue;
use wfahub_worker::senders::SmtpSenderProvider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("WFA Hub Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::from_env()?;

    let pool = create_pool(DatabaseConfig {
        url: config.database_url.clone(),
        max_connections: config.max_connections,
        ..Default::default()
    })
    .await?;

    run_migrations(&pool).await?;

    let queue = CampaignQueue::new(pool.clone());
    queue.requeue_stale(config.stale_after_minutes).await?;
    tracing::info!(pending = queue.pending_count().await?, "Recipients waiting to be sent");

    let provider = Arc::new(SmtpSenderProvider::new(pool.clone()));
    let orchestrator = WorkerOrchestrator::new(
        pool.clone(),
        provider,
        PdfRenderer::new(config.pdf.clone()),
        config.orchestrator.clone(),
    );

    let shutdown = orchestrator.shutdown_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.cancel();
    });

    tracing::info!("Worker ready and polling for campaigns");
    orchestrator.run().await?;

    close_pool(pool).await;
    tracing::info!("Worker stopped");

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "wfahub_worker=debug,wfahub_shared=info".into());

    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, finishing in-flight sends...");
}
