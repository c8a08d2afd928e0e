use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use issue_relay::config::Config;
use issue_relay::github::{OctocrabTransport, UpstreamClient};
use issue_relay::server::{AppState, build_router};
use issue_relay::store::EventStore;
use issue_relay::types::WebhookDelivery;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "issue_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    config.validate()?;
    info!(?config, "Starting issue relay");

    let store = match &config.event_journal {
        Some(path) => EventStore::with_journal(config.event_capacity, path)
            .with_context(|| format!("opening event journal {}", path.display()))?,
        None => EventStore::in_memory(config.event_capacity),
    };
    let store = Arc::new(store);

    let shutdown = CancellationToken::new();

    let transport = OctocrabTransport::from_token(
        config.github_token.clone(),
        &config.github_api_url,
        config.upstream_timeout(),
    )
    .context("building GitHub client")?;
    let upstream = UpstreamClient::new(transport).with_cancellation(shutdown.clone());

    let (automation_tx, automation_rx) = mpsc::channel(config.automation_queue);
    let automation = tokio::spawn(run_automation(automation_rx));

    let app_state = AppState::with_automation(
        store,
        config.webhook_secret.clone().into_bytes(),
        upstream,
        config.repo(),
        Some(automation_tx),
    );
    let app = build_router(app_state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("listening on {}", addr);

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Shutdown requested");
        signal.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("serving HTTP")?;

    // The router, and with it the last sender, is gone; the consumer drains and exits.
    if let Err(e) = automation.await {
        warn!(error = %e, "Automation consumer panicked");
    }
    info!("Stopped");
    Ok(())
}

/// Consumes newly recorded deliveries.
///
/// Automation itself is out of scope for this service; the consumer marks
/// the hand-off point and logs what it receives.
async fn run_automation(mut rx: mpsc::Receiver<WebhookDelivery>) {
    while let Some(delivery) = rx.recv().await {
        info!(
            delivery_id = %delivery.delivery_id,
            event_type = %delivery.event_type,
            action = %delivery.action,
            issue_number = ?delivery.issue_number.map(|n| n.0),
            "Automation received delivery"
        );
    }
}
