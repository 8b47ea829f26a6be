//! GreenCart orders - order placement and inventory reservation service

use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use greencart_orders::api::{self, AppState};
use greencart_orders::config::Config;
use greencart_orders::notifications::{LogNotifier, NatsNotifier, NotificationDispatcher, Notifier};
use greencart_orders::services::{CartService, OrderService};
use greencart_orders::store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;

    let store = Arc::new(PgStore::connect(&config.database_url, config.database_max_connections).await?);
    store.migrate().await?;

    let notifier: Arc<dyn Notifier> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsNotifier::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, notifications will only be logged");
                Arc::new(LogNotifier)
            }
        },
        None => Arc::new(LogNotifier),
    };
    let (dispatcher, workers) = NotificationDispatcher::spawn(notifier, store.clone(), config.dispatcher());

    let state = AppState {
        orders: Arc::new(OrderService::new(store.clone(), dispatcher)),
        carts: Arc::new(CartService::new(store)),
    };
    let app = api::router(state);

    tracing::info!("GreenCart orders listening on 0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    // The router held the last dispatcher handle; wait for queued notifications.
    workers.join().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
