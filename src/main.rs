//! Fulfillment webhook server.
//!
//! ```text
//!   assistant platform
//!          │ POST + google-assistant-signature
//!          ▼
//!   ┌─────────────┐    ┌───────────────┐    ┌──────────────┐
//!   │ http server │───▶│ authenticator │───▶│    router    │──▶ intent handler
//!   └─────────────┘    └───────┬───────┘    └──────────────┘
//!                              │ snapshot
//!                      ┌───────┴───────┐    ┌──────────────┐
//!                      │   key cache   │◀───│ key refresher│◀── key endpoint
//!                      └───────────────┘    └──────────────┘
//! ```
//!
//! Usage: `fulfillment-router [config.toml]`

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use fulfillment_router::config::{load_config, ConfigWatcher, WebhookConfig};
use fulfillment_router::lifecycle::{handle_signals, Shutdown};
use fulfillment_router::observability::{logging, metrics};
use fulfillment_router::routing::RouteError;
use fulfillment_router::{FulfillmentRequest, FulfillmentResponse, Router, WebhookServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => WebhookConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?config_path,
        "fulfillment-router starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut router = Router::new();
    register_intents(&mut router)?;
    if config.auth.is_enabled() {
        router.authorize(&config.auth).await?;
    } else {
        tracing::warn!("No audience configured, token verification disabled");
    }
    let router = Arc::new(router);

    let shutdown = Shutdown::new();
    let (_watcher, config_updates) = match &config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, config.clone());
            match watcher.run() {
                Ok(watcher) => (Some(watcher), updates),
                Err(e) => {
                    tracing::error!(error = %e, "Config hot reload unavailable");
                    (None, updates)
                }
            }
        }
        None => (None, mpsc::unbounded_channel().1),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = WebhookServer::new(config, router.clone());
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(handle_signals(shutdown.clone(), router.authenticator().clone()));

    server.run(listener, config_updates, server_shutdown).await?;

    if let Some(refresher) = router.authenticator().refresher() {
        refresher.stop();
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

fn register_intents(router: &mut Router) -> Result<(), RouteError> {
    router.handle_intent("HelloWorld", |req: &FulfillmentRequest| {
        let greeting = if req.locale().starts_with("fr") {
            "Bonjour le monde"
        } else {
            "Hello world"
        };
        Some(FulfillmentResponse::speech(greeting))
    });
    router
        .handle_intent("Version", |_: &FulfillmentRequest| {
            Some(FulfillmentResponse::speech(env!("CARGO_PKG_VERSION")))
        })
        .with_handler_like("^(version|about)$")?;
    Ok(())
}
