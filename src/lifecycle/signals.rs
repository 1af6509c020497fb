//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - SIGTERM/SIGINT trigger graceful shutdown
//! - SIGHUP forces a key refresh, superseding the pending renewal

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::auth::Authenticator;
use crate::lifecycle::Shutdown;

/// Handle process signals until a shutdown signal arrives.
#[cfg(unix)]
pub async fn handle_signals(shutdown: Shutdown, authenticator: Arc<Authenticator>) {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut terminate, mut hangup) =
        match (signal(SignalKind::terminate()), signal(SignalKind::hangup())) {
            (Ok(terminate), Ok(hangup)) => (terminate, hangup),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(error = %e, "Failed to install signal handlers");
                return;
            }
        };

    loop {
        tokio::select! {
            _ = terminate.recv() => {
                tracing::info!("SIGTERM received");
                break;
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                    return;
                }
                tracing::info!("SIGINT received");
                break;
            }
            _ = hangup.recv() => {
                tracing::info!("SIGHUP received");
                spawn_key_refresh(authenticator.clone());
            }
        }
    }

    shutdown.trigger();
}

/// Handle process signals until Ctrl+C arrives.
#[cfg(not(unix))]
pub async fn handle_signals(shutdown: Shutdown, _authenticator: Arc<Authenticator>) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            shutdown.trigger();
        }
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
    }
}

/// Run [`refresh_keys`] in the background so signal handling stays responsive.
pub fn spawn_key_refresh(authenticator: Arc<Authenticator>) -> JoinHandle<()> {
    tokio::spawn(async move { refresh_keys(&authenticator).await })
}

/// Force a key refresh if verification has been enabled.
pub async fn refresh_keys(authenticator: &Authenticator) {
    let Some(refresher) = authenticator.refresher() else {
        tracing::info!("Key refresh requested but token verification is disabled");
        return;
    };
    match refresher.force_refresh().await {
        Ok(max_age) => tracing::info!(max_age_secs = max_age.as_secs(), "Forced key refresh complete"),
        Err(e) => tracing::warn!(error = %e, "Forced key refresh failed"),
    }
}
