//! Configuration file watcher for hot reload.
//!
//! Only the token audience is applied live; other changed fields are
//! reported and take effect on restart.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::WebhookConfig;

/// Watches the configuration file and forwards reloaded configs.
pub struct ConfigWatcher {
    path: PathBuf,
    current: WebhookConfig,
    update_tx: mpsc::UnboundedSender<WebhookConfig>,
}

impl ConfigWatcher {
    /// Create a watcher for `path`, starting from the already loaded `current`.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(
        path: &Path,
        current: WebhookConfig,
    ) -> (Self, mpsc::UnboundedReceiver<WebhookConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                current,
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching in notify's background thread.
    ///
    /// The parent directory is watched so editors that replace the file on
    /// save keep triggering reloads. The returned watcher must be kept alive
    /// for events to flow.
    pub fn run(mut self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let file_name = self.path.file_name().map(|n| n.to_os_string());
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    let touches_file = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if touches_file {
                        self.reload();
                    }
                }
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }

    fn reload(&mut self) {
        let next = match load_config(&self.path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
                return;
            }
        };

        let pending = restart_required(&self.current, &next);
        if !pending.is_empty() {
            tracing::warn!(fields = ?pending, "Config fields changed that only apply after restart");
        }
        if next.auth.audience == self.current.auth.audience {
            tracing::debug!("Config reloaded, audience unchanged");
        }

        self.current = next.clone();
        if self.update_tx.send(next).is_err() {
            tracing::debug!("Config update receiver dropped");
        }
    }
}

/// Fields that differ between `old` and `new` but cannot be applied live.
pub fn restart_required(old: &WebhookConfig, new: &WebhookConfig) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if old.listener.bind_address != new.listener.bind_address {
        fields.push("listener.bind_address");
    }
    if old.listener.path != new.listener.path {
        fields.push("listener.path");
    }
    if old.listener.max_body_bytes != new.listener.max_body_bytes {
        fields.push("listener.max_body_bytes");
    }
    if old.auth.keys_url != new.auth.keys_url {
        fields.push("auth.keys_url");
    }
    if old.auth.proxy != new.auth.proxy {
        fields.push("auth.proxy");
    }
    if old.auth.system_proxy != new.auth.system_proxy {
        fields.push("auth.system_proxy");
    }
    if old.auth.fetch_timeout_secs != new.auth.fetch_timeout_secs {
        fields.push("auth.fetch_timeout_secs");
    }
    if old.auth.retry_attempts != new.auth.retry_attempts {
        fields.push("auth.retry_attempts");
    }
    if old.auth.retry_base_delay_ms != new.auth.retry_base_delay_ms {
        fields.push("auth.retry_base_delay_ms");
    }
    if old.auth.retry_max_delay_ms != new.auth.retry_max_delay_ms {
        fields.push("auth.retry_max_delay_ms");
    }
    if old.auth.min_renewal_secs != new.auth.min_renewal_secs {
        fields.push("auth.min_renewal_secs");
    }
    if old.timeouts.request_secs != new.timeouts.request_secs {
        fields.push("timeouts.request_secs");
    }
    if old.observability.log_level != new.observability.log_level {
        fields.push("observability.log_level");
    }
    if old.observability.json_logs != new.observability.json_logs {
        fields.push("observability.json_logs");
    }
    if old.observability.metrics_enabled != new.observability.metrics_enabled {
        fields.push("observability.metrics_enabled");
    }
    if old.observability.metrics_address != new.observability.metrics_address {
        fields.push("observability.metrics_address");
    }
    fields
}
