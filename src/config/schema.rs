//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the webhook.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Key distribution endpoint used by the assistant platform.
pub const DEFAULT_KEYS_URL: &str = "https://www.googleapis.com/oauth2/v1/certs";

/// Root configuration for the webhook.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WebhookConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Token verification and key distribution settings.
    pub auth: AuthConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Path the webhook is served on.
    pub path: String,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            path: "/".to_string(),
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Authentication configuration.
///
/// An empty `audience` disables token verification.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Expected `aud` claim (usually the project id).
    pub audience: String,

    /// Proxy used to reach the key endpoint.
    pub proxy: Option<String>,

    /// Honor HTTP(S)_PROXY from the environment when no proxy is set.
    pub system_proxy: bool,

    /// Key distribution endpoint returning `{kid: pem}`.
    pub keys_url: String,

    /// Timeout for a single key fetch in seconds.
    pub fetch_timeout_secs: u64,

    /// Retries after a failed fetch before renewal stops.
    pub retry_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub retry_max_delay_ms: u64,

    /// Lower bound on the delay between successful refreshes in seconds.
    pub min_renewal_secs: u64,
}

impl AuthConfig {
    pub fn new(audience: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
            ..Self::default()
        }
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_keys_url(mut self, url: impl Into<String>) -> Self {
        self.keys_url = url.into();
        self
    }

    pub fn is_enabled(&self) -> bool {
        !self.audience.is_empty()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            audience: String::new(),
            proxy: None,
            system_proxy: true,
            keys_url: DEFAULT_KEYS_URL.to_string(),
            fetch_timeout_secs: 10,
            retry_attempts: 5,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 60_000,
            min_renewal_secs: 1,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
