//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and URLs parse
//! - Validate value ranges (timeouts > 0, limits > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: WebhookConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::WebhookConfig;

/// A single semantic problem with a configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &WebhookConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if !config.listener.path.starts_with('/') {
        errors.push(ValidationError::new("listener.path", "must start with '/'"));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be greater than 0"));
    }

    if let Err(e) = Url::parse(&config.auth.keys_url) {
        errors.push(ValidationError::new("auth.keys_url", e.to_string()));
    }
    if let Some(proxy) = config.auth.proxy.as_deref().filter(|p| !p.is_empty()) {
        if let Err(e) = Url::parse(proxy) {
            errors.push(ValidationError::new("auth.proxy", e.to_string()));
        }
    }
    if config.auth.fetch_timeout_secs == 0 {
        errors.push(ValidationError::new("auth.fetch_timeout_secs", "must be greater than 0"));
    }
    if config.auth.retry_base_delay_ms > config.auth.retry_max_delay_ms {
        errors.push(ValidationError::new(
            "auth.retry_base_delay_ms",
            "must not exceed auth.retry_max_delay_ms",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
