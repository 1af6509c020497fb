//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! webhook.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → WebhookConfig (validated, immutable)
//!     → handed to the server and the authenticator at startup
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new audience pushed into the running Authenticator
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the audience is hot-reloaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::AuthConfig;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::TimeoutConfig;
pub use schema::WebhookConfig;
pub use watcher::ConfigWatcher;
