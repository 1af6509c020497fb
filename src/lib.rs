//! Fulfillment webhook router.
//!
//! Receives conversational-assistant webhook calls, verifies the platform's
//! signed token and hands each request to the first matching intent route.

pub mod auth;
pub mod config;
pub mod fulfillment;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;

pub use config::schema::WebhookConfig;
pub use fulfillment::{FulfillmentRequest, FulfillmentResponse};
pub use http::WebhookServer;
pub use lifecycle::Shutdown;
pub use routing::Router;
