//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID assigned or propagated)
//!     → routing::Router::dispatch (auth → decode → route scan)
//!     → Dispatch rendered as status + JSON body
//! ```

pub mod request;
pub mod server;

pub use request::{MakeRequestUuidV4, RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, WebhookServer};
