//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch outcome, key refreshes, handler panics
//!     → logging.rs (tracing events, one span per webhook call)
//!     → metrics.rs (webhook_* counters, histogram, keys gauge)
//!
//! Sinks:
//!     → stdout, pretty for development or JSON lines for collectors
//!     → Prometheus scrape endpoint when metrics are enabled
//! ```
//!
//! # Design Decisions
//! - The request ID lives on the HTTP span, so every event inside a call carries it
//! - Metric macros are no-ops until an exporter is installed, so tests need no setup

pub mod logging;
pub mod metrics;
