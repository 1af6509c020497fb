//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Key fetch fails:
//!     → backoff.rs (delay for attempt n, capped, jittered)
//!     → auth::refresh schedules the retry after that delay
//!     → retries exhausted: renewal stops, cached keys keep serving
//! ```
//!
//! # Design Decisions
//! - Every outbound call has a deadline (reqwest client timeout)
//! - Retries are bounded so a dead endpoint cannot spin forever
//! - Jittered backoff keeps a fleet of webhooks from fetching in lockstep

pub mod backoff;
