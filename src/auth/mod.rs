//! Request authentication subsystem.
//!
//! # Data Flow
//! ```text
//! First enable call (single-flight):
//!     verifier.rs (Authenticator::enable)
//!     → refresh.rs (GET key endpoint, parse cache-control max-age)
//!     → keys.rs (atomic swap of the kid → PEM snapshot)
//!     → refresh.rs schedules its successor after max-age - 1s
//!
//! Per request:
//!     signature header
//!     → verifier.rs (decode header, look up kid in current snapshot)
//!     → verify RS256 signature, compare audience claim
//!     → Ok(claims) or AuthError
//! ```
//!
//! # Design Decisions
//! - Readers never lock: the key map is replaced wholesale, never mutated
//! - Renewal is a chain of one-shot tasks; a forced refresh aborts the pending one
//! - Failed fetches retry with bounded backoff, then serve the stale snapshot
//! - Empty audience disables verification entirely

pub mod error;
pub mod keys;
pub mod refresh;
pub mod verifier;

pub use error::{AuthError, KeyFetchError};
pub use keys::{KeyCache, KeySet};
pub use refresh::{parse_max_age, KeyRefresher};
pub use verifier::{AuthSettings, Authenticator};
