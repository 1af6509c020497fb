//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Decoded FulfillmentRequest (intent, handler, locale)
//!     → router.rs (scan routes in registration order)
//!     → route.rs (intent equality, then conditions)
//!     → matcher.rs (evaluate match conditions)
//!     → handler: Some(response) stops the scan, None continues it
//!     → Return: Dispatched or Unmatched
//!
//! Route registration (at startup):
//!     handle_intent(intent, handler)
//!     → chain conditions (with_handler, with_locale_like, ...)
//!     → Router shared via Arc, immutable while serving
//! ```
//!
//! # Design Decisions
//! - Routes configured at startup, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by registration)
//! - Health-check route always present and first

pub mod matcher;
pub mod route;
pub mod router;

pub use matcher::{AndMatcher, HandlerMatcher, LocaleMatcher, Matcher, PredicateMatcher};
pub use route::{Fulfill, Route, RouteError};
pub use router::{Dispatch, Router, ACTIONS_INTENT_HEALTH_CHECK, SIGNATURE_HEADER};
