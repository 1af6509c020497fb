//! Fulfillment data contract.
//!
//! # Data Flow
//! ```text
//! POST body (JSON)
//!     → request.rs (FulfillmentRequest, decoded once per call)
//!     → routing reads handler.name / intent.name / user.locale
//!     → handler builds response.rs (FulfillmentResponse)
//!     → serialized back to the assistant platform
//! ```
//!
//! # Design Decisions
//! - Every field defaults, so partial payloads decode
//! - Free-form protobuf `Value`s are kept as `serde_json::Value`
//! - Unknown fields are ignored rather than rejected

pub mod request;
pub mod response;

pub use request::FulfillmentRequest;
pub use response::{FulfillmentResponse, Prompt, Simple};
