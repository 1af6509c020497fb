//! A single intent route and its match conditions.
//!
//! # Responsibilities
//! - Gate on intent name equality before any other condition
//! - Evaluate the attached conditions with AND semantics
//! - Own the fulfillment handler for the intent
//!
//! # Design Decisions
//! - Intent equality is the cheap discriminant, checked first
//! - No conditions = every request for the intent matches
//! - Builder methods append and return `&mut Self` for chaining

use std::fmt;

use thiserror::Error;

use crate::fulfillment::{FulfillmentRequest, FulfillmentResponse};
use crate::routing::matcher::{AndMatcher, HandlerMatcher, LocaleMatcher, Matcher, PredicateMatcher};

/// Errors raised while configuring routes.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Something that can answer a fulfillment request.
///
/// Returning `None` declines the request and lets the router keep scanning.
pub trait Fulfill: Send + Sync {
    fn fulfill(&self, req: &FulfillmentRequest) -> Option<FulfillmentResponse>;
}

impl<F> Fulfill for F
where
    F: Fn(&FulfillmentRequest) -> Option<FulfillmentResponse> + Send + Sync,
{
    fn fulfill(&self, req: &FulfillmentRequest) -> Option<FulfillmentResponse> {
        self(req)
    }
}

/// Stores the handler for an intent along with extra conditions on the
/// originating handler, the locale, or caller-provided predicates.
pub struct Route {
    intent: String,
    conditions: AndMatcher,
    handler: Box<dyn Fulfill>,
}

impl Route {
    pub fn new(intent: impl Into<String>, handler: impl Fulfill + 'static) -> Self {
        Self {
            intent: intent.into(),
            conditions: AndMatcher::default(),
            handler: Box::new(handler),
        }
    }

    pub fn intent(&self) -> &str {
        &self.intent
    }

    /// Number of conditions attached beyond the intent check.
    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_match(&self, req: &FulfillmentRequest) -> bool {
        if req.intent_name() != self.intent {
            return false;
        }
        self.conditions.matches(req)
    }

    pub(crate) fn handler(&self) -> &dyn Fulfill {
        self.handler.as_ref()
    }

    pub(crate) fn set_handler(&mut self, handler: Box<dyn Fulfill>) {
        self.handler = handler;
    }

    /// Require the request to come from exactly this handler.
    ///
    /// ```ignore
    /// router.handle_intent("hello_world", hello).with_handler("new-joiner");
    /// ```
    pub fn with_handler(&mut self, handler: impl Into<String>) -> &mut Self {
        self.matching(HandlerMatcher::exact(handler))
    }

    /// Require the handler name to contain a match for `pattern`.
    pub fn with_handler_like(&mut self, pattern: &str) -> Result<&mut Self, RouteError> {
        let matcher = HandlerMatcher::pattern(pattern).map_err(|source| RouteError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(self.matching(matcher))
    }

    /// Require the user locale to contain a match for `pattern`, e.g. `"^en-"`.
    pub fn with_locale_like(&mut self, pattern: &str) -> Result<&mut Self, RouteError> {
        let matcher = LocaleMatcher::pattern(pattern).map_err(|source| RouteError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(self.matching(matcher))
    }

    /// Filter requests with a custom predicate.
    pub fn match_fn<F>(&mut self, predicate: F) -> &mut Self
    where
        F: Fn(&FulfillmentRequest) -> bool + Send + Sync + 'static,
    {
        self.matching(PredicateMatcher::new(predicate))
    }

    /// Attach any [`Matcher`] implementation.
    pub fn matching(&mut self, matcher: impl Matcher + 'static) -> &mut Self {
        self.conditions.push(Box::new(matcher));
        self
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("intent", &self.intent)
            .field("conditions", &self.conditions)
            .finish_non_exhaustive()
    }
}
