//! Route matching logic.
//!
//! # Responsibilities
//! - Match the originating handler name (exact or pattern)
//! - Match the user locale (pattern)
//! - Wrap caller-supplied predicates
//!
//! # Design Decisions
//! - Patterns are substring searches, not anchored full matches
//! - An empty pattern matches everything, including empty fields
//! - A missing request never matches and never errors

use std::fmt;

use regex::Regex;

use crate::fulfillment::FulfillmentRequest;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &FulfillmentRequest) -> bool;

    /// Like [`Matcher::matches`], with "no request" defined as a non-match.
    fn matches_opt(&self, req: Option<&FulfillmentRequest>) -> bool {
        req.is_some_and(|r| self.matches(r))
    }
}

#[derive(Debug, Clone)]
enum NameCondition {
    Exact(String),
    Pattern(Regex),
}

/// Matches the name of the conversational handler that sent the request.
#[derive(Debug, Clone)]
pub struct HandlerMatcher {
    condition: NameCondition,
}

impl HandlerMatcher {
    /// Match when the handler name is exactly `name`.
    pub fn exact(name: impl Into<String>) -> Self {
        Self {
            condition: NameCondition::Exact(name.into()),
        }
    }

    /// Match when `pattern` is found anywhere in the handler name.
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            condition: NameCondition::Pattern(Regex::new(pattern)?),
        })
    }
}

impl Matcher for HandlerMatcher {
    fn matches(&self, req: &FulfillmentRequest) -> bool {
        match &self.condition {
            NameCondition::Exact(expected) => req.handler_name() == expected,
            NameCondition::Pattern(re) => re.is_match(req.handler_name()),
        }
    }
}

/// Matches the user's locale against a pattern.
#[derive(Debug, Clone)]
pub struct LocaleMatcher {
    re: Regex,
}

impl LocaleMatcher {
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            re: Regex::new(pattern)?,
        })
    }
}

impl Matcher for LocaleMatcher {
    fn matches(&self, req: &FulfillmentRequest) -> bool {
        self.re.is_match(req.locale())
    }
}

type Predicate = dyn Fn(&FulfillmentRequest) -> bool + Send + Sync;

/// Wraps an arbitrary predicate. The predicate must not have side effects.
pub struct PredicateMatcher {
    predicate: Box<Predicate>,
}

impl PredicateMatcher {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&FulfillmentRequest) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Box::new(predicate),
        }
    }
}

impl fmt::Debug for PredicateMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateMatcher").finish_non_exhaustive()
    }
}

impl Matcher for PredicateMatcher {
    fn matches(&self, req: &FulfillmentRequest) -> bool {
        (self.predicate)(req)
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug, Default)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    pub fn push(&mut self, matcher: Box<dyn Matcher>) {
        self.matchers.push(matcher);
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, req: &FulfillmentRequest) -> bool {
        // All matchers must pass (AND), vacuously true when empty
        self.matchers.iter().all(|m| m.matches(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(handler: &str, locale: &str) -> FulfillmentRequest {
        FulfillmentRequest::new("intent", handler, locale)
    }

    #[test]
    fn test_handler_exact() {
        let matcher = HandlerMatcher::exact("App1");
        assert!(matcher.matches(&request("App1", "en-US")));
        assert!(!matcher.matches(&request("App2", "en-US")));
        assert!(!matcher.matches(&request("app1", "en-US"))); // Case sensitive
        assert!(!matcher.matches(&request("App10", "en-US")));
    }

    #[test]
    fn test_handler_pattern_is_substring_search() {
        let matcher = HandlerMatcher::pattern("joiner").unwrap();
        assert!(matcher.matches(&request("new-joiner-flow", "")));
        assert!(!matcher.matches(&request("leaver", "")));

        let anchored = HandlerMatcher::pattern(".*-joiner$").unwrap();
        assert!(anchored.matches(&request("new-joiner", "")));
        assert!(!anchored.matches(&request("new-joiner-flow", "")));
    }

    #[test]
    fn test_empty_pattern_matches_everything() {
        let handler = HandlerMatcher::pattern("").unwrap();
        let locale = LocaleMatcher::pattern("").unwrap();
        let empty = request("", "");
        assert!(handler.matches(&empty));
        assert!(locale.matches(&empty));
    }

    #[test]
    fn test_locale_pattern() {
        let matcher = LocaleMatcher::pattern("^en-").unwrap();
        assert!(matcher.matches(&request("h", "en-GB")));
        assert!(!matcher.matches(&request("h", "es-ES")));
        assert!(!matcher.matches(&request("h", "")));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(HandlerMatcher::pattern("(unclosed").is_err());
        assert!(LocaleMatcher::pattern("[").is_err());
    }

    #[test]
    fn test_predicate() {
        let matcher = PredicateMatcher::new(|r| r.intent.query.contains("please"));
        let mut req = request("h", "en");
        assert!(!matcher.matches(&req));
        req.intent.query = "yes please".into();
        assert!(matcher.matches(&req));
    }

    #[test]
    fn test_missing_request_never_matches() {
        let matchers: Vec<Box<dyn Matcher>> = vec![
            Box::new(HandlerMatcher::exact("")),
            Box::new(HandlerMatcher::pattern("").unwrap()),
            Box::new(LocaleMatcher::pattern("").unwrap()),
            Box::new(PredicateMatcher::new(|_| true)),
            Box::new(AndMatcher::default()),
        ];
        for m in &matchers {
            assert!(!m.matches_opt(None), "{:?} matched a missing request", m);
            assert!(m.matches_opt(Some(&request("", ""))));
        }
    }

    #[test]
    fn test_and_matcher() {
        let mut all = AndMatcher::default();
        assert!(all.matches(&request("x", "y")));

        all.push(Box::new(HandlerMatcher::exact("App1")));
        all.push(Box::new(LocaleMatcher::pattern("^fr").unwrap()));
        assert_eq!(all.len(), 2);
        assert!(all.matches(&request("App1", "fr-FR")));
        assert!(!all.matches(&request("App1", "de-DE")));
        assert!(!all.matches(&request("App2", "fr-FR")));
    }
}
