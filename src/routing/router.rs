//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store routes in registration order
//! - Authenticate, decode and route each webhook call
//! - Return an explicit outcome for every terminal state
//!
//! # Design Decisions
//! - Immutable after setup (shared via Arc without locks)
//! - O(n) scan, first match wins; a declining handler lets the scan continue
//! - Authentication precedes decoding
//! - A panicking handler counts as a decline, never a crashed dispatch

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::auth::{AuthError, AuthSettings, Authenticator, KeyCache, KeyFetchError};
use crate::fulfillment::{FulfillmentRequest, FulfillmentResponse, Prompt};
use crate::observability::metrics;
use crate::routing::route::{Fulfill, Route};

/// Intent the platform sends to probe webhook health.
pub const ACTIONS_INTENT_HEALTH_CHECK: &str = "actions.intent.HEALTH_CHECK";

/// Header carrying the platform's signed token.
pub const SIGNATURE_HEADER: &str = "google-assistant-signature";

/// Terminal state of a single webhook call.
#[derive(Debug)]
pub enum Dispatch {
    /// A handler produced a response.
    Dispatched(FulfillmentResponse),
    /// Anything other than POST.
    MethodNotAllowed,
    /// Token verification failed.
    Rejected(AuthError),
    /// The body is not a fulfillment request.
    Malformed(String),
    /// No route produced a response.
    Unmatched,
}

impl Dispatch {
    /// Short label used in logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            Dispatch::Dispatched(_) => "dispatched",
            Dispatch::MethodNotAllowed => "method_not_allowed",
            Dispatch::Rejected(_) => "rejected",
            Dispatch::Malformed(_) => "malformed",
            Dispatch::Unmatched => "unmatched",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Dispatch::Dispatched(_) => StatusCode::OK,
            Dispatch::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Dispatch::Rejected(_) => StatusCode::UNAUTHORIZED,
            Dispatch::Malformed(_) => StatusCode::BAD_REQUEST,
            Dispatch::Unmatched => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for Dispatch {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Dispatch::Dispatched(body) => (status, Json(body)).into_response(),
            Dispatch::Rejected(_) => (status, Json(json!({ "error": "Unauthorized" }))).into_response(),
            Dispatch::Unmatched => (
                status,
                Json(json!({
                    "status": { "code": 404, "message": "No matching handler for intent" }
                })),
            )
                .into_response(),
            Dispatch::MethodNotAllowed | Dispatch::Malformed(_) => status.into_response(),
        }
    }
}

fn default_health_check(_: &FulfillmentRequest) -> Option<FulfillmentResponse> {
    Some(FulfillmentResponse::with_prompt(
        Prompt::simple("ok", "").overriding(),
    ))
}

/// Webhook router: an ordered list of intent routes behind an authenticator.
///
/// ```ignore
/// let mut router = Router::new();
/// router.handle_intent("HelloWorld", |_: &FulfillmentRequest| {
///     Some(FulfillmentResponse::speech("Hello world"))
/// });
/// ```
///
/// The health-check route is registered first and always answers unless
/// replaced through [`Router::health_check`].
pub struct Router {
    routes: Vec<Route>,
    authenticator: Arc<Authenticator>,
}

impl Router {
    /// A router with its own key cache and verification disabled.
    pub fn new() -> Self {
        Self::with_authenticator(Arc::new(Authenticator::new(Arc::new(KeyCache::new()))))
    }

    /// A router verifying tokens through a shared authenticator.
    pub fn with_authenticator(authenticator: Arc<Authenticator>) -> Self {
        Self {
            routes: vec![Route::new(ACTIONS_INTENT_HEALTH_CHECK, default_health_check)],
            authenticator,
        }
    }

    /// Verify every call against `settings.audience`, fetching keys through
    /// `settings.proxy` when set. Keys are fetched once per authenticator.
    pub async fn authorize(&mut self, settings: &AuthSettings) -> Result<&mut Self, KeyFetchError> {
        self.authenticator.enable(settings).await?;
        Ok(self)
    }

    pub fn authenticator(&self) -> &Arc<Authenticator> {
        &self.authenticator
    }

    /// Register `handler` for `intent`, returning the route for chaining
    /// conditions. Earlier registrations win.
    pub fn handle_intent(
        &mut self,
        intent: impl Into<String>,
        handler: impl Fulfill + 'static,
    ) -> &mut Route {
        let route = Route::new(intent, handler);
        tracing::debug!(intent = %route.intent(), position = self.routes.len(), "Route registered");
        self.routes.push(route);
        let last = self.routes.len() - 1;
        &mut self.routes[last]
    }

    /// Replace the handler answering platform health checks.
    pub fn health_check(&mut self, handler: impl Fulfill + 'static) {
        if let Some(route) = self
            .routes
            .iter_mut()
            .find(|r| r.intent() == ACTIONS_INTENT_HEALTH_CHECK)
        {
            route.set_handler(Box::new(handler));
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Run the route scan for an already decoded request.
    pub fn resolve(&self, req: &FulfillmentRequest) -> Option<FulfillmentResponse> {
        for (position, route) in self.routes.iter().enumerate() {
            if !route.is_match(req) {
                continue;
            }
            match invoke(route, req) {
                Some(response) => {
                    tracing::debug!(intent = %req.intent_name(), position, "Route fulfilled request");
                    return Some(response);
                }
                None => {
                    tracing::debug!(intent = %req.intent_name(), position, "Route declined, continuing");
                }
            }
        }
        None
    }

    /// Drive one webhook call through the dispatch state machine.
    pub fn dispatch(&self, method: &Method, headers: &HeaderMap, body: &[u8]) -> Dispatch {
        if method != Method::POST {
            return Dispatch::MethodNotAllowed;
        }

        let token = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        if let Err(e) = self.authenticator.verify(token) {
            tracing::warn!(error = %e, "Rejected webhook call");
            return Dispatch::Rejected(e);
        }

        let req: FulfillmentRequest = match serde_json::from_slice(body) {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed fulfillment request");
                return Dispatch::Malformed(e.to_string());
            }
        };

        match self.resolve(&req) {
            Some(response) => Dispatch::Dispatched(response),
            None => {
                tracing::info!(
                    intent = %req.intent_name(),
                    handler = %req.handler_name(),
                    locale = %req.locale(),
                    "No matching handler for intent"
                );
                Dispatch::Unmatched
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .field("authenticator", &self.authenticator)
            .finish()
    }
}

fn invoke(route: &Route, req: &FulfillmentRequest) -> Option<FulfillmentResponse> {
    match catch_unwind(AssertUnwindSafe(|| route.handler().fulfill(req))) {
        Ok(response) => response,
        Err(_) => {
            tracing::error!(intent = %route.intent(), "Handler panicked, treating as declined");
            metrics::record_handler_panic(route.intent());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn body(intent: &str, handler: &str, locale: &str) -> Vec<u8> {
        serde_json::to_vec(&FulfillmentRequest::new(intent, handler, locale)).unwrap()
    }

    fn say(text: &'static str) -> impl Fn(&FulfillmentRequest) -> Option<FulfillmentResponse> {
        move |_: &FulfillmentRequest| Some(FulfillmentResponse::speech(text))
    }

    fn decline(_: &FulfillmentRequest) -> Option<FulfillmentResponse> {
        None
    }

    fn spoken(dispatch: Dispatch) -> String {
        match dispatch {
            Dispatch::Dispatched(resp) => resp.prompt.unwrap().first_simple.unwrap().speech,
            other => panic!("expected a response, got {:?}", other),
        }
    }

    #[test]
    fn test_health_check_registered_first() {
        let mut router = Router::new();
        router.handle_intent("Greet", say("hi"));
        assert_eq!(router.routes()[0].intent(), ACTIONS_INTENT_HEALTH_CHECK);
        assert_eq!(router.routes().len(), 2);

        let out = router.dispatch(&Method::POST, &HeaderMap::new(), &body(ACTIONS_INTENT_HEALTH_CHECK, "", ""));
        match out {
            Dispatch::Dispatched(resp) => {
                let prompt = resp.prompt.unwrap();
                assert!(prompt.override_);
                assert_eq!(prompt.first_simple.unwrap().speech, "ok");
            }
            other => panic!("health check failed: {:?}", other),
        }
    }

    #[test]
    fn test_health_check_replaced() {
        let mut router = Router::new();
        router.health_check(say("healthy"));
        assert_eq!(router.routes().len(), 1);
        let out = router.dispatch(&Method::POST, &HeaderMap::new(), &body(ACTIONS_INTENT_HEALTH_CHECK, "", ""));
        assert_eq!(spoken(out), "healthy");
    }

    #[test]
    fn test_only_post_accepted() {
        let router = Router::new();
        for method in [Method::GET, Method::PUT, Method::DELETE, Method::HEAD] {
            let out = router.dispatch(&method, &HeaderMap::new(), &body("x", "", ""));
            assert!(matches!(out, Dispatch::MethodNotAllowed));
            assert_eq!(out.status(), StatusCode::METHOD_NOT_ALLOWED);
        }
    }

    #[test]
    fn test_malformed_body() {
        let router = Router::new();
        let out = router.dispatch(&Method::POST, &HeaderMap::new(), b"{not json");
        assert!(matches!(out, Dispatch::Malformed(_)));
        assert_eq!(out.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_auth_checked_before_decode() {
        let router = Router::new();
        router.authenticator().set_audience("my-aud");
        let out = router.dispatch(&Method::POST, &HeaderMap::new(), b"{not json");
        assert!(matches!(out, Dispatch::Rejected(AuthError::MissingToken)));
    }

    #[test]
    fn test_handler_exact_scenario() {
        let mut router = Router::new();
        router.handle_intent("Greet", say("hello app1")).with_handler("App1");

        let out = router.dispatch(&Method::POST, &HeaderMap::new(), &body("Greet", "App1", "en-US"));
        assert_eq!(spoken(out), "hello app1");

        let out = router.dispatch(&Method::POST, &HeaderMap::new(), &body("Greet", "App2", "en-US"));
        assert!(matches!(out, Dispatch::Unmatched));
        assert_eq!(out.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_null_passthrough_fields_still_route() {
        let mut router = Router::new();
        router.handle_intent("Greet", say("hello")).with_handler("App1");
        let body = br#"{
            "handler": { "name": "App1" },
            "intent": { "name": "Greet", "params": null },
            "user": { "locale": "en-US", "params": null, "permissions": null }
        }"#;
        let out = router.dispatch(&Method::POST, &HeaderMap::new(), body);
        assert_eq!(spoken(out), "hello");
    }

    #[test]
    fn test_first_registered_wins() {
        let mut router = Router::new();
        router.handle_intent("Greet", say("first"));
        router.handle_intent("Greet", say("second"));
        let req = FulfillmentRequest::new("Greet", "", "");
        for _ in 0..3 {
            assert_eq!(router.resolve(&req), Some(FulfillmentResponse::speech("first")));
        }
    }

    #[test]
    fn test_declining_handler_falls_through() {
        let mut router = Router::new();
        router.handle_intent("Greet", decline);
        router.handle_intent("Greet", say("fallback"));
        let req = FulfillmentRequest::new("Greet", "", "");
        assert_eq!(router.resolve(&req), Some(FulfillmentResponse::speech("fallback")));
    }

    #[test]
    fn test_all_declining_is_unmatched() {
        let mut router = Router::new();
        router.handle_intent("Greet", decline);
        let out = router.dispatch(&Method::POST, &HeaderMap::new(), &body("Greet", "", ""));
        assert!(matches!(out, Dispatch::Unmatched));
    }

    #[test]
    fn test_panicking_handler_is_declined() {
        let mut router = Router::new();
        router.handle_intent("Greet", |_: &FulfillmentRequest| -> Option<FulfillmentResponse> {
            panic!("handler bug")
        });
        router.handle_intent("Greet", say("survived"));
        let req = FulfillmentRequest::new("Greet", "", "");
        assert_eq!(router.resolve(&req), Some(FulfillmentResponse::speech("survived")));
    }

    #[test]
    fn test_at_most_one_handler_runs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        for _ in 0..3 {
            let calls = calls.clone();
            router.handle_intent("Greet", move |_: &FulfillmentRequest| {
                calls.fetch_add(1, Ordering::SeqCst);
                Some(FulfillmentResponse::speech("counted"))
            });
        }
        router.resolve(&FulfillmentRequest::new("Greet", "", ""));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_conditions_narrow_routes() {
        let mut router = Router::new();
        router
            .handle_intent("Greet", say("english"))
            .with_locale_like("^en")
            .unwrap();
        router
            .handle_intent("Greet", say("beta"))
            .with_handler_like("-beta$")
            .unwrap();
        router.handle_intent("Greet", say("anyone"));

        let resolve = |handler: &str, locale: &str| {
            router
                .resolve(&FulfillmentRequest::new("Greet", handler, locale))
                .and_then(|r| r.prompt)
                .and_then(|p| p.first_simple)
                .map(|s| s.speech)
        };
        assert_eq!(resolve("app", "en-US").as_deref(), Some("english"));
        assert_eq!(resolve("app-beta", "fr-FR").as_deref(), Some("beta"));
        assert_eq!(resolve("app", "fr-FR").as_deref(), Some("anyone"));
    }

    #[tokio::test]
    async fn test_error_bodies() {
        let response = Dispatch::Rejected(AuthError::MissingToken).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&bytes[..], br#"{"error":"Unauthorized"}"#);

        let response = Dispatch::Unmatched.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["status"]["code"], 404);
        assert_eq!(value["status"]["message"], "No matching handler for intent");

        let response = Dispatch::Malformed("eof".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert!(bytes.is_empty());
    }
}
