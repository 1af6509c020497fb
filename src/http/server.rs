//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router serving the webhook path
//! - Wire up middleware (request ID, tracing, body limit, timeout)
//! - Bind server to listener
//! - Hand every call to the routing engine
//! - Apply hot-reloaded audience changes while serving

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Method, Request},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::WebhookConfig;
use crate::http::request::{MakeRequestUuidV4, RequestIdExt};
use crate::observability::metrics;
use crate::routing::Router as WebhookRouter;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<WebhookRouter>,
}

/// HTTP server for the fulfillment webhook.
pub struct WebhookServer {
    app: Router,
    config: WebhookConfig,
    router: Arc<WebhookRouter>,
}

impl WebhookServer {
    /// Create a new HTTP server serving `router` with the given configuration.
    pub fn new(config: WebhookConfig, router: Arc<WebhookRouter>) -> Self {
        let state = AppState {
            router: router.clone(),
        };
        let app = Self::build_app(&config, state);
        Self {
            app,
            config,
            router,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_app(config: &WebhookConfig, state: AppState) -> Router {
        let middleware = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "webhook",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = %request.headers().request_id(),
                    )
                }),
            )
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        Router::new()
            .route(&config.listener.path, any(webhook_handler))
            .with_state(state)
            .layer(middleware)
    }

    /// The fully layered service, for in-process use.
    pub fn app(&self) -> Router {
        self.app.clone()
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Audience changes arriving on `config_updates` are applied to the
    /// router's authenticator. Returns once `shutdown` fires and in-flight
    /// requests have drained.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<WebhookConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            path = %self.config.listener.path,
            routes = self.router.routes().len(),
            authenticated = self.router.authenticator().is_enabled(),
            "HTTP server starting"
        );

        let authenticator = self.router.authenticator().clone();
        let reloader = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                if !config.auth.is_enabled() {
                    authenticator.set_audience(String::new());
                } else if let Err(e) = authenticator.enable(&config.auth).await {
                    tracing::error!(error = %e, "Failed to apply reloaded auth settings");
                }
            }
        });

        axum::serve(listener, self.app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Draining in-flight requests");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }
}

/// Webhook entry point: every method lands here so non-POST calls get 405.
async fn webhook_handler(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start_time = Instant::now();
    let dispatch = state.router.dispatch(&method, &headers, &body);
    let outcome = dispatch.outcome();

    tracing::debug!(outcome, status = %dispatch.status(), "Webhook call finished");
    metrics::record_request(outcome, start_time);

    dispatch.into_response()
}
