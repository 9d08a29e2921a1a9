//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request ID, timeout, limits, security)
//! - Bind server to listener
//! - Graceful shutdown

use axum::{
    body::Body,
    extract::Request,
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::http::handlers;
use crate::http::request::X_REQUEST_ID;
use crate::identity::SessionRegistry;
use crate::observability::metrics;
use crate::security::headers;
use crate::security::origin::{origin_check_middleware, OriginPolicy};
use crate::security::rate_limit::{rate_limit_middleware, RateLimitState, RateLimiter};
use crate::service::PollService;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PollService>,
    pub sessions: Arc<SessionRegistry>,
    pub rate_limiter: Arc<RateLimiter>,
    pub config: Arc<AppConfig>,
}

/// HTTP server for the polling API.
pub struct HttpServer {
    router: Router,
    config: Arc<AppConfig>,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        let config = state.config.clone();
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        let origin_policy = Arc::new(OriginPolicy::new(
            config.security.origin_check,
            config.security.expected_host.clone(),
        ));
        let rate_limit = RateLimitState {
            limiter: state.rate_limiter.clone(),
            enabled: config.rate_limit.enabled,
            trust_forwarded_for: config.rate_limit.trust_forwarded_for,
        };

        let api = Router::new()
            .route("/health", get(handlers::health))
            .route("/polls", get(handlers::list_polls).post(handlers::create_poll))
            .route(
                "/polls/{id}",
                get(handlers::get_poll)
                    .put(handlers::update_poll)
                    .delete(handlers::delete_poll),
            )
            .route("/polls/{id}/votes", post(handlers::submit_vote))
            .route("/admin/polls", get(handlers::admin_polls))
            .route("/admin/audit", get(handlers::admin_audit))
            .route("/admin/roles", post(handlers::grant_role))
            .route("/admin/roles/{principal}/{role}", delete(handlers::revoke_role))
            .with_state(state)
            .layer(middleware::from_fn_with_state(origin_policy, origin_check_middleware))
            .layer(middleware::from_fn_with_state(rate_limit, rate_limit_middleware));

        let api = if config.security.enable_headers {
            headers::apply(api)
        } else {
            api
        };

        let request_id = HeaderName::from_static(X_REQUEST_ID);
        api.layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(middleware::from_fn(track_metrics))
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
    }

    /// The fully layered router, for driving without a listener.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}
