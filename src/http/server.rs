//! HTTP server assembly.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{body::Body, http::Request, middleware, routing::get, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span};

use super::admin::{get_seo, save_seo, AdminState};
use super::middleware::{rate_limit, seo_rewrite, RateLimitState, SeoState};
use crate::error::{Result, ToolsetError};
use crate::ratelimit::{RateLimiter, RouteRules};
use crate::seo::SeoStore;

/// Everything the router needs, already constructed.
pub struct AppParts {
    /// Rate limiter over the configured counter store
    pub limiter: RateLimiter,
    /// Per-route rate limits
    pub rules: RouteRules,
    /// Fixed client address override
    pub debug_remote_ip: Option<String>,
    /// SEO override records
    pub seo_store: Arc<dyn SeoStore>,
    /// Largest body buffered for SEO rewriting
    pub max_body_bytes: usize,
    /// Admin bearer token; admin routes are mounted only when set
    pub admin_token: Option<String>,
    /// Directory of rendered tool pages
    pub pages_dir: PathBuf,
}

/// Build the application router.
///
/// Requests pass through tracing, then rate limiting, then SEO rewriting on
/// the way back out.
pub fn router(parts: AppParts) -> Router {
    let mut app = Router::new().route("/health", get(health));

    if let Some(token) = parts.admin_token {
        let admin = AdminState::new(parts.seo_store.clone(), token);
        app = app.merge(
            Router::new()
                .route("/seo/", get(get_seo).post(save_seo))
                .with_state(admin),
        );
    }

    let rate_state = RateLimitState::new(parts.limiter, parts.rules, parts.debug_remote_ip);
    let seo_state = SeoState::new(parts.seo_store, parts.max_body_bytes);

    app.fallback_service(ServeDir::new(parts.pages_dir))
        .layer(middleware::from_fn_with_state(seo_state, seo_rewrite))
        .layer(middleware::from_fn_with_state(rate_state, rate_limit))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                info_span!(
                    "request",
                    id = %uuid::Uuid::new_v4(),
                    method = %req.method(),
                    path = %req.uri().path(),
                )
            }),
        )
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "toolset",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// HTTP server for the toolset pages.
pub struct HttpServer {
    addr: SocketAddr,
    app: Router,
}

impl HttpServer {
    /// Create a server that will serve `app` on `addr`.
    pub fn new(addr: SocketAddr, app: Router) -> Self {
        Self { addr, app }
    }

    /// Start the server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "Starting HTTP server");

        axum::serve(
            listener,
            self.app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            ToolsetError::Io(e)
        })
    }
}
