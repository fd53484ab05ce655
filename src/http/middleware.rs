//! Request-path middleware: per-route rate limiting and SEO rewriting.

use std::sync::Arc;

use axum::{
    body::{Body, HttpBody},
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, info, warn};

use super::client::subject_identity;
use crate::ratelimit::{RateLimiter, RouteRules};
use crate::seo::{SeoRewriter, SeoStore};

/// Shared state for [`rate_limit`].
#[derive(Clone)]
pub struct RateLimitState {
    limiter: RateLimiter,
    rules: Arc<RouteRules>,
    debug_remote_ip: Option<Arc<str>>,
}

impl RateLimitState {
    /// Create the middleware state.
    pub fn new(limiter: RateLimiter, rules: RouteRules, debug_remote_ip: Option<String>) -> Self {
        Self {
            limiter,
            rules: Arc::new(rules),
            debug_remote_ip: debug_remote_ip.map(Arc::from),
        }
    }
}

/// Reject requests that exceed the rate configured for their route.
///
/// Over-limit requests get `429 Too Many Requests` with a `Retry-After`
/// header and never reach the inner service.
pub async fn rate_limit(
    State(state): State<RateLimitState>,
    mut req: Request,
    next: Next,
) -> Response {
    let spec = state.rules.find(req.uri().path()).copied();
    if spec.is_none() {
        return next.run(req).await;
    }

    let subject = subject_identity(&req, state.debug_remote_ip.as_deref());
    let usage = state
        .limiter
        .check_request(req.extensions_mut(), &subject, spec.as_ref(), true)
        .await;

    match usage {
        Some(usage) if usage.limited => {
            info!(
                subject = %subject,
                path = %req.uri().path(),
                count = usage.count,
                limit = usage.limit,
                "Request rate limited"
            );
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, please try again later.\n",
            )
                .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(usage.seconds_remaining));
            response
        }
        _ => next.run(req).await,
    }
}

/// Shared state for [`seo_rewrite`].
#[derive(Clone)]
pub struct SeoState {
    store: Arc<dyn SeoStore>,
    rewriter: Arc<SeoRewriter>,
    max_body_bytes: usize,
}

impl SeoState {
    /// Create the middleware state.
    pub fn new(store: Arc<dyn SeoStore>, max_body_bytes: usize) -> Self {
        Self {
            store,
            rewriter: Arc::new(SeoRewriter::new()),
            max_body_bytes,
        }
    }
}

/// Apply the stored SEO override for the request path to HTML responses.
pub async fn seo_rewrite(State(state): State<SeoState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let response = next.run(req).await;

    if !is_plain_html(&response) {
        return response;
    }

    let record = match state.store.get(&path).await {
        Ok(Some(record)) => record,
        Ok(None) => return response,
        Err(e) => {
            warn!(path = %path, error = %e, "SEO override lookup failed, serving page as is");
            return response;
        }
    };

    let (mut parts, body) = response.into_parts();

    let declared_len = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let within_limit = body
        .size_hint()
        .exact()
        .or(declared_len)
        .is_some_and(|len| len <= state.max_body_bytes as u64);
    if !within_limit {
        debug!(path = %path, "Response body too large or unsized, skipping SEO rewrite");
        return Response::from_parts(parts, body);
    }

    let bytes = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(path = %path, error = %e, "Failed to read response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let Ok(html) = std::str::from_utf8(&bytes) else {
        debug!(path = %path, "Response body is not UTF-8, skipping SEO rewrite");
        return Response::from_parts(parts, Body::from(bytes));
    };

    let rewritten = state.rewriter.rewrite(html, Some(&record)).into_owned();
    debug!(path = %path, "Applied SEO override");
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(rewritten))
}

fn is_plain_html(response: &Response) -> bool {
    let headers = response.headers();
    if headers.contains_key(header::CONTENT_ENCODING) {
        return false;
    }
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("text/html"))
}
