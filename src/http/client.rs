//! Identification of the subject a rate limit is charged to.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;

/// An authenticated user, inserted into request extensions by whatever sits
/// in front of the rate limiter. Authenticated users are limited by id
/// rather than by address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

/// Resolve the client address of a request.
///
/// Order: the configured debug override, the first `X-Forwarded-For` entry,
/// the socket peer address, and finally `"unknown"`.
pub fn client_ip<B>(req: &Request<B>, debug_remote_ip: Option<&str>) -> String {
    if let Some(ip) = debug_remote_ip {
        return ip.to_string();
    }

    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// The identity a request's rate limits are counted against: the user id
/// when authenticated, the client address otherwise.
pub fn subject_identity<B>(req: &Request<B>, debug_remote_ip: Option<&str>) -> String {
    match req.extensions().get::<AuthenticatedUser>() {
        Some(user) => user.0.clone(),
        None => client_ip(req, debug_remote_ip),
    }
}
