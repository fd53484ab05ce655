//! Toolset - rate limiting and SEO overrides for the network toolset pages
//!
//! This crate implements the two request-path mechanisms of the toolset web
//! site: a fixed-window rate limiter whose windows are staggered per client,
//! and a response middleware that substitutes per-URL title, H1 and meta
//! description overrides into rendered HTML.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod seo;
