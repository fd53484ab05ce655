//! HTTP host: middleware, admin endpoints and server assembly.

mod admin;
mod client;
mod middleware;
mod server;

pub use admin::{get_seo, save_seo, AdminState, SeoFields, SeoForm};
pub use client::{client_ip, subject_identity, AuthenticatedUser};
pub use middleware::{rate_limit, seo_rewrite, RateLimitState, SeoState};
pub use server::{router, AppParts, HttpServer};
