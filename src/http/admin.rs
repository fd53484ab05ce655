//! Administrative endpoints for reading and saving SEO overrides.
//!
//! Both endpoints answer `404 Not Found` unless the request carries the
//! configured bearer token, so the admin surface is invisible to everyone
//! else. With no token configured the routes are not mounted at all.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::ToolsetError;
use crate::seo::{FieldErrors, SeoOverride, SeoStore};

/// Shared state for the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    store: Arc<dyn SeoStore>,
    token: Arc<str>,
}

impl AdminState {
    /// Create the admin state.
    pub fn new(store: Arc<dyn SeoStore>, token: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            token: token.into(),
        }
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token.trim() == &*self.token)
    }
}

/// Query string of the read endpoint.
#[derive(Debug, Deserialize)]
pub struct SeoQuery {
    pub url: Option<String>,
}

/// Override fields as returned to the admin UI.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeoFields {
    pub title_tag: String,
    pub meta_description: String,
    pub page_h1: String,
}

/// Body of the save endpoint.
#[derive(Debug, Deserialize)]
pub struct SeoForm {
    pub url: Option<String>,
    #[serde(default)]
    pub title_tag: String,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub page_h1: String,
}

/// Response envelope shared by both endpoints.
#[derive(Debug, Serialize)]
pub struct AdminResponse {
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<SeoFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

/// `GET /seo/?url=/path`: the stored override, or empty fields.
pub async fn get_seo(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Query(query): Query<SeoQuery>,
) -> Response {
    let url = match query.url.filter(|u| !u.is_empty()) {
        Some(url) if state.authorized(&headers) => url,
        _ => return StatusCode::NOT_FOUND.into_response(),
    };

    let record = match state.store.get(&url).await {
        Ok(record) => record.unwrap_or_else(|| SeoOverride::new(url.clone())),
        Err(e) => {
            error!(url = %url, error = %e, "SEO override lookup failed");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };

    Json(AdminResponse {
        status: true,
        data: Some(SeoFields {
            title_tag: record.title_tag,
            meta_description: record.meta_description,
            page_h1: record.page_h1,
        }),
        errors: None,
    })
    .into_response()
}

/// `POST /seo/`: insert or replace the override for a URL.
pub async fn save_seo(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Json(form): Json<SeoForm>,
) -> Response {
    let url = match form.url.filter(|u| !u.is_empty()) {
        Some(url) if state.authorized(&headers) => url,
        _ => return StatusCode::NOT_FOUND.into_response(),
    };

    let record = SeoOverride {
        url,
        title_tag: form.title_tag,
        meta_description: form.meta_description,
        page_h1: form.page_h1,
    };

    if let Err(errors) = record.validate() {
        warn!(url = %record.url, ?errors, "Rejected SEO override");
        return Json(AdminResponse {
            status: false,
            data: None,
            errors: Some(errors),
        })
        .into_response();
    }

    let url = record.url.clone();
    match state.store.upsert(record).await {
        Ok(()) => {
            info!(url = %url, "Saved SEO override");
            Json(AdminResponse {
                status: true,
                data: None,
                errors: None,
            })
            .into_response()
        }
        Err(ToolsetError::Validation(message)) => {
            warn!(url = %url, %message, "Rejected SEO override");
            StatusCode::UNPROCESSABLE_ENTITY.into_response()
        }
        Err(e) => {
            error!(url = %url, error = %e, "Failed to save SEO override");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}
