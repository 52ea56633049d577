//! Response header middleware.
//!
//! Adds headers to all responses:
//! - X-Content-Type-Options
//! - Cache-Control
//!
//! No Content-Security-Policy is set: served pages are arbitrary site
//! content with their own inline scripts.

use axum::http::HeaderValue;
use axum::http::header::{CACHE_CONTROL, X_CONTENT_TYPE_OPTIONS};
use tower_http::set_header::SetResponseHeaderLayer;

/// Cache-Control header value.
///
/// A reload must fetch the files that just changed, never a cached copy.
const CACHE_CONTROL_VALUE: &str = "no-store";

/// Create layer that adds X-Content-Type-Options header.
pub(crate) fn content_type_options_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"))
}

/// Create layer that disables caching.
pub(crate) fn no_store_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_VALUE))
}
