//! Static file serving.
//!
//! The site root is served with [`ServeDir`]; embedded assets live below
//! [`preview_assets::ASSET_PREFIX`].

use std::path::Path;

use axum::extract::Path as UrlPath;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tower_http::services::ServeDir;

/// Serve an embedded asset.
pub(crate) async fn serve_asset(UrlPath(path): UrlPath<String>) -> Response {
    match preview_assets::get(&path) {
        Some(content) => (
            [(header::CONTENT_TYPE, preview_assets::mime_for(&path))],
            content.into_owned(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Service serving files below `root_dir`, mapping directories to `index.html`.
pub(crate) fn site_service(root_dir: &Path) -> ServeDir {
    ServeDir::new(root_dir).append_index_html_on_directories(true)
}
