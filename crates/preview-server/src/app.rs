//! Router construction.
//!
//! Builds the axum router with all routes and middleware.

use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use preview_assets::ASSET_PREFIX;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::inject::{ScriptInjector, inject_live_reload};
use crate::live_reload;
use crate::middleware::security;
use crate::state::AppState;
use crate::static_files;

/// Create the application router.
///
/// # Arguments
///
/// * `state` - Shared application state
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route(
            &format!("{ASSET_PREFIX}/{{*path}}"),
            get(static_files::serve_asset),
        )
        .fallback_service(static_files::site_service(&state.root_dir));

    // WebSocket and script injection for live reload
    if state.live_reload_enabled() {
        router = router
            .route("/livereload", get(live_reload::ws_handler))
            .layer(from_fn_with_state(
                ScriptInjector::new(state.port),
                inject_live_reload,
            ));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(security::content_type_options_layer())
                .layer(security::no_store_layer()),
        )
        .with_state(state)
}
