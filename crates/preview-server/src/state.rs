//! Application state.
//!
//! Shared state for all request handlers.

use std::path::PathBuf;

use crate::live_reload::HubHandle;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Directory served as the site.
    pub(crate) root_dir: PathBuf,
    /// Port announced to browsers in the injected script.
    pub(crate) port: u16,
    /// Live reload hub (if enabled).
    pub(crate) live_reload: Option<HubHandle>,
}

impl AppState {
    /// Check if live reload is enabled.
    #[must_use]
    pub(crate) fn live_reload_enabled(&self) -> bool {
        self.live_reload.is_some()
    }
}
