//! HTTP server with live reload for previewing a site directory.
//!
//! This crate serves a directory of files over HTTP and keeps connected
//! browsers in sync with it:
//! - Static files from the site root, with `index.html` for directories
//! - The embedded live reload client below `/grafanactl/assets/`
//! - A WebSocket endpoint at `/livereload` that pushes reload commands
//! - A middleware that injects the client `<script>` into every HTML page
//!
//! # Quick Start
//!
//! ```ignore
//! use std::path::PathBuf;
//! use preview_server::{ServerConfig, run_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig {
//!         host: "127.0.0.1".to_owned(),
//!         port: 7979,
//!         root_dir: PathBuf::from("site"),
//!         live_reload_enabled: true,
//!         watch_patterns: vec!["**/*".to_owned()],
//!     };
//!
//!     run_server(config).await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP──► axum router
//!                        │
//!                        ├─► Site files ──► script injection (HTML only)
//!                        │
//!                        ├─► Embedded assets (livereload.js)
//!                        │
//!                        └─► WebSocket ──► Connection ◄── Hub ◄── Debouncer ◄── FileWatcher
//! ```

mod app;
mod error;
mod inject;
mod live_reload;
mod middleware;
mod state;
mod static_files;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use state::AppState;
use tokio_util::sync::CancellationToken;

pub use error::ServerError;
pub use inject::{InjectError, ScriptInjector, inject_live_reload, inject_script, script_tag};
pub use live_reload::{
    Connection, ConnectionId, Debouncer, FileWatcher, Hub, HubHandle, LiveReload, QUIET_WINDOW,
    ReloadSender, ResourceChange,
};

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Directory to serve and watch.
    pub root_dir: PathBuf,
    /// Enable live reload.
    pub live_reload_enabled: bool,
    /// Glob patterns selecting which changed files trigger a reload.
    pub watch_patterns: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 7979,
            root_dir: PathBuf::from("site"),
            live_reload_enabled: true,
            watch_patterns: vec!["**/*".to_owned()],
        }
    }
}

/// Run the server until Ctrl-C.
///
/// # Arguments
///
/// * `config` - Server configuration
///
/// # Errors
///
/// Returns an error if the address is invalid, the site root cannot be
/// watched, or the listener fails.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let addr_string = format!("{}:{}", config.host, config.port);
    let addr = SocketAddr::from_str(&addr_string).map_err(|source| ServerError::Address {
        address: addr_string,
        source,
    })?;

    let cancel = CancellationToken::new();

    // Hub, debouncer and watcher (if enabled)
    let live_reload = if config.live_reload_enabled {
        let live_reload = live_reload::LiveReload::start(&cancel);
        let watcher = FileWatcher::start(
            &config.root_dir,
            &config.watch_patterns,
            live_reload.sender().clone(),
        )
        .map_err(|source| ServerError::Watch {
            root: config.root_dir.clone(),
            source,
        })?;
        Some((live_reload, watcher))
    } else {
        None
    };

    let state = Arc::new(AppState {
        root_dir: config.root_dir.clone(),
        port: config.port,
        live_reload: live_reload.as_ref().map(|(lr, _)| lr.hub().clone()),
    });
    let app = app::create_router(state);

    tracing::info!(
        address = %addr,
        root = %config.root_dir.display(),
        live_reload = config.live_reload_enabled,
        "Starting server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await;

    if let Some((live_reload, watcher)) = live_reload {
        drop(watcher);
        live_reload.shutdown().await;
    }
    served?;

    Ok(())
}

/// Wait for Ctrl-C, then cancel `cancel`.
///
/// Cancelling stops the hub, which closes open WebSockets so graceful
/// shutdown can complete.
async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => tracing::info!("Shutdown signal received, stopping server..."),
            Err(err) => {
                tracing::error!(error = %err, "Failed to install Ctrl+C handler");
                cancel.cancelled().await;
            }
        },
        () = cancel.cancelled() => {}
    }
    cancel.cancel();
}

/// Create server configuration from preview config.
///
/// # Arguments
///
/// * `config` - Loaded preview configuration
#[must_use]
pub fn server_config_from_config(config: &preview_config::Config) -> ServerConfig {
    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        root_dir: config.site_resolved.root_dir.clone(),
        live_reload_enabled: config.live_reload.enabled,
        watch_patterns: config.watch_patterns(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_server_config_from_default_config() {
        let config = preview_config::Config::default();

        let server = server_config_from_config(&config);

        assert_eq!(server.host, "127.0.0.1");
        assert_eq!(server.port, 7979);
        assert_eq!(server.root_dir, config.site_resolved.root_dir);
        assert!(server.live_reload_enabled);
        assert_eq!(server.watch_patterns, vec!["**/*".to_owned()]);
    }

    #[tokio::test]
    async fn test_run_server_rejects_bad_address() {
        let config = ServerConfig {
            host: "not an address".to_owned(),
            live_reload_enabled: false,
            ..ServerConfig::default()
        };

        let result = run_server(config).await;

        assert!(matches!(result, Err(ServerError::Address { .. })));
    }

    #[tokio::test]
    async fn test_run_server_rejects_missing_root() {
        let config = ServerConfig {
            root_dir: PathBuf::from("/nonexistent/preview/site"),
            ..ServerConfig::default()
        };

        let result = run_server(config).await;

        assert!(matches!(result, Err(ServerError::Watch { .. })));
    }
}
