//! Server error types.

use std::path::PathBuf;

/// Error starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// `host:port` is not a valid socket address.
    #[error("Invalid listen address {address}: {source}")]
    Address {
        /// The rejected `host:port` string.
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },
    /// Binding or serving failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The file watcher could not be started.
    #[error("Failed to watch {}: {source}", .root.display())]
    Watch {
        /// Directory that was to be watched.
        root: PathBuf,
        #[source]
        source: notify::Error,
    },
}
