//! Embedded browser assets for the preview server.
//!
//! The files under `assets/` are compiled into the binary via `rust-embed`
//! and served below [`ASSET_PREFIX`].

use std::borrow::Cow;

/// URL prefix the assets are mounted under.
pub const ASSET_PREFIX: &str = "/grafanactl/assets";

/// File name of the live reload client script.
pub const LIVERELOAD_SCRIPT: &str = "livereload.js";

#[derive(rust_embed::RustEmbed)]
#[folder = "assets"]
struct Assets;

/// Get an asset by path (relative to [`ASSET_PREFIX`]).
///
/// Returns the file contents if the asset exists, `None` otherwise.
pub fn get(path: &str) -> Option<Cow<'static, [u8]>> {
    Assets::get(path).map(|f| f.data)
}

/// Return the MIME type string for the given file path.
pub fn mime_for(path: &str) -> &'static str {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
}

/// Absolute URL path of the live reload client script.
pub fn livereload_script_url() -> String {
    format!("{ASSET_PREFIX}/{LIVERELOAD_SCRIPT}")
}
