//! Live reload script injection into HTML responses.
//!
//! HTML responses get the reload client tag inserted right before their last
//! `</body>`. Gzip bodies are inflated first and compressed again afterwards,
//! and `Content-Length` always matches the body that is sent.

use std::borrow::Cow;
use std::io::{Read, Write};

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

/// Tag the script is inserted in front of.
const ANCHOR: &[u8] = b"</body>";

/// Error raised while rewriting a response body.
#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    /// The body claimed to be gzip but could not be inflated.
    #[error("failed to decode gzip body: {0}")]
    Decode(#[source] std::io::Error),
    /// The rewritten body could not be compressed again.
    #[error("failed to encode gzip body: {0}")]
    Encode(#[source] std::io::Error),
}

/// The `<script>` tag that loads the live reload client.
pub fn script_tag(port: u16) -> String {
    format!(
        r#"<script src="{}" data-port="{port}"></script>"#,
        preview_assets::livereload_script_url()
    )
}

/// Inject the live reload script into `response`.
///
/// Shorthand for [`ScriptInjector::new`] followed by [`ScriptInjector::inject`].
///
/// # Errors
///
/// Returns an error if a gzip body cannot be decoded or re-encoded.
pub fn inject_script(response: &mut Response<Bytes>, port: u16) -> Result<(), InjectError> {
    ScriptInjector::new(port).inject(response)
}

/// Rewrites HTML responses to load the live reload client.
///
/// Holds only the prebuilt tag, so one injector can be shared by every
/// request.
#[derive(Clone, Debug)]
pub struct ScriptInjector {
    tag: Bytes,
}

impl ScriptInjector {
    /// Injector announcing `port` to the client script.
    pub fn new(port: u16) -> Self {
        Self {
            tag: Bytes::from(script_tag(port)),
        }
    }

    /// Insert the script tag before the last `</body>` of an HTML response.
    ///
    /// Non-HTML responses and HTML without `</body>` are left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if a gzip body cannot be decoded or re-encoded.
    pub fn inject(&self, response: &mut Response<Bytes>) -> Result<(), InjectError> {
        if !is_html(response.headers()) {
            return Ok(());
        }

        let gzipped = is_gzip(response.headers());
        let decoded: Cow<'_, [u8]> = if gzipped {
            Cow::Owned(gunzip(response.body())?)
        } else {
            Cow::Borrowed(response.body().as_ref())
        };

        let Some(index) = find_anchor(&decoded) else {
            tracing::warn!(body_size = decoded.len(), "No </body> tag found, skipping injection");
            return Ok(());
        };

        let mut rewritten = Vec::with_capacity(decoded.len() + self.tag.len() + 1);
        rewritten.extend_from_slice(&decoded[..index]);
        rewritten.extend_from_slice(&self.tag);
        rewritten.push(b'\n');
        rewritten.extend_from_slice(&decoded[index..]);

        let body = if gzipped { gzip(&rewritten)? } else { rewritten };

        tracing::debug!(
            original_size = response.body().len(),
            body_size = body.len(),
            gzipped,
            "Injected live reload script"
        );

        response
            .headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        *response.body_mut() = Bytes::from(body);

        Ok(())
    }
}

/// Middleware running [`ScriptInjector`] on every HTML response.
///
/// Only HTML bodies are buffered. An injection failure becomes
/// `502 Bad Gateway` rather than a corrupted page.
pub async fn inject_live_reload(
    State(injector): State<ScriptInjector>,
    request: Request,
    next: Next,
) -> Response<Body> {
    let uri = request.uri().clone();
    let response = next.run(request).await;

    if !is_html(response.headers()) {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(uri = %uri, error = %err, "Failed to read HTML response body");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let mut buffered = Response::from_parts(parts, bytes);
    if let Err(err) = injector.inject(&mut buffered) {
        tracing::error!(uri = %uri, error = %err, "Failed to inject live reload script");
        return StatusCode::BAD_GATEWAY.into_response();
    }

    buffered.map(Body::from)
}

fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("text/html"))
}

fn is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("gzip"))
}

/// Byte offset of the last `</body>`, compared ASCII case-insensitively.
fn find_anchor(body: &[u8]) -> Option<usize> {
    body.windows(ANCHOR.len())
        .rposition(|window| window.eq_ignore_ascii_case(ANCHOR))
}

fn gunzip(data: &[u8]) -> Result<Vec<u8>, InjectError> {
    let mut decoded = Vec::new();
    GzDecoder::new(data)
        .read_to_end(&mut decoded)
        .map_err(InjectError::Decode)?;
    Ok(decoded)
}

fn gzip(data: &[u8]) -> Result<Vec<u8>, InjectError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(InjectError::Encode)?;
    encoder.finish().map_err(InjectError::Encode)
}
