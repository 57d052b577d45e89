use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};

use super::{ServerError, SharedState};

pub const INDEX_FILE: &str = "index.html";

/// Fingerprinted bundles: never revalidate.
const CACHE_IMMUTABLE: &str = "public, max-age=31536000, immutable";
const CACHE_LONG: &str = "public, max-age=31536000";
/// The entry document must be revalidated so new bundles are picked up.
const CACHE_ENTRY: &str = "public, max-age=0";

const IMMUTABLE_EXTENSIONS: &[&str] = &["js", "css", "woff2"];

/// Serve a file from the static directory, or fall back to the SPA entry
/// document so client-side routing can take over.
pub async fn static_handler(
    State(state): State<SharedState>,
    req: Request<Body>,
) -> Result<Response, ServerError> {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }
    let root = &state.config.static_dir;
    let expose = state.expose_errors();

    // Try to serve the exact file
    if let Some(relative) = resolve_asset_path(req.uri().path()) {
        let file = root.join(&relative);
        if let Ok(meta) = tokio::fs::metadata(&file).await {
            if meta.is_file() {
                return serve_file(&file, &meta, cache_control_for(&relative), req.headers())
                    .await
                    .map_err(|e| ServerError::new(format!("{}: {}", file.display(), e), expose));
            }
        }
    }

    // Fall back to index.html for SPA client-side routing
    let index = root.join(INDEX_FILE);
    match tokio::fs::metadata(&index).await {
        Ok(meta) if meta.is_file() => serve_file(&index, &meta, CACHE_ENTRY, req.headers())
            .await
            .map_err(|e| ServerError::new(format!("{}: {}", index.display(), e), expose)),
        Ok(_) => Ok(frontend_missing()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(frontend_missing()),
        Err(e) => Err(ServerError::new(format!("{}: {}", index.display(), e), expose)),
    }
}

fn frontend_missing() -> Response {
    (
        StatusCode::NOT_FOUND,
        "Frontend not found. Build the frontend into the static directory.",
    )
        .into_response()
}

async fn serve_file(
    path: &Path,
    meta: &std::fs::Metadata,
    cache_control: &'static str,
    request_headers: &HeaderMap,
) -> std::io::Result<Response> {
    let etag = weak_etag(meta);
    let mut builder = Response::builder()
        .header(header::CACHE_CONTROL, cache_control)
        .header(header::ETAG, etag.as_str());
    if let Some(modified) = last_modified(meta) {
        builder = builder.header(header::LAST_MODIFIED, modified);
    }

    if etag_matches(request_headers, &etag) {
        return builder
            .status(StatusCode::NOT_MODIFIED)
            .body(Body::empty())
            .map_err(std::io::Error::other);
    }

    let content = tokio::fs::read(path).await?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    builder
        .header(header::CONTENT_TYPE, mime.as_ref())
        .body(Body::from(content))
        .map_err(std::io::Error::other)
}

pub fn cache_control_for(relative: &Path) -> &'static str {
    let extension = relative
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some(ext) if IMMUTABLE_EXTENSIONS.contains(&ext) => CACHE_IMMUTABLE,
        Some("html") => CACHE_ENTRY,
        _ => CACHE_LONG,
    }
}

/// Map a request path onto a path relative to the static directory.
/// Returns `None` for the root, undecodable paths and anything that would
/// leave the directory.
pub fn resolve_asset_path(uri_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode(uri_path)?;
    let mut relative = PathBuf::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains(['\\', ':', '\0']) => return None,
            s => relative.push(s),
        }
    }
    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative)
    }
}

fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn weak_etag(meta: &std::fs::Metadata) -> String {
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("W/\"{:x}-{:x}\"", meta.len(), mtime)
}

fn last_modified(meta: &std::fs::Metadata) -> Option<String> {
    let modified: DateTime<Utc> = meta.modified().ok()?.into();
    Some(modified.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
}

/// Weak comparison per `If-None-Match`: `W/` prefixes are ignored.
fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    let Some(value) = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let ours = etag.trim_start_matches("W/");
    value.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate.trim_start_matches("W/") == ours
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_resolve_asset_path_normal_paths() {
        assert_eq!(
            resolve_asset_path("/assets/index-abc123.js"),
            Some(PathBuf::from("assets/index-abc123.js"))
        );
        assert_eq!(
            resolve_asset_path("/./assets//logo.svg"),
            Some(PathBuf::from("assets/logo.svg"))
        );
        assert_eq!(
            resolve_asset_path("/fonts/Open%20Sans.woff2"),
            Some(PathBuf::from("fonts/Open Sans.woff2"))
        );
    }

    #[test]
    fn test_resolve_asset_path_rejects_escapes() {
        assert_eq!(resolve_asset_path("/"), None);
        assert_eq!(resolve_asset_path("/../etc/passwd"), None);
        assert_eq!(resolve_asset_path("/assets/%2e%2e/%2e%2e/secret"), None);
        assert_eq!(resolve_asset_path("/a%5Cb"), None);
        assert_eq!(resolve_asset_path("/bad%zz"), None);
        assert_eq!(resolve_asset_path("/trailing%2"), None);
    }

    #[test]
    fn test_cache_control_by_extension() {
        assert_eq!(cache_control_for(Path::new("assets/app.js")), CACHE_IMMUTABLE);
        assert_eq!(cache_control_for(Path::new("assets/app.CSS")), CACHE_IMMUTABLE);
        assert_eq!(cache_control_for(Path::new("fonts/inter.woff2")), CACHE_IMMUTABLE);
        assert_eq!(cache_control_for(Path::new("logo.png")), CACHE_LONG);
        assert_eq!(cache_control_for(Path::new("index.html")), CACHE_ENTRY);
        assert_eq!(cache_control_for(Path::new("LICENSE")), CACHE_LONG);
    }

    #[test]
    fn test_etag_matching() {
        let mut headers = HeaderMap::new();
        assert!(!etag_matches(&headers, "W/\"a-b\""));
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("\"x\", W/\"a-b\""));
        assert!(etag_matches(&headers, "W/\"a-b\""));
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("*"));
        assert!(etag_matches(&headers, "W/\"c-d\""));
    }
}
