//! Embedded static assets.
//!
//! Files under `static/` are compiled into the binary. `/` and any path
//! ending in `/` resolve to that directory's `index.html`; there is no
//! directory browsing and no cache header.

use axum::{
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};

/// A file compiled into the binary.
#[derive(Debug, Clone, Copy)]
pub struct Asset {
    pub path: &'static str,
    pub body: &'static [u8],
}

impl Asset {
    pub fn content_type(&self) -> &'static str {
        content_type_for(self.path)
    }
}

static ASSETS: &[Asset] = &[
    Asset {
        path: "index.html",
        body: include_bytes!("../../static/index.html"),
    },
    Asset {
        path: "style.css",
        body: include_bytes!("../../static/style.css"),
    },
    Asset {
        path: "robots.txt",
        body: include_bytes!("../../static/robots.txt"),
    },
];

const INDEX: &str = "index.html";

fn content_type_for(path: &str) -> &'static str {
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

/// Find the asset for a request path.
pub fn lookup(path: &str) -> Option<&'static Asset> {
    let relative = path.strip_prefix('/').unwrap_or(path);
    if relative.split('/').any(|segment| segment == "..") {
        return None;
    }

    let resolved = if relative.is_empty() || relative.ends_with('/') {
        format!("{relative}{INDEX}")
    } else {
        relative.to_string()
    };

    ASSETS.iter().find(|asset| asset.path == resolved)
}

/// Fallback handler serving embedded assets for GET and HEAD.
pub async fn serve_asset(method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::NOT_FOUND.into_response();
    }

    match lookup(uri.path()) {
        Some(asset) => (
            [(header::CONTENT_TYPE, HeaderValue::from_static(asset.content_type()))],
            asset.body,
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// `/favicon.ico` without an icon: 204 for GET/HEAD, 200 for OPTIONS,
/// 405 otherwise. Answered before the access log.
pub async fn favicon(method: Method) -> Response {
    match method {
        Method::GET | Method::HEAD => StatusCode::NO_CONTENT.into_response(),
        Method::OPTIONS => StatusCode::OK.into_response(),
        _ => (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET, HEAD, OPTIONS")],
        )
            .into_response(),
    }
}
