//! Static files under the dist path.

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use http::{Request, StatusCode};
use std::path::{Component, Path, PathBuf};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::context::RequestInfo;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum AssetPath {
    File(PathBuf),
    Forbidden,
    NotFound,
}

/// Resolve the file name following `prefix/` in `path`.
///
/// The path is percent-decoded exactly once, here. Rejects anything that
/// could leave the asset root (parent components, absolute paths,
/// backslashes, NUL) and dotfiles.
pub(crate) fn resolve(prefix: &str, path: &str) -> AssetPath {
    let Some(rest) = path.strip_prefix(prefix) else {
        return AssetPath::NotFound;
    };
    if !(rest.is_empty() || rest.starts_with('/')) {
        return AssetPath::NotFound;
    }
    let rest = rest.split('?').next().unwrap_or_default();
    let Ok(decoded) = urlencoding::decode(rest) else {
        return AssetPath::Forbidden;
    };
    let relative = decoded.trim_start_matches('/');
    if relative.is_empty() {
        return AssetPath::NotFound;
    }
    if relative.contains('\\') || relative.contains('\0') {
        return AssetPath::Forbidden;
    }

    let mut clean = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => {
                if part.to_string_lossy().starts_with('.') {
                    return AssetPath::Forbidden;
                }
                clean.push(part);
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return AssetPath::Forbidden;
            }
        }
    }
    AssetPath::File(clean)
}

/// Serve the file the request path names under `root`.
pub(crate) async fn serve(root: &Path, prefix: &str, request: &RequestInfo) -> Response {
    let file = match resolve(prefix, request.uri.path()) {
        AssetPath::File(file) => file,
        AssetPath::Forbidden => {
            tracing::warn!(path = %request.uri.path(), "rejected asset path");
            return StatusCode::FORBIDDEN.into_response();
        }
        AssetPath::NotFound => return StatusCode::NOT_FOUND.into_response(),
    };

    // directories and missing files alike are not served
    let file = root.join(file);
    match tokio::fs::metadata(&file).await {
        Ok(metadata) if metadata.is_file() => {}
        _ => return StatusCode::NOT_FOUND.into_response(),
    }

    // method and headers carry HEAD, ranges and conditionals; the URI is unused
    let mut forwarded = Request::new(Body::empty());
    *forwarded.method_mut() = request.method.clone();
    *forwarded.headers_mut() = request.headers.clone();

    match ServeFile::new(file).oneshot(forwarded).await {
        Ok(response) => response.map(Body::new),
        Err(err) => match err {},
    }
}
