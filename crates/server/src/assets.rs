use std::io::{self, SeekFrom};
use std::path::{Component, Path, PathBuf};

use axum::body::Body;
use axum::extract::{Path as AxumPath, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use common::is_image_file;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::warn;

use crate::state::AppState;

pub const DEFAULT_COVER_FILE: &str = "default_cover.jpg";
const FRONTEND_MISSING: &str = "Rhymic Backend Running (Frontend not built)";
const FRONTEND_ERROR: &str = "Rhymic Frontend Error";

/// Joins a request path onto `root`, refusing anything that could climb out.
pub fn safe_join(root: &Path, relpath: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for component in Path::new(relpath).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    Full,
    Partial { start: u64, end: u64 },
    Unsatisfiable,
}

/// Interprets a single-range `Range` header. Headers we cannot parse are
/// ignored and the whole file is sent.
pub fn requested_range(value: Option<&str>, size: u64) -> RangeRequest {
    let Some(ranges) = value.and_then(|v| v.trim().strip_prefix("bytes=")) else {
        return RangeRequest::Full;
    };
    if ranges.contains(',') {
        return RangeRequest::Full;
    }
    let Some((first, last)) = ranges.split_once('-') else {
        return RangeRequest::Full;
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        let Ok(suffix) = last.parse::<u64>() else {
            return RangeRequest::Full;
        };
        if suffix == 0 || size == 0 {
            return RangeRequest::Unsatisfiable;
        }
        return RangeRequest::Partial {
            start: size.saturating_sub(suffix),
            end: size - 1,
        };
    }

    let Ok(start) = first.parse::<u64>() else {
        return RangeRequest::Full;
    };
    if start >= size {
        return RangeRequest::Unsatisfiable;
    }
    let end = if last.is_empty() {
        size - 1
    } else {
        match last.parse::<u64>() {
            Ok(end) if end >= start => end.min(size - 1),
            _ => return RangeRequest::Full,
        }
    };
    RangeRequest::Partial { start, end }
}

pub async fn send_file(path: &Path, range: Option<&str>) -> io::Result<Response> {
    let mut file = File::open(path).await?;
    let metadata = file.metadata().await?;
    if !metadata.is_file() {
        return Err(io::Error::new(io::ErrorKind::NotFound, "not a file"));
    }
    let size = metadata.len();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let builder = Response::builder()
        .header(header::CONTENT_TYPE, mime.as_ref())
        .header(header::ACCEPT_RANGES, "bytes");

    let response = match requested_range(range, size) {
        RangeRequest::Full => builder
            .header(header::CONTENT_LENGTH, size)
            .body(Body::from_stream(ReaderStream::new(file))),
        RangeRequest::Partial { start, end } => {
            file.seek(SeekFrom::Start(start)).await?;
            let len = end - start + 1;
            builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_RANGE, format!("bytes {}-{}/{}", start, end, size))
                .header(header::CONTENT_LENGTH, len)
                .body(Body::from_stream(ReaderStream::new(file.take(len))))
        }
        RangeRequest::Unsatisfiable => builder
            .status(StatusCode::RANGE_NOT_SATISFIABLE)
            .header(header::CONTENT_RANGE, format!("bytes */{}", size))
            .body(Body::empty()),
    };
    response.map_err(|err| io::Error::new(io::ErrorKind::Other, err))
}

fn range_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::RANGE).and_then(|value| value.to_str().ok())
}

/// `GET /assets/*path`. A missing image is answered with the default cover.
pub async fn serve_asset(
    State(state): State<AppState>,
    AxumPath(path): AxumPath<String>,
    headers: HeaderMap,
) -> Response {
    let assets_dir = &state.frontend.assets_dir;
    let Some(file) = safe_join(assets_dir, &path) else {
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    };
    match send_file(&file, range_header(&headers)).await {
        Ok(response) => return response,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!("Failed to serve asset {:?}: {}", file, err),
    }

    if is_image_file(Path::new(&path)) {
        if let Ok(response) = send_file(&assets_dir.join(DEFAULT_COVER_FILE), None).await {
            return response;
        }
    }
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

/// Fallback route for the single-page app.
pub async fn serve_frontend(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if !state.frontend.production() {
        return (StatusCode::OK, FRONTEND_MISSING).into_response();
    }
    let dist_dir = &state.frontend.dist_dir;
    let requested = uri.path().trim_start_matches('/');
    if !requested.is_empty() {
        if let Some(file) = safe_join(dist_dir, requested) {
            if let Ok(response) = send_file(&file, range_header(&headers)).await {
                return response;
            }
        }
    }
    match send_file(&dist_dir.join("index.html"), None).await {
        Ok(response) => response,
        Err(err) => {
            warn!("Frontend index unavailable: {}", err);
            (StatusCode::NOT_FOUND, FRONTEND_ERROR).into_response()
        }
    }
}
