//! Read-only serving of mirror files for the render tool.
//!
//! The render tool loads exercise pages over HTTP so it sees exactly the
//! checked-out mirror state. Serving is scoped to the mirror directory;
//! traversal outside it is rejected.

use std::io;
use std::path::{Component, Path as FsPath};

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use super::AppState;

/// Errors from static file serving.
#[derive(Debug, Error)]
pub enum FileError {
    /// The request path escapes the mirror directory.
    #[error("invalid path")]
    Traversal,

    /// No such file in the mirror.
    #[error("not found")]
    NotFound,

    /// IO error.
    #[error("IO error: {0}")]
    Io(io::Error),
}

impl IntoResponse for FileError {
    fn into_response(self) -> Response {
        let status = match &self {
            FileError::Traversal => StatusCode::BAD_REQUEST,
            FileError::NotFound => StatusCode::NOT_FOUND,
            FileError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Exercise-file handler: `GET /exercise-screens/exercise-file/{*path}`.
pub async fn exercise_file_handler(
    State(app): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, FileError> {
    validate_relative_path(&path)?;

    let full = app.mirror_dir().join(&path);
    let body = match tokio::fs::read(&full).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(FileError::NotFound),
        // Directories read as errors on most platforms; treat them as absent.
        Err(e) if e.kind() == io::ErrorKind::IsADirectory => return Err(FileError::NotFound),
        Err(e) => return Err(FileError::Io(e)),
    };

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    Ok(([(header::CONTENT_TYPE, mime.to_string())], body).into_response())
}

/// Rejects paths that are absolute or contain parent/prefix components.
fn validate_relative_path(path: &str) -> Result<(), FileError> {
    let ok = FsPath::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if ok { Ok(()) } else { Err(FileError::Traversal) }
}
