use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::media;
use crate::state::AppState;

/// Serve an uploaded file from the uploads directory.
pub async fn serve(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    let Some(file_path) = media::resolve(&state.config.uploads_path(), &path) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match tokio::fs::read(&file_path).await {
        Ok(data) => {
            let mime = mime_guess::from_path(&file_path).first_or_octet_stream();
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, mime.as_ref().to_string()),
                    (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
                ],
                data,
            )
                .into_response()
        }
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read upload {}: {}", file_path.display(), e);
            }
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
