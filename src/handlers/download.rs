use axum::{
    body::Body,
    extract::{Query, State},
    http::header,
    response::Response,
};
use serde::Deserialize;

use crate::{
    error::{AppError, Result},
    state::AppState,
};

#[derive(Deserialize)]
pub struct DownloadQuery {
    pub token: Option<String>,
}

/// One-shot download gate: a valid unused token streams the file and is
/// burned in the process.
pub async fn download(
    State(state): State<AppState>,
    Query(q): Query<DownloadQuery>,
) -> Result<Response> {
    let token = q
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("token é obrigatório".to_string()))?;

    let delivery = state.downloads.authorize_and_stream(&token).await?;

    Response::builder()
        .header(header::CONTENT_TYPE, delivery.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", delivery.filename),
        )
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from_stream(delivery.content.bytes_stream()))
        .map_err(|e| AppError::Internal(format!("response build failed: {}", e)))
}
