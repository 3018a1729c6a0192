use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::header,
    response::IntoResponse,
};
use serde::Serialize;
use sonic_rs::JsonValueTrait;

use crate::{
    error::{AppError, Result},
    state::AppState,
};

/// Storage slot for the storefront's editable configuration blob.
const SITE_CONFIG_KEY: &str = "site:config";

/// Public site configuration consumed by the storefront page. Returns
/// `null` until an admin saves one.
pub async fn get_config(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let raw = state.store.get_raw(SITE_CONFIG_KEY).await?;
    let body = raw.unwrap_or_else(|| "null".to_string());

    Ok(([(header::CONTENT_TYPE, "application/json")], body))
}

#[derive(Serialize)]
pub struct SaveConfigResponse {
    pub ok: bool,
}

/// Replaces the stored site configuration. Admin gating happens in the
/// route layer.
pub async fn save_config(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let value: sonic_rs::Value = sonic_rs::from_slice(&body)
        .map_err(|_| AppError::Validation("invalid body".to_string()))?;
    if !value.is_object() {
        return Err(AppError::Validation("invalid body".to_string()));
    }

    let raw = sonic_rs::to_string(&value)
        .map_err(|e| AppError::Internal(format!("config re-serialization failed: {}", e)))?;
    state.store.put_raw(SITE_CONFIG_KEY, raw, None).await?;

    Ok(Json(SaveConfigResponse { ok: true }))
}
