use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::{error::AppError, state::AppState};

/// A middleware that requires the static admin bearer token.
///
/// The comparison is constant-time so the credential cannot be probed
/// byte by byte.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    let expected = state.config.admin_token.as_bytes();
    let ok = !presented.is_empty() && bool::from(presented.as_bytes().ct_eq(expected));

    if !ok {
        tracing::warn!("🔒 Admin auth rejected");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}
