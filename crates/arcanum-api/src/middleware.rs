use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::{AppState, error::ApiError};

/// Extract and validate the Bearer access token, making the verified claims
/// available to handlers as an extension. Verification is stateless — the
/// store is never consulted here.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthenticated)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthenticated)?;

    let claims = state.sessions.verify_access(token)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
