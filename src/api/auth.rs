use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::errors::AppError;
use crate::AppState;

/// Bearer-token authentication middleware.
///
/// If an API token is configured, every request must carry
/// `Authorization: Bearer <token>` matching that value.
/// Without one, authentication is disabled (dev mode).
pub async fn require_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.api_token.as_deref() else {
        return Ok(next.run(req).await);
    };

    let authorized = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected);

    if !authorized {
        return Err(AppError::Unauthorized);
    }
    Ok(next.run(req).await)
}
