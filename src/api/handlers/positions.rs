use axum::extract::{Path, State};
use axum::Json;

use crate::credentials::{decrypt_json, PmCredentials};
use crate::errors::AppError;
use crate::execution::exchange::PositionSnapshot;
use crate::AppState;

use super::ApiResponse;

/// Live positions for a user, read from the exchange with their credentials.
pub async fn list(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<PositionSnapshot>>>, AppError> {
    let blob = state
        .store
        .credential_blob(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no credentials for user {user_id}")))?;
    let creds: PmCredentials = decrypt_json(&state.master_key, &blob)?;

    let positions = state.exchange.get_positions(&creds).await?;
    Ok(Json(ApiResponse::ok(positions)))
}
