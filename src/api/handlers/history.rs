use axum::extract::{Path, Query, State};
use axum::Json;

use crate::errors::AppError;
use crate::models::HistoryRecord;
use crate::AppState;

use super::{ApiResponse, LimitQuery};

/// Recorded decisions for a user, newest first.
pub async fn list(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<HistoryRecord>>>, AppError> {
    let limit = query.resolve()?;
    let records = state.ledger.list_for_user(&user_id, limit).await?;
    Ok(Json(ApiResponse::ok(records)))
}
