use axum::extract::{Path, Query, State};
use axum::Json;

use crate::errors::AppError;
use crate::models::BotLog;
use crate::AppState;

use super::{ApiResponse, LimitQuery};

pub async fn list(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<BotLog>>>, AppError> {
    let limit = query.resolve()?;
    let logs = state.store.recent_logs(&user_id, limit).await?;
    Ok(Json(ApiResponse::ok(logs)))
}
