pub mod health;
pub mod history;
pub mod logs;
pub mod metrics;
pub mod positions;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

pub const DEFAULT_PAGE_LIMIT: i64 = 50;
pub const MAX_PAGE_LIMIT: i64 = 500;

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

impl LimitQuery {
    pub fn resolve(&self) -> Result<i64, AppError> {
        match self.limit {
            None => Ok(DEFAULT_PAGE_LIMIT),
            Some(n) if (1..=MAX_PAGE_LIMIT).contains(&n) => Ok(n),
            Some(n) => Err(AppError::BadRequest(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}, got {n}"
            ))),
        }
    }
}
