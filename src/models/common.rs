use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The `error` object inside the `{"success": false, "error": {...}}`
/// envelope every failed request returns.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}
