use crate::error::AppError;
use crate::middlewares::CurrentUser;
use actix_web::{HttpMessage, HttpRequest};

pub mod admin;
pub mod auth;
pub mod notification;
pub mod product;
pub mod recharge;
pub mod team;
pub mod user;
pub mod withdrawal;

pub use admin::admin_config;
pub use auth::auth_config;
pub use notification::notification_config;
pub use product::product_config;
pub use recharge::recharge_config;
pub use team::team_config;
pub use user::user_config;
pub use withdrawal::withdrawal_config;

/// The caller injected by the auth middleware.
pub fn current_user(req: &HttpRequest) -> Result<CurrentUser, AppError> {
    req.extensions()
        .get::<CurrentUser>()
        .copied()
        .ok_or_else(|| AppError::AuthError("Missing access token".to_string()))
}

pub fn require_admin(req: &HttpRequest) -> Result<CurrentUser, AppError> {
    let user = current_user(req)?;
    if !user.role.is_admin() {
        return Err(AppError::PermissionDenied);
    }
    Ok(user)
}
