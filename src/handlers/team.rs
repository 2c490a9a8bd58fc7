use actix_web::{web, HttpRequest, HttpResponse, ResponseError, Result};
use serde_json::json;

use crate::handlers::current_user;
use crate::models::TeamResponse;
use crate::services::ReferralService;

#[utoipa::path(
    get,
    path = "/team",
    tag = "team",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Three-level downline with commission totals; settles any outstanding commission", body = TeamResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn team(
    referral_service: web::Data<ReferralService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match referral_service.team_view(user.id).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn team_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/team", web::get().to(team));
}
