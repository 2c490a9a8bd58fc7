use actix_web::{web, HttpRequest, HttpResponse, ResponseError, Result};
use serde_json::json;

use crate::handlers::current_user;
use crate::models::{CreateWithdrawalRequest, PaginationParams};
use crate::services::WithdrawalService;

#[utoipa::path(
    post,
    path = "/withdrawals",
    tag = "withdrawals",
    security(("bearer_auth" = [])),
    request_body = CreateWithdrawalRequest,
    responses(
        (status = 200, description = "Withdrawal requested; amount deducted immediately"),
        (status = 400, description = "Insufficient balance or validation error")
    )
)]
pub async fn request_withdrawal(
    withdrawal_service: web::Data<WithdrawalService>,
    req: HttpRequest,
    request: web::Json<CreateWithdrawalRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match withdrawal_service
        .request(user.id, request.into_inner())
        .await
    {
        Ok(withdrawal) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": withdrawal
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/withdrawals",
    tag = "withdrawals",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "The caller's withdrawal requests")
    )
)]
pub async fn my_withdrawals(
    withdrawal_service: web::Data<WithdrawalService>,
    req: HttpRequest,
    params: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match withdrawal_service.user_requests(user.id, &params).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn withdrawal_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/withdrawals")
            .route("", web::post().to(request_withdrawal))
            .route("", web::get().to(my_withdrawals)),
    );
}
