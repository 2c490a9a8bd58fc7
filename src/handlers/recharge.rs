use actix_web::{web, HttpRequest, HttpResponse, ResponseError, Result};
use serde_json::json;

use crate::handlers::current_user;
use crate::models::PaginationParams;
use crate::services::{RechargeService, SubmitRechargeRequest};

#[utoipa::path(
    post,
    path = "/recharges",
    tag = "recharges",
    security(("bearer_auth" = [])),
    request_body = SubmitRechargeRequest,
    responses(
        (status = 200, description = "Recharge recorded, pending review"),
        (status = 400, description = "Validation error"),
        (status = 422, description = "Payment reference rejected by fraud screening")
    )
)]
pub async fn submit_recharge(
    recharge_service: web::Data<RechargeService>,
    req: HttpRequest,
    request: web::Json<SubmitRechargeRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match recharge_service.submit(user.id, request.into_inner()).await {
        Ok(transaction) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": transaction
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/recharges",
    tag = "recharges",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "The caller's recharge history")
    )
)]
pub async fn recharge_history(
    recharge_service: web::Data<RechargeService>,
    req: HttpRequest,
    params: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match recharge_service.history(user.id, &params).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn recharge_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/recharges")
            .route("", web::post().to(submit_recharge))
            .route("", web::get().to(recharge_history)),
    );
}
