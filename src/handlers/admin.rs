use actix_web::{web, HttpRequest, HttpResponse, ResponseError, Result};
use serde_json::json;

use crate::handlers::require_admin;
use crate::models::*;
use crate::services::{
    AccrualService, FraudService, LedgerService, ProductService, RechargeService, UserService,
    WithdrawalService,
};

// ---- users ----

#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(UserQuery),
    responses(
        (status = 200, description = "Paginated user list"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn list_users(
    user_service: web::Data<UserService>,
    req: HttpRequest,
    query: web::Query<UserQuery>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match user_service.list(&query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/users/{id}",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User id")),
    request_body = AdminUpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 403, description = "Role changes require superadmin")
    )
)]
pub async fn update_user(
    user_service: web::Data<UserService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<AdminUpdateUserRequest>,
) -> Result<HttpResponse> {
    let admin = match require_admin(&req) {
        Ok(admin) => admin,
        Err(e) => return Ok(e.error_response()),
    };

    match user_service
        .admin_update(admin.role, path.into_inner(), request.into_inner())
        .await
    {
        Ok(user) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": user
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/users/export",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(UserQuery),
    responses(
        (status = 200, description = "User list as CSV", content_type = "text/csv"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn export_users(
    user_service: web::Data<UserService>,
    req: HttpRequest,
    query: web::Query<UserQuery>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match user_service.export_csv(&query).await {
        Ok(csv) => Ok(HttpResponse::Ok()
            .content_type("text/csv")
            .insert_header(("Content-Disposition", "attachment; filename=\"users.csv\""))
            .body(csv)),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/users/{id}/accrue",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "Daily returns settled for the user"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn accrue_user(
    accrual_service: web::Data<AccrualService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match accrual_service.settle_user(path.into_inner()).await {
        Ok(credited) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": { "credited": credited }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

// ---- transactions ----

#[utoipa::path(
    get,
    path = "/admin/transactions",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(TransactionQuery),
    responses(
        (status = 200, description = "Paginated ledger with kind/status/user filters"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn list_transactions(
    ledger_service: web::Data<LedgerService>,
    req: HttpRequest,
    query: web::Query<TransactionQuery>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match ledger_service.list(&query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/transactions/export",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(TransactionQuery),
    responses(
        (status = 200, description = "Matching transactions as CSV", content_type = "text/csv"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn export_transactions(
    ledger_service: web::Data<LedgerService>,
    req: HttpRequest,
    query: web::Query<TransactionQuery>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match ledger_service.export_csv(&query).await {
        Ok(csv) => Ok(HttpResponse::Ok()
            .content_type("text/csv")
            .insert_header((
                "Content-Disposition",
                "attachment; filename=\"transactions.csv\"",
            ))
            .body(csv)),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/recharges/{id}/approve",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Recharge transaction id")),
    responses(
        (status = 200, description = "Recharge approved and balance credited"),
        (status = 400, description = "Transaction is not a pending recharge")
    )
)]
pub async fn approve_recharge(
    recharge_service: web::Data<RechargeService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let admin = match require_admin(&req) {
        Ok(admin) => admin,
        Err(e) => return Ok(e.error_response()),
    };

    match recharge_service.approve(admin.id, path.into_inner()).await {
        Ok(transaction) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": transaction
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/recharges/{id}/reject",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Recharge transaction id")),
    responses(
        (status = 200, description = "Recharge rejected; no balance change"),
        (status = 400, description = "Transaction is not a pending recharge")
    )
)]
pub async fn reject_recharge(
    recharge_service: web::Data<RechargeService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let admin = match require_admin(&req) {
        Ok(admin) => admin,
        Err(e) => return Ok(e.error_response()),
    };

    match recharge_service.reject(admin.id, path.into_inner()).await {
        Ok(transaction) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": transaction
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

// ---- withdrawals ----

#[utoipa::path(
    get,
    path = "/admin/withdrawals",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(WithdrawalQuery),
    responses(
        (status = 200, description = "Paginated withdrawal requests"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn list_withdrawals(
    withdrawal_service: web::Data<WithdrawalService>,
    req: HttpRequest,
    query: web::Query<WithdrawalQuery>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match withdrawal_service.list(&query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/withdrawals/{id}/approve",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Withdrawal request id")),
    responses(
        (status = 200, description = "Withdrawal approved"),
        (status = 400, description = "Request already processed")
    )
)]
pub async fn approve_withdrawal(
    withdrawal_service: web::Data<WithdrawalService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let admin = match require_admin(&req) {
        Ok(admin) => admin,
        Err(e) => return Ok(e.error_response()),
    };

    match withdrawal_service
        .approve(admin.id, path.into_inner())
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
    post,
    path = "/admin/withdrawals/{id}/reject",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Withdrawal request id")),
    request_body = RejectWithdrawalRequest,
    responses(
        (status = 200, description = "Withdrawal rejected and amount refunded"),
        (status = 400, description = "Request already processed")
    )
)]
pub async fn reject_withdrawal(
    withdrawal_service: web::Data<WithdrawalService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<RejectWithdrawalRequest>,
) -> Result<HttpResponse> {
    let admin = match require_admin(&req) {
        Ok(admin) => admin,
        Err(e) => return Ok(e.error_response()),
    };

    match withdrawal_service
        .reject(admin.id, path.into_inner(), request.into_inner())
        .await
    {
        Ok(withdrawal) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": withdrawal
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

// ---- fraud alerts ----

#[utoipa::path(
    get,
    path = "/admin/alerts",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(AlertQuery),
    responses(
        (status = 200, description = "Paginated fraud alerts"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn list_alerts(
    fraud_service: web::Data<FraudService>,
    req: HttpRequest,
    query: web::Query<AlertQuery>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match fraud_service.list_alerts(&query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/alerts/{id}/status",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Alert id")),
    request_body = UpdateAlertStatusRequest,
    responses(
        (status = 200, description = "Alert status updated", body = FraudAlert),
        (status = 400, description = "Invalid status transition")
    )
)]
pub async fn update_alert(
    fraud_service: web::Data<FraudService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateAlertStatusRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match fraud_service
        .update_alert_status(path.into_inner(), request.into_inner())
        .await
    {
        Ok(alert) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": alert
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

// ---- products ----

#[utoipa::path(
    get,
    path = "/admin/products",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All products including inactive"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn list_all_products(
    product_service: web::Data<ProductService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match product_service.list_all().await {
        Ok(products) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": products
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/products",
    tag = "admin",
    security(("bearer_auth" = [])),
    request_body = CreateProductRequest,
    responses(
        (status = 200, description = "Product created", body = Product),
        (status = 400, description = "Invalid pricing")
    )
)]
pub async fn create_product(
    product_service: web::Data<ProductService>,
    req: HttpRequest,
    request: web::Json<CreateProductRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match product_service.create(request.into_inner()).await {
        Ok(product) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": product
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/products/{id}",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Product id")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = Product),
        (status = 404, description = "Product not found")
    )
)]
pub async fn update_product(
    product_service: web::Data<ProductService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateProductRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match product_service
        .update(path.into_inner(), request.into_inner())
        .await
    {
        Ok(product) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": product
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

// ---- dashboard ----

#[utoipa::path(
    get,
    path = "/admin/stats",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Back-office dashboard counters"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn dashboard_stats(
    user_service: web::Data<UserService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match user_service.dashboard_stats().await {
        Ok(stats) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": stats
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/users", web::get().to(list_users))
            .route("/users/export", web::get().to(export_users))
            .route("/users/{id}", web::put().to(update_user))
            .route("/users/{id}/accrue", web::post().to(accrue_user))
            .route("/transactions", web::get().to(list_transactions))
            .route("/transactions/export", web::get().to(export_transactions))
            .route("/recharges/{id}/approve", web::post().to(approve_recharge))
            .route("/recharges/{id}/reject", web::post().to(reject_recharge))
            .route("/withdrawals", web::get().to(list_withdrawals))
            .route(
                "/withdrawals/{id}/approve",
                web::post().to(approve_withdrawal),
            )
            .route(
                "/withdrawals/{id}/reject",
                web::post().to(reject_withdrawal),
            )
            .route("/alerts", web::get().to(list_alerts))
            .route("/alerts/{id}/status", web::put().to(update_alert))
            .route("/products", web::get().to(list_all_products))
            .route("/products", web::post().to(create_product))
            .route("/products/{id}", web::put().to(update_product))
            .route("/stats", web::get().to(dashboard_stats)),
    );
}
