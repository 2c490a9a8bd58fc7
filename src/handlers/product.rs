use actix_web::{web, HttpRequest, HttpResponse, ResponseError, Result};
use serde_json::json;

use crate::handlers::current_user;
use crate::services::ProductService;

#[utoipa::path(
    get,
    path = "/products",
    tag = "products",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active products in display order")
    )
)]
pub async fn list_products(product_service: web::Data<ProductService>) -> Result<HttpResponse> {
    match product_service.list_active().await {
        Ok(products) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": products
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/products/{id}/purchase",
    tag = "products",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 200, description = "Purchase created with snapshot pricing"),
        (status = 400, description = "Insufficient balance"),
        (status = 404, description = "Product not found or inactive")
    )
)]
pub async fn purchase_product(
    product_service: web::Data<ProductService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match product_service.purchase(user.id, path.into_inner()).await {
        Ok(purchase) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": purchase
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/products/purchases",
    tag = "products",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The caller's purchases, newest first")
    )
)]
pub async fn my_purchases(
    product_service: web::Data<ProductService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match product_service.user_purchases(user.id).await {
        Ok(purchases) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": purchases
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn product_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/products")
            .route("", web::get().to(list_products))
            .route("/purchases", web::get().to(my_purchases))
            .route("/{id}/purchase", web::post().to(purchase_product)),
    );
}
