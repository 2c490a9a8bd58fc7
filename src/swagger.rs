use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::models::*;
use crate::services::{DashboardStats, SubmitRechargeRequest};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.as_mut().unwrap();
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        )
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::session,
        handlers::user::get_profile,
        handlers::user::update_profile,
        handlers::user::change_password,
        handlers::user::transactions,
        handlers::product::list_products,
        handlers::product::purchase_product,
        handlers::product::my_purchases,
        handlers::recharge::submit_recharge,
        handlers::recharge::recharge_history,
        handlers::withdrawal::request_withdrawal,
        handlers::withdrawal::my_withdrawals,
        handlers::team::team,
        handlers::notification::list_notifications,
        handlers::notification::unread_count,
        handlers::notification::mark_read,
        handlers::notification::mark_all_read,
        handlers::admin::list_users,
        handlers::admin::update_user,
        handlers::admin::export_users,
        handlers::admin::accrue_user,
        handlers::admin::list_transactions,
        handlers::admin::export_transactions,
        handlers::admin::approve_recharge,
        handlers::admin::reject_recharge,
        handlers::admin::list_withdrawals,
        handlers::admin::approve_withdrawal,
        handlers::admin::reject_withdrawal,
        handlers::admin::list_alerts,
        handlers::admin::update_alert,
        handlers::admin::list_all_products,
        handlers::admin::create_product,
        handlers::admin::update_product,
        handlers::admin::dashboard_stats,
    ),
    components(
        schemas(
            ApiError,
            UserRole,
            UserResponse,
            UserStatistics,
            RegisterRequest,
            LoginRequest,
            RefreshRequest,
            UpdateUserRequest,
            ChangePasswordRequest,
            AdminUpdateUserRequest,
            AuthResponse,
            UserQuery,
            TransactionKind,
            TransactionStatus,
            TransactionResponse,
            TransactionQuery,
            Product,
            CreateProductRequest,
            UpdateProductRequest,
            PurchaseResponse,
            SubmitRechargeRequest,
            WithdrawalStatus,
            WithdrawalRequest,
            CreateWithdrawalRequest,
            RejectWithdrawalRequest,
            WithdrawalQuery,
            AlertSeverity,
            AlertStatus,
            FraudAlert,
            UpdateAlertStatusRequest,
            AlertQuery,
            Notification,
            UnreadCountResponse,
            ReferralLevel,
            TeamMember,
            TeamLevelSummary,
            TeamResponse,
            PaginationParams,
            PaginationInfo,
            DashboardStats,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Authentication API"),
        (name = "user", description = "Profile and transaction history API"),
        (name = "products", description = "Investment product API"),
        (name = "recharges", description = "Mobile-money recharge API"),
        (name = "withdrawals", description = "Withdrawal API"),
        (name = "team", description = "Referral team API"),
        (name = "notifications", description = "Notification API"),
        (name = "admin", description = "Back-office API"),
    ),
    info(
        title = "ProfitNet Backend API",
        version = "1.0.0",
        description = "ProfitNet investment wallet REST API documentation"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
