pub mod accrual_service;
pub mod auth_service;
pub mod fraud_service;
pub mod ledger_service;
pub mod notification_service;
pub mod product_service;
pub mod recharge_service;
pub mod referral_service;
pub mod user_service;
pub mod withdrawal_service;

pub use accrual_service::AccrualService;
pub use auth_service::AuthService;
pub use fraud_service::FraudService;
pub use ledger_service::LedgerService;
pub use notification_service::NotificationService;
pub use product_service::ProductService;
pub use recharge_service::{RechargeService, SubmitRechargeRequest};
pub use referral_service::ReferralService;
pub use user_service::{DashboardStats, UserService};
pub use withdrawal_service::WithdrawalService;
