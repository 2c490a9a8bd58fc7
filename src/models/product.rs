use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: Decimal,
    pub original_price: Decimal,
    pub cycle_days: i32,
    pub category: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Per-day return over the cycle. Promotional products carry price 0
    /// and fall back to their original price as the return base.
    pub fn daily_return(&self) -> Decimal {
        let base = if self.price > Decimal::ZERO {
            self.price
        } else {
            self.original_price
        };
        base / Decimal::from(self.cycle_days)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub original_price: Decimal,
    pub cycle_days: i32,
    pub category: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub original_price: Option<Decimal>,
    pub cycle_days: Option<i32>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// A purchase carries a snapshot of the product at buy time so later
/// catalog edits cannot change accrual for holdings already in flight.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Purchase {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub price: Decimal,
    pub original_price: Decimal,
    pub cycle_days: i32,
    pub purchase_date: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub returns_paid: i32,
    pub created_at: DateTime<Utc>,
}

impl Purchase {
    pub fn daily_return(&self) -> Decimal {
        let base = if self.price > Decimal::ZERO {
            self.price
        } else {
            self.original_price
        };
        base / Decimal::from(self.cycle_days)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PurchaseResponse {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub price: Decimal,
    pub cycle_days: i32,
    pub daily_return: Decimal,
    pub purchase_date: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub returns_paid: i32,
}

impl From<Purchase> for PurchaseResponse {
    fn from(p: Purchase) -> Self {
        let daily_return = p.daily_return();
        Self {
            id: p.id,
            product_id: p.product_id,
            product_name: p.product_name,
            price: p.price,
            cycle_days: p.cycle_days,
            daily_return,
            purchase_date: p.purchase_date,
            expires_at: p.expires_at,
            is_active: p.is_active,
            returns_paid: p.returns_paid,
        }
    }
}
