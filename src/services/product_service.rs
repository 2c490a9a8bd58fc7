use crate::error::{AppError, AppResult};
use crate::models::{
    CreateProductRequest, Product, Purchase, PurchaseResponse, TransactionKind, TransactionStatus,
    UpdateProductRequest,
};
use crate::services::ledger_service;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

const PRODUCT_COLUMNS: &str = "id, name, price, original_price, cycle_days, category, \
     description, is_active, created_at";
const PURCHASE_COLUMNS: &str = "id, user_id, product_id, product_name, price, original_price, \
     cycle_days, purchase_date, expires_at, is_active, returns_paid, created_at";

#[derive(Clone)]
pub struct ProductService {
    pool: PgPool,
}

impl ProductService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_active(&self) -> AppResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = TRUE ORDER BY price ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    pub async fn list_all(&self) -> AppResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    pub async fn get(&self, product_id: i64) -> AppResult<Product> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
    }

    pub async fn create(&self, request: CreateProductRequest) -> AppResult<Product> {
        Self::validate_pricing(request.price, request.original_price, request.cycle_days)?;

        let product = sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO products (name, price, original_price, cycle_days, category, description)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(request.name.trim())
        .bind(request.price)
        .bind(request.original_price)
        .bind(request.cycle_days)
        .bind(request.category.unwrap_or_else(|| "standard".to_string()))
        .bind(request.description.unwrap_or_default())
        .fetch_one(&self.pool)
        .await?;

        Ok(product)
    }

    pub async fn update(
        &self,
        product_id: i64,
        request: UpdateProductRequest,
    ) -> AppResult<Product> {
        let current = self.get(product_id).await?;

        let price = request.price.unwrap_or(current.price);
        let original_price = request.original_price.unwrap_or(current.original_price);
        let cycle_days = request.cycle_days.unwrap_or(current.cycle_days);
        Self::validate_pricing(price, original_price, cycle_days)?;

        let product = sqlx::query_as::<_, Product>(&format!(
            "UPDATE products
             SET name = $1, price = $2, original_price = $3, cycle_days = $4,
                 category = $5, description = $6, is_active = $7
             WHERE id = $8
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(request.name.unwrap_or(current.name))
        .bind(price)
        .bind(original_price)
        .bind(cycle_days)
        .bind(request.category.unwrap_or(current.category))
        .bind(request.description.unwrap_or(current.description))
        .bind(request.is_active.unwrap_or(current.is_active))
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(product)
    }

    fn validate_pricing(price: Decimal, original_price: Decimal, cycle_days: i32) -> AppResult<()> {
        if price < Decimal::ZERO || original_price < Decimal::ZERO {
            return Err(AppError::ValidationError(
                "Prices cannot be negative".to_string(),
            ));
        }
        if price == Decimal::ZERO && original_price == Decimal::ZERO {
            return Err(AppError::ValidationError(
                "A product needs a price or an original price".to_string(),
            ));
        }
        if cycle_days <= 0 {
            return Err(AppError::ValidationError(
                "Cycle days must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Buy a product: debit the price, snapshot the product into the
    /// purchase so later catalog edits cannot change its accrual.
    pub async fn purchase(&self, user_id: i64, product_id: i64) -> AppResult<PurchaseResponse> {
        let product = self.get(product_id).await?;
        if !product.is_active {
            return Err(AppError::ValidationError(
                "Product is no longer available".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        if product.price > Decimal::ZERO {
            ledger_service::post_debit(
                &mut tx,
                user_id,
                TransactionKind::Purchase,
                product.price,
                &format!("Purchase of {}", product.name),
                TransactionStatus::Completed,
            )
            .await?;
        }

        let now = Utc::now();
        let expires_at = now + Duration::days(product.cycle_days as i64);

        let purchase = sqlx::query_as::<_, Purchase>(&format!(
            "INSERT INTO purchases (user_id, product_id, product_name, price, original_price,
                                    cycle_days, purchase_date, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {PURCHASE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(product.id)
        .bind(&product.name)
        .bind(product.price)
        .bind(product.original_price)
        .bind(product.cycle_days)
        .bind(now)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        log::info!(
            "User {user_id} purchased product {} ({} TZS)",
            product.name,
            product.price
        );

        Ok(PurchaseResponse::from(purchase))
    }

    pub async fn user_purchases(&self, user_id: i64) -> AppResult<Vec<PurchaseResponse>> {
        let purchases = sqlx::query_as::<_, Purchase>(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases
             WHERE user_id = $1
             ORDER BY purchase_date DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(purchases.into_iter().map(PurchaseResponse::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pricing_validation() {
        assert!(ProductService::validate_pricing(dec!(10000), dec!(0), 180).is_ok());
        // Promotional product: free but with an original price for accrual.
        assert!(ProductService::validate_pricing(dec!(0), dec!(30000), 180).is_ok());
        assert!(ProductService::validate_pricing(dec!(0), dec!(0), 180).is_err());
        assert!(ProductService::validate_pricing(dec!(-1), dec!(0), 180).is_err());
        assert!(ProductService::validate_pricing(dec!(10000), dec!(0), 0).is_err());
    }
}
