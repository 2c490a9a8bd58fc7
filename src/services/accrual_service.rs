use crate::error::AppResult;
use crate::models::{Purchase, TransactionKind, TransactionStatus};
use crate::services::{ledger_service, notification_service};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

/// Daily-return accrual over active purchases.
///
/// For each active purchase: `eligible = min(days_held, cycle_days)`,
/// `due = eligible - returns_paid`. Everything due across all purchases is
/// credited as ONE `return` transaction; `returns_paid` gates the engine so
/// re-running it within the same day credits nothing.

#[derive(Debug, PartialEq)]
pub struct PurchaseUpdate {
    pub purchase_id: i64,
    pub returns_due: i32,
    pub new_returns_paid: i32,
    pub deactivate: bool,
    pub credit: Decimal,
}

#[derive(Debug)]
pub struct AccrualPlan {
    pub total_credit: Decimal,
    pub updates: Vec<PurchaseUpdate>,
}

impl AccrualPlan {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

pub fn plan_accrual(purchases: &[Purchase], now: DateTime<Utc>) -> AccrualPlan {
    let mut updates = Vec::new();
    let mut total = Decimal::ZERO;

    for purchase in purchases.iter().filter(|p| p.is_active) {
        let days_held = (now - purchase.purchase_date).num_days().max(0);
        let eligible = days_held.min(purchase.cycle_days as i64) as i32;
        let due = (eligible - purchase.returns_paid).max(0);
        if due == 0 {
            continue;
        }

        let credit = purchase.daily_return() * Decimal::from(due);
        let new_returns_paid = purchase.returns_paid + due;

        total += credit;
        updates.push(PurchaseUpdate {
            purchase_id: purchase.id,
            returns_due: due,
            new_returns_paid,
            deactivate: new_returns_paid >= purchase.cycle_days,
            credit,
        });
    }

    AccrualPlan {
        // Full precision inside the plan; money rounding happens once,
        // on the posted total.
        total_credit: total.round_dp(2),
        updates,
    }
}

#[derive(Clone)]
pub struct AccrualService {
    pool: PgPool,
}

impl AccrualService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Settle all outstanding daily returns for one user. Invoked on login
    /// and session load, and manually by admins. Returns the credited
    /// amount when anything was due.
    pub async fn settle_user(&self, user_id: i64) -> AppResult<Option<Decimal>> {
        let mut tx = self.pool.begin().await?;

        let purchases = sqlx::query_as::<_, Purchase>(
            "SELECT id, user_id, product_id, product_name, price, original_price,
                    cycle_days, purchase_date, expires_at, is_active, returns_paid, created_at
             FROM purchases
             WHERE user_id = $1 AND is_active = TRUE
             FOR UPDATE",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        let plan = plan_accrual(&purchases, Utc::now());
        if plan.is_empty() || plan.total_credit <= Decimal::ZERO {
            tx.commit().await?;
            return Ok(None);
        }

        for update in &plan.updates {
            sqlx::query(
                "UPDATE purchases SET returns_paid = $1, is_active = $2 WHERE id = $3",
            )
            .bind(update.new_returns_paid)
            .bind(!update.deactivate)
            .bind(update.purchase_id)
            .execute(&mut *tx)
            .await?;
        }

        let description = format!(
            "Daily returns for {} purchase(s)",
            plan.updates.len()
        );
        ledger_service::post_credit(
            &mut tx,
            user_id,
            TransactionKind::Return,
            plan.total_credit,
            &description,
            TransactionStatus::Completed,
            None,
        )
        .await?;

        notification_service::create(
            &mut tx,
            user_id,
            "Daily returns credited",
            &format!("TZS {} in daily returns was added to your balance", plan.total_credit),
        )
        .await?;

        tx.commit().await?;

        log::info!(
            "Accrued {} TZS over {} purchase(s) for user {}",
            plan.total_credit,
            plan.updates.len(),
            user_id
        );

        Ok(Some(plan.total_credit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn purchase(
        id: i64,
        price: Decimal,
        original_price: Decimal,
        cycle_days: i32,
        days_ago: i64,
        returns_paid: i32,
        is_active: bool,
    ) -> Purchase {
        let purchase_date = Utc::now() - Duration::days(days_ago);
        Purchase {
            id,
            user_id: 1,
            product_id: 1,
            product_name: "Test product".to_string(),
            price,
            original_price,
            cycle_days,
            purchase_date,
            expires_at: purchase_date + Duration::days(cycle_days as i64),
            is_active,
            returns_paid,
            created_at: purchase_date,
        }
    }

    #[test]
    fn test_three_full_days_credit() {
        // price=10000, cycle=180, 3 days untouched: 3 * (10000/180).
        let purchases = vec![purchase(1, dec!(10000), dec!(0), 180, 3, 0, true)];
        let plan = plan_accrual(&purchases, Utc::now());

        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].returns_due, 3);
        assert_eq!(plan.updates[0].new_returns_paid, 3);
        assert!(!plan.updates[0].deactivate);
        assert_eq!(plan.total_credit, dec!(166.67));
    }

    #[test]
    fn test_same_day_rerun_is_idempotent() {
        // After the first settlement returns_paid equals days held, so a
        // second run the same day finds nothing due.
        let purchases = vec![purchase(1, dec!(10000), dec!(0), 180, 3, 3, true)];
        let plan = plan_accrual(&purchases, Utc::now());

        assert!(plan.is_empty());
        assert_eq!(plan.total_credit, Decimal::ZERO);
    }

    #[test]
    fn test_original_price_fallback() {
        // Promotional purchase: price 0, original 30000, cycle 180; after
        // 10 days credits 10 * (30000/180) = 1666.67 and stays active.
        let purchases = vec![purchase(1, dec!(0), dec!(30000), 180, 10, 0, true)];
        let plan = plan_accrual(&purchases, Utc::now());

        assert_eq!(plan.total_credit, dec!(1666.67));
        assert_eq!(plan.updates[0].new_returns_paid, 10);
        assert!(!plan.updates[0].deactivate);
    }

    #[test]
    fn test_returns_capped_at_cycle_and_deactivated() {
        // Held far past the cycle end: only cycle_days are ever paid and
        // the purchase is deactivated.
        let purchases = vec![purchase(1, dec!(9000), dec!(0), 30, 90, 12, true)];
        let plan = plan_accrual(&purchases, Utc::now());

        assert_eq!(plan.updates[0].returns_due, 18);
        assert_eq!(plan.updates[0].new_returns_paid, 30);
        assert!(plan.updates[0].deactivate);
        // 18 days at 9000/30 = 300/day.
        assert_eq!(plan.total_credit, dec!(5400));
    }

    #[test]
    fn test_inactive_purchases_are_skipped() {
        let purchases = vec![purchase(1, dec!(10000), dec!(0), 30, 60, 30, false)];
        let plan = plan_accrual(&purchases, Utc::now());

        assert!(plan.is_empty());
    }

    #[test]
    fn test_multiple_purchases_single_total() {
        let purchases = vec![
            purchase(1, dec!(10000), dec!(0), 180, 3, 0, true),
            purchase(2, dec!(0), dec!(30000), 180, 10, 0, true),
        ];
        let plan = plan_accrual(&purchases, Utc::now());

        assert_eq!(plan.updates.len(), 2);
        // 166.666... + 1666.666... rounded once on the sum.
        assert_eq!(plan.total_credit, dec!(1833.33));
    }

    #[test]
    fn test_future_dated_purchase_accrues_nothing() {
        let purchases = vec![purchase(1, dec!(10000), dec!(0), 180, -1, 0, true)];
        let plan = plan_accrual(&purchases, Utc::now());

        assert!(plan.is_empty());
    }
}
