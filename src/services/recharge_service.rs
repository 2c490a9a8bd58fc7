use crate::error::{AppError, AppResult};
use crate::models::{
    PaginatedResponse, PaginationParams, Transaction, TransactionKind, TransactionResponse,
    TransactionStatus, User,
};
use crate::services::fraud_service::ReferenceViolation;
use crate::services::{notification_service, FraudService};
use crate::services::ledger_service;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitRechargeRequest {
    pub amount: Decimal,
    /// Mobile-money operator the payment was made on; defaults to the
    /// account's operator.
    pub network: Option<String>,
    /// The operator's transaction reference from the payment confirmation.
    #[schema(example = "AB12CD34EF")]
    pub reference: String,
}

/// A unique-index violation on `payment_references(user_id, reference)`
/// means a duplicate reference raced in between the fraud screen and the
/// insert.
fn is_duplicate_reference(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[derive(Clone)]
pub struct RechargeService {
    pool: PgPool,
    fraud_service: FraudService,
}

impl RechargeService {
    pub fn new(pool: PgPool, fraud_service: FraudService) -> Self {
        Self {
            pool,
            fraud_service,
        }
    }

    /// Submit a mobile-money recharge. Passes the fraud gate, records the
    /// payment reference and creates a PENDING recharge transaction; the
    /// balance is credited only on admin approval.
    pub async fn submit(
        &self,
        user_id: i64,
        request: SubmitRechargeRequest,
    ) -> AppResult<TransactionResponse> {
        if request.amount <= Decimal::ZERO {
            return Err(AppError::ValidationError(
                "Recharge amount must be positive".to_string(),
            ));
        }

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if user.is_blocked {
            return Err(AppError::Forbidden);
        }
        if !user.is_active {
            return Err(AppError::ValidationError(
                "Account is deactivated".to_string(),
            ));
        }

        let reference = request.reference.trim().to_uppercase();
        let network = request.network.unwrap_or_else(|| user.network.clone());

        self.fraud_service
            .screen_recharge(user_id, &network, &reference, request.amount)
            .await?;

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO payment_references (user_id, reference, network, amount)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id)
        .bind(&reference)
        .bind(&network)
        .bind(request.amount)
        .execute(&mut *tx)
        .await;

        if let Err(error) = inserted {
            tx.rollback().await?;
            // A concurrent submission of the same reference can slip past
            // the fraud screen; the unique index is the backstop, and the
            // loser gets the same duplicate rejection.
            if is_duplicate_reference(&error) {
                self.fraud_service
                    .record_attempt(user_id, &ReferenceViolation::Duplicate)
                    .await?;
                return Err(AppError::FraudError(ReferenceViolation::Duplicate.message()));
            }
            return Err(error.into());
        }

        let transaction = ledger_service::post_credit(
            &mut tx,
            user_id,
            TransactionKind::Recharge,
            request.amount,
            &format!("Mobile money recharge via {network}"),
            TransactionStatus::Pending,
            Some(&reference),
        )
        .await?;

        tx.commit().await?;

        log::info!(
            "User {user_id} submitted recharge of {} TZS (reference {reference})",
            request.amount
        );

        Ok(TransactionResponse::from(transaction))
    }

    /// Admin approval: credit the balance and complete the transaction.
    /// Idempotence comes from the transaction state machine; a second
    /// approval of the same row is rejected as an invalid transition.
    pub async fn approve(&self, admin_id: i64, transaction_id: i64) -> AppResult<TransactionResponse> {
        let mut tx = self.pool.begin().await?;

        let pending = ledger_service::get_transaction(&mut tx, transaction_id).await?;
        Self::ensure_recharge(&pending)?;

        let completed = ledger_service::complete(&mut tx, transaction_id).await?;

        notification_service::create(
            &mut tx,
            completed.user_id,
            "Recharge approved",
            &format!("Your recharge of TZS {} has been approved", completed.amount),
        )
        .await?;

        tx.commit().await?;

        log::info!(
            "Admin {admin_id} approved recharge {transaction_id} for user {}",
            completed.user_id
        );

        Ok(TransactionResponse::from(completed))
    }

    /// Admin rejection: mark failed. Nothing was credited on submission,
    /// so no refund applies.
    pub async fn reject(&self, admin_id: i64, transaction_id: i64) -> AppResult<TransactionResponse> {
        let mut tx = self.pool.begin().await?;

        let pending = ledger_service::get_transaction(&mut tx, transaction_id).await?;
        Self::ensure_recharge(&pending)?;

        let failed =
            ledger_service::fail(&mut tx, transaction_id, TransactionStatus::Failed, false).await?;

        notification_service::create(
            &mut tx,
            failed.user_id,
            "Recharge rejected",
            &format!("Your recharge of TZS {} was rejected", failed.amount),
        )
        .await?;

        tx.commit().await?;

        log::info!(
            "Admin {admin_id} rejected recharge {transaction_id} for user {}",
            failed.user_id
        );

        Ok(TransactionResponse::from(failed))
    }

    fn ensure_recharge(transaction: &Transaction) -> AppResult<()> {
        if transaction.kind != TransactionKind::Recharge {
            return Err(AppError::ValidationError(
                "Transaction is not a recharge".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn history(
        &self,
        user_id: i64,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<TransactionResponse>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE user_id = $1 AND kind = 'recharge'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let records = sqlx::query_as::<_, Transaction>(
            "SELECT id, user_id, kind, amount, description, status, reference, created_at, updated_at
             FROM transactions
             WHERE user_id = $1 AND kind = 'recharge'
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(params.get_limit() as i64)
        .bind(params.get_offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let items: Vec<TransactionResponse> =
            records.into_iter().map(TransactionResponse::from).collect();

        Ok(PaginatedResponse::new(items, params, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[derive(Debug)]
    struct UniqueViolation;

    impl std::fmt::Display for UniqueViolation {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "duplicate key value violates unique constraint")
        }
    }

    impl std::error::Error for UniqueViolation {}

    impl sqlx::error::DatabaseError for UniqueViolation {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed("23505"))
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::UniqueViolation
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }
    }

    #[test]
    fn test_unique_violation_maps_to_duplicate() {
        // The loser of a concurrent same-reference race gets the duplicate
        // rejection, not a generic database error.
        let error = sqlx::Error::Database(Box::new(UniqueViolation));
        assert!(is_duplicate_reference(&error));
    }

    #[test]
    fn test_other_errors_are_not_duplicates() {
        assert!(!is_duplicate_reference(&sqlx::Error::RowNotFound));
        assert!(!is_duplicate_reference(&sqlx::Error::PoolClosed));
    }
}
