use crate::error::{AppError, AppResult};
use crate::models::{
    CreateWithdrawalRequest, PaginatedResponse, PaginationParams, RejectWithdrawalRequest,
    TransactionKind, TransactionStatus, WithdrawalQuery, WithdrawalRequest, WithdrawalStatus,
};
use crate::services::{ledger_service, notification_service};
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, QueryBuilder};

const WITHDRAWAL_COLUMNS: &str = "id, user_id, transaction_id, amount, method, details, status, \
     requested_at, processed_at, processed_by, rejection_reason";

/// Withdrawal requests use optimistic deduction: the amount leaves the
/// spendable balance when the request is created, and is refunded in full
/// if an admin rejects it. Pending withdrawals therefore never overdraw.
#[derive(Clone)]
pub struct WithdrawalService {
    pool: PgPool,
}

impl WithdrawalService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn request(
        &self,
        user_id: i64,
        request: CreateWithdrawalRequest,
    ) -> AppResult<WithdrawalRequest> {
        if request.amount <= Decimal::ZERO {
            return Err(AppError::ValidationError(
                "Withdrawal amount must be positive".to_string(),
            ));
        }
        if request.method.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Withdrawal method is required".to_string(),
            ));
        }

        let is_blocked: Option<bool> =
            sqlx::query_scalar("SELECT is_blocked FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        match is_blocked {
            None => return Err(AppError::NotFound("User not found".to_string())),
            Some(true) => return Err(AppError::Forbidden),
            Some(false) => {}
        }

        let mut tx = self.pool.begin().await?;

        // Deduct now; the guarded update fails the request instead of
        // letting the balance go negative.
        let transaction = ledger_service::post_debit(
            &mut tx,
            user_id,
            TransactionKind::Withdrawal,
            request.amount,
            &format!("Withdrawal via {}", request.method),
            TransactionStatus::Pending,
        )
        .await?;

        let withdrawal = sqlx::query_as::<_, WithdrawalRequest>(&format!(
            "INSERT INTO withdrawal_requests (user_id, transaction_id, amount, method, details)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {WITHDRAWAL_COLUMNS}"
        ))
        .bind(user_id)
        .bind(transaction.id)
        .bind(request.amount)
        .bind(request.method.trim())
        .bind(&request.details)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        log::info!(
            "User {user_id} requested withdrawal of {} TZS (request {})",
            withdrawal.amount,
            withdrawal.id
        );

        Ok(withdrawal)
    }

    pub async fn approve(&self, admin_id: i64, withdrawal_id: i64) -> AppResult<WithdrawalRequest> {
        let mut tx = self.pool.begin().await?;

        let withdrawal = Self::get_for_update(&mut tx, withdrawal_id).await?;
        Self::ensure_transition(&withdrawal, WithdrawalStatus::Approved)?;

        // Funds already left the balance at request time; completing the
        // ledger row records settlement without a second deduction.
        ledger_service::complete(&mut tx, withdrawal.transaction_id).await?;

        let updated = sqlx::query_as::<_, WithdrawalRequest>(&format!(
            "UPDATE withdrawal_requests
             SET status = $1, processed_at = $2, processed_by = $3
             WHERE id = $4
             RETURNING {WITHDRAWAL_COLUMNS}"
        ))
        .bind(WithdrawalStatus::Approved)
        .bind(Utc::now())
        .bind(admin_id)
        .bind(withdrawal_id)
        .fetch_one(&mut *tx)
        .await?;

        notification_service::create(
            &mut tx,
            updated.user_id,
            "Withdrawal approved",
            &format!("Your withdrawal of TZS {} has been paid out", updated.amount),
        )
        .await?;

        tx.commit().await?;

        log::info!("Admin {admin_id} approved withdrawal {withdrawal_id}");
        Ok(updated)
    }

    /// Rejection refunds the exact deducted amount, so a rejected request
    /// is net zero on the balance.
    pub async fn reject(
        &self,
        admin_id: i64,
        withdrawal_id: i64,
        request: RejectWithdrawalRequest,
    ) -> AppResult<WithdrawalRequest> {
        let mut tx = self.pool.begin().await?;

        let withdrawal = Self::get_for_update(&mut tx, withdrawal_id).await?;
        Self::ensure_transition(&withdrawal, WithdrawalStatus::Rejected)?;

        ledger_service::fail(
            &mut tx,
            withdrawal.transaction_id,
            TransactionStatus::Rejected,
            true,
        )
        .await?;

        let updated = sqlx::query_as::<_, WithdrawalRequest>(&format!(
            "UPDATE withdrawal_requests
             SET status = $1, processed_at = $2, processed_by = $3, rejection_reason = $4
             WHERE id = $5
             RETURNING {WITHDRAWAL_COLUMNS}"
        ))
        .bind(WithdrawalStatus::Rejected)
        .bind(Utc::now())
        .bind(admin_id)
        .bind(&request.reason)
        .bind(withdrawal_id)
        .fetch_one(&mut *tx)
        .await?;

        notification_service::create(
            &mut tx,
            updated.user_id,
            "Withdrawal rejected",
            &format!(
                "Your withdrawal of TZS {} was rejected and refunded: {}",
                updated.amount, request.reason
            ),
        )
        .await?;

        tx.commit().await?;

        log::info!("Admin {admin_id} rejected withdrawal {withdrawal_id}");
        Ok(updated)
    }

    async fn get_for_update(
        conn: &mut PgConnection,
        withdrawal_id: i64,
    ) -> AppResult<WithdrawalRequest> {
        sqlx::query_as::<_, WithdrawalRequest>(&format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawal_requests WHERE id = $1 FOR UPDATE"
        ))
        .bind(withdrawal_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Withdrawal request not found".to_string()))
    }

    fn ensure_transition(
        withdrawal: &WithdrawalRequest,
        next: WithdrawalStatus,
    ) -> AppResult<()> {
        if !withdrawal.status.can_transition_to(next) {
            return Err(AppError::ValidationError(
                "Withdrawal request has already been processed".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn user_requests(
        &self,
        user_id: i64,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<WithdrawalRequest>> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM withdrawal_requests WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        let items = sqlx::query_as::<_, WithdrawalRequest>(&format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawal_requests
             WHERE user_id = $1
             ORDER BY requested_at DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(params.get_limit() as i64)
        .bind(params.get_offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(PaginatedResponse::new(items, params, total))
    }

    pub async fn list(
        &self,
        query: &WithdrawalQuery,
    ) -> AppResult<PaginatedResponse<WithdrawalRequest>> {
        let params = PaginationParams::new(query.page, query.per_page);

        let mut count_builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM withdrawal_requests WHERE 1=1");
        Self::apply_filters(&mut count_builder, query);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawal_requests WHERE 1=1"
        ));
        Self::apply_filters(&mut builder, query);
        builder.push(" ORDER BY requested_at DESC LIMIT ");
        builder.push_bind(params.get_limit() as i64);
        builder.push(" OFFSET ");
        builder.push_bind(params.get_offset() as i64);

        let items: Vec<WithdrawalRequest> =
            builder.build_query_as().fetch_all(&self.pool).await?;

        Ok(PaginatedResponse::new(items, &params, total))
    }

    fn apply_filters(builder: &mut QueryBuilder<sqlx::Postgres>, query: &WithdrawalQuery) {
        if let Some(status) = query.status {
            builder.push(" AND status = ");
            builder.push_bind(status);
        }
        if let Some(user_id) = query.user_id {
            builder.push(" AND user_id = ");
            builder.push_bind(user_id);
        }
    }
}
