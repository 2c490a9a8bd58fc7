use crate::error::{AppError, AppResult};
use crate::models::{
    PaginatedResponse, PaginationParams, Transaction, TransactionKind, TransactionQuery,
    TransactionResponse, TransactionStatus,
};
use crate::utils::csv_escape;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, QueryBuilder};

/// Every balance mutation in the system goes through the posting functions
/// in this module, always on a connection owned by the caller's database
/// transaction. Amounts are positive magnitudes; direction comes from the
/// transaction kind.

const TRANSACTION_COLUMNS: &str =
    "id, user_id, kind, amount, description, status, reference, created_at, updated_at";

pub async fn get_transaction(conn: &mut PgConnection, id: i64) -> AppResult<Transaction> {
    sqlx::query_as::<_, Transaction>(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))
}

/// Post a credit-kind transaction. The balance is increased only when the
/// row is already completed (accrual, commission); pending credits
/// (recharge awaiting approval) do not touch the balance.
pub async fn post_credit(
    conn: &mut PgConnection,
    user_id: i64,
    kind: TransactionKind,
    amount: Decimal,
    description: &str,
    status: TransactionStatus,
    reference: Option<&str>,
) -> AppResult<Transaction> {
    if !kind.is_credit() {
        return Err(AppError::InternalError(format!(
            "post_credit called with debit kind {kind}"
        )));
    }
    if amount <= Decimal::ZERO {
        return Err(AppError::ValidationError(
            "Amount must be positive".to_string(),
        ));
    }

    let transaction = insert_transaction(conn, user_id, kind, amount, description, status, reference)
        .await?;

    if status == TransactionStatus::Completed {
        apply_balance_delta(conn, user_id, amount).await?;
    }

    Ok(transaction)
}

/// Post a debit-kind transaction. Debits take effect at posting time
/// (optimistic deduction for withdrawals, immediate spend for purchases);
/// the balance is checked under a row lock so it can never go negative.
pub async fn post_debit(
    conn: &mut PgConnection,
    user_id: i64,
    kind: TransactionKind,
    amount: Decimal,
    description: &str,
    status: TransactionStatus,
) -> AppResult<Transaction> {
    if kind.is_credit() {
        return Err(AppError::InternalError(format!(
            "post_debit called with credit kind {kind}"
        )));
    }
    if amount <= Decimal::ZERO {
        return Err(AppError::ValidationError(
            "Amount must be positive".to_string(),
        ));
    }

    let balance: Option<Decimal> =
        sqlx::query_scalar("SELECT balance FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
    let balance = balance.ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    ensure_sufficient(balance, amount)?;

    sqlx::query("UPDATE users SET balance = balance - $1, updated_at = NOW() WHERE id = $2")
        .bind(amount)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    insert_transaction(conn, user_id, kind, amount, description, status, None).await
}

/// The debit guard: the row is locked when this runs, so passing it means
/// the update cannot take the balance negative.
fn ensure_sufficient(balance: Decimal, amount: Decimal) -> AppResult<()> {
    if balance < amount {
        return Err(AppError::InsufficientBalance);
    }
    Ok(())
}

/// Balance effect of completing a pending transaction. Credits are applied
/// now; debits were already deducted at posting.
fn completion_delta(transaction: &Transaction) -> Option<Decimal> {
    if transaction.kind.is_credit() {
        Some(transaction.amount)
    } else {
        None
    }
}

/// Balance effect of failing or rejecting a pending transaction. A refund
/// only makes sense for debit kinds, and returns exactly the deducted
/// amount.
fn refund_delta(transaction: &Transaction, refund: bool) -> AppResult<Option<Decimal>> {
    if !refund {
        return Ok(None);
    }
    if transaction.kind.is_credit() {
        return Err(AppError::InternalError(
            "Refund requested for a credit transaction".to_string(),
        ));
    }
    Ok(Some(transaction.amount))
}

/// Transition a pending transaction to completed. Credit kinds receive
/// their balance effect here; debit kinds were already deducted at posting.
pub async fn complete(conn: &mut PgConnection, id: i64) -> AppResult<Transaction> {
    let transaction = get_transaction(conn, id).await?;

    if !transaction
        .status
        .can_transition_to(TransactionStatus::Completed)
    {
        return Err(AppError::ValidationError(format!(
            "Cannot complete a {} transaction",
            transaction.status
        )));
    }

    set_status(conn, id, TransactionStatus::Completed).await?;

    if let Some(delta) = completion_delta(&transaction) {
        apply_balance_delta(conn, transaction.user_id, delta).await?;
    }

    get_transaction(conn, id).await
}

/// Transition a pending transaction to failed or rejected. When `refund`
/// is set (withdrawal rejection) the originally-deducted amount is returned
/// to the balance, leaving the account net zero for the request.
pub async fn fail(
    conn: &mut PgConnection,
    id: i64,
    status: TransactionStatus,
    refund: bool,
) -> AppResult<Transaction> {
    if !matches!(
        status,
        TransactionStatus::Failed | TransactionStatus::Rejected
    ) {
        return Err(AppError::InternalError(format!(
            "fail called with status {status}"
        )));
    }

    let transaction = get_transaction(conn, id).await?;

    if !transaction.status.can_transition_to(status) {
        return Err(AppError::ValidationError(format!(
            "Cannot transition a {} transaction to {status}",
            transaction.status
        )));
    }

    set_status(conn, id, status).await?;

    if let Some(delta) = refund_delta(&transaction, refund)? {
        apply_balance_delta(conn, transaction.user_id, delta).await?;
    }

    get_transaction(conn, id).await
}

async fn insert_transaction(
    conn: &mut PgConnection,
    user_id: i64,
    kind: TransactionKind,
    amount: Decimal,
    description: &str,
    status: TransactionStatus,
    reference: Option<&str>,
) -> AppResult<Transaction> {
    let transaction = sqlx::query_as::<_, Transaction>(&format!(
        "INSERT INTO transactions (user_id, kind, amount, description, status, reference)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {TRANSACTION_COLUMNS}"
    ))
    .bind(user_id)
    .bind(kind)
    .bind(amount)
    .bind(description)
    .bind(status)
    .bind(reference)
    .fetch_one(&mut *conn)
    .await?;

    Ok(transaction)
}

async fn set_status(
    conn: &mut PgConnection,
    id: i64,
    status: TransactionStatus,
) -> AppResult<()> {
    sqlx::query("UPDATE transactions SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(status)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn apply_balance_delta(
    conn: &mut PgConnection,
    user_id: i64,
    delta: Decimal,
) -> AppResult<()> {
    let result = sqlx::query("UPDATE users SET balance = balance + $1, updated_at = NOW() WHERE id = $2")
        .bind(delta)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    Ok(())
}

/// Read side of the ledger: history, admin listing, CSV export.
#[derive(Clone)]
pub struct LedgerService {
    pool: PgPool,
}

impl LedgerService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn user_history(
        &self,
        user_id: i64,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<TransactionResponse>> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        let records = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions
             WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(params.get_limit() as i64)
        .bind(params.get_offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let items: Vec<TransactionResponse> =
            records.into_iter().map(TransactionResponse::from).collect();

        Ok(PaginatedResponse::new(items, params, total))
    }

    pub async fn list(
        &self,
        query: &TransactionQuery,
    ) -> AppResult<PaginatedResponse<TransactionResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);

        let mut count_builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM transactions WHERE 1=1");
        Self::apply_filters(&mut count_builder, query);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE 1=1"
        ));
        Self::apply_filters(&mut builder, query);
        builder.push(" ORDER BY created_at DESC LIMIT ");
        builder.push_bind(params.get_limit() as i64);
        builder.push(" OFFSET ");
        builder.push_bind(params.get_offset() as i64);

        let records: Vec<Transaction> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        let items: Vec<TransactionResponse> =
            records.into_iter().map(TransactionResponse::from).collect();

        Ok(PaginatedResponse::new(items, &params, total))
    }

    fn apply_filters(builder: &mut QueryBuilder<sqlx::Postgres>, query: &TransactionQuery) {
        if let Some(kind) = query.kind {
            builder.push(" AND kind = ");
            builder.push_bind(kind);
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ");
            builder.push_bind(status);
        }
        if let Some(user_id) = query.user_id {
            builder.push(" AND user_id = ");
            builder.push_bind(user_id);
        }
    }

    /// Export matching transactions as CSV for the back office.
    pub async fn export_csv(&self, query: &TransactionQuery) -> AppResult<String> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE 1=1"
        ));
        Self::apply_filters(&mut builder, query);
        builder.push(" ORDER BY created_at DESC");

        let records: Vec<Transaction> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        let mut out = String::from("id,user_id,kind,amount,signed_amount,status,description,reference,created_at\n");
        for t in records {
            let signed = t.signed_amount();
            out.push_str(&format!(
                "{},{},{},{},{},{},{},{},{}\n",
                t.id,
                t.user_id,
                t.kind,
                t.amount,
                signed,
                t.status,
                csv_escape(&t.description),
                csv_escape(t.reference.as_deref().unwrap_or("")),
                t.created_at.to_rfc3339(),
            ));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn transaction(kind: TransactionKind, amount: Decimal) -> Transaction {
        Transaction {
            id: 1,
            user_id: 1,
            kind,
            amount,
            description: String::new(),
            status: TransactionStatus::Pending,
            reference: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_debit_guard_blocks_overdraw() {
        assert!(ensure_sufficient(dec!(100), dec!(100)).is_ok());
        assert!(ensure_sufficient(dec!(100), dec!(99.99)).is_ok());
        assert!(matches!(
            ensure_sufficient(dec!(100), dec!(100.01)),
            Err(AppError::InsufficientBalance)
        ));
        assert!(matches!(
            ensure_sufficient(Decimal::ZERO, dec!(1)),
            Err(AppError::InsufficientBalance)
        ));
    }

    #[test]
    fn test_rejected_withdrawal_is_net_zero() {
        // The deduction at posting and the refund on rejection cancel out.
        let withdrawal = transaction(TransactionKind::Withdrawal, dec!(500));
        let refund = refund_delta(&withdrawal, true).unwrap().unwrap();
        assert_eq!(withdrawal.signed_amount() + refund, Decimal::ZERO);
    }

    #[test]
    fn test_failure_without_refund_leaves_balance_alone() {
        let withdrawal = transaction(TransactionKind::Withdrawal, dec!(500));
        assert_eq!(refund_delta(&withdrawal, false).unwrap(), None);
    }

    #[test]
    fn test_refund_rejected_for_credit_kinds() {
        let recharge = transaction(TransactionKind::Recharge, dec!(500));
        assert!(refund_delta(&recharge, true).is_err());
    }

    #[test]
    fn test_completion_credits_only_credit_kinds() {
        // A completed recharge gains its amount; a completed withdrawal
        // must not be deducted a second time.
        let recharge = transaction(TransactionKind::Recharge, dec!(250));
        assert_eq!(completion_delta(&recharge), Some(dec!(250)));

        let withdrawal = transaction(TransactionKind::Withdrawal, dec!(250));
        assert_eq!(completion_delta(&withdrawal), None);
    }
}
