use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "withdrawal_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

impl WithdrawalStatus {
    /// Valid lifecycle: pending -> approved | rejected.
    pub fn can_transition_to(&self, next: WithdrawalStatus) -> bool {
        matches!(self, WithdrawalStatus::Pending)
            && matches!(next, WithdrawalStatus::Approved | WithdrawalStatus::Rejected)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct WithdrawalRequest {
    pub id: i64,
    pub user_id: i64,
    /// The pending withdrawal row in the transactions ledger.
    pub transaction_id: i64,
    pub amount: Decimal,
    pub method: String,
    pub details: serde_json::Value,
    pub status: WithdrawalStatus,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<i64>,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateWithdrawalRequest {
    pub amount: Decimal,
    #[schema(example = "mobile_money")]
    pub method: String,
    /// Method-specific payload (e.g. receiving phone number and network).
    #[serde(default)]
    pub details: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RejectWithdrawalRequest {
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, IntoParams)]
pub struct WithdrawalQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<WithdrawalStatus>,
    pub user_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_withdrawal_transitions() {
        use WithdrawalStatus::*;

        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Approved.can_transition_to(Pending));
    }
}
