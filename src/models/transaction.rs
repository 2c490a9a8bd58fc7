use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "transaction_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Recharge,
    Purchase,
    Withdrawal,
    Return,
    InviteCommission,
    Referral,
    LuckyDraw,
}

impl TransactionKind {
    /// Whether a completed transaction of this kind adds to the balance.
    /// Amounts are stored as positive magnitudes; this is the only
    /// place the sign convention lives.
    pub fn is_credit(&self) -> bool {
        !matches!(self, TransactionKind::Purchase | TransactionKind::Withdrawal)
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionKind::Recharge => "recharge",
            TransactionKind::Purchase => "purchase",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::Return => "return",
            TransactionKind::InviteCommission => "invite_commission",
            TransactionKind::Referral => "referral",
            TransactionKind::LuckyDraw => "lucky_draw",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "transaction_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Rejected,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// Valid lifecycle: pending -> completed | failed | rejected.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(self, TransactionStatus::Pending) && next.is_terminal()
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub description: String,
    pub status: TransactionStatus,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Amount with the direction applied: negative for debits.
    pub fn signed_amount(&self) -> Decimal {
        if self.kind.is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    pub id: i64,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub signed_amount: Decimal,
    pub description: String,
    pub status: TransactionStatus,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionResponse {
    fn from(t: Transaction) -> Self {
        let signed_amount = t.signed_amount();
        Self {
            id: t.id,
            kind: t.kind,
            amount: t.amount,
            signed_amount,
            description: t.description,
            status: t.status,
            reference: t.reference,
            created_at: t.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, IntoParams)]
pub struct TransactionQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub kind: Option<TransactionKind>,
    pub status: Option<TransactionStatus>,
    pub user_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample(kind: TransactionKind, amount: Decimal) -> Transaction {
        Transaction {
            id: 1,
            user_id: 1,
            kind,
            amount,
            description: String::new(),
            status: TransactionStatus::Completed,
            reference: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_sign_convention() {
        assert!(TransactionKind::Recharge.is_credit());
        assert!(TransactionKind::Return.is_credit());
        assert!(TransactionKind::InviteCommission.is_credit());
        assert!(TransactionKind::LuckyDraw.is_credit());
        assert!(!TransactionKind::Purchase.is_credit());
        assert!(!TransactionKind::Withdrawal.is_credit());

        let credit = sample(TransactionKind::Return, dec!(500));
        assert_eq!(credit.signed_amount(), dec!(500));

        let debit = sample(TransactionKind::Withdrawal, dec!(500));
        assert_eq!(debit.signed_amount(), dec!(-500));
    }

    #[test]
    fn test_status_transitions() {
        use TransactionStatus::*;

        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Failed));
        assert!(Pending.can_transition_to(Rejected));
        // Terminal states are immutable.
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Rejected.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
    }
}
