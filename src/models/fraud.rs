use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "alert_severity", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "alert_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Pending,
    Investigating,
    Resolved,
    FalsePositive,
}

impl AlertStatus {
    /// pending -> investigating -> resolved | false_positive; an alert can
    /// also be closed directly from pending.
    pub fn can_transition_to(&self, next: AlertStatus) -> bool {
        match self {
            AlertStatus::Pending => !matches!(next, AlertStatus::Pending),
            AlertStatus::Investigating => {
                matches!(next, AlertStatus::Resolved | AlertStatus::FalsePositive)
            }
            AlertStatus::Resolved | AlertStatus::FalsePositive => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct FraudAlert {
    pub id: i64,
    pub user_id: i64,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub description: String,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateAlertStatusRequest {
    pub status: AlertStatus,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, IntoParams)]
pub struct AlertQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<AlertStatus>,
    pub user_id: Option<i64>,
}

/// An already-accepted external mobile-money reference; the corpus the
/// duplicate and near-duplicate checks run against.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentReference {
    pub id: i64,
    pub user_id: i64,
    pub reference: String,
    pub network: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_transitions() {
        use AlertStatus::*;

        assert!(Pending.can_transition_to(Investigating));
        assert!(Pending.can_transition_to(Resolved));
        assert!(Pending.can_transition_to(FalsePositive));
        assert!(Investigating.can_transition_to(Resolved));
        assert!(Investigating.can_transition_to(FalsePositive));
        assert!(!Investigating.can_transition_to(Pending));
        assert!(!Resolved.can_transition_to(Investigating));
        assert!(!FalsePositive.can_transition_to(Pending));
    }
}
