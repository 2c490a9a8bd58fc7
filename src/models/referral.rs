use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The three downline tiers of the referral tree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReferralLevel {
    B,
    C,
    D,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeamMember {
    pub user_id: i64,
    pub name: String,
    pub joined_at: DateTime<Utc>,
    /// Sum of the member's completed recharge transactions.
    pub recharge_total: Decimal,
    pub commission: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TeamLevelSummary {
    pub level: ReferralLevel,
    pub rate: Decimal,
    pub member_count: usize,
    pub commission: Decimal,
    pub members: Vec<TeamMember>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TeamResponse {
    pub levels: Vec<TeamLevelSummary>,
    pub total_commission: Decimal,
    /// invite_commission amounts already posted to the ledger.
    pub already_credited: Decimal,
    /// Amount credited by this request (outstanding diff, clamped >= 0).
    pub credited_now: Decimal,
}
