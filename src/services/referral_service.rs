use crate::config::ReferralConfig;
use crate::error::AppResult;
use crate::models::{
    ReferralLevel, TeamLevelSummary, TeamMember, TeamResponse, TransactionKind, TransactionStatus,
};
use crate::services::ledger_service;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};

/// Three-level referral commissions. Level B is the user's direct
/// referrals, C their referrals, D one level further. The commission base
/// for a member is the member's completed recharge total from the ledger;
/// the outstanding amount is what the full tree earns minus what was
/// already posted as invite_commission transactions.

pub fn rate_for_level(level: ReferralLevel, config: &ReferralConfig) -> Decimal {
    match level {
        ReferralLevel::B => config.level_b_rate,
        ReferralLevel::C => config.level_c_rate,
        ReferralLevel::D => config.level_d_rate,
    }
}

/// Outstanding commission, clamped so an over-posted ledger can never
/// produce a negative credit.
pub fn outstanding_commission(total: Decimal, already_posted: Decimal) -> Decimal {
    (total - already_posted).max(Decimal::ZERO).round_dp(2)
}

#[derive(Debug, FromRow)]
struct DownlineRow {
    id: i64,
    name: String,
    referral_code: String,
    created_at: DateTime<Utc>,
    recharge_total: Decimal,
}

#[derive(Clone)]
pub struct ReferralService {
    pool: PgPool,
    config: ReferralConfig,
}

impl ReferralService {
    pub fn new(pool: PgPool, config: ReferralConfig) -> Self {
        Self { pool, config }
    }

    /// Build the team view and settle any outstanding commission. This is
    /// the commission trigger: commissions are posted when the referring
    /// user looks at their team.
    pub async fn team_view(&self, user_id: i64) -> AppResult<TeamResponse> {
        let referral_code: Option<String> =
            sqlx::query_scalar("SELECT referral_code FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        let referral_code = referral_code
            .ok_or_else(|| crate::error::AppError::NotFound("User not found".to_string()))?;

        let mut levels = Vec::with_capacity(3);
        let mut parent_codes = vec![referral_code];
        let mut total_commission = Decimal::ZERO;

        for level in [ReferralLevel::B, ReferralLevel::C, ReferralLevel::D] {
            let rows = self.downline_of(&parent_codes).await?;
            let rate = rate_for_level(level, &self.config);

            let mut commission = Decimal::ZERO;
            let mut members = Vec::with_capacity(rows.len());
            parent_codes = rows.iter().map(|r| r.referral_code.clone()).collect();

            for row in rows {
                let member_commission = (row.recharge_total * rate).round_dp(2);
                commission += member_commission;
                members.push(TeamMember {
                    user_id: row.id,
                    name: row.name,
                    joined_at: row.created_at,
                    recharge_total: row.recharge_total,
                    commission: member_commission,
                });
            }

            total_commission += commission;
            levels.push(TeamLevelSummary {
                level,
                rate,
                member_count: members.len(),
                commission,
                members,
            });
        }

        let (already_credited, credited_now) = self.settle(user_id, total_commission).await?;

        Ok(TeamResponse {
            levels,
            total_commission: total_commission.round_dp(2),
            already_credited,
            credited_now,
        })
    }

    async fn downline_of(&self, parent_codes: &[String]) -> AppResult<Vec<DownlineRow>> {
        if parent_codes.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, DownlineRow>(
            "SELECT u.id, u.name, u.referral_code, u.created_at,
                    COALESCE((
                        SELECT SUM(t.amount) FROM transactions t
                        WHERE t.user_id = u.id
                          AND t.kind = 'recharge'
                          AND t.status = 'completed'
                    ), 0) AS recharge_total
             FROM users u
             WHERE u.referred_by = ANY($1)
             ORDER BY u.created_at DESC",
        )
        .bind(parent_codes)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Post the outstanding commission. The posted total is read under a
    /// lock on the user row in the same transaction as the credit, so two
    /// concurrent team views cannot both observe the old total and pay
    /// the difference twice. Returns (already credited, credited now).
    async fn settle(
        &self,
        user_id: i64,
        total_commission: Decimal,
    ) -> AppResult<(Decimal, Decimal)> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let already_credited: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM transactions
             WHERE user_id = $1 AND kind = 'invite_commission' AND status = 'completed'",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let due = outstanding_commission(total_commission, already_credited);
        if due <= Decimal::ZERO {
            tx.commit().await?;
            return Ok((already_credited, Decimal::ZERO));
        }

        ledger_service::post_credit(
            &mut tx,
            user_id,
            TransactionKind::InviteCommission,
            due,
            "Referral commission (levels B/C/D)",
            TransactionStatus::Completed,
            None,
        )
        .await?;
        tx.commit().await?;

        log::info!("Credited {due} TZS referral commission to user {user_id}");
        Ok((already_credited, due))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_level_rates() {
        let config = ReferralConfig::default();
        assert_eq!(rate_for_level(ReferralLevel::B, &config), dec!(0.35));
        assert_eq!(rate_for_level(ReferralLevel::C, &config), dec!(0.02));
        assert_eq!(rate_for_level(ReferralLevel::D, &config), dec!(0.01));
    }

    #[test]
    fn test_outstanding_commission_diff() {
        // Credited = total earned minus previously posted.
        assert_eq!(
            outstanding_commission(dec!(3500), dec!(1000)),
            dec!(2500)
        );
        assert_eq!(outstanding_commission(dec!(3500), dec!(0)), dec!(3500));
    }

    #[test]
    fn test_outstanding_commission_never_negative() {
        assert_eq!(
            outstanding_commission(dec!(1000), dec!(1500)),
            Decimal::ZERO
        );
        assert_eq!(
            outstanding_commission(Decimal::ZERO, Decimal::ZERO),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_settlement_idempotent_once_posted() {
        // First settlement of a 3500 total posts the full amount; any
        // later pass that reads the updated posted sum finds nothing due.
        let first = outstanding_commission(dec!(3500), dec!(0));
        assert_eq!(first, dec!(3500));
        assert_eq!(outstanding_commission(dec!(3500), first), Decimal::ZERO);
    }

    #[test]
    fn test_commission_example() {
        // Direct referral with 10,000 completed recharges at 35%.
        let config = ReferralConfig::default();
        let rate = rate_for_level(ReferralLevel::B, &config);
        assert_eq!((dec!(10_000) * rate).round_dp(2), dec!(3500));
    }
}
