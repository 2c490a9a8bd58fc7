use crate::config::FraudConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    AlertQuery, AlertSeverity, AlertStatus, FraudAlert, PaginatedResponse, PaginationParams,
    UpdateAlertStatusRequest,
};
use crate::services::notification_service;
use crate::utils::similarity;
use chrono::Utc;
use regex::Regex;
use rust_decimal::Decimal;
use sqlx::{PgPool, QueryBuilder};

/// Heuristics over mobile-money references and deposit statistics. Format,
/// duplicate and near-duplicate violations reject the recharge and count as
/// fraud attempts; statistical findings only raise alerts for review.

#[derive(Debug, PartialEq)]
pub enum ReferenceViolation {
    InvalidFormat,
    Duplicate,
    NearDuplicate { similar_to: String, score: f64 },
}

impl ReferenceViolation {
    pub fn message(&self) -> String {
        match self {
            ReferenceViolation::InvalidFormat => {
                "Transaction reference does not match the expected format for this network"
                    .to_string()
            }
            ReferenceViolation::Duplicate => {
                "This transaction reference has already been used".to_string()
            }
            ReferenceViolation::NearDuplicate { score, .. } => format!(
                "Transaction reference is suspiciously similar to a previous one ({:.0}% match)",
                score * 100.0
            ),
        }
    }
}

/// Per-operator reference formats. Unknown operators fall back to a generic
/// alphanumeric shape.
fn reference_pattern(network: &str) -> &'static str {
    match network.to_ascii_lowercase().as_str() {
        "vodacom" | "mpesa" | "m-pesa" => r"^[A-Z0-9]{10}$",
        "tigo" | "mixx" => r"^[A-Z]{2,3}[0-9]{8,12}$",
        "airtel" => r"^(MP|PP)[A-Z0-9]{8,14}$",
        "halotel" | "halopesa" => r"^[0-9]{10,14}$",
        _ => r"^[A-Z0-9]{8,20}$",
    }
}

pub fn reference_format_valid(network: &str, reference: &str) -> bool {
    // Patterns are static literals; compilation cannot fail.
    Regex::new(reference_pattern(network))
        .map(|re| re.is_match(reference))
        .unwrap_or(false)
}

/// Run the reference checks against a user's prior accepted references.
pub fn check_reference(
    network: &str,
    reference: &str,
    prior: &[String],
    similarity_threshold: f64,
) -> Result<(), ReferenceViolation> {
    if !reference_format_valid(network, reference) {
        return Err(ReferenceViolation::InvalidFormat);
    }

    for old in prior {
        if old == reference {
            return Err(ReferenceViolation::Duplicate);
        }
    }

    for old in prior {
        let score = similarity(reference, old);
        if score > similarity_threshold {
            return Err(ReferenceViolation::NearDuplicate {
                similar_to: old.clone(),
                score,
            });
        }
    }

    Ok(())
}

#[derive(Debug, PartialEq)]
pub enum StatFinding {
    LargeDeposit,
    HighVelocity { deposits_in_24h: i64 },
    AverageDeviation { average: Decimal },
}

/// Statistical anomaly checks: these flag, they never block.
pub fn statistical_findings(
    amount: Decimal,
    deposits_in_last_24h: i64,
    recent_completed: &[Decimal],
    config: &FraudConfig,
) -> Vec<StatFinding> {
    let mut findings = Vec::new();

    if amount > config.large_deposit_threshold {
        findings.push(StatFinding::LargeDeposit);
    }

    // Counting the submission being checked.
    if deposits_in_last_24h + 1 > config.max_deposits_per_day {
        findings.push(StatFinding::HighVelocity {
            deposits_in_24h: deposits_in_last_24h + 1,
        });
    }

    if !recent_completed.is_empty() {
        let sum: Decimal = recent_completed.iter().copied().sum();
        let average = sum / Decimal::from(recent_completed.len() as i64);
        if average > Decimal::ZERO && amount > average * config.average_multiplier {
            findings.push(StatFinding::AverageDeviation { average });
        }
    }

    findings
}

#[derive(Clone)]
pub struct FraudService {
    pool: PgPool,
    config: FraudConfig,
}

impl FraudService {
    pub fn new(pool: PgPool, config: FraudConfig) -> Self {
        Self { pool, config }
    }

    /// Gate a recharge submission. A violation logs a fraud attempt (three
    /// attempts block the account) and rejects the request; statistical
    /// findings create alerts and let it through.
    pub async fn screen_recharge(
        &self,
        user_id: i64,
        network: &str,
        reference: &str,
        amount: Decimal,
    ) -> AppResult<()> {
        let prior: Vec<String> =
            sqlx::query_scalar("SELECT reference FROM payment_references WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        if let Err(violation) =
            check_reference(network, reference, &prior, self.config.similarity_threshold)
        {
            self.record_attempt(user_id, &violation).await?;
            return Err(AppError::FraudError(violation.message()));
        }

        let deposits_in_last_24h: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions
             WHERE user_id = $1 AND kind = 'recharge'
               AND created_at > NOW() - INTERVAL '24 hours'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let recent_completed: Vec<Decimal> = sqlx::query_scalar(
            "SELECT amount FROM transactions
             WHERE user_id = $1 AND kind = 'recharge' AND status = 'completed'
             ORDER BY created_at DESC
             LIMIT 10",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let findings =
            statistical_findings(amount, deposits_in_last_24h, &recent_completed, &self.config);
        for finding in findings {
            self.raise_alert(user_id, amount, &finding).await?;
        }

        Ok(())
    }

    async fn raise_alert(
        &self,
        user_id: i64,
        amount: Decimal,
        finding: &StatFinding,
    ) -> AppResult<()> {
        let (alert_type, severity, description) = match finding {
            StatFinding::LargeDeposit => (
                "large_deposit",
                AlertSeverity::High,
                format!(
                    "Deposit of TZS {amount} exceeds the {} threshold",
                    self.config.large_deposit_threshold
                ),
            ),
            StatFinding::HighVelocity { deposits_in_24h } => (
                "high_velocity",
                AlertSeverity::Medium,
                format!("{deposits_in_24h} deposits within 24 hours"),
            ),
            StatFinding::AverageDeviation { average } => (
                "average_deviation",
                AlertSeverity::Medium,
                format!(
                    "Deposit of TZS {amount} is more than {}x the recent average of TZS {}",
                    self.config.average_multiplier,
                    average.round_dp(2)
                ),
            ),
        };

        sqlx::query(
            "INSERT INTO fraud_alerts (user_id, alert_type, severity, description)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id)
        .bind(alert_type)
        .bind(severity)
        .bind(&description)
        .execute(&self.pool)
        .await?;

        log::warn!("Fraud alert ({alert_type}) for user {user_id}: {description}");
        Ok(())
    }

    /// Increment the user's fraud attempt counter; the configured attempt
    /// count blocks the account.
    pub(crate) async fn record_attempt(
        &self,
        user_id: i64,
        violation: &ReferenceViolation,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let attempts: i64 = sqlx::query_scalar(
            "UPDATE users SET fraud_attempts = fraud_attempts + 1, updated_at = NOW()
             WHERE id = $1
             RETURNING fraud_attempts::BIGINT",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        log::warn!(
            "Fraud attempt {attempts} for user {user_id}: {}",
            violation.message()
        );

        if attempts >= self.config.auto_block_attempts as i64 {
            sqlx::query("UPDATE users SET is_blocked = TRUE, updated_at = NOW() WHERE id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                "INSERT INTO fraud_alerts (user_id, alert_type, severity, description)
                 VALUES ($1, 'auto_block', $2, $3)",
            )
            .bind(user_id)
            .bind(AlertSeverity::High)
            .bind(format!(
                "Account blocked automatically after {attempts} fraud attempts"
            ))
            .execute(&mut *tx)
            .await?;

            notification_service::create(
                &mut tx,
                user_id,
                "Account blocked",
                "Your account was blocked after repeated suspicious transactions. Contact support.",
            )
            .await?;

            log::warn!("User {user_id} auto-blocked after {attempts} fraud attempts");
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn list_alerts(
        &self,
        query: &AlertQuery,
    ) -> AppResult<PaginatedResponse<FraudAlert>> {
        let params = PaginationParams::new(query.page, query.per_page);

        let mut count_builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM fraud_alerts WHERE 1=1");
        Self::apply_filters(&mut count_builder, query);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT id, user_id, alert_type, severity, description, status, created_at, updated_at
             FROM fraud_alerts WHERE 1=1",
        );
        Self::apply_filters(&mut builder, query);
        builder.push(" ORDER BY created_at DESC LIMIT ");
        builder.push_bind(params.get_limit() as i64);
        builder.push(" OFFSET ");
        builder.push_bind(params.get_offset() as i64);

        let items: Vec<FraudAlert> = builder.build_query_as().fetch_all(&self.pool).await?;

        Ok(PaginatedResponse::new(items, &params, total))
    }

    fn apply_filters(builder: &mut QueryBuilder<sqlx::Postgres>, query: &AlertQuery) {
        if let Some(status) = query.status {
            builder.push(" AND status = ");
            builder.push_bind(status);
        }
        if let Some(user_id) = query.user_id {
            builder.push(" AND user_id = ");
            builder.push_bind(user_id);
        }
    }

    pub async fn update_alert_status(
        &self,
        alert_id: i64,
        request: UpdateAlertStatusRequest,
    ) -> AppResult<FraudAlert> {
        let current: Option<AlertStatus> =
            sqlx::query_scalar("SELECT status FROM fraud_alerts WHERE id = $1")
                .bind(alert_id)
                .fetch_optional(&self.pool)
                .await?;

        let current =
            current.ok_or_else(|| AppError::NotFound("Fraud alert not found".to_string()))?;

        if !current.can_transition_to(request.status) {
            return Err(AppError::ValidationError(
                "Invalid alert status transition".to_string(),
            ));
        }

        let alert = sqlx::query_as::<_, FraudAlert>(
            "UPDATE fraud_alerts SET status = $1, updated_at = $2 WHERE id = $3
             RETURNING id, user_id, alert_type, severity, description, status, created_at, updated_at",
        )
        .bind(request.status)
        .bind(Utc::now())
        .bind(alert_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reference_formats_per_network() {
        assert!(reference_format_valid("Vodacom", "AB12CD34EF"));
        assert!(!reference_format_valid("Vodacom", "ab12cd34ef")); // lowercase
        assert!(!reference_format_valid("Vodacom", "AB12CD34E")); // 9 chars

        assert!(reference_format_valid("Tigo", "TG123456789"));
        assert!(!reference_format_valid("Tigo", "1234567890"));

        assert!(reference_format_valid("Airtel", "MP12345678"));
        assert!(reference_format_valid("Airtel", "PP12AB34CD56"));
        assert!(!reference_format_valid("Airtel", "XX12345678"));

        assert!(reference_format_valid("Halotel", "01234567890"));
        assert!(!reference_format_valid("Halotel", "ABC1234567"));

        // Unknown networks get the generic shape.
        assert!(reference_format_valid("other", "ABCD1234"));
        assert!(!reference_format_valid("other", "abc"));
    }

    #[test]
    fn test_duplicate_reference_rejected() {
        let prior = vec!["AB12CD34EF".to_string()];
        let result = check_reference("Vodacom", "AB12CD34EF", &prior, 0.8);
        assert_eq!(result, Err(ReferenceViolation::Duplicate));
    }

    #[test]
    fn test_near_duplicate_rejected() {
        // One character changed on a 10-char reference: similarity 0.9.
        let prior = vec!["AB12CD34EF".to_string()];
        let result = check_reference("Vodacom", "AB12CD34EG", &prior, 0.8);
        match result {
            Err(ReferenceViolation::NearDuplicate { similar_to, score }) => {
                assert_eq!(similar_to, "AB12CD34EF");
                assert!(score > 0.8);
            }
            other => panic!("expected near-duplicate, got {other:?}"),
        }
    }

    #[test]
    fn test_distinct_reference_accepted() {
        let prior = vec!["AB12CD34EF".to_string()];
        assert!(check_reference("Vodacom", "QJ72KD91XR", &prior, 0.8).is_ok());
    }

    #[test]
    fn test_no_history_accepts_valid_reference() {
        assert!(check_reference("Vodacom", "AB12CD34EF", &[], 0.8).is_ok());
    }

    #[test]
    fn test_large_deposit_flagged() {
        let config = FraudConfig::default();
        let findings = statistical_findings(dec!(1_500_000), 0, &[], &config);
        assert_eq!(findings, vec![StatFinding::LargeDeposit]);
    }

    #[test]
    fn test_velocity_flagged() {
        let config = FraudConfig::default();
        // 5 prior deposits in 24h; this submission is the 6th.
        let findings = statistical_findings(dec!(1000), 5, &[], &config);
        assert_eq!(
            findings,
            vec![StatFinding::HighVelocity { deposits_in_24h: 6 }]
        );

        let quiet = statistical_findings(dec!(1000), 3, &[], &config);
        assert!(quiet.is_empty());
    }

    #[test]
    fn test_average_deviation_flagged() {
        let config = FraudConfig::default();
        let recent = vec![dec!(10_000), dec!(20_000), dec!(30_000)]; // avg 20k
        let findings = statistical_findings(dec!(150_000), 0, &recent, &config);
        assert_eq!(
            findings,
            vec![StatFinding::AverageDeviation {
                average: dec!(20_000)
            }]
        );

        let normal = statistical_findings(dec!(50_000), 0, &recent, &config);
        assert!(normal.is_empty());
    }

    #[test]
    fn test_no_findings_for_ordinary_deposit() {
        let config = FraudConfig::default();
        assert!(statistical_findings(dec!(50_000), 1, &[dec!(40_000)], &config).is_empty());
    }
}
