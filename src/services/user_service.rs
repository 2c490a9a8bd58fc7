use crate::error::{AppError, AppResult};
use crate::models::{
    AdminUpdateUserRequest, ChangePasswordRequest, PaginatedResponse, PaginationParams,
    UpdateUserRequest, User, UserQuery, UserResponse, UserRole, UserStatistics,
};
use crate::services::notification_service;
use crate::utils::{csv_escape, hash_password, validate_password, verify_password};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgPool, QueryBuilder};
use utoipa::ToSchema;

const USER_COLUMNS: &str = "id, name, email, phone, password_hash, network, balance, role, \
     referral_code, referred_by, is_active, is_blocked, fraud_attempts, created_at, updated_at";

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_users: i64,
    pub blocked_users: i64,
    pub total_balance: Decimal,
    pub pending_recharges: i64,
    pub pending_withdrawals: i64,
    pub open_fraud_alerts: i64,
}

#[derive(Clone)]
pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_user(&self, user_id: i64) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn get_profile(&self, user_id: i64) -> AppResult<(UserResponse, UserStatistics)> {
        let user = self.get_user(user_id).await?;
        let statistics = self.get_statistics(user_id).await?;
        Ok((UserResponse::from(user), statistics))
    }

    async fn get_statistics(&self, user_id: i64) -> AppResult<UserStatistics> {
        let sums: Vec<(String, Decimal)> = sqlx::query_as(
            "SELECT kind::TEXT, COALESCE(SUM(amount), 0)
             FROM transactions
             WHERE user_id = $1 AND status = 'completed'
             GROUP BY kind",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let sum_for = |kind: &str| {
            sums.iter()
                .find(|(k, _)| k == kind)
                .map(|(_, v)| *v)
                .unwrap_or(Decimal::ZERO)
        };

        let active_purchases: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM purchases WHERE user_id = $1 AND is_active = TRUE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let total_referrals: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users
             WHERE referred_by = (SELECT referral_code FROM users WHERE id = $1)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(UserStatistics {
            total_recharged: sum_for("recharge"),
            total_withdrawn: sum_for("withdrawal"),
            total_returns: sum_for("return"),
            total_commission: sum_for("invite_commission"),
            active_purchases,
            total_referrals,
        })
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        request: UpdateUserRequest,
    ) -> AppResult<UserResponse> {
        if let Some(name) = &request.name {
            if name.trim().len() < 2 || name.trim().len() > 60 {
                return Err(AppError::ValidationError(
                    "Name must be between 2 and 60 characters".to_string(),
                ));
            }
        }
        if request.name.is_none() && request.phone.is_none() && request.network.is_none() {
            return Err(AppError::ValidationError("No fields to update".to_string()));
        }

        let current = self.get_user(user_id).await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET name = $1, phone = $2, network = $3, updated_at = NOW()
             WHERE id = $4
             RETURNING {USER_COLUMNS}"
        ))
        .bind(request.name.map(|n| n.trim().to_string()).unwrap_or(current.name))
        .bind(request.phone.unwrap_or(current.phone))
        .bind(request.network.unwrap_or(current.network))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(UserResponse::from(user))
    }

    pub async fn change_password(
        &self,
        user_id: i64,
        request: ChangePasswordRequest,
    ) -> AppResult<()> {
        let user = self.get_user(user_id).await?;

        if !verify_password(&request.current_password, &user.password_hash)? {
            return Err(AppError::AuthError(
                "Current password is incorrect".to_string(),
            ));
        }
        validate_password(&request.new_password)?;

        let password_hash = hash_password(&request.new_password)?;
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(&password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn list(&self, query: &UserQuery) -> AppResult<PaginatedResponse<UserResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);

        let mut count_builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM users WHERE 1=1");
        Self::apply_filters(&mut count_builder, query);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE 1=1"));
        Self::apply_filters(&mut builder, query);
        builder.push(" ORDER BY created_at DESC LIMIT ");
        builder.push_bind(params.get_limit() as i64);
        builder.push(" OFFSET ");
        builder.push_bind(params.get_offset() as i64);

        let users: Vec<User> = builder.build_query_as().fetch_all(&self.pool).await?;
        let items: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();

        Ok(PaginatedResponse::new(items, &params, total))
    }

    fn apply_filters(builder: &mut QueryBuilder<sqlx::Postgres>, query: &UserQuery) {
        if let Some(search) = &query.search {
            let pattern = format!("%{}%", search.trim());
            builder.push(" AND (name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR email ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR phone ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }
        if let Some(is_blocked) = query.is_blocked {
            builder.push(" AND is_blocked = ");
            builder.push_bind(is_blocked);
        }
        if let Some(role) = &query.role {
            if let Ok(role) = role.parse::<UserRole>() {
                builder.push(" AND role = ");
                builder.push_bind(role);
            }
        }
    }

    /// Admin mutation of account flags. Role changes require superadmin.
    pub async fn admin_update(
        &self,
        actor_role: UserRole,
        user_id: i64,
        request: AdminUpdateUserRequest,
    ) -> AppResult<UserResponse> {
        if request.role.is_some() && actor_role != UserRole::Superadmin {
            return Err(AppError::PermissionDenied);
        }

        let current = self.get_user(user_id).await?;
        let was_blocked = current.is_blocked;
        let is_blocked = request.is_blocked.unwrap_or(current.is_blocked);

        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET is_active = $1, is_blocked = $2, role = $3,
                 fraud_attempts = CASE WHEN $2 = FALSE THEN 0 ELSE fraud_attempts END,
                 updated_at = NOW()
             WHERE id = $4
             RETURNING {USER_COLUMNS}"
        ))
        .bind(request.is_active.unwrap_or(current.is_active))
        .bind(is_blocked)
        .bind(request.role.unwrap_or(current.role))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if is_blocked && !was_blocked {
            notification_service::create(
                &mut tx,
                user_id,
                "Account blocked",
                "Your account has been blocked by an administrator.",
            )
            .await?;
        } else if !is_blocked && was_blocked {
            notification_service::create(
                &mut tx,
                user_id,
                "Account unblocked",
                "Your account has been unblocked.",
            )
            .await?;
        }

        tx.commit().await?;
        Ok(UserResponse::from(user))
    }

    pub async fn export_csv(&self, query: &UserQuery) -> AppResult<String> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE 1=1"));
        Self::apply_filters(&mut builder, query);
        builder.push(" ORDER BY created_at DESC");

        let users: Vec<User> = builder.build_query_as().fetch_all(&self.pool).await?;

        let mut out = String::from(
            "id,name,email,phone,network,balance,role,referral_code,referred_by,is_active,is_blocked,created_at\n",
        );
        for u in users {
            out.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{},{},{}\n",
                u.id,
                csv_escape(&u.name),
                csv_escape(&u.email),
                csv_escape(&u.phone),
                csv_escape(&u.network),
                u.balance,
                u.role,
                u.referral_code,
                u.referred_by.as_deref().unwrap_or(""),
                u.is_active,
                u.is_blocked,
                u.created_at.to_rfc3339(),
            ));
        }
        Ok(out)
    }

    pub async fn dashboard_stats(&self) -> AppResult<DashboardStats> {
        let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let blocked_users: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_blocked = TRUE")
                .fetch_one(&self.pool)
                .await?;
        let total_balance: Decimal =
            sqlx::query_scalar("SELECT COALESCE(SUM(balance), 0) FROM users")
                .fetch_one(&self.pool)
                .await?;
        let pending_recharges: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE kind = 'recharge' AND status = 'pending'",
        )
        .fetch_one(&self.pool)
        .await?;
        let pending_withdrawals: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM withdrawal_requests WHERE status = 'pending'",
        )
        .fetch_one(&self.pool)
        .await?;
        let open_fraud_alerts: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM fraud_alerts WHERE status IN ('pending', 'investigating')",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DashboardStats {
            total_users,
            blocked_users,
            total_balance,
            pending_recharges,
            pending_withdrawals,
            open_fraud_alerts,
        })
    }
}
