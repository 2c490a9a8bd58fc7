use crate::error::{AppError, AppResult};
use crate::models::{
    AuthResponse, LoginRequest, RefreshRequest, RegisterRequest, User, UserResponse,
};
use crate::services::AccrualService;
use crate::utils::{
    generate_unique_referral_code, hash_password, validate_password, verify_password, JwtService,
};
use regex::Regex;
use sqlx::PgPool;

const USER_COLUMNS: &str = "id, name, email, phone, password_hash, network, balance, role, \
     referral_code, referred_by, is_active, is_blocked, fraud_attempts, created_at, updated_at";

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    jwt_service: JwtService,
    accrual_service: AccrualService,
}

impl AuthService {
    pub fn new(pool: PgPool, jwt_service: JwtService, accrual_service: AccrualService) -> Self {
        Self {
            pool,
            jwt_service,
            accrual_service,
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> AppResult<AuthResponse> {
        let email = request.email.trim().to_lowercase();
        let phone = request.phone.trim().to_string();

        validate_email(&email)?;
        validate_tz_phone(&phone)?;
        validate_password(&request.password)?;
        if request.name.trim().len() < 2 {
            return Err(AppError::ValidationError("Name is too short".to_string()));
        }

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = $1 OR phone = $2")
                .bind(&email)
                .bind(&phone)
                .fetch_one(&self.pool)
                .await?;
        if existing > 0 {
            return Err(AppError::ValidationError(
                "An account with this email or phone already exists".to_string(),
            ));
        }

        // The referrer's code must exist for the referral chain to hold up.
        let referred_by = match &request.referral_code {
            Some(code) if !code.trim().is_empty() => {
                let code = code.trim().to_uppercase();
                let found: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE referral_code = $1")
                        .bind(&code)
                        .fetch_one(&self.pool)
                        .await?;
                if found == 0 {
                    return Err(AppError::ValidationError(
                        "Unknown referral code".to_string(),
                    ));
                }
                Some(code)
            }
            _ => None,
        };

        let password_hash = hash_password(&request.password)?;
        let referral_code = generate_unique_referral_code(&self.pool).await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, phone, password_hash, network, referral_code, referred_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(request.name.trim())
        .bind(&email)
        .bind(&phone)
        .bind(&password_hash)
        .bind(request.network.trim())
        .bind(&referral_code)
        .bind(&referred_by)
        .fetch_one(&self.pool)
        .await?;

        log::info!("Registered user {} ({})", user.id, user.email);
        self.build_auth_response(user)
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        let email = request.email.trim().to_lowercase();

        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(&email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::AuthError("Invalid email or password".to_string()))?;

        if !verify_password(&request.password, &user.password_hash)? {
            return Err(AppError::AuthError(
                "Invalid email or password".to_string(),
            ));
        }
        self.ensure_usable(&user)?;

        // Session initialization is the accrual trigger: outstanding daily
        // returns are settled before the profile is returned.
        self.accrual_service.settle_user(user.id).await?;

        let user = self.reload(user.id).await?;
        self.build_auth_response(user)
    }

    pub async fn refresh(&self, request: RefreshRequest) -> AppResult<AuthResponse> {
        let claims = self.jwt_service.verify_refresh_token(&request.refresh_token)?;
        let user_id: i64 = claims
            .sub
            .parse()
            .map_err(|_| AppError::AuthError("Invalid token subject".to_string()))?;

        let user = self.reload(user_id).await?;
        self.ensure_usable(&user)?;
        self.build_auth_response(user)
    }

    /// Revalidate the session and settle accrual, mirroring the login path
    /// for an already-authenticated client.
    pub async fn session(&self, user_id: i64) -> AppResult<UserResponse> {
        let user = self.reload(user_id).await?;
        self.ensure_usable(&user)?;

        self.accrual_service.settle_user(user_id).await?;

        let user = self.reload(user_id).await?;
        Ok(UserResponse::from(user))
    }

    fn ensure_usable(&self, user: &User) -> AppResult<()> {
        if user.is_blocked {
            return Err(AppError::AuthError(
                "Account is blocked. Contact support.".to_string(),
            ));
        }
        if !user.is_active {
            return Err(AppError::AuthError("Account is deactivated".to_string()));
        }
        Ok(())
    }

    async fn reload(&self, user_id: i64) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    fn build_auth_response(&self, user: User) -> AppResult<AuthResponse> {
        let access_token = self.jwt_service.generate_access_token(user.id, user.role)?;
        let refresh_token = self.jwt_service.generate_refresh_token(user.id, user.role)?;

        Ok(AuthResponse {
            user: UserResponse::from(user),
            access_token,
            refresh_token,
            expires_in: self.jwt_service.get_access_token_expires_in(),
        })
    }
}

fn validate_email(email: &str) -> AppResult<()> {
    let re = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex");
    if !re.is_match(email) {
        return Err(AppError::ValidationError(
            "Invalid email address".to_string(),
        ));
    }
    Ok(())
}

/// Tanzanian MSISDN: +255 followed by 9 digits, or the local 0-prefixed
/// form.
fn validate_tz_phone(phone: &str) -> AppResult<()> {
    let re = Regex::new(r"^(\+255[0-9]{9}|0[0-9]{9})$").expect("static regex");
    if !re.is_match(phone) {
        return Err(AppError::ValidationError(
            "Invalid phone number. Use +255XXXXXXXXX or 0XXXXXXXXX".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("asha@example.com").is_ok());
        assert!(validate_email("a.b+c@mail.co.tz").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("a b@c.com").is_err());
    }

    #[test]
    fn test_validate_tz_phone() {
        assert!(validate_tz_phone("+255712345678").is_ok());
        assert!(validate_tz_phone("0712345678").is_ok());
        assert!(validate_tz_phone("+254712345678").is_err()); // wrong country
        assert!(validate_tz_phone("712345678").is_err());
        assert!(validate_tz_phone("+2557123").is_err());
    }
}
