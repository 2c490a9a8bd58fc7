use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub fraud: FraudConfig,
    #[serde(default)]
    pub referral: ReferralConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64,  // seconds
    pub refresh_token_expires_in: i64, // seconds
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudConfig {
    /// Deposits above this amount (TZS) raise a high-severity alert.
    pub large_deposit_threshold: Decimal,
    /// More deposits than this within 24h raises an alert.
    pub max_deposits_per_day: i64,
    /// Deposit larger than this multiple of the recent average raises an alert.
    pub average_multiplier: Decimal,
    /// Normalized Levenshtein similarity above this rejects a reference.
    pub similarity_threshold: f64,
    /// Logged fraud attempts at which the account is blocked.
    pub auto_block_attempts: i32,
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            large_deposit_threshold: dec!(1_000_000),
            max_deposits_per_day: 5,
            average_multiplier: dec!(5),
            similarity_threshold: 0.8,
            auto_block_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralConfig {
    pub level_b_rate: Decimal,
    pub level_c_rate: Decimal,
    pub level_d_rate: Decimal,
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            level_b_rate: dec!(0.35),
            level_c_rate: dec!(0.02),
            level_d_rate: dec!(0.01),
        }
    }
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => toml::from_str(&config_str)
                .map_err(|e| format!("Failed to parse config file: {e}"))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // No config file: build from environment variables and defaults.
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                let database_url = get_env("DATABASE_URL")
                    .ok_or("DATABASE_URL is not set and no config.toml was found")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    jwt: JwtConfig {
                        secret: get_env("JWT_SECRET")
                            .unwrap_or_else(|| "change-me-in-production".to_string()),
                        access_token_expires_in: get_env_parse("JWT_ACCESS_EXPIRES_IN", 7200i64),
                        refresh_token_expires_in: get_env_parse(
                            "JWT_REFRESH_EXPIRES_IN",
                            2_592_000i64,
                        ),
                    },
                    fraud: FraudConfig::default(),
                    referral: ReferralConfig::default(),
                }
            }
            Err(e) => {
                return Err(format!("Cannot read config file {config_path}: {e}").into());
            }
        };

        // Environment variables win even when the file exists.
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT") {
            if let Ok(p) = v.parse() {
                config.server.port = p;
            }
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS") {
            if let Ok(mc) = v.parse() {
                config.database.max_connections = mc;
            }
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            config.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_ACCESS_EXPIRES_IN") {
            if let Ok(n) = v.parse() {
                config.jwt.access_token_expires_in = n;
            }
        }
        if let Ok(v) = env::var("JWT_REFRESH_EXPIRES_IN") {
            if let Ok(n) = v.parse() {
                config.jwt.refresh_token_expires_in = n;
            }
        }
        if let Ok(v) = env::var("FRAUD_AUTO_BLOCK_ATTEMPTS") {
            if let Ok(n) = v.parse() {
                config.fraud.auto_block_attempts = n;
            }
        }
        if let Ok(v) = env::var("FRAUD_SIMILARITY_THRESHOLD") {
            if let Ok(n) = v.parse() {
                config.fraud.similarity_threshold = n;
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let raw = r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [database]
            url = "postgres://localhost/profitnet"
            max_connections = 5

            [jwt]
            secret = "test-secret"
            access_token_expires_in = 3600
            refresh_token_expires_in = 86400
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.max_connections, 5);
        // Omitted sections fall back to defaults.
        assert_eq!(config.fraud.auto_block_attempts, 3);
        assert_eq!(config.referral.level_b_rate, dec!(0.35));
    }

    #[test]
    fn test_fraud_section_override() {
        let raw = r#"
            [server]
            host = "0.0.0.0"
            port = 8080

            [database]
            url = "postgres://localhost/profitnet"
            max_connections = 10

            [jwt]
            secret = "s"
            access_token_expires_in = 10
            refresh_token_expires_in = 20

            [fraud]
            large_deposit_threshold = "2000000"
            max_deposits_per_day = 10
            average_multiplier = "3"
            similarity_threshold = 0.9
            auto_block_attempts = 5
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.fraud.large_deposit_threshold, dec!(2_000_000));
        assert_eq!(config.fraud.max_deposits_per_day, 10);
        assert_eq!(config.fraud.auto_block_attempts, 5);
    }
}
