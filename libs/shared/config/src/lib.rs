use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_address: String,
    pub scheduling: SchedulingConfig,
}

/// Knobs of slot generation, payments and the unpaid sweep.
#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    pub unpaid_grace_minutes: i64,
    pub reclaim_interval_seconds: u64,
    pub max_schedule_days: i64,
    pub payment_transaction_prefix: String,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            unpaid_grace_minutes: 30,
            reclaim_interval_seconds: 60,
            max_schedule_days: 366,
            payment_transaction_prefix: "HealthCare".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = SchedulingConfig::default();

        let config = Self {
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("DATABASE_URL not set, falling back to the in-memory store");
                    String::new()
                }),
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10),
            bind_address: env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            scheduling: SchedulingConfig {
                unpaid_grace_minutes: parse_or("UNPAID_GRACE_MINUTES", defaults.unpaid_grace_minutes),
                reclaim_interval_seconds: parse_or("RECLAIM_INTERVAL_SECONDS", defaults.reclaim_interval_seconds),
                max_schedule_days: parse_or("MAX_SCHEDULE_DAYS", defaults.max_schedule_days),
                payment_transaction_prefix: env::var("PAYMENT_TRANSACTION_PREFIX")
                    .unwrap_or(defaults.payment_transaction_prefix),
            },
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.jwt_secret.is_empty()
    }

    pub fn uses_postgres(&self) -> bool {
        !self.database_url.is_empty()
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
