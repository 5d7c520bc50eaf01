use std::time::Duration;

use rust_decimal::Decimal;

use crate::i18n::Lang;

/// Process-wide configuration, loaded once at startup and immutable after.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram_bot_token: String,
    pub database_url: String,

    /// Telegram ids of super-admins. Membership here grants every permission
    /// unconditionally and is not revocable through the admin UI.
    pub super_admin_ids: Vec<i64>,

    pub default_language: Lang,
    pub default_currency: String,

    /// Prefix + year used when minting customer codes, e.g. "C2025".
    pub customer_code_prefix: String,

    /// Inclusive amount bounds for deposit/withdraw requests.
    pub min_amount: Decimal,
    pub max_amount: Decimal,

    pub broadcast_chunk_size: usize,
    pub broadcast_chunk_pause: Duration,
    pub broadcast_retry_attempts: u32,
    pub broadcast_retry_delay: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let super_admin_ids: Vec<i64> = std::env::var("SUPER_ADMINS")
            .unwrap_or_default()
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();

        let default_language =
            Lang::from_code(&std::env::var("DEFAULT_LANGUAGE").unwrap_or_else(|_| "ar".into()));

        Ok(Self {
            telegram_bot_token: std::env::var("TELEGRAM_BOT_TOKEN")?,
            database_url: std::env::var("DATABASE_URL")?,
            super_admin_ids,
            default_language,
            default_currency: std::env::var("DEFAULT_CURRENCY")
                .unwrap_or_else(|_| "SAR".to_string()),
            customer_code_prefix: std::env::var("CUSTOMER_CODE_PREFIX")
                .unwrap_or_else(|_| "C2025".to_string()),
            min_amount: parse_decimal_env("MIN_AMOUNT", "1.00"),
            max_amount: parse_decimal_env("MAX_AMOUNT", "1000000.00"),
            broadcast_chunk_size: parse_env("BROADCAST_CHUNK_SIZE", 100),
            broadcast_chunk_pause: Duration::from_secs(parse_env("BROADCAST_CHUNK_PAUSE_SECS", 28)),
            broadcast_retry_attempts: parse_env("BROADCAST_RETRY_ATTEMPTS", 3),
            broadcast_retry_delay: Duration::from_secs(parse_env("BROADCAST_RETRY_DELAY_SECS", 5)),
        })
    }

    pub fn is_super_admin(&self, telegram_id: i64) -> bool {
        self.super_admin_ids.contains(&telegram_id)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_decimal_env(key: &str, default: &str) -> Decimal {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| default.parse().expect("valid default decimal"))
}
