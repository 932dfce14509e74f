use std::net::SocketAddr;
use std::path::PathBuf;

use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;

pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Shared secret for the gateway's `X-Webhook-Signature` HMAC.
    pub webhook_secret: SecretString,
    /// Admin routes are disabled when unset.
    pub admin_token: Option<SecretString>,
    /// Notifications are only logged when unset.
    pub telegram_bot_token: Option<SecretString>,
    pub telegram_api_base: String,
    /// JSON plan list; the built-in catalog is used when unset.
    pub plan_catalog_path: Option<PathBuf>,
    pub free_habit_quota: usize,
    pub sweep_interval_secs: u64,
    pub db_max_connections: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url: String = get_env("DATABASE_URL");
        let bind_addr: SocketAddr =
            get_env_default("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3001)));
        let webhook_secret = SecretString::new(get_env::<String>("WEBHOOK_SECRET").into());
        let admin_token = optional_env("ADMIN_TOKEN").map(|t| SecretString::new(t.into()));
        let telegram_bot_token =
            optional_env("TELEGRAM_BOT_TOKEN").map(|t| SecretString::new(t.into()));
        let telegram_api_base: String = get_env_default(
            "TELEGRAM_API_BASE",
            "https://api.telegram.org".to_string(),
        );
        let plan_catalog_path = optional_env("PLAN_CATALOG_PATH").map(PathBuf::from);
        let free_habit_quota: usize = get_env_default("FREE_HABIT_QUOTA", 3);
        let sweep_interval_secs: u64 = get_env_default("SWEEP_INTERVAL_SECS", 86_400);
        let db_max_connections: u32 = get_env_default("DB_MAX_CONNECTIONS", 5);

        Self {
            database_url,
            bind_addr,
            webhook_secret,
            admin_token,
            telegram_bot_token,
            telegram_api_base,
            plan_catalog_path,
            free_habit_quota,
            sweep_interval_secs,
            db_max_connections,
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
