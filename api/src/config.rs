use std::{env, fmt::Display, str::FromStr};

use tracing::info;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub jwt_secret: String,
    pub cors_origin: String,
    /// Emails holding the admin capability, comma-separated in the env.
    pub admin_emails: Vec<String>,
    pub metadata_base_url: String,
    pub metadata_token: String,
    pub post_cooldown_secs: i64,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("PALAVER_PORT", "8080"),
            database_path: try_load("DATABASE_PATH", "palaver.db"),
            jwt_secret: try_load("JWT_SECRET", "dev-secret-change-me"),
            cors_origin: try_load("CORS_ORIGIN", "http://localhost:1313"),
            admin_emails: try_load::<String>("ADMIN_EMAILS", "")
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            metadata_base_url: try_load("METADATA_BASE_URL", "https://api.themoviedb.org/3"),
            metadata_token: try_load("METADATA_TOKEN", ""),
            post_cooldown_secs: try_load("POST_COOLDOWN_SECS", "60"),
        }
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .unwrap_or_else(|e| panic!("invalid {key} value: {e}"))
}
