pub mod tunables;

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::config::tunables::Tunables;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub app_mode: String,
    pub app_env: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub paseto_access_key: [u8; 32],
    pub tunables: Tunables,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:8080");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;
        let app_mode = env_or("APP_MODE", "api");
        let app_env = env_or("APP_ENV", "development");
        let tunables = Tunables::from_env(is_production(&app_env))?;

        Ok(Self {
            http_addr,
            app_mode,
            app_env,
            database_url: env_or_err("DATABASE_URL")?,
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "25")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            paseto_access_key: env_key_32("PASETO_ACCESS_KEY")?,
            tunables,
        })
    }
}

fn is_production(app_env: &str) -> bool {
    app_env.eq_ignore_ascii_case("production")
}

pub(crate) fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

pub(crate) fn env_flag(key: &str) -> bool {
    matches!(
        env_or(key, "").trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

pub(crate) fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .trim()
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}

fn env_key_32(key: &str) -> Result<[u8; 32]> {
    let value = env_or_err(key)?;
    let decoded = STANDARD
        .decode(value.as_bytes())
        .map_err(|err| anyhow!("invalid {}: {}", key, err))?;
    if decoded.len() != 32 {
        return Err(anyhow!("invalid {}: expected 32 bytes", key));
    }
    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(&decoded);
    Ok(key_bytes)
}
