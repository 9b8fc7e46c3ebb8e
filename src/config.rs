use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = "./pricebook.db";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:4000";
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173";
pub const DEFAULT_POOL_SIZE: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub listen_addr: SocketAddr,
    /// Allowed CORS origins; a single "*" allows any
    pub cors_allow: Vec<String>,
    pub log_format: LogFormat,
    /// Read connections the server keeps open
    pub pool_size: u32,
}

impl Config {
    /// Read PRICEBOOK_* variables, loading `.env` first if present
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("PRICEBOOK_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

        let raw_addr =
            lookup("PRICEBOOK_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr: SocketAddr = raw_addr
            .parse()
            .with_context(|| format!("Invalid PRICEBOOK_LISTEN_ADDR: {}", raw_addr))?;

        let cors_allow = lookup("PRICEBOOK_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let log_format = match lookup("PRICEBOOK_LOG_FORMAT") {
            Some(format) if format.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(format) if format.eq_ignore_ascii_case("text") => LogFormat::Text,
            None => LogFormat::Text,
            Some(other) => anyhow::bail!("Invalid PRICEBOOK_LOG_FORMAT: {}", other),
        };

        let pool_size = match lookup("PRICEBOOK_DB_POOL_SIZE") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(size) if size > 0 => size,
                _ => anyhow::bail!("Invalid PRICEBOOK_DB_POOL_SIZE: {}", raw),
            },
            None => DEFAULT_POOL_SIZE,
        };

        Ok(Self {
            db_path: PathBuf::from(db_path),
            listen_addr,
            cors_allow,
            log_format,
            pool_size,
        })
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_allow.iter().any(|origin| origin == "*")
    }
}
