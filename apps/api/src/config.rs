use std::str::FromStr;

use anyhow::{Context, Result};

use crate::resumes::versions::DEFAULT_CHAIN_LIMIT;

/// Application configuration loaded from environment variables.
/// Fails at startup if a variable is present but malformed.
#[derive(Debug, Clone)]
pub struct Config {
    /// Absent → in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub port: u16,
    pub rust_log: String,
    /// Absent → PDF export always falls back to the detail view.
    pub pdf_renderer_url: Option<String>,
    pub pdf_renderer_timeout_secs: u64,
    pub version_chain_limit: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            database_max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            pdf_renderer_url: optional_env("PDF_RENDERER_URL"),
            pdf_renderer_timeout_secs: parse_env("PDF_RENDERER_TIMEOUT_SECS", 30)?,
            version_chain_limit: positive_value(
                "VERSION_CHAIN_LIMIT",
                std::env::var("VERSION_CHAIN_LIMIT").ok(),
                DEFAULT_CHAIN_LIMIT,
            )?,
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_value(key, std::env::var(key).ok(), default)
}

fn parse_value<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
    }
}

fn positive_value(key: &str, raw: Option<String>, default: usize) -> Result<usize> {
    let value = parse_value(key, raw, default)?;
    anyhow::ensure!(value > 0, "Environment variable '{key}' must be at least 1");
    Ok(value)
}
