use crate::state::StateOptions;
use clap::{Parser, ValueEnum};
use linktrack_core::shortcode::{MAX_LENGTH, MIN_LENGTH};
use linktrack_generator::random::{GeneratorSettings, DEFAULT_LENGTH};
use linktrack_shortener::service::DEFAULT_MAX_ATTEMPTS;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;

pub const LISTEN_ADDR_ENV: &str = "LINKTRACK_LISTEN_ADDR";
pub const PUBLIC_BASE_URL_ENV: &str = "LINKTRACK_PUBLIC_BASE_URL";
pub const STORAGE_BACKEND_ENV: &str = "LINKTRACK_STORAGE_BACKEND";
pub const DATABASE_URL_ENV: &str = "LINKTRACK_DATABASE_URL";
pub const CODE_LENGTH_ENV: &str = "LINKTRACK_CODE_LENGTH";
pub const MAX_ALLOCATION_ATTEMPTS_ENV: &str = "LINKTRACK_MAX_ALLOCATION_ATTEMPTS";
pub const TRUST_PROXY_HEADERS_ENV: &str = "LINKTRACK_TRUST_PROXY_HEADERS";
pub const LOG_FORMAT_ENV: &str = "LINKTRACK_LOG_FORMAT";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_SQLITE_URL: &str = "sqlite://linktrack.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "sqlite")]
    Sqlite,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Sqlite => write!(f, "sqlite"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Server configuration, read from flags or `LINKTRACK_*` environment variables.
#[derive(Debug, Parser)]
#[command(name = "linktrack", about = "URL shortener with click analytics")]
pub struct Config {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Prefix for generated short URLs, e.g. `https://sho.rt`.
    #[arg(long, env = PUBLIC_BASE_URL_ENV, default_value = DEFAULT_PUBLIC_BASE_URL)]
    pub public_base_url: String,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::Sqlite
    )]
    pub storage: StorageBackendArg,

    /// Database URL; defaults to a local SQLite file for the sqlite backend.
    #[arg(long, env = DATABASE_URL_ENV, required_if_eq("storage", "mysql"))]
    pub database_url: Option<String>,

    #[arg(
        long,
        env = CODE_LENGTH_ENV,
        default_value_t = DEFAULT_LENGTH,
        value_parser = parse_code_length
    )]
    pub code_length: usize,

    #[arg(
        long,
        env = MAX_ALLOCATION_ATTEMPTS_ENV,
        default_value_t = DEFAULT_MAX_ATTEMPTS,
        value_parser = parse_attempts
    )]
    pub max_allocation_attempts: usize,

    /// Take the client IP from `X-Forwarded-For` / `X-Real-IP`.
    #[arg(long, env = TRUST_PROXY_HEADERS_ENV)]
    pub trust_proxy_headers: bool,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Config {
    pub fn database_url(&self) -> &str {
        self.database_url.as_deref().unwrap_or(DEFAULT_SQLITE_URL)
    }

    pub fn generator_settings(&self) -> GeneratorSettings {
        GeneratorSettings::builder().length(self.code_length).build()
    }

    pub fn state_options(&self) -> StateOptions {
        StateOptions::builder()
            .base_url(self.public_base_url.trim_end_matches('/'))
            .max_attempts(self.max_allocation_attempts)
            .trust_proxy_headers(self.trust_proxy_headers)
            .build()
    }
}

fn parse_code_length(value: &str) -> Result<usize, String> {
    let length: usize = value.parse().map_err(|e| format!("{e}"))?;
    if (MIN_LENGTH..=MAX_LENGTH).contains(&length) {
        Ok(length)
    } else {
        Err(format!(
            "code length must be between {MIN_LENGTH} and {MAX_LENGTH}"
        ))
    }
}

fn parse_attempts(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("at least one allocation attempt is required".to_string()),
        Ok(attempts) => Ok(attempts),
        Err(e) => Err(format!("{e}")),
    }
}
