/// Configuration management for the API server
///
/// This module loads configuration from environment variables (a `.env` file
/// is read first in development) into a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
/// - `API_HOST` / `API_PORT`: bind address (default: 0.0.0.0:8080)
/// - `SESSION_SECRET`: HS256 key for session and account tokens (required, 32+ chars)
/// - `SESSION_COOKIE_NAME`: session cookie name (default: wfa_session)
/// - `SESSION_TTL_HOURS`: session lifetime (default: 168)
/// - `COOKIE_SECURE`: add `Secure` to cookies (default: same as `PRODUCTION`)
/// - `CORS_ORIGINS`: comma-separated allowed origins (default: none)
/// - `PRODUCTION`: production mode (default: false)
/// - `PUBLIC_BASE_URL`: base of links in account emails (default: http://localhost:5173)
/// - `SIGNUP_CREDITS`: opening balance for new users (default: 10)
/// - `MAX_UPLOAD_ROWS`: recipient rows per campaign upload (default: 5000)
/// - `AUTH_RATE_LIMIT_PER_MINUTE`: requests per client IP on public auth endpoints (default: 10)
/// - `TRUST_PROXY_HEADERS`: key the auth rate limit on the right-most `X-Forwarded-For`
///   hop instead of the peer address; only set behind a reverse proxy (default: false)
/// - `CHROMIUM_PATH`: headless browser for local PDF rendering (default: chromium)
/// - `PDF_API_URL` / `PDF_API_KEY`: third-party PDF endpoint
/// - `PDF_TIMEOUT_SECS`: PDF rendering timeout (default: 30)
///
/// # Example
///
/// ```no_run
/// use wfahub_api::config::Config;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use wfahub_shared::auth::middleware::DEFAULT_SESSION_COOKIE;
use wfahub_shared::pdf::PdfOptions;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub limits: LimitsConfig,
    pub pdf: PdfConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Origins allowed by CORS; empty disables cross-origin access
    pub cors_origins: Vec<String>,

    pub production: bool,

    /// Public URL of the web client, used to build links in emails
    pub public_base_url: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    #[serde(skip_serializing)]
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Secret key for token signing
    ///
    /// IMPORTANT: This must be kept secret and should be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    #[serde(skip_serializing)]
    pub secret: String,

    pub cookie_name: String,
    pub ttl_hours: i64,
    pub cookie_secure: bool,
}

impl SessionConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.ttl_hours)
    }

    pub fn max_age_seconds(&self) -> i64 {
        self.ttl_hours * 3600
    }
}

/// Business limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Credits granted at registration
    pub signup_credits: i32,

    /// Maximum data rows in one campaign upload
    pub max_upload_rows: usize,

    /// Requests per minute (and burst size) per client on login, register and password reset
    pub auth_rate_limit_per_minute: u32,

    /// Take the client address from the proxy's `X-Forwarded-For` entry
    pub trust_proxy_headers: bool,
}

/// PDF rendering backends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfConfig {
    pub chromium_path: String,
    pub api_url: Option<String>,

    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    pub timeout_secs: u64,
}

impl PdfConfig {
    pub fn options(&self) -> PdfOptions {
        PdfOptions {
            chromium_path: self.chromium_path.clone(),
            api_url: self.api_url.clone(),
            api_key: self.api_key.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let session_secret = get("SESSION_SECRET")
            .ok_or_else(|| anyhow::anyhow!("SESSION_SECRET environment variable is required"))?;

        if session_secret.len() < 32 {
            anyhow::bail!("SESSION_SECRET must be at least 32 characters long");
        }

        let production = parse_bool(get("PRODUCTION").as_deref(), "PRODUCTION", false)?;
        let cookie_secure = parse_bool(get("COOKIE_SECURE").as_deref(), "COOKIE_SECURE", production)?;

        let ttl_hours: i64 = parse_or(get("SESSION_TTL_HOURS"), "SESSION_TTL_HOURS", 168)?;
        if ttl_hours <= 0 {
            anyhow::bail!("SESSION_TTL_HOURS must be positive");
        }

        let signup_credits: i32 = parse_or(get("SIGNUP_CREDITS"), "SIGNUP_CREDITS", 10)?;
        if signup_credits < 0 {
            anyhow::bail!("SIGNUP_CREDITS cannot be negative");
        }

        let auth_rate_limit_per_minute: u32 =
            parse_or(get("AUTH_RATE_LIMIT_PER_MINUTE"), "AUTH_RATE_LIMIT_PER_MINUTE", 10)?;
        if auth_rate_limit_per_minute == 0 {
            anyhow::bail!("AUTH_RATE_LIMIT_PER_MINUTE must be at least 1");
        }

        let trust_proxy_headers =
            parse_bool(get("TRUST_PROXY_HEADERS").as_deref(), "TRUST_PROXY_HEADERS", false)?;

        let cors_origins = get("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|o| o.trim().trim_end_matches('/').to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            api: ApiConfig {
                host: get("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(get("API_PORT"), "API_PORT", 8080)?,
                cors_origins,
                production,
                public_base_url: get("PUBLIC_BASE_URL")
                    .unwrap_or_else(|| "http://localhost:5173".to_string())
                    .trim_end_matches('/')
                    .to_string(),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_or(get("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", 10)?,
            },
            session: SessionConfig {
                secret: session_secret,
                cookie_name: get("SESSION_COOKIE_NAME")
                    .unwrap_or_else(|| DEFAULT_SESSION_COOKIE.to_string()),
                ttl_hours,
                cookie_secure,
            },
            limits: LimitsConfig {
                signup_credits,
                max_upload_rows: parse_or(get("MAX_UPLOAD_ROWS"), "MAX_UPLOAD_ROWS", 5000)?,
                auth_rate_limit_per_minute,
                trust_proxy_headers,
            },
            pdf: PdfConfig {
                chromium_path: get("CHROMIUM_PATH").unwrap_or_else(|| "chromium".to_string()),
                api_url: get("PDF_API_URL"),
                api_key: get("PDF_API_KEY"),
                timeout_secs: parse_or(get("PDF_TIMEOUT_SECS"), "PDF_TIMEOUT_SECS", 30)?,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Absolute link into the web client
    pub fn client_link(&self, path: &str, token: &str) -> String {
        format!("{}{}?token={}", self.api.public_base_url, path, token)
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
    }
}

fn parse_bool(value: Option<&str>, key: &str, default: bool) -> anyhow::Result<bool> {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => anyhow::bail!("{} must be a boolean, got '{}'", key, v),
    }
}
