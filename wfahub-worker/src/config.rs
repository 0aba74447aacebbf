/// Worker configuration
///
/// Read from environment variables (a `.env` file is loaded first in
/// development).
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 5)
/// - `WORKER_POLL_INTERVAL_SECS`: idle wait between queue polls (default: 5)
/// - `WORKER_MAX_CONCURRENT_CAMPAIGNS`: campaigns sent in parallel (default: 2)
/// - `WORKER_MAX_CONCURRENT_SENDS`: in-flight messages per campaign (default: 5)
/// - `WORKER_MAX_ATTEMPTS`: tries per recipient on transient SMTP errors (default: 3)
/// - `WORKER_RETRY_BACKOFF_MS`: first retry delay, doubled per attempt (default: 2000)
/// - `WORKER_STALE_AFTER_MINUTES`: `sending` campaigns untouched this long are
///   requeued at startup (default: 15)
/// - `CHROMIUM_PATH`, `PDF_API_URL`, `PDF_API_KEY`, `PDF_TIMEOUT_SECS`: PDF
///   rendering, same as the API server

use std::env;
use std::str::FromStr;
use std::time::Duration;
use wfahub_shared::pdf::PdfOptions;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub orchestrator: OrchestratorConfig,

    /// Requeue threshold for campaigns left in `sending`
    pub stale_after_minutes: i64,

    pub pdf: PdfOptions,
}

/// Worker orchestrator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Wait between polls when nothing is due
    pub poll_interval: Duration,

    /// Campaigns processed at once by this worker
    pub max_concurrent_campaigns: usize,

    /// Messages in flight per campaign
    pub max_concurrent_sends: usize,

    /// Attempts per recipient, first try included
    pub max_attempts: u32,

    /// Delay before the first retry
    pub retry_backoff: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            poll_interval: Duration::from_secs(5),
            max_concurrent_campaigns: 2,
            max_concurrent_sends: 5,
            max_attempts: 3,
            retry_backoff: Duration::from_millis(2000),
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = OrchestratorConfig::default();

        let database_url = get("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let poll_secs: u64 = parse_or(
            get("WORKER_POLL_INTERVAL_SECS"),
            "WORKER_POLL_INTERVAL_SECS",
            defaults.poll_interval.as_secs(),
        )?;
        let max_concurrent_campaigns: usize = parse_or(
            get("WORKER_MAX_CONCURRENT_CAMPAIGNS"),
            "WORKER_MAX_CONCURRENT_CAMPAIGNS",
            defaults.max_concurrent_campaigns,
        )?;
        let max_concurrent_sends: usize = parse_or(
            get("WORKER_MAX_CONCURRENT_SENDS"),
            "WORKER_MAX_CONCURRENT_SENDS",
            defaults.max_concurrent_sends,
        )?;
        let max_attempts: u32 =
            parse_or(get("WORKER_MAX_ATTEMPTS"), "WORKER_MAX_ATTEMPTS", defaults.max_attempts)?;
        let backoff_ms: u64 = parse_or(
            get("WORKER_RETRY_BACKOFF_MS"),
            "WORKER_RETRY_BACKOFF_MS",
            defaults.retry_backoff.as_millis() as u64,
        )?;

        if poll_secs == 0 {
            anyhow::bail!("WORKER_POLL_INTERVAL_SECS must be at least 1");
        }
        if max_concurrent_campaigns == 0 || max_concurrent_sends == 0 {
            anyhow::bail!("Worker concurrency limits must be at least 1");
        }
        if max_attempts == 0 {
            anyhow::bail!("WORKER_MAX_ATTEMPTS must be at least 1");
        }

        Ok(Self {
            database_url,
            max_connections: parse_or(get("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", 5)?,
            orchestrator: OrchestratorConfig {
                poll_interval: Duration::from_secs(poll_secs),
                max_concurrent_campaigns,
                max_concurrent_sends,
                max_attempts,
                retry_backoff: Duration::from_millis(backoff_ms),
            },
            stale_after_minutes: parse_or(
                get("WORKER_STALE_AFTER_MINUTES"),
                "WORKER_STALE_AFTER_MINUTES",
                15,
            )?,
            pdf: PdfOptions {
                chromium_path: get("CHROMIUM_PATH").unwrap_or_else(|| "chromium".to_string()),
                api_url: get("PDF_API_URL"),
                api_key: get("PDF_API_KEY"),
                timeout: Duration::from_secs(parse_or(
                    get("PDF_TIMEOUT_SECS"),
                    "PDF_TIMEOUT_SECS",
                    30,
                )?),
            },
        })
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
