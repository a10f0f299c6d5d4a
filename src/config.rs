use crate::constants;
use crate::error::{Result, ScraperError};
use crate::types::PageIndex;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Settings for one scrape run.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScrapeConfig {
    pub base_url: String,
    pub table: u32,
    pub start_page: u32,
    pub end_page: u32,
    pub max_concurrency: usize,
    pub request_timeout_secs: u64,
    pub header_rows_to_skip: usize,
    pub requests_per_min: Option<u64>,
    pub user_agent: String,
    pub output_dir: String,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: constants::DEFAULT_BASE_URL.to_string(),
            table: constants::DEFAULT_TABLE,
            start_page: constants::DEFAULT_START_PAGE,
            end_page: constants::DEFAULT_END_PAGE,
            max_concurrency: constants::DEFAULT_MAX_CONCURRENCY,
            request_timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT_SECS,
            header_rows_to_skip: constants::DEFAULT_HEADER_ROWS_TO_SKIP,
            requests_per_min: None,
            user_agent: constants::DEFAULT_USER_AGENT.to_string(),
            output_dir: constants::DEFAULT_OUTPUT_DIR.to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: constants::DEFAULT_MAX_RETRIES,
            base_delay_ms: constants::DEFAULT_RETRY_BASE_DELAY_MS,
            max_delay_ms: constants::DEFAULT_RETRY_MAX_DELAY_MS,
            jitter_ms: constants::DEFAULT_RETRY_JITTER_MS,
        }
    }
}

impl RetryConfig {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

impl ScrapeConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ScrapeConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Override fields from `HISCORES_*` environment variables.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HISCORES_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("HISCORES_TABLE") {
            self.table = parse_env("HISCORES_TABLE", &v)?;
        }
        if let Some(v) = lookup("HISCORES_START_PAGE") {
            self.start_page = parse_env("HISCORES_START_PAGE", &v)?;
        }
        if let Some(v) = lookup("HISCORES_END_PAGE") {
            self.end_page = parse_env("HISCORES_END_PAGE", &v)?;
        }
        if let Some(v) = lookup("HISCORES_MAX_CONCURRENCY") {
            self.max_concurrency = parse_env("HISCORES_MAX_CONCURRENCY", &v)?;
        }
        if let Some(v) = lookup("HISCORES_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_env("HISCORES_REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("HISCORES_REQUESTS_PER_MIN") {
            self.requests_per_min = Some(parse_env("HISCORES_REQUESTS_PER_MIN", &v)?);
        }
        if let Some(v) = lookup("HISCORES_MAX_RETRIES") {
            self.retry.max_retries = parse_env("HISCORES_MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("HISCORES_OUTPUT_DIR") {
            self.output_dir = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ScraperError::Config("base_url must not be empty".into()));
        }
        if self.start_page == 0 {
            return Err(ScraperError::Config("start_page must be at least 1".into()));
        }
        if self.start_page > self.end_page {
            return Err(ScraperError::Config(format!(
                "start_page {} is after end_page {}",
                self.start_page, self.end_page
            )));
        }
        if self.max_concurrency == 0 {
            return Err(ScraperError::Config("max_concurrency must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ScraperError::Config("request_timeout_secs must be at least 1".into()));
        }
        if self.requests_per_min == Some(0) {
            return Err(ScraperError::Config("requests_per_min must be at least 1 when set".into()));
        }
        Ok(())
    }

    pub fn pages(&self) -> impl Iterator<Item = PageIndex> {
        (self.start_page..=self.end_page).map(PageIndex)
    }

    pub fn page_count(&self) -> usize {
        if self.start_page > self.end_page {
            0
        } else {
            (self.end_page - self.start_page) as usize + 1
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ScraperError::Config(format!("{key} has invalid value {value:?}")))
}
