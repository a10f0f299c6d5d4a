//! Defaults and fixed markers for the hiscores source.

pub const DEFAULT_BASE_URL: &str = "https://secure.runescape.com/m=hiscore_oldschool/overall.ws";

// Overall skill table
pub const DEFAULT_TABLE: u32 = 0;

pub const DEFAULT_START_PAGE: u32 = 1;
pub const DEFAULT_END_PAGE: u32 = 1000;

pub const DEFAULT_MAX_CONCURRENCY: usize = 16;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HEADER_ROWS_TO_SKIP: usize = 1;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 250;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 10_000;
pub const DEFAULT_RETRY_JITTER_MS: u64 = 250;

pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

pub const DEFAULT_USER_AGENT: &str = "hiscores_scraper/0.1";

pub const TBODY_OPEN: &[u8] = b"<tbody>";
pub const TBODY_CLOSE: &[u8] = b"</tbody>";

/// Build the request URL for one page of a table.
pub fn page_url(base_url: &str, table: u32, page: u32) -> String {
    format!("{base_url}?table={table}&page={page}")
}
