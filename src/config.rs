use anyhow::{bail, Result};
use std::time::Duration;

// -----------------------------------------------
// NSE API ENDPOINTS
// -----------------------------------------------
pub const NSE_BASE_URL: &str = "https://www.nseindia.com";

pub fn nse_contract_info_url(symbol: &str) -> String {
    format!(
        "{}/api/option-chain-contract-info?symbol={}",
        NSE_BASE_URL,
        urlencoding::encode(symbol)
    )
}

pub fn nse_option_chain_url(typ: &str, symbol: &str, expiry: &str) -> String {
    format!(
        "{}/api/option-chain-v3?type={}&symbol={}&expiry={}",
        NSE_BASE_URL,
        typ,
        urlencoding::encode(symbol),
        urlencoding::encode(expiry)
    )
}

// -----------------------------------------------
// INDICES (queried with type=Indices)
// -----------------------------------------------
pub const NSE_INDICES: &[&str] = &["NIFTY", "BANKNIFTY", "FINNIFTY", "MIDCPNIFTY", "NIFTYNXT50"];

// -----------------------------------------------
// HTTP CLIENT CONFIG
// -----------------------------------------------
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                               AppleWebKit/537.36 (KHTML, like Gecko) \
                               Chrome/131.0.0.0 Safari/537.36";

pub const ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.8",
    "en-IN,en;q=0.9",
];

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

// -----------------------------------------------
// SESSION WARMUP
// -----------------------------------------------
pub const WARMUP_DELAY_MS: u64 = 200;

// -----------------------------------------------
// RETRY CONFIG
// -----------------------------------------------
pub const RETRY_BASE_DELAY_MS: u64 = 100;
pub const RETRY_FACTOR: u64 = 2;
pub const RETRY_MAX_DELAY_SECS: u64 = 3;
pub const RETRY_MAX_ATTEMPTS: usize = 3;

// -----------------------------------------------
// HTTP HEADERS
// -----------------------------------------------
pub const HEADER_REFERER: &str = "https://www.nseindia.com/";
pub const HEADER_X_REQUESTED_WITH: &str = "XMLHttpRequest";
pub const HEADER_ACCEPT_HTML: &str = "text/html";

// -----------------------------------------------
// EXPIRY SELECTION
// -----------------------------------------------
pub const EXPIRY_DATE_FORMAT: &str = "%d-%b-%Y";
pub const MARKET_CLOSE_HOUR: u32 = 15;
pub const MARKET_CLOSE_MINUTE: u32 = 30;

// -----------------------------------------------
// SIGNAL THRESHOLDS
// -----------------------------------------------
pub const BULLISH_PCR_THRESHOLD: f64 = 1.1;
pub const BEARISH_PCR_THRESHOLD: f64 = 0.9;
pub const OI_CHANGE_PCR_PIVOT: f64 = 1.0;

// -----------------------------------------------
// RUNTIME DEFAULTS
// -----------------------------------------------
pub const DEFAULT_SYMBOL: &str = "NIFTY";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_REFRESH_SECS: u64 = 30;
pub const MIN_REFRESH_SECS: u64 = 5;
pub const MAX_REFRESH_SECS: u64 = 3600;

/// How the binary presents results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Fetch, print, exit
    Once,
    /// Print a fresh report on every refresh tick
    Watch,
    /// Serve the dashboard
    Server,
}

impl Mode {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "once" | "single" => Ok(Mode::Once),
            "watch" => Ok(Mode::Watch),
            "server" | "dashboard" => Ok(Mode::Server),
            other => bail!("Invalid mode '{}'. Use 'once', 'watch' or 'server'", other),
        }
    }
}

/// Runtime configuration read from PCR_* environment variables
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: Mode,
    pub symbol: String,
    pub expiry: Option<String>,
    pub port: u16,
    pub refresh_interval: Duration,
    pub strike_rows: Option<usize>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup so tests don't have to touch the process env
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = match lookup("PCR_MODE") {
            Some(value) => Mode::parse(&value)?,
            None => Mode::Once,
        };

        let symbol = lookup("PCR_SYMBOL")
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SYMBOL.to_string());

        let expiry = lookup("PCR_EXPIRY")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let port = lookup("PCR_PORT")
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let refresh_secs = lookup("PCR_REFRESH_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REFRESH_SECS)
            .clamp(MIN_REFRESH_SECS, MAX_REFRESH_SECS);

        let strike_rows = lookup("PCR_STRIKE_ROWS").and_then(|s| s.parse::<usize>().ok());

        Ok(Self {
            mode,
            symbol,
            expiry,
            port,
            refresh_interval: Duration::from_secs(refresh_secs),
            strike_rows,
        })
    }
}

/// Indices use a different option chain query type than equities
pub fn is_index(symbol: &str) -> bool {
    NSE_INDICES.contains(&symbol)
}
