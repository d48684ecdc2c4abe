use crate::config;
use crate::models::{ContractInfo, OptionChain, OptionChainRow, OptionDetail, OptionType, Security, Snapshot};
use crate::source::SnapshotSource;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use rand::{seq::SliceRandom, thread_rng};
use reqwest::{header, Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;
use tracing::{debug, info, warn};

// -----------------------------------------------
// CLIENT WRAPPER WITH SESSION STATE
// -----------------------------------------------
pub struct NSEClient {
    client: Client,
    warmed_up: Arc<RwLock<bool>>,
}

impl NSEClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            warmed_up: Arc::new(RwLock::new(false)),
        })
    }

    /// Warmup NSE session (only once per client)
    async fn warmup_if_needed(&self) -> Result<()> {
        if *self.warmed_up.read().await {
            return Ok(());
        }

        let mut warmed = self.warmed_up.write().await;
        if !*warmed {
            debug!("Warming up NSE session");
            let _ = self.client
                .get(config::NSE_BASE_URL)
                .header(header::ACCEPT, config::HEADER_ACCEPT_HTML)
                .send()
                .await
                .context("Failed to warm up NSE session")?;

            tokio::time::sleep(Duration::from_millis(config::WARMUP_DELAY_MS)).await;
            *warmed = true;
        }

        Ok(())
    }

    /// GET a JSON body, retrying on rate limits and server errors
    async fn fetch_json(&self, url: &str) -> Result<String> {
        self.warmup_if_needed().await?;

        let backoff = ExponentialBackoff::from_millis(config::RETRY_BASE_DELAY_MS)
            .factor(config::RETRY_FACTOR)
            .max_delay(Duration::from_secs(config::RETRY_MAX_DELAY_SECS))
            .take(config::RETRY_MAX_ATTEMPTS);

        Retry::spawn(backoff, || async {
            let res = self.client
                .get(url)
                .header(header::REFERER, config::HEADER_REFERER)
                .header("X-Requested-With", config::HEADER_X_REQUESTED_WITH)
                .send()
                .await
                .context("Request send failed")?;

            let status = res.status();
            debug!(url, status = status.as_u16(), "NSE response");

            if status.is_success() {
                let text = res.text().await.context("Failed to read body")?;
                ensure_json(&text)?;
                Ok(text)
            } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                warn!(url, %status, "Retryable NSE error");
                bail!("Retryable error: {}", status)
            } else {
                let body = res.text().await.unwrap_or_default();
                let preview: String = body.chars().take(200).collect();
                bail!("Client error {}: {}", status, preview)
            }
        })
        .await
    }

    pub async fn fetch_contract_info(&self, symbol: &str) -> Result<ContractInfo> {
        let url = config::nse_contract_info_url(symbol);
        let text = self.fetch_json(&url).await?;
        let info: ContractInfo = serde_json::from_str(&text)
            .context("Failed to parse contract info")?;

        Ok(info)
    }

    pub async fn fetch_option_chain(&self, security: &Security, expiry: &str) -> Result<OptionChain> {
        let url = config::nse_option_chain_url(security.security_type.as_query(), &security.symbol, expiry);
        let text = self.fetch_json(&url).await?;
        let chain: OptionChain = serde_json::from_str(&text)
            .context("Failed to parse option chain")?;

        Ok(chain)
    }

    /// Nearest tradable expiry for a symbol
    pub async fn resolve_expiry(&self, symbol: &str) -> Result<String> {
        let info = self.fetch_contract_info(symbol).await?;
        let expiry = select_expiry(&info.expiry_dates, Local::now().naive_local())?;
        info!(symbol, expiry = %expiry, "Resolved nearest expiry");
        Ok(expiry.clone())
    }
}

#[async_trait]
impl SnapshotSource for NSEClient {
    async fn fetch(&self, symbol: &str, expiry: Option<&str>) -> Result<Snapshot> {
        let security = if config::is_index(symbol) {
            Security::index(symbol.to_string())
        } else {
            Security::equity(symbol.to_string())
        };

        let expiry = match expiry {
            Some(e) => e.to_string(),
            None => self.resolve_expiry(symbol).await?,
        };

        let chain = self.fetch_option_chain(&security, &expiry).await?;
        let snapshot = snapshot_from_chain(&security.symbol, &expiry, chain)?;
        info!(symbol, expiry = %expiry, rows = snapshot.rows.len(), "Fetched option chain");

        Ok(snapshot)
    }
}

// -----------------------------------------------
// PAYLOAD → SNAPSHOT MAPPING
// -----------------------------------------------

/// Flatten per-strike CE/PE legs into snapshot rows.
///
/// Malformed entries reject the whole chain. Entries tagged with a different
/// expiry are skipped.
pub fn snapshot_from_chain(symbol: &str, expiry: &str, chain: OptionChain) -> Result<Snapshot> {
    let mut rows = Vec::with_capacity(chain.records.data.len() * 2);

    for (idx, entry) in chain.records.data.into_iter().enumerate() {
        if let Some(entry_expiry) = entry.expiry_date.as_deref() {
            if !entry_expiry.eq_ignore_ascii_case(expiry) {
                continue;
            }
        }

        let strike = entry
            .strike_price
            .ok_or_else(|| anyhow!("Option chain entry {} has no strike price", idx))?;
        if !strike.is_finite() || strike < 0.0 {
            bail!("Option chain entry {} has invalid strike price {}", idx, strike);
        }

        if let Some(ce) = entry.call {
            rows.push(row_from_detail(OptionType::Call, strike, &ce)
                .with_context(|| format!("Invalid CE leg at strike {}", strike))?);
        }
        if let Some(pe) = entry.put {
            rows.push(row_from_detail(OptionType::Put, strike, &pe)
                .with_context(|| format!("Invalid PE leg at strike {}", strike))?);
        }
    }

    Ok(Snapshot {
        symbol: symbol.to_string(),
        expiry: expiry.to_string(),
        timestamp: chain.records.timestamp,
        underlying_value: chain.records.underlying_value,
        rows,
    })
}

fn row_from_detail(option_type: OptionType, strike: f64, detail: &OptionDetail) -> Result<OptionChainRow> {
    let open_interest = contracts(detail.open_interest, "open interest")?;
    if open_interest < 0 {
        bail!("negative open interest {}", open_interest);
    }
    let change_in_oi = contracts(detail.change_in_oi, "change in open interest")?;

    Ok(OptionChainRow {
        option_type,
        strike_price: strike,
        open_interest,
        change_in_oi,
    })
}

/// Contract counts arrive as JSON numbers; missing means zero
fn contracts(value: Option<f64>, field: &str) -> Result<i64> {
    let v = match value {
        None => return Ok(0),
        Some(v) if v.is_finite() => v.round(),
        Some(v) => bail!("non-finite {} {}", field, v),
    };

    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    if v < i64::MIN as f64 || v >= i64::MAX as f64 {
        bail!("{} {} out of range", field, v);
    }
    Ok(v as i64)
}

fn ensure_json(text: &str) -> Result<()> {
    let trimmed = text.trim();
    if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
        let preview: String = text.chars().take(200).collect();
        bail!("Non-JSON response: {}", preview);
    }
    Ok(())
}

// -----------------------------------------------
// EXPIRY SELECTION
// -----------------------------------------------

/// Earliest expiry that is still tradable at `now`.
///
/// Past dates are skipped; today's expiry only counts before market close.
pub fn select_expiry(expiry_dates: &[String], now: NaiveDateTime) -> Result<&String> {
    if expiry_dates.is_empty() {
        bail!("No expiry dates found");
    }

    let mut parsed: Vec<(NaiveDate, usize)> = Vec::with_capacity(expiry_dates.len());
    for (idx, s) in expiry_dates.iter().enumerate() {
        let d = NaiveDate::parse_from_str(s, config::EXPIRY_DATE_FORMAT)
            .with_context(|| format!("Failed to parse expiry date: {}", s))?;
        parsed.push((d, idx));
    }
    parsed.sort_by_key(|(d, _)| *d);

    let today = now.date();
    let cutoff = NaiveTime::from_hms_opt(config::MARKET_CLOSE_HOUR, config::MARKET_CLOSE_MINUTE, 0)
        .ok_or_else(|| anyhow!("Invalid market close time"))?;

    parsed
        .into_iter()
        .find(|(date, _)| *date > today || (*date == today && now.time() < cutoff))
        .map(|(_, idx)| &expiry_dates[idx])
        .ok_or_else(|| anyhow!("No valid expiry found (all past or after cutoff)"))
}

// -----------------------------------------------
// HTTP CLIENT BUILDER
// -----------------------------------------------
fn build_client() -> Result<Client> {
    let mut headers = header::HeaderMap::new();

    // Rotating Accept-Language headers (fingerprint avoidance)
    let lang = config::ACCEPT_LANGUAGES
        .choose(&mut thread_rng())
        .copied()
        .unwrap_or("en-US,en;q=0.9");
    headers.insert(header::ACCEPT_LANGUAGE, header::HeaderValue::from_str(lang)?);
    headers.insert(header::ACCEPT, header::HeaderValue::from_static("*/*"));

    Client::builder()
        .default_headers(headers)
        .cookie_store(true) // crucial for NSE
        .user_agent(config::USER_AGENT)
        .timeout(config::HTTP_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn expiries() -> Vec<String> {
        vec![
            "30-Dec-2025".to_string(),
            "23-Dec-2025".to_string(),
            "16-Dec-2025".to_string(),
        ]
    }

    #[test]
    fn test_select_expiry_skips_past_dates() {
        let dates = expiries();
        assert_eq!(select_expiry(&dates, at("2025-12-17", 10, 0)).unwrap(), "23-Dec-2025");
    }

    #[test]
    fn test_select_expiry_today_before_and_after_close() {
        let dates = expiries();
        assert_eq!(select_expiry(&dates, at("2025-12-16", 15, 29)).unwrap(), "16-Dec-2025");
        assert_eq!(select_expiry(&dates, at("2025-12-16", 15, 30)).unwrap(), "23-Dec-2025");
    }

    #[test]
    fn test_select_expiry_errors() {
        assert!(select_expiry(&[], at("2025-12-16", 9, 0)).is_err());
        assert!(select_expiry(&expiries(), at("2026-01-05", 9, 0)).is_err());
        assert!(select_expiry(&["2025/12/30".to_string()], at("2025-12-16", 9, 0)).is_err());
    }

    #[test]
    fn test_ensure_json() {
        assert!(ensure_json("  {\"records\":{}}").is_ok());
        assert!(ensure_json("[1,2]").is_ok());
        assert!(ensure_json("<html>Access Denied</html>").is_err());
    }

    #[test]
    fn test_contracts_handles_missing_and_non_finite() {
        assert_eq!(contracts(None, "oi").unwrap(), 0);
        assert_eq!(contracts(Some(1500.0), "oi").unwrap(), 1500);
        assert_eq!(contracts(Some(-25.0), "oi").unwrap(), -25);
        assert!(contracts(Some(f64::INFINITY), "oi").is_err());
    }

    #[test]
    fn test_contracts_rejects_out_of_range() {
        assert!(contracts(Some(1e20), "oi").is_err());
        assert!(contracts(Some(-1e20), "oi").is_err());
        assert!(contracts(Some(9_223_372_036_854_775_808.0), "oi").is_err());
        assert_eq!(contracts(Some(-9_223_372_036_854_775_808.0), "oi").unwrap(), i64::MIN);
        assert_eq!(contracts(Some(1e15), "oi").unwrap(), 1_000_000_000_000_000);
    }
}
