use crate::processor::{self, PcrReport};
use crate::source::SnapshotSource;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Drives fetch → analyze on a fixed cadence.
///
/// The engine stays stateless; this is the only place that knows about time.
#[derive(Clone)]
pub struct Refresher {
    source: Arc<dyn SnapshotSource>,
    symbol: String,
    expiry: Option<String>,
    interval: Duration,
}

impl Refresher {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        symbol: impl Into<String>,
        expiry: Option<String>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            symbol: symbol.into(),
            expiry,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One fetch + analysis pass
    pub async fn tick(&self) -> Result<PcrReport> {
        let snapshot = self.source
            .fetch(&self.symbol, self.expiry.as_deref())
            .await
            .with_context(|| format!("Failed to fetch option chain for {}", self.symbol))?;

        let report = processor::build_report(&snapshot)
            .with_context(|| format!("Rejected option chain for {}", self.symbol))?;

        info!(
            symbol = %report.symbol,
            pcr = report.analysis.aggregate.put_call_ratio_oi.value,
            pcr_oi_change = report.analysis.aggregate.put_call_ratio_oi_change.value,
            signal = %report.analysis.signal,
            "PCR refreshed"
        );

        Ok(report)
    }

    /// Tick forever, handing every outcome to `sink`. Failed ticks are logged
    /// and the loop carries on with the next one.
    pub async fn run<F>(&self, mut sink: F)
    where
        F: FnMut(Result<PcrReport>),
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let outcome = self.tick().await;
            if let Err(e) = &outcome {
                error!(symbol = %self.symbol, "Refresh failed: {:#}", e);
            }
            sink(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OptionChainRow, Snapshot};
    use crate::rules::Signal;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource {
        rows: Vec<OptionChainRow>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SnapshotSource for FixedSource {
        async fn fetch(&self, symbol: &str, expiry: Option<&str>) -> Result<Snapshot> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n == 1 {
                anyhow::bail!("simulated outage");
            }
            Ok(Snapshot {
                symbol: symbol.to_string(),
                expiry: expiry.unwrap_or("30-Dec-2025").to_string(),
                timestamp: "16-Dec-2025 10:00:00".to_string(),
                underlying_value: 18050.0,
                rows: self.rows.clone(),
            })
        }
    }

    fn source() -> Arc<FixedSource> {
        Arc::new(FixedSource {
            rows: vec![
                OptionChainRow::call(18000.0, 100, 10),
                OptionChainRow::put(18000.0, 150, 20),
            ],
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_tick_builds_report() {
        let refresher = Refresher::new(source(), "NIFTY", None, Duration::from_secs(30));
        let report = refresher.tick().await.unwrap();

        assert_eq!(report.symbol, "NIFTY");
        assert_eq!(report.expiry, "30-Dec-2025");
        assert_eq!(report.analysis.aggregate.put_call_ratio_oi.value, 1.5);
        assert_eq!(report.analysis.signal, Signal::StrongBullish);
    }

    #[tokio::test]
    async fn test_tick_rejects_invalid_snapshot() {
        let bad = Arc::new(FixedSource {
            rows: vec![OptionChainRow::call(18000.0, -1, 0)],
            calls: AtomicUsize::new(0),
        });
        let refresher = Refresher::new(bad, "NIFTY", None, Duration::from_secs(30));
        assert!(refresher.tick().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_survives_failed_ticks() {
        let src = source();
        let refresher = Refresher::new(src.clone(), "NIFTY", Some("30-Dec-2025".into()), Duration::from_secs(30));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            refresher.run(move |outcome| {
                let _ = tx.send(outcome.is_ok());
            }).await;
        });

        let mut outcomes = Vec::new();
        for _ in 0..3 {
            outcomes.push(rx.recv().await.unwrap());
        }
        handle.abort();

        assert_eq!(outcomes, vec![true, false, true]);
        assert_eq!(src.calls.load(Ordering::SeqCst), 3);
    }
}
