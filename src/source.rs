use crate::models::Snapshot;
use anyhow::Result;
use async_trait::async_trait;

/// Supplies option chain snapshots to the PCR engine.
///
/// Session handling, network I/O and vendor payload mapping live behind this
/// trait; the engine only ever sees the returned [`Snapshot`].
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch a fresh snapshot. `expiry = None` lets the source pick the
    /// nearest tradable expiry.
    async fn fetch(&self, symbol: &str, expiry: Option<&str>) -> Result<Snapshot>;
}
