use crate::error::{PcrError, Result};
use crate::models::{OptionChainRow, OptionType, Snapshot};
use crate::rules::{classify_aggregate, Signal};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Ratio rounded to 2 decimals. A zero denominator yields 0 with the flag set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Ratio {
    pub value: f64,
    pub zero_denominator: bool,
}

/// Per-side sums over a snapshot.
///
/// Rows carry `i64` counts; sums are widened to `i128` so any number of valid
/// rows adds up without overflow.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpenInterestTotals {
    pub call_oi: i128,
    pub put_oi: i128,
    pub call_oi_change: i128,
    pub put_oi_change: i128,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AggregatePcr {
    pub put_call_ratio_oi: Ratio,
    pub put_call_ratio_oi_change: Ratio,
}

/// One strike present on both the call and the put side
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrikePcrRow {
    pub strike_price: f64,
    pub call_oi: i128,
    pub put_oi: i128,
    pub call_oi_change: i128,
    pub put_oi_change: i128,
    pub pcr: Ratio,
    pub pcr_oi_change: Ratio,
}

/// Complete engine output for one snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PcrAnalysis {
    pub totals: OpenInterestTotals,
    pub aggregate: AggregatePcr,
    pub strikes: Vec<StrikePcrRow>,
    pub signal: Signal,
}

/// Analysis paired with the snapshot it was computed from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcrReport {
    pub symbol: String,
    pub expiry: String,
    pub timestamp: String,
    pub underlying_value: f64,
    pub generated_at: DateTime<Local>,
    #[serde(flatten)]
    pub analysis: PcrAnalysis,
}

/// Round to 2 decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// numerator / denominator rounded to 2 decimals, or the 0 sentinel
pub fn ratio(numerator: i128, denominator: i128) -> Ratio {
    if denominator == 0 {
        return Ratio { value: 0.0, zero_denominator: true };
    }

    Ratio {
        value: round2(numerator as f64 / denominator as f64),
        zero_denominator: false,
    }
}

/// Reject the whole snapshot if any row is malformed
pub fn validate_rows(rows: &[OptionChainRow]) -> Result<()> {
    for (index, row) in rows.iter().enumerate() {
        if row.open_interest < 0 {
            return Err(PcrError::InvalidInput {
                index,
                reason: format!("negative open interest {}", row.open_interest),
            });
        }

        if !row.strike_price.is_finite() || row.strike_price < 0.0 {
            return Err(PcrError::InvalidInput {
                index,
                reason: format!("invalid strike price {}", row.strike_price),
            });
        }
    }

    Ok(())
}

/// Sum OI and OI change per side. Empty partitions sum to 0.
pub fn aggregate_open_interest(rows: &[OptionChainRow]) -> OpenInterestTotals {
    rows.iter().fold(OpenInterestTotals::default(), |mut totals, row| {
        match row.option_type {
            OptionType::Call => {
                totals.call_oi += i128::from(row.open_interest);
                totals.call_oi_change += i128::from(row.change_in_oi);
            }
            OptionType::Put => {
                totals.put_oi += i128::from(row.open_interest);
                totals.put_oi_change += i128::from(row.change_in_oi);
            }
        }
        totals
    })
}

pub fn aggregate_pcr(totals: &OpenInterestTotals) -> AggregatePcr {
    AggregatePcr {
        put_call_ratio_oi: ratio(totals.put_oi, totals.call_oi),
        put_call_ratio_oi_change: ratio(totals.put_oi_change, totals.call_oi_change),
    }
}

/// Strike used as an ordered map key (strikes are validated finite)
#[derive(Debug, Clone, Copy)]
struct StrikeKey(f64);

impl PartialEq for StrikeKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for StrikeKey {}

impl PartialOrd for StrikeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StrikeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // +0.0 normalizes -0.0 so both compare equal
        (self.0 + 0.0).total_cmp(&(other.0 + 0.0))
    }
}

/// (OI, OI change) per strike for one side
fn project_side(rows: &[OptionChainRow], side: OptionType) -> BTreeMap<StrikeKey, (i128, i128)> {
    let mut projected = BTreeMap::new();

    for row in rows.iter().filter(|r| r.option_type == side) {
        let entry = projected.entry(StrikeKey(row.strike_price)).or_insert((0, 0));
        entry.0 += i128::from(row.open_interest);
        entry.1 += i128::from(row.change_in_oi);
    }

    projected
}

/// Inner join of call and put legs on strike, ascending by strike.
///
/// Strikes quoted on only one side are dropped here but still count towards
/// [`aggregate_open_interest`].
pub fn strike_wise_pcr(rows: &[OptionChainRow]) -> Vec<StrikePcrRow> {
    let calls = project_side(rows, OptionType::Call);
    let puts = project_side(rows, OptionType::Put);

    calls
        .iter()
        .filter_map(|(strike, &(call_oi, call_oi_change))| {
            let &(put_oi, put_oi_change) = puts.get(strike)?;

            Some(StrikePcrRow {
                strike_price: strike.0,
                call_oi,
                put_oi,
                call_oi_change,
                put_oi_change,
                pcr: ratio(put_oi, call_oi),
                pcr_oi_change: ratio(put_oi_change, call_oi_change),
            })
        })
        .collect()
}

/// Validate, aggregate, join and classify one snapshot
pub fn analyze(rows: &[OptionChainRow]) -> Result<PcrAnalysis> {
    validate_rows(rows)?;

    let totals = aggregate_open_interest(rows);
    let aggregate = aggregate_pcr(&totals);
    let strikes = strike_wise_pcr(rows);
    let signal = classify_aggregate(&aggregate);

    Ok(PcrAnalysis { totals, aggregate, strikes, signal })
}

pub fn build_report(snapshot: &Snapshot) -> Result<PcrReport> {
    let analysis = analyze(&snapshot.rows)?;

    Ok(PcrReport {
        symbol: snapshot.symbol.clone(),
        expiry: snapshot.expiry.clone(),
        timestamp: snapshot.timestamp.clone(),
        underlying_value: snapshot.underlying_value,
        generated_at: Local::now(),
        analysis,
    })
}
