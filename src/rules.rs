use crate::config;
use crate::processor::AggregatePcr;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading signal derived from the aggregate ratios
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    StrongBullish,
    StrongBearish,
    Neutral,
}

impl Signal {
    pub fn code(&self) -> &'static str {
        match self {
            Signal::StrongBullish => "STRONG_BULLISH",
            Signal::StrongBearish => "STRONG_BEARISH",
            Signal::Neutral => "NEUTRAL",
        }
    }

    /// Human readable action shown by the console and dashboard
    pub fn label(&self) -> &'static str {
        match self {
            Signal::StrongBullish => "BUY (Bullish Market)",
            Signal::StrongBearish => "SELL (Bearish Market)",
            Signal::Neutral => "NO TRADE (Sideways)",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Classify the market from aggregate PCR and PCR of OI change.
///
/// Both conditions must agree, with strict inequalities; anything else is
/// neutral. No state is carried between calls.
pub fn classify_signal(pcr: f64, pcr_oi_change: f64) -> Signal {
    if pcr > config::BULLISH_PCR_THRESHOLD && pcr_oi_change > config::OI_CHANGE_PCR_PIVOT {
        Signal::StrongBullish
    } else if pcr < config::BEARISH_PCR_THRESHOLD && pcr_oi_change < config::OI_CHANGE_PCR_PIVOT {
        Signal::StrongBearish
    } else {
        Signal::Neutral
    }
}

/// Classify aggregate ratios, treating a zero-denominator sentinel as no data.
///
/// An empty or one-sided snapshot would otherwise read as a 0.00 PCR and be
/// classified bearish.
pub fn classify_aggregate(aggregate: &AggregatePcr) -> Signal {
    let pcr = aggregate.put_call_ratio_oi;
    let pcr_oi_change = aggregate.put_call_ratio_oi_change;

    if pcr.zero_denominator || pcr_oi_change.zero_denominator {
        return Signal::Neutral;
    }

    classify_signal(pcr.value, pcr_oi_change.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::ratio;

    #[test]
    fn test_bullish_requires_both_ratios() {
        assert_eq!(classify_signal(1.27, 6.0), Signal::StrongBullish);
        assert_eq!(classify_signal(1.5, 0.8), Signal::Neutral);
        assert_eq!(classify_signal(1.5, 1.0), Signal::Neutral);
    }

    #[test]
    fn test_bearish_requires_both_ratios() {
        assert_eq!(classify_signal(0.6, 0.4), Signal::StrongBearish);
        assert_eq!(classify_signal(0.6, 1.4), Signal::Neutral);
        assert_eq!(classify_signal(0.6, 1.0), Signal::Neutral);
    }

    #[test]
    fn test_thresholds_are_strict() {
        assert_eq!(classify_signal(1.1, 5.0), Signal::Neutral);
        assert_eq!(classify_signal(0.9, 0.1), Signal::Neutral);
        assert_eq!(classify_signal(1.11, 1.01), Signal::StrongBullish);
        assert_eq!(classify_signal(0.89, 0.99), Signal::StrongBearish);
    }

    #[test]
    fn test_sentinel_ratios_are_neutral() {
        let no_calls = AggregatePcr {
            put_call_ratio_oi: ratio(100, 0),
            put_call_ratio_oi_change: ratio(10, 0),
        };
        assert_eq!(classify_aggregate(&no_calls), Signal::Neutral);

        let flat_call_change = AggregatePcr {
            put_call_ratio_oi: ratio(50, 100),
            put_call_ratio_oi_change: ratio(-10, 0),
        };
        assert_eq!(classify_aggregate(&flat_call_change), Signal::Neutral);

        let bearish = AggregatePcr {
            put_call_ratio_oi: ratio(50, 100),
            put_call_ratio_oi_change: ratio(5, 10),
        };
        assert_eq!(classify_aggregate(&bearish), Signal::StrongBearish);
    }

    #[test]
    fn test_signal_serialization() {
        assert_eq!(serde_json::to_string(&Signal::StrongBullish).unwrap(), "\"STRONG_BULLISH\"");
        assert_eq!(serde_json::to_string(&Signal::Neutral).unwrap(), "\"NEUTRAL\"");
        assert_eq!(Signal::StrongBearish.to_string(), "STRONG_BEARISH");
        assert_eq!(Signal::StrongBearish.label(), "SELL (Bearish Market)");
    }
}
