use pcr_analyzer::models::OptionChain;
use pcr_analyzer::nse_client::snapshot_from_chain;
use pcr_analyzer::{build_report, OptionType, Signal};

#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN: &str = r#"{
        "records": {
            "timestamp": "16-Dec-2025 15:30:00",
            "underlyingValue": 18042.5,
            "data": [
                {
                    "expiryDates": "30-Dec-2025",
                    "strikePrice": 18000,
                    "CE": {"openInterest": 100, "changeinOpenInterest": 10, "lastPrice": 95.5},
                    "PE": {"openInterest": 150, "changeinOpenInterest": 20, "lastPrice": 40.0}
                },
                {
                    "expiryDates": "30-Dec-2025",
                    "strikePrice": 18100,
                    "CE": {"openInterest": 50, "changeinOpenInterest": -5, "lastPrice": 42.0},
                    "PE": {"openInterest": 40, "changeinOpenInterest": 10, "lastPrice": 88.0}
                },
                {
                    "expiryDates": "30-Dec-2025",
                    "strikePrice": 18200,
                    "CE": {"openInterest": 25, "changeinOpenInterest": 0}
                },
                {
                    "expiryDates": "06-Jan-2026",
                    "strikePrice": 18000,
                    "CE": {"openInterest": 9999, "changeinOpenInterest": 9999},
                    "PE": {"openInterest": 1, "changeinOpenInterest": 1}
                }
            ]
        }
    }"#;

    fn parse(json: &str) -> OptionChain {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_chain_maps_to_rows() {
        let snapshot = snapshot_from_chain("NIFTY", "30-Dec-2025", parse(CHAIN)).unwrap();

        assert_eq!(snapshot.symbol, "NIFTY");
        assert_eq!(snapshot.underlying_value, 18042.5);
        assert_eq!(snapshot.rows.len(), 5);
        assert_eq!(
            snapshot.rows.iter().filter(|r| r.option_type == OptionType::Call).count(),
            3
        );
    }

    #[test]
    fn test_mapped_chain_feeds_engine() {
        let snapshot = snapshot_from_chain("NIFTY", "30-Dec-2025", parse(CHAIN)).unwrap();
        let report = build_report(&snapshot).unwrap();

        // 18200 CE has no put leg: counted in call OI, absent from the table
        assert_eq!(report.analysis.totals.call_oi, 175);
        assert_eq!(report.analysis.totals.put_oi, 190);
        assert_eq!(report.analysis.aggregate.put_call_ratio_oi.value, 1.09);
        assert_eq!(report.analysis.strikes.len(), 2);
        assert_eq!(report.analysis.signal, Signal::Neutral);
    }

    #[test]
    fn test_negative_open_interest_is_rejected() {
        let json = r#"{"records":{"timestamp":"t","underlyingValue":1.0,"data":[
            {"strikePrice":100,"CE":{"openInterest":-5,"changeinOpenInterest":0}}
        ]}}"#;
        assert!(snapshot_from_chain("X", "30-Dec-2025", parse(json)).is_err());
    }

    #[test]
    fn test_missing_strike_is_rejected() {
        let json = r#"{"records":{"timestamp":"t","underlyingValue":1.0,"data":[
            {"PE":{"openInterest":5,"changeinOpenInterest":0}}
        ]}}"#;
        assert!(snapshot_from_chain("X", "30-Dec-2025", parse(json)).is_err());
    }

    #[test]
    fn test_out_of_range_open_interest_is_rejected() {
        let json = r#"{"records":{"timestamp":"t","underlyingValue":1.0,"data":[
            {"strikePrice":100,"PE":{"openInterest":1e20,"changeinOpenInterest":0}}
        ]}}"#;
        assert!(snapshot_from_chain("X", "30-Dec-2025", parse(json)).is_err());
    }
}
