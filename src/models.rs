use crate::error::PcrError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// -----------------------------------------------
// SNAPSHOT MODEL (input to the PCR engine)
// -----------------------------------------------

/// Side of an option contract
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String")]
pub enum OptionType {
    #[serde(rename = "CE")]
    Call,
    #[serde(rename = "PE")]
    Put,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionType::Call => "CE",
            OptionType::Put => "PE",
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionType {
    type Err = PcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CE" | "CALL" => Ok(OptionType::Call),
            "PE" | "PUT" => Ok(OptionType::Put),
            _ => Err(PcrError::UnknownOptionType(s.to_string())),
        }
    }
}

impl TryFrom<String> for OptionType {
    type Error = PcrError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One contract observation in an option chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionChainRow {
    #[serde(rename = "optionType")]
    pub option_type: OptionType,

    #[serde(rename = "strikePrice")]
    pub strike_price: f64,

    #[serde(rename = "openInterest")]
    pub open_interest: i64,

    #[serde(rename = "changeInOpenInterest")]
    pub change_in_oi: i64,
}

impl OptionChainRow {
    pub fn call(strike_price: f64, open_interest: i64, change_in_oi: i64) -> Self {
        Self { option_type: OptionType::Call, strike_price, open_interest, change_in_oi }
    }

    pub fn put(strike_price: f64, open_interest: i64, change_in_oi: i64) -> Self {
        Self { option_type: OptionType::Put, strike_price, open_interest, change_in_oi }
    }
}

/// Option chain for one underlying/expiry pair at one point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub symbol: String,
    pub expiry: String,
    pub timestamp: String,
    pub underlying_value: f64,
    pub rows: Vec<OptionChainRow>,
}

// -----------------------------------------------
// NSE PAYLOADS
// -----------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Security {
    pub symbol: String,
    pub security_type: SecurityType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SecurityType {
    Equity,
    Indices,
}

impl SecurityType {
    /// Value of the `type` query parameter on the option chain endpoint
    pub fn as_query(&self) -> &'static str {
        match self {
            SecurityType::Equity => "Equity",
            SecurityType::Indices => "Indices",
        }
    }
}

impl Security {
    pub fn equity(symbol: String) -> Self {
        Self { symbol, security_type: SecurityType::Equity }
    }

    pub fn index(symbol: String) -> Self {
        Self { symbol, security_type: SecurityType::Indices }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractInfo {
    #[serde(rename = "expiryDates")]
    pub expiry_dates: Vec<String>,
}

/// Response from the NSE option chain API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionChain {
    pub records: Records,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Records {
    pub timestamp: String,

    #[serde(rename = "underlyingValue")]
    pub underlying_value: f64,

    pub data: Vec<OptionData>,
}

/// CE and PE legs for one strike
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionData {
    #[serde(rename = "expiryDates")]
    pub expiry_date: Option<String>,

    #[serde(rename = "strikePrice")]
    pub strike_price: Option<f64>,

    #[serde(rename = "CE")]
    pub call: Option<OptionDetail>,

    #[serde(rename = "PE")]
    pub put: Option<OptionDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionDetail {
    #[serde(rename = "openInterest")]
    pub open_interest: Option<f64>,

    #[serde(rename = "changeinOpenInterest")]
    pub change_in_oi: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_type_parsing() {
        assert_eq!("CE".parse::<OptionType>().unwrap(), OptionType::Call);
        assert_eq!("call".parse::<OptionType>().unwrap(), OptionType::Call);
        assert_eq!(" PE ".parse::<OptionType>().unwrap(), OptionType::Put);
        assert_eq!("Put".parse::<OptionType>().unwrap(), OptionType::Put);
        assert_eq!(
            "FUT".parse::<OptionType>(),
            Err(PcrError::UnknownOptionType("FUT".to_string()))
        );
    }

    #[test]
    fn test_row_deserialization_rejects_unknown_type() {
        let ok = r#"{"optionType":"PE","strikePrice":18000.0,"openInterest":150,"changeInOpenInterest":-20}"#;
        let row: OptionChainRow = serde_json::from_str(ok).unwrap();
        assert_eq!(row, OptionChainRow::put(18000.0, 150, -20));

        let bad = r#"{"optionType":"XX","strikePrice":18000.0,"openInterest":150,"changeInOpenInterest":0}"#;
        assert!(serde_json::from_str::<OptionChainRow>(bad).is_err());
    }

    #[test]
    fn test_row_serializes_short_side_code() {
        let json = serde_json::to_value(OptionChainRow::call(100.0, 1, 0)).unwrap();
        assert_eq!(json["optionType"], "CE");
    }
}
