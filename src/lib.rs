pub mod config;
pub mod console;
pub mod dashboard;
pub mod error;
pub mod logging;
pub mod models;
pub mod nse_client;
pub mod processor;
pub mod refresh;
pub mod rules;
pub mod source;

// Re-exports (public API)
pub use error::PcrError;
pub use models::{OptionChainRow, OptionType, Snapshot};
pub use nse_client::NSEClient;
pub use processor::{
    aggregate_open_interest,
    aggregate_pcr,
    analyze,
    build_report,
    ratio,
    strike_wise_pcr,
    AggregatePcr,
    OpenInterestTotals,
    PcrAnalysis,
    PcrReport,
    Ratio,
    StrikePcrRow,
};
pub use refresh::Refresher;
pub use rules::{classify_aggregate, classify_signal, Signal};
pub use source::SnapshotSource;
