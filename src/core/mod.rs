//! Core dashboard logic
//!
//! Unit conversions, the shared data model, funder aggregation and the
//! synthetic chart projection. Nothing here talks to the network directly.

pub mod aggregation;
pub mod history;
pub mod monetary;
pub mod types;

pub use aggregation::{
    aggregate_funders, AggregateSnapshot, AggregationRunner, DataOrigin, FunderScan,
    FunderSource, ScanEnd, CHART_FUNDER_CAP, STATS_FUNDER_CAP,
};
pub use history::{ProjectionSource, SyntheticProjection};
pub use monetary::{PRICE_FEED_DECIMALS, WEI_DECIMALS};
pub use types::{
    address_hex, parse_address, Address, AggregateTotals, Funder, FundingHistoryPoint, PriceQuote,
    U256,
};
