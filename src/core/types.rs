//! Shared data model
//!
//! Everything here is recomputed from the contract on each fetch cycle.
//! Nothing in this module is persisted.

use crate::error::{DashboardError, Result};
use serde::Serialize;

pub use ethers::types::{Address, U256};

/// Length of an account address in bytes
pub const ADDRESS_LEN: usize = 20;

/// Parse a 40-digit hex address, with or without the `0x` prefix.
///
/// Letter case is ignored, so two spellings of the same account compare
/// equal once parsed.
pub fn parse_address(text: &str) -> Result<Address> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.len() != ADDRESS_LEN * 2 {
        return Err(DashboardError::InvalidAddress(text.to_string()));
    }
    digits
        .parse::<Address>()
        .map_err(|_| DashboardError::InvalidAddress(text.to_string()))
}

/// Full lowercase `0x` hex. `Display` on [`Address`] abbreviates, this doesn't.
pub fn address_hex(address: &Address) -> String {
    format!("{address:#x}")
}

/// An address that has contributed to the contract, with its cumulative amount (wei)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Funder {
    pub address: Address,
    pub amount: U256,
}

/// Derived totals over the funder set
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AggregateTotals {
    pub total_funded: U256,
    pub funder_count: usize,
}

impl AggregateTotals {
    pub fn empty() -> Self {
        AggregateTotals::default()
    }
}

/// Oracle answer from `latestRoundData()`.
///
/// `answer` keeps the oracle's 8-decimal fixed-point value as-is, including
/// negative or stale values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceQuote {
    pub round_id: u128,
    pub answer: i128,
    pub started_at: u64,
    pub updated_at: u64,
    pub answered_in_round: u128,
}

impl PriceQuote {
    /// Floating price per display unit (`answer / 10^8`), for display math only
    pub fn price(&self) -> f64 {
        self.answer as f64 / 10f64.powi(crate::core::monetary::PRICE_FEED_DECIMALS as i32)
    }
}

/// One bucket of the synthetic funding projection used for charting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundingHistoryPoint {
    pub label: String,
    pub eth_amount: f64,
    pub usd_amount: f64,
}
