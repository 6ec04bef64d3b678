//! In-memory chain for tests and offline runs
//!
//! Stands in for the node, the FundMe deployment and its price feed.

#[cfg(test)]
pub mod http_stub;
pub mod mock_chain;

pub use mock_chain::{MockChain, DEFAULT_ANSWER, SEPOLIA_CHAIN_ID};
