//! Wallet session
//!
//! The wallet provider holds the keys and signs; this module only tracks the
//! connected address and chain.

pub mod session;

pub use session::{WalletSession, EXPECTED_CHAIN_ID};
