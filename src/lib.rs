//! # FundMe Dashboard - My Crowdfunding Contract Dashboard
//!
//! This is the core of the dashboard I use to watch and operate a FundMe
//! crowdfunding contract on Sepolia. When I come back to this code, here's
//! what I need to remember:
//!
//! ## What I Built
//! - **Contract Adapter**: Typed reads and writes against FundMe through an `ethers` provider
//! - **Price Oracle**: ETH/USD from the contract's Chainlink-style feed, cached for 60 s
//! - **Aggregation**: Walks the funder list by index and folds it into totals
//! - **Relay Reads**: The same funder walk through an HTTP read-contract relay
//! - **Projection**: A clearly synthetic monthly chart series built from the totals
//! - **Preferences**: Light/dark theme persisted with sled
//!
//! ## How I Organized My Code
//! - `core/`: Unit conversions, data types, aggregation and the projection
//! - `network/`: Contract ABIs, JSON-RPC, relay, price feed and the contract adapter
//! - `wallet/`: Connected address and chain checks
//! - `storage/`: The theme preference store
//! - `config/`: Environment settings and the `fundme.toml` tunables
//! - `utils/`: The notification queue
//! - `cli/`: Command-line interface for every panel
//! - `testnet/`: An in-memory deployment for offline runs and tests
//!
//! ## Key Design Decisions I Made
//! - Amounts stay as `U256` wei until the last moment; floats only for price math
//! - Adapter writes never fail, they report through state flags and notifications
//! - A newer aggregation run always supersedes an older one
//! - The chart is a projection, and its type says so

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod storage;
pub mod testnet;
pub mod utils;
pub mod wallet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::{Config, DashboardSettings, GLOBAL_CONFIG, SETTINGS_FILE};
pub use core::{
    aggregate_funders, parse_address, Address, AggregateSnapshot, AggregateTotals,
    AggregationRunner, DataOrigin, Funder, FunderScan, FunderSource, FundingHistoryPoint,
    PriceQuote, ProjectionSource, ScanEnd, SyntheticProjection, U256,
};
pub use error::{DashboardError, Result};
pub use network::{
    ContractCaller, FundMeContract, PriceFeed, RelayClient, RpcClient, WalletProvider,
};
pub use storage::{Theme, ThemeStore};
pub use utils::Notifier;
pub use wallet::WalletSession;
