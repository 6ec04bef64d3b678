//! Contract and oracle access
//!
//! This module handles everything that crosses the process boundary: the
//! JSON-RPC transport (an `ethers` provider), the HTTP relay, the contract
//! ABIs and the adapters for the FundMe contract and its price feed.

pub mod abi;
pub mod fundme;
pub mod price_feed;
pub mod relay;
pub mod rpc;

pub use abi::ContractFunction;
pub use fundme::{is_owner, ContractReads, FundMeContract, ReadState, WriteKind, WriteState};
pub use price_feed::{PriceFeed, PriceReading, RefreshGuard};
pub use relay::RelayClient;
pub use rpc::{ContractCaller, ContractTransaction, ReceiptStatus, RpcClient, WalletProvider};
