//! Error handling for the dashboard
//!
//! This module provides the error types shared by the contract adapters,
//! the price feed, storage and the CLI.

use ethers::providers::{ProviderError, RpcError};
use std::fmt;

/// Result type alias for dashboard operations
pub type Result<T> = std::result::Result<T, DashboardError>;

/// Error types for dashboard operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardError {
    /// JSON-RPC transport or node errors
    Rpc(String),
    /// Node rejected the call because the contract reverted
    Reverted(String),
    /// HTTP relay transport or body errors
    Relay(String),
    /// The relay answered with a non-2xx status
    RelayStatus { function: String, status: u16 },
    /// ABI encoding/decoding errors
    Abi(String),
    /// Contract missing or returned something unexpected
    Contract(String),
    /// Configuration errors
    Config(String),
    /// Key-value storage errors
    Storage(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// File I/O errors
    Io(String),
    /// Invalid address format
    InvalidAddress(String),
    /// Invalid user-entered amount
    InvalidAmount(String),
    /// Wallet/session provider errors
    Wallet(String),
}

impl fmt::Display for DashboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DashboardError::Rpc(msg) => write!(f, "RPC error: {msg}"),
            DashboardError::Reverted(msg) => write!(f, "Execution reverted: {msg}"),
            DashboardError::Relay(msg) => write!(f, "Relay error: {msg}"),
            DashboardError::RelayStatus { function, status } => {
                write!(f, "Relay error: {function}: HTTP {status}")
            }
            DashboardError::Abi(msg) => write!(f, "ABI error: {msg}"),
            DashboardError::Contract(msg) => write!(f, "Contract error: {msg}"),
            DashboardError::Config(msg) => write!(f, "Configuration error: {msg}"),
            DashboardError::Storage(msg) => write!(f, "Storage error: {msg}"),
            DashboardError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            DashboardError::Io(msg) => write!(f, "I/O error: {msg}"),
            DashboardError::InvalidAddress(addr) => write!(f, "Invalid address: {addr}"),
            DashboardError::InvalidAmount(amount) => write!(f, "Invalid amount: {amount}"),
            DashboardError::Wallet(msg) => write!(f, "Wallet error: {msg}"),
        }
    }
}

impl std::error::Error for DashboardError {}

impl From<std::io::Error> for DashboardError {
    fn from(err: std::io::Error) -> Self {
        DashboardError::Io(err.to_string())
    }
}

impl From<sled::Error> for DashboardError {
    fn from(err: sled::Error) -> Self {
        DashboardError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> Self {
        DashboardError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for DashboardError {
    fn from(err: toml::de::Error) -> Self {
        DashboardError::Config(err.to_string())
    }
}

impl From<ProviderError> for DashboardError {
    fn from(err: ProviderError) -> Self {
        match err.as_error_response() {
            Some(response) if response.code == 3 || response.message.contains("revert") => {
                DashboardError::Reverted(response.message.clone())
            }
            _ => DashboardError::Rpc(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = DashboardError::InvalidAddress("0x12".to_string());
        assert_eq!(err.to_string(), "Invalid address: 0x12");

        let err = DashboardError::RelayStatus {
            function: "getFunder".to_string(),
            status: 404,
        };
        assert_eq!(err.to_string(), "Relay error: getFunder: HTTP 404");

        let err = DashboardError::InvalidAmount("abc".to_string());
        assert_eq!(err.to_string(), "Invalid amount: abc");
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: DashboardError = io.into();
        assert!(matches!(err, DashboardError::Io(_)));
    }
}
