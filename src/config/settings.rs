use crate::core::types::{parse_address, Address};
use crate::error::{DashboardError, Result};
use crate::network::rpc::DEFAULT_RPC_URL;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::RwLock;

pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::new);

static DEFAULT_DATA_DIR: &str = ".fundme";

const RPC_URL_KEY: &str = "FUNDME_RPC_URL";
const CONTRACT_ADDRESS_KEY: &str = "FUNDME_CONTRACT_ADDRESS";
const RELAY_URL_KEY: &str = "FUNDME_RELAY_URL";
const WALLET_ADDRESS_KEY: &str = "FUNDME_WALLET_ADDRESS";
const DATA_DIR_KEY: &str = "FUNDME_DATA_DIR";

/// Process-wide connection settings, seeded from the environment and
/// overridable from the command line.
pub struct Config {
    inner: RwLock<HashMap<String, String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Config {
        let mut map = HashMap::new();
        map.insert(String::from(RPC_URL_KEY), String::from(DEFAULT_RPC_URL));
        map.insert(String::from(DATA_DIR_KEY), String::from(DEFAULT_DATA_DIR));

        for key in [
            RPC_URL_KEY,
            CONTRACT_ADDRESS_KEY,
            RELAY_URL_KEY,
            WALLET_ADDRESS_KEY,
            DATA_DIR_KEY,
        ] {
            if let Ok(value) = env::var(key) {
                map.insert(String::from(key), value);
            }
        }

        Config {
            inner: RwLock::new(map),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        match self.inner.read() {
            Ok(inner) => inner.get(key).cloned(),
            Err(poisoned) => poisoned.into_inner().get(key).cloned(),
        }
    }

    fn set(&self, key: &str, value: String) {
        match self.inner.write() {
            Ok(mut inner) => inner.insert(String::from(key), value),
            Err(poisoned) => poisoned.into_inner().insert(String::from(key), value),
        };
    }

    fn get_address(&self, key: &str) -> Result<Option<Address>> {
        match self.get(key) {
            Some(raw) if !raw.trim().is_empty() => parse_address(&raw)
                .map(Some)
                .map_err(|_| DashboardError::Config(format!("{key} is not an address: {raw}"))),
            _ => Ok(None),
        }
    }

    pub fn get_rpc_url(&self) -> String {
        self.get(RPC_URL_KEY)
            .unwrap_or_else(|| String::from(DEFAULT_RPC_URL))
    }

    pub fn set_rpc_url(&self, url: String) {
        self.set(RPC_URL_KEY, url);
    }

    pub fn get_contract_address(&self) -> Result<Option<Address>> {
        self.get_address(CONTRACT_ADDRESS_KEY)
    }

    /// The FundMe address; required by every contract command
    pub fn require_contract_address(&self) -> Result<Address> {
        self.get_contract_address()?.ok_or_else(|| {
            DashboardError::Config(format!(
                "No contract address. Set {CONTRACT_ADDRESS_KEY} or pass --contract"
            ))
        })
    }

    pub fn set_contract_address(&self, address: String) {
        self.set(CONTRACT_ADDRESS_KEY, address);
    }

    pub fn get_relay_url(&self) -> Option<String> {
        self.get(RELAY_URL_KEY).filter(|url| !url.is_empty())
    }

    pub fn set_relay_url(&self, url: String) {
        self.set(RELAY_URL_KEY, url);
    }

    pub fn get_wallet_address(&self) -> Result<Option<Address>> {
        self.get_address(WALLET_ADDRESS_KEY)
    }

    pub fn set_wallet_address(&self, address: String) {
        self.set(WALLET_ADDRESS_KEY, address);
    }

    pub fn get_data_dir(&self) -> PathBuf {
        PathBuf::from(
            self.get(DATA_DIR_KEY)
                .unwrap_or_else(|| String::from(DEFAULT_DATA_DIR)),
        )
    }

    pub fn set_data_dir(&self, dir: String) {
        self.set(DATA_DIR_KEY, dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let config = Config::new();
        config.set_rpc_url("http://node:8545".to_string());
        assert_eq!(config.get_rpc_url(), "http://node:8545");

        config.set_contract_address("0x00000000000000000000000000000000000000c0".to_string());
        assert!(config.require_contract_address().is_ok());

        config.set_wallet_address("not-an-address".to_string());
        assert!(config.get_wallet_address().is_err());

        config.set_relay_url(String::new());
        assert!(config.get_relay_url().is_none());
    }
}
