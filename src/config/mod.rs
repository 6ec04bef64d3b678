//! Configuration management
//!
//! Connection settings (RPC endpoint, contract, relay, wallet) come from the
//! environment and the command line. Dashboard tunables come from an
//! optional `fundme.toml`.

pub mod dashboard;
pub mod settings;

pub use dashboard::{DashboardSettings, SETTINGS_FILE};
pub use settings::{Config, GLOBAL_CONFIG};
