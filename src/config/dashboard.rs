use crate::core::aggregation::{CHART_FUNDER_CAP, STATS_FUNDER_CAP};
use crate::core::history::DEFAULT_HISTORY_BUCKETS;
use crate::error::{DashboardError, Result};
use crate::wallet::EXPECTED_CHAIN_ID;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default settings file, looked up in the working directory
pub const SETTINGS_FILE: &str = "fundme.toml";

/// Tunables for the dashboard, loaded from `fundme.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    /// Funder index cap for the stats panel
    pub stats_funder_cap: u64,
    /// Funder index cap for the chart panel
    pub chart_funder_cap: u64,
    pub price_refresh_secs: u64,
    pub price_stale_secs: u64,
    /// Fractional digits of the contract's minimum-USD value
    pub minimum_usd_decimals: u32,
    pub history_buckets: usize,
    /// Show placeholder figures when the contract cannot be reached at all
    pub demo_fallback: bool,
    pub expected_chain_id: u64,
    pub receipt_poll_secs: u64,
    pub receipt_attempts: u32,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            stats_funder_cap: STATS_FUNDER_CAP,
            chart_funder_cap: CHART_FUNDER_CAP,
            price_refresh_secs: 60,
            price_stale_secs: 60,
            minimum_usd_decimals: 18,
            history_buckets: DEFAULT_HISTORY_BUCKETS,
            demo_fallback: true,
            expected_chain_id: EXPECTED_CHAIN_ID,
            receipt_poll_secs: 2,
            receipt_attempts: 60,
        }
    }
}

impl DashboardSettings {
    /// Load from `path`; a missing file yields the defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<DashboardSettings> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(DashboardSettings::default());
        }
        let raw = fs::read_to_string(path)?;
        let settings = DashboardSettings::from_toml(&raw)?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_toml(raw: &str) -> Result<DashboardSettings> {
        let settings: DashboardSettings = toml::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.stats_funder_cap == 0 || self.chart_funder_cap == 0 {
            return Err(DashboardError::Config(
                "funder caps must be greater than zero".to_string(),
            ));
        }
        if self.price_refresh_secs == 0 {
            return Err(DashboardError::Config(
                "price_refresh_secs must be greater than zero".to_string(),
            ));
        }
        if self.minimum_usd_decimals > 77 {
            return Err(DashboardError::Config(format!(
                "minimum_usd_decimals out of range: {}",
                self.minimum_usd_decimals
            )));
        }
        Ok(())
    }

    pub fn price_refresh(&self) -> Duration {
        Duration::from_secs(self.price_refresh_secs)
    }

    pub fn price_stale_after(&self) -> Duration {
        Duration::from_secs(self.price_stale_secs)
    }

    pub fn receipt_poll(&self) -> Duration {
        Duration::from_secs(self.receipt_poll_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let settings = DashboardSettings::default();
        assert_eq!(settings.stats_funder_cap, 1000);
        assert_eq!(settings.chart_funder_cap, 100);
        assert_eq!(settings.price_stale_after(), Duration::from_secs(60));
        assert!(settings.demo_fallback);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = DashboardSettings::from_toml("chart_funder_cap = 1000\ndemo_fallback = false\n").unwrap();
        assert_eq!(settings.chart_funder_cap, 1000);
        assert!(!settings.demo_fallback);
        assert_eq!(settings.stats_funder_cap, 1000);
        assert_eq!(settings.minimum_usd_decimals, 18);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(DashboardSettings::from_toml("stats_funder_cap = 0").is_err());
        assert!(DashboardSettings::from_toml("price_refresh_secs = \"soon\"").is_err());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let settings = DashboardSettings::load(dir.path().join(SETTINGS_FILE)).unwrap();
        assert_eq!(settings, DashboardSettings::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "history_buckets = 12\n").unwrap();
        let settings = DashboardSettings::load(&path).unwrap();
        assert_eq!(settings.history_buckets, 12);
    }
}
