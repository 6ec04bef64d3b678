use clap::{Parser, Subcommand};
use std::str::FromStr;

/// Theme argument: an explicit theme or a toggle of the stored one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeArg {
    Light,
    Dark,
    Toggle,
}

impl FromStr for ThemeArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "light" => Ok(ThemeArg::Light),
            "dark" => Ok(ThemeArg::Dark),
            "toggle" => Ok(ThemeArg::Toggle),
            _ => Err(format!(
                "Invalid theme: {s}. Valid options: light, dark, toggle"
            )),
        }
    }
}

impl std::fmt::Display for ThemeArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThemeArg::Light => write!(f, "light"),
            ThemeArg::Dark => write!(f, "dark"),
            ThemeArg::Toggle => write!(f, "toggle"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "fundme-dashboard", about = "Dashboard for a FundMe crowdfunding contract")]
pub struct Opt {
    #[arg(long = "rpc-url", global = true, help = "JSON-RPC endpoint of the node or wallet")]
    pub rpc_url: Option<String>,
    #[arg(long = "contract", global = true, help = "Address of the FundMe contract")]
    pub contract: Option<String>,
    #[arg(long = "wallet", global = true, help = "Address to act as instead of the provider's first account")]
    pub wallet: Option<String>,
    #[arg(long = "relay-url", global = true, help = "Base URL of the read-contract relay")]
    pub relay_url: Option<String>,
    #[arg(long = "config", global = true, help = "Path to the dashboard settings file")]
    pub config: Option<String>,
    #[arg(
        long = "offline",
        global = true,
        help = "Use an in-memory demo deployment instead of a node"
    )]
    pub offline: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "info", about = "Show contract information")]
    Info,
    #[command(name = "price", about = "Show the current ETH/USD price")]
    Price,
    #[command(name = "stats", about = "Show total funded and number of funders")]
    Stats {
        #[arg(long = "relay", help = "Read funders through the relay instead of the node")]
        relay: bool,
    },
    #[command(name = "chart", about = "Show the projected funding history")]
    Chart {
        #[arg(long = "relay", help = "Read funders through the relay instead of the node")]
        relay: bool,
    },
    #[command(name = "funders", about = "List the funders and their contributions")]
    Funders {
        #[arg(long = "relay", help = "Read funders through the relay instead of the node")]
        relay: bool,
    },
    #[command(name = "funded", about = "Show how much an address has funded")]
    Funded {
        #[arg(help = "Funder address (defaults to the connected wallet)")]
        address: Option<String>,
    },
    #[command(name = "fund", about = "Send ETH to the contract")]
    Fund {
        #[arg(help = "Amount in ETH (e.g. 0.05)")]
        amount: String,
    },
    #[command(name = "withdraw", about = "Withdraw all funds (owner only)")]
    Withdraw {
        #[arg(long = "cheaper", help = "Use the gas-optimised withdrawal")]
        cheaper: bool,
        #[arg(long = "yes", short = 'y', help = "Skip the confirmation prompt")]
        yes: bool,
    },
    #[command(name = "theme", about = "Show or change the display theme")]
    Theme {
        #[arg(help = "Theme (light, dark, toggle)")]
        theme: Option<ThemeArg>,
    },
    #[command(name = "network", about = "Check the connected chain")]
    Network {
        #[arg(long = "switch", help = "Ask the wallet to switch to the expected chain")]
        switch: bool,
    },
    #[command(name = "watch", about = "Keep the price and stats panels updated")]
    Watch {
        #[arg(long = "updates", help = "Stop after this many price updates")]
        updates: Option<u32>,
    },
}
