//! ETH/USD price oracle adapter
//!
//! Reads `latestRoundData()` from the oracle and turns the 8-decimal answer
//! into a float. Quotes are cached for a staleness window and can be kept
//! fresh by a background refresh task. Negative or stale answers are passed
//! through unchanged; judging them is up to the caller.

use crate::core::types::{Address, PriceQuote};
use crate::error::Result;
use crate::network::abi::{decode_round_data, encode_call, ContractFunction};
use crate::network::rpc::ContractCaller;
use log::{debug, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How long a quote is served from cache
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60);

/// Background refresh period
pub const DEFAULT_REFRESH_EVERY: Duration = Duration::from_secs(60);

/// What the price panel sees
#[derive(Debug, Clone, PartialEq)]
pub struct PriceReading {
    pub price: f64,
    pub is_loading: bool,
    pub error: Option<String>,
    pub raw: Option<PriceQuote>,
}

#[derive(Debug, Default)]
struct FeedState {
    cached: Option<(PriceQuote, Instant)>,
    error: Option<String>,
    is_loading: bool,
}

pub struct PriceFeed<C: ContractCaller + ?Sized> {
    caller: Arc<C>,
    oracle: Option<Address>,
    stale_after: Duration,
    state: Mutex<FeedState>,
    prices: watch::Sender<f64>,
}

impl<C: ContractCaller + ?Sized + 'static> PriceFeed<C> {
    /// With `oracle == None` the feed is disabled: it reports a zero price
    /// and never touches the network.
    pub fn new(caller: Arc<C>, oracle: Option<Address>, stale_after: Duration) -> Self {
        let (prices, _) = watch::channel(0.0);
        PriceFeed {
            caller,
            oracle,
            stale_after,
            state: Mutex::new(FeedState::default()),
            prices,
        }
    }

    pub fn oracle(&self) -> Option<Address> {
        self.oracle
    }

    pub fn is_enabled(&self) -> bool {
        self.oracle.is_some()
    }

    fn state(&self) -> MutexGuard<'_, FeedState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Current reading without any network access
    pub fn current(&self) -> PriceReading {
        let state = self.state();
        let raw = state.cached.as_ref().map(|(quote, _)| quote.clone());
        PriceReading {
            price: raw.as_ref().map(PriceQuote::price).unwrap_or(0.0),
            is_loading: state.is_loading,
            error: state.error.clone(),
            raw,
        }
    }

    fn is_fresh(&self) -> bool {
        self.state()
            .cached
            .as_ref()
            .is_some_and(|(_, at)| at.elapsed() < self.stale_after)
    }

    /// Cached reading while fresh, otherwise a new fetch
    pub async fn latest(&self) -> PriceReading {
        if !self.is_enabled() || self.is_fresh() {
            return self.current();
        }
        self.refresh().await
    }

    /// Fetch a new quote regardless of cache age.
    ///
    /// A failed fetch keeps the previous quote and records the error.
    pub async fn refresh(&self) -> PriceReading {
        let Some(oracle) = self.oracle else {
            return self.current();
        };

        self.state().is_loading = true;
        let result = self.fetch(&oracle).await;
        {
            let mut state = self.state();
            state.is_loading = false;
            match result {
                Ok(quote) => {
                    let price = quote.price();
                    debug!("Oracle {oracle:#x} answered {} (round {})", quote.answer, quote.round_id);
                    state.cached = Some((quote, Instant::now()));
                    state.error = None;
                    self.prices.send_if_modified(|current| {
                        if *current != price {
                            *current = price;
                            true
                        } else {
                            false
                        }
                    });
                }
                Err(e) => {
                    warn!("Price feed read failed: {e}");
                    state.error = Some(e.to_string());
                }
            }
        }
        self.current()
    }

    async fn fetch(&self, oracle: &Address) -> Result<PriceQuote> {
        let data = encode_call(ContractFunction::LatestRoundData, &[])?;
        let raw = self.caller.call(oracle, &data).await?;
        decode_round_data(&raw)
    }

    /// Price updates, starting at 0 until the first successful fetch
    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.prices.subscribe()
    }

    /// Refresh every `every` until the returned guard is dropped.
    /// Returns `None` when the feed is disabled.
    pub fn spawn_refresh(self: &Arc<Self>, every: Duration) -> Option<RefreshGuard> {
        if !self.is_enabled() {
            return None;
        }
        let feed = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            loop {
                tick.tick().await;
                feed.refresh().await;
            }
        });
        Some(RefreshGuard { handle })
    }
}

/// Stops the background refresh when dropped
pub struct RefreshGuard {
    handle: JoinHandle<()>,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
