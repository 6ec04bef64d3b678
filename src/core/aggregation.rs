//! Funder aggregation
//!
//! The contract only exposes its funders through an index accessor, so the
//! full set is rebuilt by reading index 0, 1, 2, ... until the first null
//! address or the first failed read. Each source decides which failures mean
//! "past the end of the array" (a revert on the node, a non-2xx on the relay);
//! anything else marks the result as partial. Reads are strictly sequential: a
//! batched or reordered scan could mistake a gap for the end of the list.
//!
//! Both dashboard panels (stats and chart) share this one routine and differ
//! only in their index cap.

use crate::core::history::SyntheticProjection;
use crate::core::monetary::conversions::{display_units, parse_user_amount};
use crate::core::types::{Address, AggregateTotals, Funder, U256};
use crate::error::{DashboardError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Index cap used by the stats panel
pub const STATS_FUNDER_CAP: u64 = 1000;

/// Index cap used by the chart panel
pub const CHART_FUNDER_CAP: u64 = 100;

/// Placeholder totals shown when the funder source is unreachable and demo data is on
pub const DEMO_TOTAL_ETH: &str = "12.45";
pub const DEMO_FUNDER_COUNT: usize = 24;
pub const DEMO_SUCCESS_RATE: u8 = 95;

/// Read access to the contract's funder list
#[async_trait]
pub trait FunderSource: Send + Sync {
    /// Checked once before the scan starts. A failure here is the only case
    /// that falls back to placeholder figures.
    async fn ensure_available(&self) -> Result<()> {
        Ok(())
    }

    /// Address stored at `index` in the funders array
    async fn funder_at(&self, index: u64) -> Result<Address>;

    /// Cumulative amount (wei) funded by `funder`
    async fn amount_funded_by(&self, funder: &Address) -> Result<U256>;

    /// Whether a failed `funder_at` read means the index is past the end of
    /// the array rather than a transport or decoding problem
    fn is_end_of_data(&self, _error: &DashboardError) -> bool {
        false
    }
}

/// Why a scan stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEnd {
    /// A zero address was returned at `index`
    NullAddress { index: u64 },
    /// The source reported that `index` is past the end of the array
    EndOfData { index: u64 },
    /// A read at `index` failed for another reason; the result is partial
    FetchFailed { index: u64, reason: String },
    /// Every index below the cap held a funder
    CapReached,
    /// A newer run started before this one finished
    Superseded,
}

/// Result of one pass over the funder list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunderScan {
    pub funders: Vec<Funder>,
    pub totals: AggregateTotals,
    pub end: ScanEnd,
}

/// Scan the funder list from index 0 up to `cap` (exclusive).
///
/// Never fails: any read error ends the scan and the partial result is returned.
/// Addresses whose cumulative amount is zero are not counted as funders.
pub async fn aggregate_funders<S>(source: &S, cap: u64) -> FunderScan
where
    S: FunderSource + ?Sized,
{
    scan(source, cap, None).await
}

async fn scan<S>(source: &S, cap: u64, token: Option<&RunToken>) -> FunderScan
where
    S: FunderSource + ?Sized,
{
    let mut total_funded = U256::zero();
    let mut seen: HashSet<Address> = HashSet::new();
    let mut funders = Vec::new();
    let mut end = ScanEnd::CapReached;

    for index in 0..cap {
        if token.is_some_and(|t| !t.is_current()) {
            end = ScanEnd::Superseded;
            break;
        }

        let address = match source.funder_at(index).await {
            Ok(address) => address,
            Err(e) if source.is_end_of_data(&e) => {
                debug!("Funder list ends at index {index}: {e}");
                end = ScanEnd::EndOfData { index };
                break;
            }
            Err(e) => {
                warn!("Funder read failed at index {index}: {e}");
                end = ScanEnd::FetchFailed {
                    index,
                    reason: e.to_string(),
                };
                break;
            }
        };
        if address.is_zero() {
            end = ScanEnd::NullAddress { index };
            break;
        }

        // The amount accessor is already cumulative per address, so a repeat
        // entry must not be added again.
        if seen.contains(&address) {
            continue;
        }

        let amount = match source.amount_funded_by(&address).await {
            Ok(amount) => amount,
            Err(e) => {
                warn!("Amount read for {address:#x} failed at index {index}: {e}");
                end = ScanEnd::FetchFailed {
                    index,
                    reason: e.to_string(),
                };
                break;
            }
        };

        seen.insert(address);
        if amount.is_zero() {
            continue;
        }
        total_funded = total_funded.saturating_add(amount);
        funders.push(Funder { address, amount });
    }

    FunderScan {
        totals: AggregateTotals {
            total_funded,
            funder_count: funders.len(),
        },
        funders,
        end,
    }
}

/// Where a snapshot's figures came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    /// Read from the contract (possibly partial)
    Live,
    /// The source was unreachable and demo data is disabled
    Unavailable,
    /// Hardcoded placeholder figures
    DemoPlaceholder,
}

/// Published result of an aggregation run
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSnapshot {
    pub run_id: u64,
    pub origin: DataOrigin,
    pub totals: AggregateTotals,
    pub funders: Vec<Funder>,
    pub end: Option<ScanEnd>,
}

impl AggregateSnapshot {
    fn from_scan(run_id: u64, scan: FunderScan) -> Self {
        AggregateSnapshot {
            run_id,
            origin: DataOrigin::Live,
            totals: scan.totals,
            funders: scan.funders,
            end: Some(scan.end),
        }
    }

    fn demo(run_id: u64) -> Self {
        AggregateSnapshot {
            run_id,
            origin: DataOrigin::DemoPlaceholder,
            totals: AggregateTotals {
                total_funded: parse_user_amount(DEMO_TOTAL_ETH),
                funder_count: DEMO_FUNDER_COUNT,
            },
            funders: Vec::new(),
            end: None,
        }
    }

    fn unavailable(run_id: u64) -> Self {
        AggregateSnapshot {
            run_id,
            origin: DataOrigin::Unavailable,
            totals: AggregateTotals::empty(),
            funders: Vec::new(),
            end: None,
        }
    }

    /// Total funded in ETH, for display math
    pub fn total_eth(&self) -> f64 {
        display_units(&self.totals.total_funded)
    }

    /// Chart series for this snapshot
    pub fn projection(&self, eth_price: f64, today: NaiveDate, buckets: usize) -> SyntheticProjection {
        match self.origin {
            DataOrigin::DemoPlaceholder => SyntheticProjection::demo(eth_price),
            _ => SyntheticProjection::interpolate(self.total_eth(), eth_price, today, buckets),
        }
    }
}

/// Identifies one run; stale once a newer run has started
#[derive(Debug, Clone)]
pub struct RunToken {
    id: u64,
    generation: Arc<AtomicU64>,
}

impl RunToken {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.id
    }
}

struct RunContext<S: FunderSource + ?Sized> {
    source: Arc<S>,
    cap: u64,
    demo_fallback: bool,
    generation: Arc<AtomicU64>,
    snapshots: Arc<watch::Sender<Option<AggregateSnapshot>>>,
}

impl<S: FunderSource + ?Sized> Clone for RunContext<S> {
    fn clone(&self) -> Self {
        RunContext {
            source: Arc::clone(&self.source),
            cap: self.cap,
            demo_fallback: self.demo_fallback,
            generation: Arc::clone(&self.generation),
            snapshots: Arc::clone(&self.snapshots),
        }
    }
}

impl<S: FunderSource + ?Sized> RunContext<S> {
    fn begin(&self) -> RunToken {
        let id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        RunToken {
            id,
            generation: Arc::clone(&self.generation),
        }
    }

    async fn execute(&self, token: RunToken) -> Option<AggregateSnapshot> {
        if let Err(e) = self.source.ensure_available().await {
            warn!("Funder source unavailable: {e}");
            let snapshot = if self.demo_fallback {
                AggregateSnapshot::demo(token.id)
            } else {
                AggregateSnapshot::unavailable(token.id)
            };
            return self.publish(&token, snapshot);
        }

        let result = scan(self.source.as_ref(), self.cap, Some(&token)).await;
        if result.end == ScanEnd::Superseded {
            debug!("Aggregation run {} superseded", token.id);
            return None;
        }
        info!(
            "Aggregation run {} found {} funders ({:?})",
            token.id, result.totals.funder_count, result.end
        );
        self.publish(&token, AggregateSnapshot::from_scan(token.id, result))
    }

    fn publish(&self, token: &RunToken, snapshot: AggregateSnapshot) -> Option<AggregateSnapshot> {
        // the currency check and the store happen under the channel's lock
        let published = self.snapshots.send_if_modified(|latest| {
            if !token.is_current() {
                return false;
            }
            *latest = Some(snapshot.clone());
            true
        });
        if !published {
            debug!("Dropping result of stale aggregation run {}", token.id);
            return None;
        }
        Some(snapshot)
    }
}

/// Runs the aggregation routine on demand and keeps the latest result.
///
/// Every run takes a fresh token. A run whose token is no longer current
/// stops at its next index and never publishes, so a newer trigger always
/// supersedes an in-flight one.
pub struct AggregationRunner<S: FunderSource + ?Sized> {
    ctx: RunContext<S>,
    last_price: Mutex<Option<f64>>,
    inflight: Mutex<Option<JoinHandle<Option<AggregateSnapshot>>>>,
}

impl<S: FunderSource + ?Sized + 'static> AggregationRunner<S> {
    pub fn new(source: Arc<S>, cap: u64, demo_fallback: bool) -> Self {
        AggregationRunner {
            ctx: RunContext {
                source,
                cap,
                demo_fallback,
                generation: Arc::new(AtomicU64::new(0)),
                snapshots: Arc::new(watch::channel(None).0),
            },
            last_price: Mutex::new(None),
            inflight: Mutex::new(None),
        }
    }

    pub fn cap(&self) -> u64 {
        self.ctx.cap
    }

    /// Run to completion on the current task. Returns `None` if superseded.
    pub async fn run(&self) -> Option<AggregateSnapshot> {
        let token = self.ctx.begin();
        self.ctx.execute(token).await
    }

    /// Start a run in the background, cancelling the previous one
    pub fn trigger(&self) -> RunToken {
        let token = self.ctx.begin();
        let ctx = self.ctx.clone();
        let run_token = token.clone();
        let handle = tokio::spawn(async move { ctx.execute(run_token).await });

        let mut inflight = match self.inflight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = inflight.replace(handle) {
            previous.abort();
        }
        token
    }

    /// Wait for the most recent background run, if any
    pub async fn wait(&self) -> Option<AggregateSnapshot> {
        let handle = match self.inflight.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match handle {
            Some(handle) => handle.await.ok().flatten(),
            None => self.latest(),
        }
    }

    /// Trigger a run when the price becomes available or changes.
    /// Returns whether a run was started.
    pub fn on_price(&self, price: f64) -> bool {
        if price <= 0.0 || !price.is_finite() {
            return false;
        }
        {
            let mut last = match self.last_price.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if *last == Some(price) {
                return false;
            }
            *last = Some(price);
        }
        self.trigger();
        true
    }

    /// Re-run aggregation on every price published to `prices`. The task
    /// ends when the price sender is dropped.
    pub fn spawn_price_listener(self: Arc<Self>, mut prices: watch::Receiver<f64>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let price = *prices.borrow_and_update();
                self.on_price(price);
                if prices.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    pub fn latest(&self) -> Option<AggregateSnapshot> {
        self.ctx.snapshots.borrow().clone()
    }

    /// Every snapshot this runner publishes, starting from the latest one
    pub fn subscribe(&self) -> watch::Receiver<Option<AggregateSnapshot>> {
        self.ctx.snapshots.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn addr(n: u8) -> Address {
        Address::from_low_u64_be(n as u64)
    }

    /// In-memory funder list that records every index it is asked for.
    /// Reading past the list reverts, like the contract does.
    struct ScriptedSource {
        entries: Vec<Result<Address>>,
        amounts: Vec<(Address, u64)>,
        queried: Mutex<Vec<u64>>,
        available: bool,
    }

    impl ScriptedSource {
        fn new(entries: Vec<Result<Address>>, amounts: Vec<(Address, u64)>) -> Self {
            ScriptedSource {
                entries,
                amounts,
                queried: Mutex::new(Vec::new()),
                available: true,
            }
        }

        fn queried(&self) -> Vec<u64> {
            self.queried.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FunderSource for ScriptedSource {
        async fn ensure_available(&self) -> Result<()> {
            if self.available {
                Ok(())
            } else {
                Err(DashboardError::Rpc("connection refused".to_string()))
            }
        }

        async fn funder_at(&self, index: u64) -> Result<Address> {
            self.queried.lock().unwrap().push(index);
            match self.entries.get(index as usize) {
                Some(entry) => entry.clone(),
                None => Err(DashboardError::Reverted("index out of bounds".to_string())),
            }
        }

        async fn amount_funded_by(&self, funder: &Address) -> Result<U256> {
            self.amounts
                .iter()
                .find(|(a, _)| a == funder)
                .map(|(_, v)| U256::from(*v))
                .ok_or_else(|| DashboardError::Contract("unknown funder".to_string()))
        }

        fn is_end_of_data(&self, error: &DashboardError) -> bool {
            matches!(error, DashboardError::Reverted(_))
        }
    }

    #[tokio::test]
    async fn test_stops_at_null_address() {
        let source = ScriptedSource::new(
            vec![Ok(addr(1)), Ok(addr(2)), Ok(addr(3)), Ok(Address::zero()), Ok(addr(4))],
            vec![(addr(1), 100), (addr(2), 200), (addr(3), 300), (addr(4), 400)],
        );

        let scan = aggregate_funders(&source, STATS_FUNDER_CAP).await;
        assert_eq!(scan.totals.funder_count, 3);
        assert_eq!(scan.totals.total_funded, U256::from(600u32));
        assert_eq!(scan.end, ScanEnd::NullAddress { index: 3 });
        assert_eq!(source.queried(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_revert_past_last_index_is_end_of_data() {
        let source = ScriptedSource::new(
            vec![Ok(addr(1)), Ok(addr(2))],
            vec![(addr(1), 100), (addr(2), 200)],
        );

        let scan = aggregate_funders(&source, STATS_FUNDER_CAP).await;
        assert_eq!(scan.end, ScanEnd::EndOfData { index: 2 });
        assert_eq!(scan.totals.funder_count, 2);
        assert_eq!(scan.totals.total_funded, U256::from(300u32));
    }

    #[tokio::test]
    async fn test_failure_returns_partial_result() {
        let source = ScriptedSource::new(
            vec![
                Ok(addr(1)),
                Err(DashboardError::Rpc("timeout".to_string())),
                Ok(addr(3)),
            ],
            vec![(addr(1), 100), (addr(3), 300)],
        );

        let scan = aggregate_funders(&source, STATS_FUNDER_CAP).await;
        assert_eq!(scan.totals.funder_count, 1);
        assert_eq!(scan.totals.total_funded, U256::from(100u32));
        assert_eq!(
            scan.end,
            ScanEnd::FetchFailed {
                index: 1,
                reason: "RPC error: timeout".to_string()
            }
        );
        assert_eq!(scan.funders, vec![Funder { address: addr(1), amount: U256::from(100u32) }]);
    }

    #[tokio::test]
    async fn test_repeated_address_is_folded() {
        let source = ScriptedSource::new(
            vec![Ok(addr(1)), Ok(addr(2)), Ok(addr(1)), Ok(Address::zero())],
            vec![(addr(1), 500), (addr(2), 250)],
        );

        let scan = aggregate_funders(&source, STATS_FUNDER_CAP).await;
        assert_eq!(scan.totals.funder_count, 2);
        assert_eq!(scan.totals.total_funded, U256::from(750u32));
        assert_eq!(scan.funders.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_amount_address_is_not_a_funder() {
        let source = ScriptedSource::new(
            vec![Ok(addr(1)), Ok(addr(2)), Ok(addr(2)), Ok(addr(3))],
            vec![(addr(1), 500), (addr(2), 0), (addr(3), 250)],
        );

        let scan = aggregate_funders(&source, STATS_FUNDER_CAP).await;
        assert_eq!(scan.totals.funder_count, 2);
        assert_eq!(scan.totals.total_funded, U256::from(750u32));
        assert!(scan.funders.iter().all(|f| f.address != addr(2)));
        assert_eq!(scan.end, ScanEnd::EndOfData { index: 4 });
    }

    #[tokio::test]
    async fn test_cap_bounds_the_scan() {
        let entries = (1..=20).map(|n| Ok(addr(n))).collect();
        let amounts = (1..=20).map(|n| (addr(n), 1)).collect();
        let source = ScriptedSource::new(entries, amounts);

        let scan = aggregate_funders(&source, 5).await;
        assert_eq!(scan.end, ScanEnd::CapReached);
        assert_eq!(scan.totals.funder_count, 5);
        assert_eq!(source.queried(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_unavailable_source_uses_demo_figures() {
        let mut source = ScriptedSource::new(vec![], vec![]);
        source.available = false;
        let runner = AggregationRunner::new(Arc::new(source), STATS_FUNDER_CAP, true);

        let snapshot = runner.run().await.unwrap();
        assert_eq!(snapshot.origin, DataOrigin::DemoPlaceholder);
        assert_eq!(snapshot.totals.funder_count, DEMO_FUNDER_COUNT);
        assert_eq!(snapshot.total_eth(), 12.45);
    }

    #[tokio::test]
    async fn test_unavailable_source_without_demo_is_empty() {
        let mut source = ScriptedSource::new(vec![], vec![]);
        source.available = false;
        let runner = AggregationRunner::new(Arc::new(source), STATS_FUNDER_CAP, false);

        let snapshot = runner.run().await.unwrap();
        assert_eq!(snapshot.origin, DataOrigin::Unavailable);
        assert_eq!(snapshot.totals, AggregateTotals::empty());
    }

    /// Blocks on index 1 until released, so a second run can overtake it
    struct GatedSource {
        gate: Notify,
        calls: AtomicU64,
    }

    #[async_trait]
    impl FunderSource for GatedSource {
        async fn funder_at(&self, index: u64) -> Result<Address> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if index == 1 && call == 1 {
                self.gate.notified().await;
            }
            if index < 2 {
                Ok(addr(index as u8 + 1))
            } else {
                Ok(Address::zero())
            }
        }

        async fn amount_funded_by(&self, _funder: &Address) -> Result<U256> {
            Ok(U256::from(10u32))
        }
    }

    #[tokio::test]
    async fn test_newer_run_supersedes_inflight_run() {
        let source = Arc::new(GatedSource {
            gate: Notify::new(),
            calls: AtomicU64::new(0),
        });
        let runner = Arc::new(AggregationRunner::new(Arc::clone(&source), CHART_FUNDER_CAP, false));

        let first = runner.ctx.begin();
        let ctx = runner.ctx.clone();
        let stale = tokio::spawn(async move { ctx.execute(first).await });

        // let the first run reach the gate
        while source.calls.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let fresh = runner.run().await.unwrap();
        source.gate.notify_one();

        assert!(stale.await.unwrap().is_none());
        assert_eq!(fresh.totals.funder_count, 2);
        assert_eq!(runner.latest().unwrap().run_id, fresh.run_id);
    }

    #[tokio::test]
    async fn test_on_price_only_triggers_on_change() {
        let source = ScriptedSource::new(vec![Ok(Address::zero())], vec![]);
        let runner = AggregationRunner::new(Arc::new(source), CHART_FUNDER_CAP, false);

        assert!(!runner.on_price(0.0));
        assert!(runner.on_price(2500.0));
        assert!(!runner.on_price(2500.0));
        let snapshot = runner.wait().await.unwrap();
        assert_eq!(snapshot.totals.funder_count, 0);
        assert_eq!(snapshot.end, Some(ScanEnd::NullAddress { index: 0 }));

        assert!(runner.on_price(2600.0));
        assert!(runner.wait().await.is_some());
    }

    #[tokio::test]
    async fn test_price_listener_publishes_a_run_per_price_change() {
        let source = ScriptedSource::new(vec![Ok(addr(1))], vec![(addr(1), 100)]);
        let runner = Arc::new(AggregationRunner::new(Arc::new(source), CHART_FUNDER_CAP, false));
        let mut snapshots = runner.subscribe();
        assert!(snapshots.borrow().is_none());

        let (prices, receiver) = watch::channel(0.0);
        let listener = Arc::clone(&runner).spawn_price_listener(receiver);

        prices.send(2500.0).unwrap();
        snapshots.changed().await.unwrap();
        let first = snapshots.borrow_and_update().clone().unwrap();
        assert_eq!(first.run_id, 1);
        assert_eq!(first.totals.funder_count, 1);

        // an unchanged price starts nothing, a new one starts exactly one run
        prices.send(2500.0).unwrap();
        prices.send(2600.0).unwrap();
        snapshots.changed().await.unwrap();
        let second = snapshots.borrow_and_update().clone().unwrap();
        assert_eq!(second.run_id, 2);
        assert_eq!(runner.latest(), Some(second));

        drop(prices);
        tokio::time::timeout(Duration::from_secs(5), listener)
            .await
            .unwrap()
            .unwrap();
    }
}
