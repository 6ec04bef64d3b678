//! FundMe contract adapter
//!
//! Single point of contact for contract reads and writes. Reads are tracked
//! independently (value, loading flag, error). Writes expose pending, success
//! and error flags for the one outstanding submission of each kind.
//!
//! Nothing stops a second write of the same kind while one is pending; callers
//! must disable their controls while `is_pending` is set.

use crate::core::aggregation::FunderSource;
use crate::core::types::{Address, U256};
use crate::error::{DashboardError, Result};
use crate::network::abi::{address_at, decode_output, encode_call, u64_at, uint_at, ContractFunction};
use crate::network::rpc::{ContractCaller, ContractTransaction, ReceiptStatus};
use crate::utils::notify::Notifier;
use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::TxHash;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Delay between receipt polls
pub const DEFAULT_RECEIPT_POLL: Duration = Duration::from_secs(2);

/// Receipt polls before giving up on a confirmation
pub const DEFAULT_RECEIPT_ATTEMPTS: u32 = 60;

/// One independently tracked read
#[derive(Debug, Clone, PartialEq)]
pub struct ReadState<T> {
    pub value: Option<T>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl<T> Default for ReadState<T> {
    fn default() -> Self {
        ReadState {
            value: None,
            is_loading: false,
            error: None,
        }
    }
}

impl<T> ReadState<T> {
    /// Disabled or not yet requested
    pub fn idle() -> Self {
        ReadState::default()
    }

    fn begin(&mut self) {
        self.is_loading = true;
    }

    fn finish(&mut self, result: Result<T>) {
        self.is_loading = false;
        match result {
            Ok(value) => {
                self.value = Some(value);
                self.error = None;
            }
            Err(e) => self.error = Some(e.to_string()),
        }
    }
}

/// All contract reads shown by the dashboard
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContractReads {
    pub minimum_usd: ReadState<U256>,
    pub version: ReadState<u64>,
    pub price_feed: ReadState<Address>,
    pub owner: ReadState<Address>,
    pub user_funded: ReadState<U256>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteKind {
    Fund,
    Withdraw,
    CheaperWithdraw,
}

impl WriteKind {
    pub fn function(&self) -> ContractFunction {
        match self {
            WriteKind::Fund => ContractFunction::Fund,
            WriteKind::Withdraw => ContractFunction::Withdraw,
            WriteKind::CheaperWithdraw => ContractFunction::CheaperWithdraw,
        }
    }

    fn submit_failed(&self) -> (&'static str, &'static str) {
        match self {
            WriteKind::Fund => ("Transaction Failed", "Failed to submit funding transaction"),
            WriteKind::Withdraw => ("Withdrawal Failed", "Failed to submit withdrawal transaction"),
            WriteKind::CheaperWithdraw => (
                "Withdrawal Failed",
                "Failed to submit cheaper withdrawal transaction",
            ),
        }
    }

    fn succeeded(&self) -> (&'static str, &'static str) {
        match self {
            WriteKind::Fund => ("Funding Successful!", "Your contribution has been recorded."),
            WriteKind::Withdraw => (
                "Withdrawal Successful!",
                "Funds have been successfully withdrawn from the contract.",
            ),
            WriteKind::CheaperWithdraw => (
                "Cheaper Withdrawal Successful!",
                "Funds have been successfully withdrawn using the cheaper method.",
            ),
        }
    }

    fn reverted(&self) -> (&'static str, &'static str) {
        match self {
            WriteKind::Fund => (
                "Funding Failed",
                "The funding transaction was reverted. You may need to send more ETH.",
            ),
            WriteKind::Withdraw => (
                "Withdrawal Failed",
                "Failed to withdraw funds. You may not have permission or there might be insufficient funds.",
            ),
            WriteKind::CheaperWithdraw => (
                "Cheaper Withdrawal Failed",
                "Failed to withdraw funds using cheaper method. You may not have permission or there might be insufficient funds.",
            ),
        }
    }
}

/// Lifecycle flags of the latest submission of one write kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteState {
    pub is_pending: bool,
    pub is_success: bool,
    pub is_error: bool,
    pub tx_hash: Option<TxHash>,
}

/// `true` only when both addresses are known and equal (case-insensitive)
pub fn is_owner(connected: Option<&Address>, owner: Option<&Address>) -> bool {
    match (connected, owner) {
        (Some(connected), Some(owner)) => connected == owner,
        _ => false,
    }
}

pub struct FundMeContract<C: ContractCaller + ?Sized> {
    caller: Arc<C>,
    address: Address,
    notifier: Notifier,
    reads: Mutex<ContractReads>,
    writes: Mutex<HashMap<WriteKind, WriteState>>,
    receipt_poll: Duration,
    receipt_attempts: u32,
}

impl<C: ContractCaller + ?Sized> FundMeContract<C> {
    pub fn new(caller: Arc<C>, address: Address, notifier: Notifier) -> Self {
        FundMeContract {
            caller,
            address,
            notifier,
            reads: Mutex::new(ContractReads::default()),
            writes: Mutex::new(HashMap::new()),
            receipt_poll: DEFAULT_RECEIPT_POLL,
            receipt_attempts: DEFAULT_RECEIPT_ATTEMPTS,
        }
    }

    pub fn with_receipt_polling(mut self, poll: Duration, attempts: u32) -> Self {
        self.receipt_poll = poll;
        self.receipt_attempts = attempts.max(1);
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Encode, call and decode one read
    async fn call(&self, function: ContractFunction, args: &[Token]) -> Result<Vec<Token>> {
        let data = encode_call(function, args)?;
        let raw = self.caller.call(&self.address, &data).await?;
        decode_output(function, &raw)
    }

    /// Minimum contribution in USD, as the contract's raw fixed-point integer
    pub async fn minimum_usd(&self) -> Result<U256> {
        uint_at(&self.call(ContractFunction::MinimumUsd, &[]).await?, 0)
    }

    pub async fn version(&self) -> Result<u64> {
        u64_at(&self.call(ContractFunction::Version, &[]).await?, 0)
    }

    /// Address of the price oracle the contract uses
    pub async fn price_feed(&self) -> Result<Address> {
        address_at(&self.call(ContractFunction::PriceFeed, &[]).await?, 0)
    }

    pub async fn owner(&self) -> Result<Address> {
        address_at(&self.call(ContractFunction::Owner, &[]).await?, 0)
    }

    pub async fn amount_funded(&self, funder: &Address) -> Result<U256> {
        let out = self
            .call(ContractFunction::AmountFundedBy, &[Token::Address(*funder)])
            .await?;
        uint_at(&out, 0)
    }

    pub async fn funder(&self, index: u64) -> Result<Address> {
        let out = self
            .call(ContractFunction::FunderAt, &[Token::Uint(U256::from(index))])
            .await?;
        address_at(&out, 0)
    }

    fn reads_guard(&self) -> MutexGuard<'_, ContractReads> {
        match self.reads.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Refresh every read. The per-address amount is only requested when an
    /// address is connected; otherwise it is left idle with no value.
    pub async fn refresh_reads(&self, connected: Option<&Address>) -> ContractReads {
        {
            let mut reads = self.reads_guard();
            reads.minimum_usd.begin();
            reads.version.begin();
            reads.price_feed.begin();
            reads.owner.begin();
            if connected.is_some() {
                reads.user_funded.begin();
            } else {
                reads.user_funded = ReadState::idle();
            }
        }

        let user_funded = async {
            match connected {
                Some(address) => Some(self.amount_funded(address).await),
                None => None,
            }
        };
        let (minimum_usd, version, price_feed, owner, user_funded) = tokio::join!(
            self.minimum_usd(),
            self.version(),
            self.price_feed(),
            self.owner(),
            user_funded
        );

        let mut reads = self.reads_guard();
        reads.minimum_usd.finish(minimum_usd);
        reads.version.finish(version);
        reads.price_feed.finish(price_feed);
        reads.owner.finish(owner);
        if let Some(result) = user_funded {
            reads.user_funded.finish(result);
        }
        reads.clone()
    }

    pub fn reads(&self) -> ContractReads {
        self.reads_guard().clone()
    }

    /// Ownership check against the last owner read
    pub fn is_owner(&self, connected: Option<&Address>) -> bool {
        let owner = self.reads_guard().owner.value;
        is_owner(connected, owner.as_ref())
    }

    fn writes_guard(&self) -> MutexGuard<'_, HashMap<WriteKind, WriteState>> {
        match self.writes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn write_state(&self, kind: WriteKind) -> WriteState {
        self.writes_guard().get(&kind).cloned().unwrap_or_default()
    }

    fn set_write_state(&self, kind: WriteKind, state: WriteState) {
        self.writes_guard().insert(kind, state);
    }

    /// Send `value` wei to `fund()`
    pub async fn fund(&self, from: &Address, value: U256) -> WriteState {
        self.submit(WriteKind::Fund, from, Some(value)).await
    }

    pub async fn withdraw(&self, from: &Address) -> WriteState {
        self.submit(WriteKind::Withdraw, from, None).await
    }

    pub async fn cheaper_withdraw(&self, from: &Address) -> WriteState {
        self.submit(WriteKind::CheaperWithdraw, from, None).await
    }

    /// Submit one write and follow it to its receipt. Never fails: errors are
    /// reflected in the returned flags and in a notification.
    async fn submit(&self, kind: WriteKind, from: &Address, value: Option<U256>) -> WriteState {
        self.set_write_state(
            kind,
            WriteState {
                is_pending: true,
                ..WriteState::default()
            },
        );

        let tx_hash = match self.send(kind, from, value).await {
            Ok(hash) => hash,
            Err(e) => {
                warn!("{:?} submission failed: {e}", kind);
                let (title, description) = kind.submit_failed();
                self.notifier.failure(title, description);
                let state = WriteState {
                    is_error: true,
                    ..WriteState::default()
                };
                self.set_write_state(kind, state.clone());
                return state;
            }
        };
        info!("{:?} submitted as {tx_hash:#x}", kind);
        self.set_write_state(
            kind,
            WriteState {
                is_pending: true,
                tx_hash: Some(tx_hash),
                ..WriteState::default()
            },
        );

        let mut state = WriteState {
            tx_hash: Some(tx_hash),
            ..WriteState::default()
        };
        match self.wait_for_receipt(&tx_hash).await {
            Ok(Some(ReceiptStatus::Success)) => {
                let (title, description) = kind.succeeded();
                self.notifier.success(title, description);
                state.is_success = true;
            }
            Ok(Some(ReceiptStatus::Reverted)) => {
                let (title, description) = kind.reverted();
                self.notifier.failure(title, description);
                state.is_error = true;
            }
            Ok(None) => {
                self.notifier.success(
                    "Transaction Submitted",
                    &format!("{tx_hash:#x} is still waiting for confirmation"),
                );
                state.is_pending = true;
            }
            Err(e) => {
                warn!("Receipt lookup for {tx_hash:#x} failed: {e}");
                let (title, description) = kind.reverted();
                self.notifier.failure(title, description);
                state.is_error = true;
            }
        }
        self.set_write_state(kind, state.clone());
        state
    }

    async fn send(&self, kind: WriteKind, from: &Address, value: Option<U256>) -> Result<TxHash> {
        let tx = ContractTransaction {
            from: *from,
            to: self.address,
            value,
            data: encode_call(kind.function(), &[])?,
        };
        self.caller.send_transaction(&tx).await
    }

    async fn wait_for_receipt(&self, tx_hash: &TxHash) -> Result<Option<ReceiptStatus>> {
        for attempt in 0..self.receipt_attempts {
            if let Some(status) = self.caller.receipt_status(tx_hash).await? {
                return Ok(Some(status));
            }
            if attempt + 1 < self.receipt_attempts {
                tokio::time::sleep(self.receipt_poll).await;
            }
        }
        Ok(None)
    }
}

/// Direct-contract funder source for the stats panel
#[async_trait]
impl<C: ContractCaller + ?Sized> FunderSource for FundMeContract<C> {
    async fn ensure_available(&self) -> Result<()> {
        let code = self.caller.code_at(&self.address).await?;
        if code.is_empty() {
            return Err(DashboardError::Contract(format!(
                "no contract deployed at {:#x}",
                self.address
            )));
        }
        Ok(())
    }

    async fn funder_at(&self, index: u64) -> Result<Address> {
        self.funder(index).await
    }

    async fn amount_funded_by(&self, funder: &Address) -> Result<U256> {
        self.amount_funded(funder).await
    }

    /// `getFunder` reverts once the index passes the end of the array
    fn is_end_of_data(&self, error: &DashboardError) -> bool {
        matches!(error, DashboardError::Reverted(_))
    }
}
