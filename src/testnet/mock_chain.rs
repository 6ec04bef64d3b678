//! In-memory FundMe deployment
//!
//! Answers the same calls a node would for the FundMe contract and its price
//! feed, so adapters and the aggregation routine can run without a network.
//! The CLI uses it for `--offline` runs.

use crate::core::monetary::pow10;
use crate::core::types::{Address, U256};
use crate::error::{DashboardError, Result};
use crate::network::abi::{address_at, decode_call, u64_at, ContractFunction};
use crate::network::rpc::{ContractCaller, ContractTransaction, ReceiptStatus, WalletProvider};
use async_trait::async_trait;
use ethers::abi::{encode, Token};
use ethers::types::{Bytes, TxHash};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Sepolia chain id
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

/// Default oracle answer: 2000 USD with 8 decimals
pub const DEFAULT_ANSWER: i128 = 200_000_000_000;

struct ChainState {
    chain_id: u64,
    fundme: Address,
    oracle: Address,
    owner: Address,
    minimum_usd: U256,
    version: u64,
    answer: i128,
    round_id: u128,
    updated_at: u64,
    funders: Vec<Address>,
    amounts: HashMap<Address, U256>,
    receipts: HashMap<TxHash, ReceiptStatus>,
    tx_count: u64,
    unreachable: bool,
    reject_sends: bool,
}

pub struct MockChain {
    state: Mutex<ChainState>,
    calls: AtomicU64,
}

fn numbered(tag: u8, n: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[0] = tag;
    bytes[19] = n;
    Address::from(bytes)
}

/// `int256` in two's complement
fn int_token(value: i128) -> Token {
    let magnitude = U256::from(value.unsigned_abs());
    if value < 0 {
        Token::Int((!magnitude).overflowing_add(U256::one()).0)
    } else {
        Token::Int(magnitude)
    }
}

fn returns(tokens: &[Token]) -> Bytes {
    Bytes::from(encode(tokens))
}

fn revert(reason: &str) -> DashboardError {
    DashboardError::Reverted(format!("execution reverted: {reason}"))
}

impl MockChain {
    /// A fresh deployment on Sepolia with no funders
    pub fn sepolia() -> MockChain {
        MockChain {
            state: Mutex::new(ChainState {
                chain_id: SEPOLIA_CHAIN_ID,
                fundme: numbered(0xf0, 1),
                oracle: numbered(0x0a, 1),
                owner: numbered(0x00, 0xee),
                minimum_usd: U256::from(5u32) * pow10(18),
                version: 4,
                answer: DEFAULT_ANSWER,
                round_id: 1,
                updated_at: 1_700_000_000,
                funders: Vec::new(),
                amounts: HashMap::new(),
                receipts: HashMap::new(),
                tx_count: 0,
                unreachable: false,
                reject_sends: false,
            }),
            calls: AtomicU64::new(0),
        }
    }

    /// A deployment with a few funders already recorded, for offline runs
    pub fn demo() -> MockChain {
        let chain = MockChain::sepolia();
        chain.seed_funder(&chain.account(1), U256::from(1_500_000_000_000_000_000u64));
        chain.seed_funder(&chain.account(2), U256::from(250_000_000_000_000_000u64));
        chain.seed_funder(&chain.account(3), U256::from(3_000_000_000_000_000_000u64));
        chain.seed_funder(&chain.account(1), U256::from(500_000_000_000_000_000u64));
        chain
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn fundme_address(&self) -> Address {
        self.state().fundme
    }

    pub fn oracle_address(&self) -> Address {
        self.state().oracle
    }

    pub fn owner(&self) -> Address {
        self.state().owner
    }

    /// A deterministic non-owner account
    pub fn account(&self, n: u8) -> Address {
        numbered(0xac, n)
    }

    /// Number of `eth_call`s served so far
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_answer(&self, answer: i128) {
        let mut state = self.state();
        state.answer = answer;
        state.round_id += 1;
        state.updated_at += 60;
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        self.state().chain_id = chain_id;
    }

    /// Every call fails as if the node were down
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Transaction submissions fail before reaching the chain
    pub fn set_reject_sends(&self, reject: bool) {
        self.state().reject_sends = reject;
    }

    /// Record a contribution without going through `fund()`
    pub fn seed_funder(&self, funder: &Address, amount: U256) {
        let mut state = self.state();
        state.funders.push(*funder);
        *state.amounts.entry(*funder).or_default() += amount;
    }

    fn check_reachable(&self) -> Result<()> {
        if self.state().unreachable {
            return Err(DashboardError::Rpc("connection refused".to_string()));
        }
        Ok(())
    }

    fn apply(state: &mut ChainState, tx: &ContractTransaction) -> ReceiptStatus {
        let is = |f: ContractFunction| {
            f.selector()
                .is_ok_and(|selector| tx.data.get(..4) == Some(&selector[..]))
        };
        let value = tx.value.unwrap_or_default();
        if is(ContractFunction::Fund) {
            // answer * 1e10 * value / 1e18 must reach the 18-decimal minimum
            if state.answer <= 0 {
                return ReceiptStatus::Reverted;
            }
            let price = U256::from(state.answer as u128) * pow10(10);
            let usd = price.saturating_mul(value) / pow10(18);
            if usd < state.minimum_usd {
                return ReceiptStatus::Reverted;
            }
            state.funders.push(tx.from);
            *state.amounts.entry(tx.from).or_default() += value;
            ReceiptStatus::Success
        } else if is(ContractFunction::Withdraw) || is(ContractFunction::CheaperWithdraw) {
            if tx.from != state.owner {
                return ReceiptStatus::Reverted;
            }
            state.funders.clear();
            state.amounts.clear();
            ReceiptStatus::Success
        } else {
            ReceiptStatus::Reverted
        }
    }
}

#[async_trait]
impl ContractCaller for MockChain {
    async fn call(&self, to: &Address, data: &Bytes) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;

        let state = self.state();
        let selector = data.get(..4).ok_or_else(|| revert("missing selector"))?;
        let is = |f: ContractFunction| f.selector().is_ok_and(|s| selector == s);

        if *to == state.oracle {
            if is(ContractFunction::LatestRoundData) {
                return Ok(returns(&[
                    Token::Uint(U256::from(state.round_id)),
                    int_token(state.answer),
                    Token::Uint(U256::from(state.updated_at)),
                    Token::Uint(U256::from(state.updated_at)),
                    Token::Uint(U256::from(state.round_id)),
                ]));
            }
            return Err(revert("unknown oracle function"));
        }
        if *to != state.fundme {
            // no code at the address: calls return empty data
            return Ok(Bytes::new());
        }

        if is(ContractFunction::MinimumUsd) {
            Ok(returns(&[Token::Uint(state.minimum_usd)]))
        } else if is(ContractFunction::Version) {
            Ok(returns(&[Token::Uint(U256::from(state.version))]))
        } else if is(ContractFunction::PriceFeed) {
            Ok(returns(&[Token::Address(state.oracle)]))
        } else if is(ContractFunction::Owner) {
            Ok(returns(&[Token::Address(state.owner)]))
        } else if is(ContractFunction::AmountFundedBy) {
            let args = decode_call(ContractFunction::AmountFundedBy, data)?;
            let funder = address_at(&args, 0)?;
            let amount = state.amounts.get(&funder).copied().unwrap_or_default();
            Ok(returns(&[Token::Uint(amount)]))
        } else if is(ContractFunction::FunderAt) {
            let args = decode_call(ContractFunction::FunderAt, data)?;
            let index = u64_at(&args, 0)? as usize;
            state
                .funders
                .get(index)
                .map(|funder| returns(&[Token::Address(*funder)]))
                .ok_or_else(|| revert("index out of bounds"))
        } else {
            Err(revert("unknown function"))
        }
    }

    async fn send_transaction(&self, tx: &ContractTransaction) -> Result<TxHash> {
        self.check_reachable()?;
        let mut state = self.state();
        if state.reject_sends {
            return Err(DashboardError::Wallet("user rejected the request".to_string()));
        }
        if tx.to != state.fundme {
            return Err(DashboardError::Rpc(format!("no contract at {:#x}", tx.to)));
        }
        state.tx_count += 1;
        let hash = TxHash::from_low_u64_be(state.tx_count);
        let status = MockChain::apply(&mut state, tx);
        state.receipts.insert(hash, status);
        Ok(hash)
    }

    async fn receipt_status(&self, tx_hash: &TxHash) -> Result<Option<ReceiptStatus>> {
        self.check_reachable()?;
        Ok(self.state().receipts.get(tx_hash).copied())
    }

    async fn code_at(&self, address: &Address) -> Result<Bytes> {
        self.check_reachable()?;
        let state = self.state();
        if *address == state.fundme || *address == state.oracle {
            Ok(Bytes::from(vec![0x60, 0x80, 0x60, 0x40]))
        } else {
            Ok(Bytes::new())
        }
    }
}

#[async_trait]
impl WalletProvider for MockChain {
    async fn chain_id(&self) -> Result<u64> {
        self.check_reachable()?;
        Ok(self.state().chain_id)
    }

    async fn accounts(&self) -> Result<Vec<Address>> {
        self.check_reachable()?;
        Ok(vec![self.owner()])
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<()> {
        self.check_reachable()?;
        self.state().chain_id = chain_id;
        Ok(())
    }
}
