//! JSON-RPC transport to an Ethereum node
//!
//! The node (or the wallet behind it) owns the keys: transactions go out via
//! `eth_sendTransaction` and are signed on the other side.

use crate::core::types::{Address, U256};
use crate::error::{DashboardError, Result};
use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Bytes, TransactionRequest, TxHash, U64};
use log::debug;
use serde_json::{json, Value};

/// Local development node
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Contract write to submit through the node's wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractTransaction {
    pub from: Address,
    pub to: Address,
    pub value: Option<U256>,
    pub data: Bytes,
}

/// Mined outcome of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// Read and write access to deployed contracts
#[async_trait]
pub trait ContractCaller: Send + Sync {
    /// `eth_call` against the latest block, returning raw return data.
    /// A revert comes back as [`DashboardError::Reverted`].
    async fn call(&self, to: &Address, data: &Bytes) -> Result<Bytes>;

    /// Submit a transaction; returns its hash
    async fn send_transaction(&self, tx: &ContractTransaction) -> Result<TxHash>;

    /// `None` while the transaction is still pending
    async fn receipt_status(&self, tx_hash: &TxHash) -> Result<Option<ReceiptStatus>>;

    /// Deployed bytecode at `address` (empty when nothing is deployed)
    async fn code_at(&self, address: &Address) -> Result<Bytes>;
}

/// The wallet/session side of the node
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;

    async fn accounts(&self) -> Result<Vec<Address>>;

    async fn switch_chain(&self, chain_id: u64) -> Result<()>;
}

/// HTTP JSON-RPC client
pub struct RpcClient {
    provider: Provider<Http>,
    url: String,
}

impl RpcClient {
    pub fn new(url: &str) -> Result<RpcClient> {
        let provider = Provider::<Http>::try_from(url)
            .map_err(|e| DashboardError::Config(format!("invalid RPC URL {url}: {e}")))?;
        Ok(RpcClient {
            provider,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ContractCaller for RpcClient {
    async fn call(&self, to: &Address, data: &Bytes) -> Result<Bytes> {
        let tx = TransactionRequest::new().to(*to).data(data.clone());
        Ok(self.provider.call(&tx.into(), None).await?)
    }

    async fn send_transaction(&self, tx: &ContractTransaction) -> Result<TxHash> {
        let mut request = TransactionRequest::new()
            .from(tx.from)
            .to(tx.to)
            .data(tx.data.clone());
        if let Some(value) = tx.value {
            request = request.value(value);
        }
        let pending = self.provider.send_transaction(request, None).await?;
        debug!("eth_sendTransaction from {:#x} -> {:#x}", tx.from, pending.tx_hash());
        Ok(pending.tx_hash())
    }

    async fn receipt_status(&self, tx_hash: &TxHash) -> Result<Option<ReceiptStatus>> {
        let Some(receipt) = self.provider.get_transaction_receipt(*tx_hash).await? else {
            return Ok(None);
        };
        match receipt.status {
            Some(status) if status == U64::one() => Ok(Some(ReceiptStatus::Success)),
            Some(_) => Ok(Some(ReceiptStatus::Reverted)),
            None => Err(DashboardError::Rpc(format!("receipt for {tx_hash:#x} has no status"))),
        }
    }

    async fn code_at(&self, address: &Address) -> Result<Bytes> {
        Ok(self.provider.get_code(*address, None).await?)
    }
}

#[async_trait]
impl WalletProvider for RpcClient {
    async fn chain_id(&self) -> Result<u64> {
        let id = self.provider.get_chainid().await?;
        if id.bits() > 64 {
            return Err(DashboardError::Rpc(format!("chain id out of range: {id}")));
        }
        Ok(id.as_u64())
    }

    async fn accounts(&self) -> Result<Vec<Address>> {
        Ok(self.provider.get_accounts().await?)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<()> {
        let params = [json!({ "chainId": format!("0x{chain_id:x}") })];
        self.provider
            .request::<_, Value>("wallet_switchEthereumChain", params)
            .await
            .map_err(|e| DashboardError::Wallet(format!("switch to chain {chain_id}: {e}")))?;
        Ok(())
    }
}
