use crate::core::types::Address;
use crate::error::{DashboardError, Result};
use crate::network::rpc::WalletProvider;
use log::{info, warn};

/// Chain the FundMe contract is deployed on (Sepolia)
pub const EXPECTED_CHAIN_ID: u64 = 11_155_111;

/// Connected identity as reported by the wallet provider.
///
/// Key material stays with the provider; this only records who is connected
/// and on which chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletSession {
    address: Option<Address>,
    chain_id: Option<u64>,
    expected_chain_id: u64,
}

impl WalletSession {
    pub fn disconnected(expected_chain_id: u64) -> WalletSession {
        WalletSession {
            address: None,
            chain_id: None,
            expected_chain_id,
        }
    }

    /// Resolve the session. A configured address wins over the provider's
    /// first account. Provider failures leave the session disconnected.
    pub async fn connect<P: WalletProvider + ?Sized>(
        provider: &P,
        configured: Option<Address>,
        expected_chain_id: u64,
    ) -> WalletSession {
        let mut session = WalletSession::disconnected(expected_chain_id);

        match provider.chain_id().await {
            Ok(id) => session.chain_id = Some(id),
            Err(e) => warn!("Could not read chain id: {e}"),
        }

        session.address = match configured {
            Some(address) => Some(address),
            None => match provider.accounts().await {
                Ok(accounts) => accounts.into_iter().next(),
                Err(e) => {
                    warn!("Could not read wallet accounts: {e}");
                    None
                }
            },
        };

        if let Some(address) = &session.address {
            info!("Connected as {address:#x} on chain {:?}", session.chain_id);
        }
        session
    }

    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.address.is_some()
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn expected_chain_id(&self) -> u64 {
        self.expected_chain_id
    }

    pub fn is_correct_network(&self) -> bool {
        self.chain_id == Some(self.expected_chain_id)
    }

    /// Ask the provider to move to the expected chain
    pub async fn switch_to_expected<P: WalletProvider + ?Sized>(&mut self, provider: &P) -> Result<()> {
        if self.is_correct_network() {
            return Ok(());
        }
        provider.switch_chain(self.expected_chain_id).await?;
        let id = provider.chain_id().await?;
        self.chain_id = Some(id);
        if !self.is_correct_network() {
            return Err(DashboardError::Wallet(format!(
                "still on chain {id} after switching to {}",
                self.expected_chain_id
            )));
        }
        Ok(())
    }

    /// The connected address, or an error for operations that need one
    pub fn require_address(&self) -> Result<Address> {
        self.address
            .ok_or_else(|| DashboardError::Wallet("no wallet connected".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::MockChain;

    #[tokio::test]
    async fn test_connect_uses_provider_account() {
        let chain = MockChain::sepolia();
        let session = WalletSession::connect(&chain, None, EXPECTED_CHAIN_ID).await;
        assert_eq!(session.address(), Some(&chain.owner()));
        assert!(session.is_correct_network());
    }

    #[tokio::test]
    async fn test_configured_address_wins() {
        let chain = MockChain::sepolia();
        let me = chain.account(7);
        let session = WalletSession::connect(&chain, Some(me), EXPECTED_CHAIN_ID).await;
        assert_eq!(session.require_address().unwrap(), me);
    }

    #[tokio::test]
    async fn test_unreachable_provider_leaves_session_disconnected() {
        let chain = MockChain::sepolia();
        chain.set_unreachable(true);
        let session = WalletSession::connect(&chain, None, EXPECTED_CHAIN_ID).await;
        assert!(!session.is_connected());
        assert!(!session.is_correct_network());
        assert!(session.require_address().is_err());
    }

    #[tokio::test]
    async fn test_switch_chain() {
        let chain = MockChain::sepolia();
        chain.set_chain_id(1);
        let mut session = WalletSession::connect(&chain, None, EXPECTED_CHAIN_ID).await;
        assert!(!session.is_correct_network());

        session.switch_to_expected(&chain).await.unwrap();
        assert!(session.is_correct_network());
        assert_eq!(session.chain_id(), Some(EXPECTED_CHAIN_ID));
    }
}
