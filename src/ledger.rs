//! Ledger RPC seam
//!
//! [`LedgerRpc`] names the primitive remote operations the driver needs.
//! Production code goes through [`SolanaRpc`]; tests substitute a scripted
//! implementation at the same seam.

use std::time::Duration;

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::Transaction,
};
use tracing::debug;

use crate::errors::{BridgeError, BridgeResult};

/// How often the confirmation poll re-queries within one attempt
const CONFIRM_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Primitive operations of the remote ledger node
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Liveness probe; an error means the node is not usable yet
    async fn check_health(&self) -> BridgeResult<()>;

    /// Minimum balance for an account of `size` bytes to persist without rent
    async fn minimum_balance_for_size(&self, size: usize) -> BridgeResult<u64>;

    /// Latest reference hash for transaction construction
    async fn latest_blockhash(&self) -> BridgeResult<Hash>;

    /// Submit a signed transaction, returning its signature
    async fn send_transaction(&self, transaction: &Transaction) -> BridgeResult<Signature>;

    /// Poll for finalized commitment of `signature`, giving up with a
    /// transient timeout error after `timeout`
    async fn confirm_finalized(
        &self,
        signature: &Signature,
        timeout: Duration,
    ) -> BridgeResult<()>;

    /// Fetch the raw bytes of the account at `address`
    async fn account_data(&self, address: &Pubkey) -> BridgeResult<Vec<u8>>;
}

/// [`LedgerRpc`] over the nonblocking Solana RPC client
pub struct SolanaRpc {
    client: RpcClient,
}

impl SolanaRpc {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: RpcClient::new(endpoint.to_string()),
        }
    }
}

#[async_trait]
impl LedgerRpc for SolanaRpc {
    async fn check_health(&self) -> BridgeResult<()> {
        self.client
            .get_health()
            .await
            .map_err(BridgeError::from_client_error)
    }

    async fn minimum_balance_for_size(&self, size: usize) -> BridgeResult<u64> {
        self.client
            .get_minimum_balance_for_rent_exemption(size)
            .await
            .map_err(BridgeError::from_client_error)
    }

    async fn latest_blockhash(&self) -> BridgeResult<Hash> {
        self.client
            .get_latest_blockhash()
            .await
            .map_err(BridgeError::from_client_error)
    }

    async fn send_transaction(&self, transaction: &Transaction) -> BridgeResult<Signature> {
        self.client
            .send_transaction(transaction)
            .await
            .map_err(BridgeError::from_client_error)
    }

    async fn confirm_finalized(
        &self,
        signature: &Signature,
        timeout: Duration,
    ) -> BridgeResult<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let confirmed = self
                .client
                .confirm_transaction_with_commitment(signature, CommitmentConfig::finalized())
                .await
                .map_err(BridgeError::from_client_error)?
                .value;
            if confirmed {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BridgeError::Timeout {
                    operation: "confirm_transaction".to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            debug!(signature = %signature, "transaction not finalized yet");
            tokio::time::sleep(CONFIRM_POLL_INTERVAL).await;
        }
    }

    async fn account_data(&self, address: &Pubkey) -> BridgeResult<Vec<u8>> {
        let account = self
            .client
            .get_account_with_commitment(address, CommitmentConfig::finalized())
            .await
            .map_err(BridgeError::from_client_error)?
            .value
            .ok_or_else(|| BridgeError::AccountMissing {
                address: address.to_string(),
            })?;
        Ok(account.data)
    }
}
