//! Endpoint connection management
//!
//! A [`ConnectionManager`] dials the configured endpoint, probes liveness,
//! and keeps retrying at a fixed interval until the node answers. The
//! first live connection is cached for the manager's lifetime; nothing
//! ever tears it down.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::errors::BridgeResult;
use crate::ledger::{LedgerRpc, SolanaRpc};

pub struct ConnectionManager {
    endpoint: String,
    probe_interval: Duration,
    cached: RwLock<Option<Arc<dyn LedgerRpc>>>,
}

impl ConnectionManager {
    pub fn new(endpoint: impl Into<String>, probe_interval: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            probe_interval,
            cached: RwLock::new(None),
        }
    }

    /// Wrap an externally supplied transport; `acquire` will never dial.
    pub fn preconnected(connection: Arc<dyn LedgerRpc>) -> Self {
        Self {
            endpoint: String::new(),
            probe_interval: Duration::ZERO,
            cached: RwLock::new(Some(connection)),
        }
    }

    /// Return the cached connection, dialing the endpoint first if needed.
    pub async fn acquire(&self, cancel: &CancelToken) -> BridgeResult<Arc<dyn LedgerRpc>> {
        if let Some(connection) = self.cached.read().await.as_ref() {
            return Ok(Arc::clone(connection));
        }

        let mut slot = self.cached.write().await;
        // a concurrent caller may have connected while we waited for the lock
        if let Some(connection) = slot.as_ref() {
            return Ok(Arc::clone(connection));
        }

        let connection = establish(&self.endpoint, self.probe_interval, cancel, |endpoint| {
            Arc::new(SolanaRpc::new(endpoint)) as Arc<dyn LedgerRpc>
        })
        .await?;
        *slot = Some(Arc::clone(&connection));
        info!(endpoint = %self.endpoint, "connected to ledger endpoint");
        Ok(connection)
    }
}

/// Build a connection and probe it, rebuilding after `probe_interval` on
/// every failed probe until one answers. Any probe error retries; only
/// cancellation stops the loop.
async fn establish<F>(
    endpoint: &str,
    probe_interval: Duration,
    cancel: &CancelToken,
    factory: F,
) -> BridgeResult<Arc<dyn LedgerRpc>>
where
    F: Fn(&str) -> Arc<dyn LedgerRpc>,
{
    loop {
        let connection = factory(endpoint);
        match connection.check_health().await {
            Ok(()) => return Ok(connection),
            Err(err) => {
                debug!(
                    endpoint,
                    error = %err,
                    retry_in_secs = probe_interval.as_secs(),
                    "endpoint not live yet"
                );
                cancel.sleep(probe_interval).await?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BridgeError;
    use async_trait::async_trait;
    use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PROBE_INTERVAL: Duration = Duration::from_secs(10);

    /// Probe-only ledger: fails health checks until the counter drains.
    struct FlakyNode {
        failures_left: AtomicUsize,
    }

    impl FlakyNode {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                failures_left: AtomicUsize::new(failures),
            })
        }
    }

    #[async_trait]
    impl LedgerRpc for FlakyNode {
        async fn check_health(&self) -> BridgeResult<()> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(BridgeError::Transport {
                    message: "connection refused".to_string(),
                });
            }
            Ok(())
        }

        async fn minimum_balance_for_size(&self, _size: usize) -> BridgeResult<u64> {
            unimplemented!("probe-only mock")
        }

        async fn latest_blockhash(&self) -> BridgeResult<Hash> {
            unimplemented!("probe-only mock")
        }

        async fn send_transaction(&self, _transaction: &Transaction) -> BridgeResult<Signature> {
            unimplemented!("probe-only mock")
        }

        async fn confirm_finalized(
            &self,
            _signature: &Signature,
            _timeout: Duration,
        ) -> BridgeResult<()> {
            unimplemented!("probe-only mock")
        }

        async fn account_data(&self, _address: &Pubkey) -> BridgeResult<Vec<u8>> {
            unimplemented!("probe-only mock")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn establish_rebuilds_until_a_probe_succeeds() {
        let node = FlakyNode::new(2);
        let builds = AtomicUsize::new(0);
        let started = tokio::time::Instant::now();

        let connection = establish("http://node", PROBE_INTERVAL, &CancelToken::disconnected(), |_| {
            builds.fetch_add(1, Ordering::SeqCst);
            Arc::clone(&node) as Arc<dyn LedgerRpc>
        })
        .await
        .unwrap();

        // two failed probes, each followed by the fixed wait and a rebuild
        assert_eq!(builds.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), 2 * PROBE_INTERVAL);
        assert!(connection.check_health().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_dial_loop() {
        let node = FlakyNode::new(usize::MAX);
        let token = CancelToken::new();
        let remote = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(25)).await;
            remote.cancel();
        });

        let result = establish("http://node", PROBE_INTERVAL, &token, |_| {
            Arc::clone(&node) as Arc<dyn LedgerRpc>
        })
        .await;

        assert!(matches!(result, Err(BridgeError::Cancelled)));
    }

    #[tokio::test]
    async fn acquire_reuses_the_cached_connection() {
        let node = FlakyNode::new(0);
        let manager = ConnectionManager::preconnected(Arc::clone(&node) as Arc<dyn LedgerRpc>);
        let cancel = CancelToken::disconnected();

        let first = manager.acquire(&cancel).await.unwrap();
        let second = manager.acquire(&cancel).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }
}
