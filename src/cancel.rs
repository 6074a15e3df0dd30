//! Caller-supplied cancellation
//!
//! The bridge retries unboundedly by design, so a call against an
//! unreachable endpoint never finishes on its own. Every wait in the
//! connect and retry loops goes through [`CancelToken::sleep`], which a
//! clone of the token held by the caller can interrupt at any time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::errors::{BridgeError, BridgeResult};

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cloneable cancellation signal shared between a caller and the bridge.
///
/// All clones observe the same state. The default token is disconnected:
/// it can never fire and its waits degrade to plain sleeps.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Option<Arc<CancelState>>,
}

impl CancelToken {
    /// An armed token whose clones can be cancelled
    pub fn new() -> Self {
        Self {
            state: Some(Arc::new(CancelState::default())),
        }
    }

    /// A token that can never fire
    pub fn disconnected() -> Self {
        Self { state: None }
    }

    /// Signal cancellation to every clone of this token
    pub fn cancel(&self) {
        if let Some(state) = &self.state {
            state.cancelled.store(true, Ordering::SeqCst);
            state.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(|state| state.cancelled.load(Ordering::SeqCst))
    }

    /// Sleep for `duration`, returning early with [`BridgeError::Cancelled`]
    /// if the token fires first.
    pub async fn sleep(&self, duration: Duration) -> BridgeResult<()> {
        let Some(state) = &self.state else {
            tokio::time::sleep(duration).await;
            return Ok(());
        };

        // Register the waiter before re-checking the flag so a cancel()
        // landing between the check and the select cannot be missed.
        let notified = state.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if state.cancelled.load(Ordering::SeqCst) {
            return Err(BridgeError::Cancelled);
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = &mut notified => Err(BridgeError::Cancelled),
        }
    }
}
