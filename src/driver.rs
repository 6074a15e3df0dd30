//! Program invocation driver
//!
//! [`ProgramClient`] runs one call as a strictly sequential pipeline:
//! ensure the response account exists, encode the payload, submit the
//! instruction, await finalized confirmation, read the response account
//! back and decode it against the schema. Remote steps share the
//! fixed-delay transient-retry policy; a server-side rejection at the
//! submit step becomes a [`CallOutcome::SubmissionFailed`] indicator
//! instead of an error so callers can branch on it.

use std::sync::Arc;

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    system_instruction,
    transaction::Transaction,
};
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::codec;
use crate::config::BridgeConfig;
use crate::connection::ConnectionManager;
use crate::errors::{BridgeError, BridgeResult};
use crate::ledger::LedgerRpc;
use crate::retry::retry_until;
use crate::schema::{DecodedResponse, Schema};

/// Seed for deriving the response account address. One account exists per
/// (payer, seed, program) combination and is reused across calls.
const RESPONSE_SEED: &str = "solbridge";

/// Result of one program call
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// The transaction finalized and the response account decoded cleanly
    Completed(DecodedResponse),
    /// The ledger rejected the transaction at submission
    SubmissionFailed,
}

impl CallOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, CallOutcome::Completed(_))
    }

    pub fn response(&self) -> Option<&DecodedResponse> {
        match self {
            CallOutcome::Completed(decoded) => Some(decoded),
            CallOutcome::SubmissionFailed => None,
        }
    }

    pub fn into_response(self) -> Option<DecodedResponse> {
        match self {
            CallOutcome::Completed(decoded) => Some(decoded),
            CallOutcome::SubmissionFailed => None,
        }
    }
}

/// Client for one deployed program and its declared response schema.
///
/// A client drives one call at a time; the only shared state is the cached
/// connection, so sequential calls on the same instance reuse it.
pub struct ProgramClient {
    program_id: Pubkey,
    payer: Keypair,
    schema: Schema,
    connections: ConnectionManager,
    call_retry: std::time::Duration,
    confirm_timeout: std::time::Duration,
    cancel: CancelToken,
}

impl ProgramClient {
    pub fn new(config: &BridgeConfig, program_id: Pubkey, schema: Schema, payer: Keypair) -> Self {
        Self {
            program_id,
            payer,
            schema,
            connections: ConnectionManager::new(config.endpoint.clone(), config.connect_retry()),
            call_retry: config.call_retry(),
            confirm_timeout: config.confirm_timeout(),
            cancel: CancelToken::disconnected(),
        }
    }

    /// Build a client over an externally supplied transport instead of
    /// dialing the configured endpoint.
    pub fn with_transport(
        config: &BridgeConfig,
        program_id: Pubkey,
        schema: Schema,
        payer: Keypair,
        transport: Arc<dyn LedgerRpc>,
    ) -> Self {
        Self {
            program_id,
            payer,
            schema,
            connections: ConnectionManager::preconnected(transport),
            call_retry: config.call_retry(),
            confirm_timeout: config.confirm_timeout(),
            cancel: CancelToken::disconnected(),
        }
    }

    /// Attach a cancellation token; every retry wait becomes interruptible.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn payer_pubkey(&self) -> Pubkey {
        self.payer.pubkey()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Deterministic response account address for this (payer, program) pair
    pub fn response_address(&self) -> BridgeResult<Pubkey> {
        Pubkey::create_with_seed(&self.payer.pubkey(), RESPONSE_SEED, &self.program_id)
            .map_err(|e| BridgeError::Internal(e.to_string()))
    }

    /// Invoke the program with `values` and decode its response.
    ///
    /// Returns `Ok(CallOutcome::SubmissionFailed)` when the ledger rejects
    /// the transaction at submission; transient failures at any step are
    /// retried indefinitely; format and signing problems are errors.
    pub async fn call(&self, values: &[f64]) -> BridgeResult<CallOutcome> {
        let connection = self.connections.acquire(&self.cancel).await?;
        let ledger = connection.as_ref();

        let response_key = self.ensure_response_account(ledger).await?;

        let payload = codec::encode(values)?;
        debug!(bytes = payload.len(), "prepared request payload");

        let instruction = Instruction {
            program_id: self.program_id,
            accounts: vec![AccountMeta::new(response_key, false)],
            data: payload,
        };
        let transaction = self.sign_with_fresh_blockhash(ledger, &[instruction]).await?;

        let signature = match retry_until(
            "send_transaction",
            self.call_retry,
            &self.cancel,
            || async { ledger.send_transaction(&transaction).await },
        )
        .await
        {
            Ok(signature) => signature,
            Err(BridgeError::RpcResponse { message, code }) => {
                warn!(reason = %message, code = ?code, "transaction rejected at submission");
                return Ok(CallOutcome::SubmissionFailed);
            }
            Err(other) => return Err(other),
        };

        retry_until(
            "confirm_transaction",
            self.call_retry,
            &self.cancel,
            || async { ledger.confirm_finalized(&signature, self.confirm_timeout).await },
        )
        .await?;

        let data = retry_until("account_data", self.call_retry, &self.cancel, || async {
            ledger.account_data(&response_key).await
        })
        .await?;

        let decoded = codec::decode(&data, &self.schema)?;
        debug!(fields = decoded.len(), "decoded program response");
        Ok(CallOutcome::Completed(decoded))
    }

    /// Create the response account if it does not exist yet.
    ///
    /// The address derives from (payer, seed, program), so a rejection of
    /// the create transaction means the account is already there; any
    /// server-reported rejection logs and falls through to reuse.
    async fn ensure_response_account(&self, ledger: &dyn LedgerRpc) -> BridgeResult<Pubkey> {
        let space = self.schema.byte_len();
        let rent = retry_until("minimum_balance", self.call_retry, &self.cancel, || async {
            ledger.minimum_balance_for_size(space).await
        })
        .await?;

        let payer_key = self.payer.pubkey();
        let response_key = self.response_address()?;
        debug!(address = %response_key, space, rent, "ensuring response account");

        let instruction = system_instruction::create_account_with_seed(
            &payer_key,
            &response_key,
            &payer_key,
            RESPONSE_SEED,
            rent,
            space as u64,
            &self.program_id,
        );
        let transaction = self.sign_with_fresh_blockhash(ledger, &[instruction]).await?;

        match self.send_and_confirm(ledger, &transaction).await {
            Ok(signature) => {
                debug!(address = %response_key, %signature, "created response account");
            }
            Err(BridgeError::RpcResponse { message, .. }) => {
                debug!(address = %response_key, reason = %message, "reusing existing response account");
            }
            Err(other) => return Err(other),
        }
        Ok(response_key)
    }

    async fn sign_with_fresh_blockhash(
        &self,
        ledger: &dyn LedgerRpc,
        instructions: &[Instruction],
    ) -> BridgeResult<Transaction> {
        let blockhash = retry_until(
            "latest_blockhash",
            self.call_retry,
            &self.cancel,
            || async { ledger.latest_blockhash().await },
        )
        .await?;

        let mut transaction = Transaction::new_with_payer(instructions, Some(&self.payer.pubkey()));
        transaction
            .try_sign(&[&self.payer], blockhash)
            .map_err(|e| BridgeError::Signing(e.to_string()))?;
        Ok(transaction)
    }

    async fn send_and_confirm(
        &self,
        ledger: &dyn LedgerRpc,
        transaction: &Transaction,
    ) -> BridgeResult<Signature> {
        let signature = retry_until(
            "create_response_account",
            self.call_retry,
            &self.cancel,
            || async { ledger.send_transaction(transaction).await },
        )
        .await?;

        retry_until(
            "confirm_account_creation",
            self.call_retry,
            &self.cancel,
            || async { ledger.confirm_finalized(&signature, self.confirm_timeout).await },
        )
        .await?;

        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FieldKind};
    use async_trait::async_trait;
    use solana_sdk::hash::Hash;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Ledger double with scripted per-method outcomes. Unscripted calls
    /// succeed with defaults so tests only spell out the interesting steps.
    struct ScriptedLedger {
        send_results: Mutex<VecDeque<BridgeResult<Signature>>>,
        account_data: Vec<u8>,
        send_calls: AtomicUsize,
        confirm_calls: AtomicUsize,
        data_calls: AtomicUsize,
    }

    impl ScriptedLedger {
        fn new(account_data: Vec<u8>) -> Self {
            Self {
                send_results: Mutex::new(VecDeque::new()),
                account_data,
                send_calls: AtomicUsize::new(0),
                confirm_calls: AtomicUsize::new(0),
                data_calls: AtomicUsize::new(0),
            }
        }

        fn script_send(&self, result: BridgeResult<Signature>) {
            self.send_results.lock().unwrap().push_back(result);
        }
    }

    #[async_trait]
    impl LedgerRpc for ScriptedLedger {
        async fn check_health(&self) -> BridgeResult<()> {
            Ok(())
        }

        async fn minimum_balance_for_size(&self, _size: usize) -> BridgeResult<u64> {
            Ok(890_880)
        }

        async fn latest_blockhash(&self) -> BridgeResult<Hash> {
            Ok(Hash::new_unique())
        }

        async fn send_transaction(&self, _transaction: &Transaction) -> BridgeResult<Signature> {
            self.send_calls.fetch_add(1, Ordering::SeqCst);
            self.send_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Signature::default()))
        }

        async fn confirm_finalized(
            &self,
            _signature: &Signature,
            _timeout: Duration,
        ) -> BridgeResult<()> {
            self.confirm_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn account_data(&self, _address: &Pubkey) -> BridgeResult<Vec<u8>> {
            self.data_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.account_data.clone())
        }
    }

    fn fit_schema() -> Schema {
        Schema::new(vec![
            Field::new("slope", FieldKind::Float),
            Field::new("intercept", FieldKind::Float),
        ])
    }

    fn fit_response(slope: f32, intercept: f32) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&slope.to_le_bytes());
        data.extend_from_slice(&intercept.to_le_bytes());
        data
    }

    fn client_over(ledger: Arc<ScriptedLedger>) -> ProgramClient {
        ProgramClient::with_transport(
            &BridgeConfig::default(),
            Pubkey::new_unique(),
            fit_schema(),
            Keypair::new(),
            ledger,
        )
    }

    fn rejected(message: &str) -> BridgeError {
        BridgeError::RpcResponse {
            message: message.to_string(),
            code: Some(-32002),
        }
    }

    #[tokio::test]
    async fn call_runs_the_full_pipeline() {
        let ledger = Arc::new(ScriptedLedger::new(fit_response(2.5, -0.75)));
        let client = client_over(Arc::clone(&ledger));

        let outcome = client.call(&[10.6, 8.85, 15.678]).await.unwrap();

        let decoded = outcome.into_response().unwrap();
        assert_eq!(decoded.float("slope"), Some(2.5));
        assert_eq!(decoded.float("intercept"), Some(-0.75));

        // one create-account send plus the program instruction send
        assert_eq!(ledger.send_calls.load(Ordering::SeqCst), 2);
        assert_eq!(ledger.confirm_calls.load(Ordering::SeqCst), 2);
        assert_eq!(ledger.data_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn existing_response_account_is_reused() {
        let ledger = Arc::new(ScriptedLedger::new(fit_response(1.0, 2.0)));
        ledger.script_send(Err(rejected("account already in use")));
        let client = client_over(Arc::clone(&ledger));

        let outcome = client.call(&[1.5]).await.unwrap();

        assert!(outcome.is_completed());
        // the create-account confirmation is skipped on reuse
        assert_eq!(ledger.confirm_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn submission_rejection_yields_failure_indicator() {
        let ledger = Arc::new(ScriptedLedger::new(fit_response(1.0, 2.0)));
        ledger.script_send(Ok(Signature::default()));
        ledger.script_send(Err(rejected("transaction simulation failed")));
        let client = client_over(Arc::clone(&ledger));

        let outcome = client.call(&[42.0]).await.unwrap();

        assert_eq!(outcome, CallOutcome::SubmissionFailed);
        assert!(outcome.response().is_none());
        // confirmation and read-back never run after a rejected submit
        assert_eq!(ledger.confirm_calls.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.data_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_submit_errors_are_retried_not_failed() {
        let ledger = Arc::new(ScriptedLedger::new(fit_response(1.0, 2.0)));
        ledger.script_send(Ok(Signature::default()));
        ledger.script_send(Err(BridgeError::Transport {
            message: "node busy".to_string(),
        }));
        let client = client_over(Arc::clone(&ledger));

        let outcome = client.call(&[7.0]).await.unwrap();

        assert!(outcome.is_completed());
        assert_eq!(ledger.send_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn undersized_response_account_is_a_format_error() {
        let ledger = Arc::new(ScriptedLedger::new(vec![0u8; 5]));
        let client = client_over(ledger);

        let result = client.call(&[1.0]).await;

        assert!(matches!(result, Err(BridgeError::Codec(_))));
    }

    #[tokio::test]
    async fn negative_values_never_reach_the_wire() {
        let ledger = Arc::new(ScriptedLedger::new(fit_response(1.0, 2.0)));
        let client = client_over(Arc::clone(&ledger));

        let result = client.call(&[-1.0]).await;

        assert!(matches!(result, Err(BridgeError::Codec(_))));
        // provisioning ran, but no payload was submitted
        assert_eq!(ledger.send_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn response_address_matches_seed_derivation() {
        let ledger = Arc::new(ScriptedLedger::new(fit_response(1.0, 2.0)));
        let client = client_over(ledger);

        let expected = Pubkey::create_with_seed(
            &client.payer_pubkey(),
            RESPONSE_SEED,
            &client.program_id,
        )
        .unwrap();

        assert_eq!(client.response_address().unwrap(), expected);
        // derivation is pure, so repeated calls agree
        assert_eq!(client.response_address().unwrap(), expected);
    }

    #[tokio::test]
    async fn cancelled_client_aborts_without_touching_the_ledger() {
        let ledger = Arc::new(ScriptedLedger::new(fit_response(1.0, 2.0)));
        let token = CancelToken::new();
        token.cancel();
        let client = client_over(Arc::clone(&ledger)).with_cancel_token(token);

        let result = client.call(&[1.0]).await;

        assert!(matches!(result, Err(BridgeError::Cancelled)));
        assert_eq!(ledger.send_calls.load(Ordering::SeqCst), 0);
    }
}
