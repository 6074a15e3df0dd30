//! Error taxonomy for the bridge
//!
//! Every remote operation funnels its failures through [`BridgeError`], and
//! the retry layer keys off [`BridgeError::is_transient`] to decide whether
//! an attempt may be repeated.

use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::rpc_request::RpcError;
use thiserror::Error;

use crate::codec::CodecError;

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Bridge error types
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    /// Transport-level errors (network, connection)
    #[error("transport error: {message}")]
    Transport { message: String },

    /// A single attempt of a remote operation ran out of time
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// The node answered with an error (transaction rejected, bad request)
    #[error("rpc response error: {message} (code: {code:?})")]
    RpcResponse { message: String, code: Option<i64> },

    /// Account lookup returned no data at the given address
    #[error("account {address} not found on ledger")]
    AccountMissing { address: String },

    /// Request payload or response layout violated the wire format
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Transaction signing failed
    #[error("signing failed: {0}")]
    Signing(String),

    /// A caller-supplied cancellation signal interrupted a wait
    #[error("operation cancelled")]
    Cancelled,

    /// Internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Whether the retry layer may repeat the failed operation.
    ///
    /// Only failures where the node never gave a verdict qualify; once the
    /// node has answered, repeating the same request cannot change it.
    pub fn is_transient(&self) -> bool {
        match self {
            BridgeError::Transport { .. } => true,
            BridgeError::Timeout { .. } => true,

            BridgeError::RpcResponse { .. } => false,
            BridgeError::AccountMissing { .. } => false,
            BridgeError::Codec(_) => false,
            BridgeError::Signing(_) => false,
            BridgeError::Cancelled => false,
            BridgeError::Internal(_) => false,
        }
    }

    /// Classify a `solana-client` error into the bridge taxonomy
    pub fn from_client_error(err: ClientError) -> Self {
        match &err.kind {
            ClientErrorKind::Io(io) => BridgeError::Transport {
                message: io.to_string(),
            },
            ClientErrorKind::Reqwest(req) => BridgeError::Transport {
                message: req.to_string(),
            },
            ClientErrorKind::RpcError(rpc) => match rpc {
                // Request never made it to a responding node
                RpcError::RpcRequestError(message) => BridgeError::Transport {
                    message: message.clone(),
                },
                RpcError::RpcResponseError { code, message, .. } => BridgeError::RpcResponse {
                    message: message.clone(),
                    code: Some(*code),
                },
                RpcError::ParseError(message) | RpcError::ForUser(message) => {
                    BridgeError::RpcResponse {
                        message: message.clone(),
                        code: None,
                    }
                }
            },
            ClientErrorKind::SigningError(sign) => BridgeError::Signing(sign.to_string()),
            ClientErrorKind::TransactionError(tx) => BridgeError::RpcResponse {
                message: tx.to_string(),
                code: None,
            },
            _ => BridgeError::Internal(err.to_string()),
        }
    }
}
