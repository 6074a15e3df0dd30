//! Client-side bridge for numeric on-chain programs
//!
//! Declares a program's response layout as an explicit schema, packs the
//! caller's values into a compact dual-mode payload, drives the
//! provision → submit → confirm → read-back pipeline against the ledger,
//! and decodes the response account into typed fields. Transient RPC
//! failures retry with a fixed delay until a caller-supplied cancellation
//! token says otherwise.

pub mod cancel;
pub mod codec;
pub mod config;
pub mod connection;
pub mod driver;
pub mod errors;
pub mod ledger;
pub mod retry;
pub mod schema;
pub mod wallet;

pub use cancel::CancelToken;
pub use config::BridgeConfig;
pub use driver::{CallOutcome, ProgramClient};
pub use errors::{BridgeError, BridgeResult};
pub use schema::{DecodedResponse, Field, FieldKind, FieldValue, Schema};
pub use wallet::PayerWallet;

// Re-export commonly used types
pub use solana_sdk::{pubkey::Pubkey, signature::Keypair};
