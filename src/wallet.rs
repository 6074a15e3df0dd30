//! Payer wallet loading
//!
//! Loads the payer keypair from a Solana CLI `id.json` (a JSON array of 64
//! bytes) or a raw 64-byte file. Credential problems are resource errors,
//! reported with context and propagated unchanged.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};

#[derive(Debug)]
pub struct PayerWallet {
    keypair: Keypair,
}

impl PayerWallet {
    /// Load from `path`, or from the Solana CLI default location
    /// (`~/.config/solana/id.json`) when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Self::default_path()
                    .context("cannot resolve home directory for the default wallet path")?;
                Self::from_file(&default)
            }
        }
    }

    /// The Solana CLI keypair location under the user's home directory
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".config").join("solana").join("id.json"))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path)
            .with_context(|| format!("failed to read keypair file: {}", path.display()))?;

        // a JSON array of 64 byte values is always longer than 64 bytes,
        // so an exact 64-byte file must be the raw format
        let bytes: Vec<u8> = if raw.len() == 64 {
            raw
        } else {
            serde_json::from_slice(&raw)
                .with_context(|| format!("failed to parse keypair JSON: {}", path.display()))?
        };

        Self::from_bytes(&bytes)
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self { keypair }
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 64 {
            anyhow::bail!(
                "invalid keypair length: expected 64 bytes, got {}",
                bytes.len()
            );
        }
        if bytes.iter().all(|&b| b == 0) {
            anyhow::bail!("invalid keypair: all-zero key rejected");
        }
        let keypair = Keypair::try_from(bytes).context("invalid keypair bytes")?;
        Ok(Self { keypair })
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn into_keypair(self) -> Keypair {
        self.keypair
    }
}
