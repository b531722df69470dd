//! Wallet signer collaborator

use crate::compat::{self, SignError};
use async_trait::async_trait;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::VersionedTransaction,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("Failed to read keypair file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid keypair: {0}")]
    InvalidKeypair(String),

    /// The user declined the signature request
    #[error("Signature request declined: {0}")]
    Declined(String),

    #[error(transparent)]
    Sign(#[from] SignError),
}

/// Signs batches of transactions on behalf of the wallet owner.
///
/// The wallet's key is only borrowed through this trait; the session never
/// copies or persists it.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    /// Add the wallet's signature to every transaction, preserving existing
    /// signatures. All-or-nothing: a decline rejects the whole batch.
    async fn sign_all_transactions(
        &self,
        transactions: Vec<VersionedTransaction>,
    ) -> Result<Vec<VersionedTransaction>, WalletError>;
}

/// Local keypair wallet
#[derive(Clone)]
pub struct KeypairWallet {
    keypair: Arc<Keypair>,
}

impl KeypairWallet {
    /// Load a keypair file, either 64 raw bytes or the JSON byte-array format
    pub fn from_file(path: &str) -> Result<Self, WalletError> {
        let io_err = |e: std::io::Error| WalletError::Io {
            path: path.to_string(),
            message: e.to_string(),
        };
        let keypair_bytes = std::fs::read(path).map_err(io_err)?;

        let bytes = if keypair_bytes.len() == 64 {
            keypair_bytes
        } else {
            serde_json::from_slice::<Vec<u8>>(&keypair_bytes)
                .map_err(|e| WalletError::InvalidKeypair(format!("bad keypair JSON: {e}")))?
        };
        if bytes.len() != 64 {
            return Err(WalletError::InvalidKeypair(format!(
                "expected 64 bytes, got {}",
                bytes.len()
            )));
        }
        if bytes.iter().all(|&b| b == 0) {
            return Err(WalletError::InvalidKeypair(
                "all-zero key rejected".to_string(),
            ));
        }
        let keypair = Keypair::try_from(bytes.as_slice())
            .map_err(|e| WalletError::InvalidKeypair(e.to_string()))?;

        Ok(Self::from_keypair(keypair))
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }
}

#[async_trait]
impl WalletSigner for KeypairWallet {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign_all_transactions(
        &self,
        mut transactions: Vec<VersionedTransaction>,
    ) -> Result<Vec<VersionedTransaction>, WalletError> {
        for tx in transactions.iter_mut() {
            compat::partial_sign(tx, self.keypair.as_ref())?;
        }
        debug!(count = transactions.len(), signer = %self.pubkey(), "Signed transactions");
        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_file_json_format() {
        let keypair = Keypair::new();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let wallet = KeypairWallet::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(wallet.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_from_file_rejects_zero_key() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 64]).unwrap();
        let err = KeypairWallet::from_file(file.path().to_str().unwrap())
            .err()
            .unwrap();
        assert!(matches!(err, WalletError::InvalidKeypair(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = KeypairWallet::from_file("/nonexistent/id.json").err().unwrap();
        assert!(matches!(err, WalletError::Io { .. }));
    }
}
