//! Orchestration error taxonomy
//!
//! Only [`MintError::Configuration`] crosses the session boundary as an
//! `Err`; every other kind is folded into the mint report and the event
//! stream.

use crate::rpc_manager::RpcError;
use crate::state::StateError;
use crate::tx_builder::TransactionBuilderError;
use crate::wallet::WalletError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MintError {
    /// Missing or invalid program address, unresolved guard definition
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No allowance for the requested group
    #[error("Not eligible for '{label}': {reason}")]
    Eligibility { label: String, reason: String },

    /// Allowlist route transaction failed; nothing was built
    #[error("Allowlist approval failed: {0}")]
    Approval(String),

    #[error(transparent)]
    Build(#[from] TransactionBuilderError),

    /// Wallet declined or could not sign
    #[error(transparent)]
    Signing(#[from] WalletError),

    /// The first dispatched transaction was rejected
    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    #[error("Confirmation failed: {0}")]
    Confirmation(String),

    #[error("Asset resolution failed: {0}")]
    Resolution(String),
}

impl MintError {
    /// Fatal errors end the session; all others leave it usable
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Eligibility { .. } => "eligibility",
            Self::Approval(_) => "approval",
            Self::Build(_) => "build",
            Self::Signing(_) => "signing",
            Self::Dispatch(_) => "dispatch",
            Self::Confirmation(_) => "confirmation",
            Self::Resolution(_) => "resolution",
        }
    }
}

impl From<StateError> for MintError {
    fn from(err: StateError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl MintError {
    /// Program state could not be loaded, so the session cannot start
    pub fn from_state_rpc(what: &str, err: RpcError) -> Self {
        Self::Configuration(format!("failed to load {what}: {err}"))
    }
}
