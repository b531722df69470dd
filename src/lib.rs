//! Candy Minter - mint orchestration for Metaplex candy machines
//!
//! This library exposes the mint flow behind two collaborator traits: a
//! [`rpc_manager::LedgerRpc`] for network access and a
//! [`wallet::WalletSigner`] for signatures. The binary wires the production
//! implementations; tests drive the same flow with in-memory doubles.

pub mod compat;
pub mod config;
pub mod engine;
pub mod errors;
pub mod guards;
pub mod metrics;
pub mod observability;
pub mod rpc_manager;
pub mod state;
pub mod structured_logging;
pub mod test_utils;
pub mod tx_builder;
pub mod types;
pub mod wallet;

// Re-export commonly used types
pub use engine::{MintSession, SessionConfig};
pub use errors::MintError;
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};
pub use types::{BatchVerdict, EligibilityResult, MintEvent, MintReport};
