//! Ledger RPC collaborator
//!
//! The orchestration core only talks to the network through [`LedgerRpc`].
//! [`SolanaRpc`] is the production implementation over the nonblocking
//! Solana RPC client; tests use the in-crate mock ledger instead.

pub mod metadata;
pub mod rpc_client;
pub mod rpc_errors;

pub use metadata::{HttpMetadataFetcher, JsonMetadata, MetadataFetcher};
pub use rpc_client::SolanaRpc;
pub use rpc_errors::{RetryPolicy, RpcError};

use async_trait::async_trait;
use borsh::BorshDeserialize;
use serde::{Deserialize, Serialize};
use solana_sdk::{
    account::Account, address_lookup_table::AddressLookupTableAccount, hash::Hash,
    pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction,
};

/// Commitment a signature has reached on the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationLevel {
    Processed,
    Confirmed,
    Finalized,
}

/// Status of one signature as reported by the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureState {
    pub level: ConfirmationLevel,
    /// Set when the transaction landed but its execution failed
    pub err: Option<String>,
}

impl SignatureState {
    /// True once the transaction reached at least `target`
    pub fn reached(&self, target: ConfirmationLevel) -> bool {
        self.level >= target
    }
}

/// Per-send options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    pub skip_preflight: bool,
    pub max_retries: Option<usize>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            skip_preflight: true,
            max_retries: None,
        }
    }
}

/// SPL token account held by a wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHolding {
    pub address: Pubkey,
    pub mint: Pubkey,
    pub amount: u64,
}

/// Leading fields of an SPL token account; the rest is ignored
#[derive(BorshDeserialize)]
struct RawTokenAccount {
    mint: Pubkey,
    _owner: Pubkey,
    amount: u64,
}

/// Decode the mint and amount of an SPL token account (classic or token-2022)
pub fn decode_token_account(address: Pubkey, data: &[u8]) -> Option<TokenHolding> {
    let raw = RawTokenAccount::deserialize(&mut &data[..]).ok()?;
    Some(TokenHolding {
        address,
        mint: raw.mint,
        amount: raw.amount,
    })
}

/// Async request/response boundary to the ledger
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Latest blockhash and the last block height at which it is valid
    async fn get_latest_blockhash(&self) -> Result<(Hash, u64), RpcError>;

    async fn is_blockhash_valid(&self, blockhash: &Hash) -> Result<bool, RpcError>;

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        options: SendOptions,
    ) -> Result<Signature, RpcError>;

    /// One entry per requested signature, `None` when the ledger has not seen it
    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureState>>, RpcError>;

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, RpcError>;

    async fn get_multiple_accounts(
        &self,
        addresses: &[Pubkey],
    ) -> Result<Vec<Option<Account>>, RpcError>;

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError>;

    /// Every classic SPL token account owned by `owner`
    async fn get_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
    ) -> Result<Vec<TokenHolding>, RpcError>;

    async fn get_address_lookup_table(
        &self,
        address: &Pubkey,
    ) -> Result<AddressLookupTableAccount, RpcError>;

    /// Unix timestamp of the current slot on the network
    async fn get_network_time(&self) -> Result<i64, RpcError>;
}
