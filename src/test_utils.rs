//! Test Utilities Module
//!
//! In-memory stand-ins for the ledger, the wallet and the metadata host,
//! plus fixtures for program accounts. Everything is deterministic and
//! scriptable so the mint flow can be driven without a network.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use crate::compat;
use crate::rpc_manager::{
    ConfirmationLevel, JsonMetadata, LedgerRpc, MetadataFetcher, RpcError, SendOptions,
    SignatureState, TokenHolding,
};
use crate::state::{
    pdas, CandyGuardState, CandyMachineState, GuardGroup, GuardSet, MetadataAccount,
    TokenStandard,
};
use crate::wallet::{KeypairWallet, WalletError, WalletSigner};
use async_trait::async_trait;
use solana_sdk::{
    account::Account,
    address_lookup_table::AddressLookupTableAccount,
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    transaction::VersionedTransaction,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

const MOCK_ENDPOINT: &str = "mock";

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<Pubkey, Account>,
    balances: HashMap<Pubkey, u64>,
    token_accounts: HashMap<Pubkey, Vec<TokenHolding>>,
    lookup_tables: HashMap<Pubkey, AddressLookupTableAccount>,
    send_failures: HashMap<usize, RpcError>,
    send_attempts: usize,
    sent: Vec<VersionedTransaction>,
    statuses: HashMap<Signature, SignatureState>,
    delayed_statuses: HashMap<Signature, (usize, SignatureState)>,
    status_calls: usize,
    valid_checks_left: Option<usize>,
    land_level: Option<ConfirmationLevel>,
    minted_uri_base: Option<String>,
}

/// Scriptable in-memory ledger
pub struct MockLedger {
    blockhash: Hash,
    last_valid_block_height: u64,
    network_time: Mutex<i64>,
    state: Mutex<LedgerState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            blockhash: Hash::new_unique(),
            last_valid_block_height: 1_000,
            network_time: Mutex::new(1_700_000_000),
            state: Mutex::new(LedgerState::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap()
    }

    pub fn blockhash(&self) -> Hash {
        self.blockhash
    }

    pub fn add_account(&self, address: Pubkey, account: Account) {
        self.state().accounts.insert(address, account);
    }

    pub fn set_balance(&self, owner: Pubkey, lamports: u64) {
        self.state().balances.insert(owner, lamports);
    }

    pub fn add_token_holding(&self, owner: Pubkey, holding: TokenHolding) {
        self.state().token_accounts.entry(owner).or_default().push(holding);
    }

    pub fn add_lookup_table(&self, table: AddressLookupTableAccount) {
        self.state().lookup_tables.insert(table.key, table);
    }

    pub fn set_network_time(&self, now: i64) {
        *self.network_time.lock().unwrap() = now;
    }

    /// Reject the `index`-th send (0-based, counting every send)
    pub fn fail_send(&self, index: usize, err: RpcError) {
        self.state().send_failures.insert(index, err);
    }

    /// Accepted sends land immediately at `level`
    pub fn land_sends(&self, level: ConfirmationLevel) {
        self.state().land_level = Some(level);
    }

    /// Landed mints get a metadata account pointing at `{base}/{mint}.json`
    pub fn create_metadata_on_land(&self, base: &str) {
        self.state().minted_uri_base = Some(base.to_string());
    }

    pub fn set_status(&self, signature: Signature, level: ConfirmationLevel, err: Option<String>) {
        self.state()
            .statuses
            .insert(signature, SignatureState { level, err });
    }

    /// Status only visible after `polls` status queries have been answered;
    /// replaces any status set with [`MockLedger::set_status`] from then on
    pub fn set_status_after_polls(&self, signature: Signature, polls: usize, state: SignatureState) {
        self.state().delayed_statuses.insert(signature, (polls, state));
    }

    /// The blockhash stays valid for `checks` validity checks, then expires
    pub fn expire_blockhash_after(&self, checks: usize) {
        self.state().valid_checks_left = Some(checks);
    }

    pub fn sent(&self) -> Vec<VersionedTransaction> {
        self.state().sent.clone()
    }

    pub fn send_count(&self) -> usize {
        self.state().sent.len()
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerRpc for MockLedger {
    async fn get_latest_blockhash(&self) -> Result<(Hash, u64), RpcError> {
        Ok((self.blockhash, self.last_valid_block_height))
    }

    async fn is_blockhash_valid(&self, blockhash: &Hash) -> Result<bool, RpcError> {
        let mut state = self.state();
        let valid = match state.valid_checks_left.as_mut() {
            Some(0) => false,
            Some(left) => {
                *left -= 1;
                true
            }
            None => true,
        };
        Ok(valid && *blockhash == self.blockhash)
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        _options: SendOptions,
    ) -> Result<Signature, RpcError> {
        let mut state = self.state();
        let attempt = state.send_attempts;
        state.send_attempts += 1;
        if let Some(err) = state.send_failures.get(&attempt) {
            return Err(err.clone());
        }

        let signature = compat::transaction_id(transaction);
        state.sent.push(transaction.clone());

        if let Some(level) = state.land_level {
            state
                .statuses
                .insert(signature, SignatureState { level, err: None });
            if let Some(base) = state.minted_uri_base.clone() {
                let signers = compat::get_required_signers(&transaction.message);
                for mint in signers.iter().skip(1) {
                    state.accounts.insert(
                        pdas::metadata(mint),
                        metadata_account(mint, &format!("{base}/{mint}.json")),
                    );
                }
            }
        }
        Ok(signature)
    }

    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureState>>, RpcError> {
        let mut state = self.state();
        state.status_calls += 1;
        let calls = state.status_calls;
        Ok(signatures
            .iter()
            .map(|sig| {
                state
                    .delayed_statuses
                    .get(sig)
                    .filter(|(after, _)| calls > *after)
                    .map(|(_, s)| s.clone())
                    .or_else(|| state.statuses.get(sig).cloned())
            })
            .collect())
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, RpcError> {
        Ok(self.state().accounts.get(address).cloned())
    }

    async fn get_multiple_accounts(
        &self,
        addresses: &[Pubkey],
    ) -> Result<Vec<Option<Account>>, RpcError> {
        let state = self.state();
        Ok(addresses
            .iter()
            .map(|a| state.accounts.get(a).cloned())
            .collect())
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError> {
        Ok(self.state().balances.get(address).copied().unwrap_or(0))
    }

    async fn get_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
    ) -> Result<Vec<TokenHolding>, RpcError> {
        Ok(self
            .state()
            .token_accounts
            .get(owner)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_address_lookup_table(
        &self,
        address: &Pubkey,
    ) -> Result<AddressLookupTableAccount, RpcError> {
        self.state()
            .lookup_tables
            .get(address)
            .cloned()
            .ok_or_else(|| RpcError::AccountNotFound {
                account: address.to_string(),
                endpoint: MOCK_ENDPOINT.to_string(),
            })
    }

    async fn get_network_time(&self) -> Result<i64, RpcError> {
        Ok(*self.network_time.lock().unwrap())
    }
}

/// In-memory metadata host
#[derive(Default)]
pub struct MockMetadataFetcher {
    documents: Mutex<HashMap<String, JsonMetadata>>,
    fallback: Mutex<Option<JsonMetadata>>,
    failing: Mutex<HashSet<String>>,
    fetches: AtomicUsize,
}

impl MockMetadataFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, uri: &str, document: JsonMetadata) {
        self.documents
            .lock()
            .unwrap()
            .insert(uri.to_string(), document);
    }

    /// Served for any URI without its own document
    pub fn set_fallback(&self, document: JsonMetadata) {
        *self.fallback.lock().unwrap() = Some(document);
    }

    /// Requests for `uri` time out
    pub fn fail_uri(&self, uri: &str) {
        self.failing.lock().unwrap().insert(uri.to_string());
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataFetcher for MockMetadataFetcher {
    async fn fetch_json(&self, uri: &str) -> Result<JsonMetadata, RpcError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(uri) {
            return Err(RpcError::Timeout {
                endpoint: uri.to_string(),
                timeout_ms: 10_000,
            });
        }
        if let Some(document) = self.documents.lock().unwrap().get(uri) {
            return Ok(document.clone());
        }
        self.fallback
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| RpcError::RpcResponse {
                endpoint: uri.to_string(),
                message: "404 Not Found".to_string(),
                code: Some(404),
            })
    }
}

/// Keypair wallet that can be told to decline
pub struct MockWallet {
    inner: KeypairWallet,
    declining: AtomicBool,
    sign_requests: AtomicUsize,
}

impl MockWallet {
    pub fn new() -> Self {
        Self {
            inner: KeypairWallet::from_keypair(Keypair::new()),
            declining: AtomicBool::new(false),
            sign_requests: AtomicUsize::new(0),
        }
    }

    pub fn decline(&self, declining: bool) {
        self.declining.store(declining, Ordering::SeqCst);
    }

    pub fn sign_requests(&self) -> usize {
        self.sign_requests.load(Ordering::SeqCst)
    }
}

impl Default for MockWallet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletSigner for MockWallet {
    fn pubkey(&self) -> Pubkey {
        self.inner.pubkey()
    }

    async fn sign_all_transactions(
        &self,
        transactions: Vec<VersionedTransaction>,
    ) -> Result<Vec<VersionedTransaction>, WalletError> {
        self.sign_requests.fetch_add(1, Ordering::SeqCst);
        if self.declining.load(Ordering::SeqCst) {
            return Err(WalletError::Declined("user rejected the request".to_string()));
        }
        self.inner.sign_all_transactions(transactions).await
    }
}

/// Metadata account for `mint` pointing at `uri`
pub fn metadata_account(mint: &Pubkey, uri: &str) -> Account {
    metadata_account_with_authority(mint, uri, Pubkey::new_from_array([9u8; 32]))
}

pub fn metadata_account_with_authority(mint: &Pubkey, uri: &str, authority: Pubkey) -> Account {
    let record = MetadataAccount {
        update_authority: authority,
        mint: *mint,
        name: "Candy".to_string(),
        symbol: "CNDY".to_string(),
        uri: uri.to_string(),
        seller_fee_basis_points: 500,
        creators: Vec::new(),
        primary_sale_happened: true,
        is_mutable: true,
        edition_nonce: Some(254),
        token_standard: Some(0),
        collection: None,
    };
    program_account(pdas::TOKEN_METADATA_PROGRAM_ID, record.encode())
}

pub fn program_account(owner: Pubkey, data: Vec<u8>) -> Account {
    Account {
        lamports: 1_000_000,
        data,
        owner,
        executable: false,
        rent_epoch: 0,
    }
}

/// Candy machine, candy guard and collection metadata ready to install
/// into a [`MockLedger`]
#[derive(Debug, Clone)]
pub struct ProgramFixture {
    pub machine: CandyMachineState,
    pub guard: CandyGuardState,
    pub collection_update_authority: Pubkey,
}

impl ProgramFixture {
    pub fn new(default_guards: GuardSet, groups: Vec<GuardGroup>) -> Self {
        let guard_address = Pubkey::new_unique();
        Self {
            machine: CandyMachineState {
                address: Pubkey::new_unique(),
                program_id: Pubkey::new_unique(),
                authority: Pubkey::new_unique(),
                mint_authority: guard_address,
                collection_mint: Pubkey::new_unique(),
                items_redeemed: 0,
                items_available: 100,
                token_standard: TokenStandard::NonFungible,
            },
            guard: CandyGuardState {
                address: guard_address,
                program_id: Pubkey::new_unique(),
                base: Pubkey::new_unique(),
                bump: 255,
                authority: Pubkey::new_unique(),
                default_guards,
                groups,
            },
            collection_update_authority: Pubkey::new_unique(),
        }
    }

    pub fn install(&self, ledger: &MockLedger) {
        ledger.add_account(
            self.machine.address,
            program_account(self.machine.program_id, self.machine.encode()),
        );
        ledger.add_account(
            self.guard.address,
            program_account(self.guard.program_id, self.guard.encode()),
        );
        ledger.add_account(
            pdas::metadata(&self.machine.collection_mint),
            metadata_account_with_authority(
                &self.machine.collection_mint,
                "https://arweave.net/collection.json",
                self.collection_update_authority,
            ),
        );
    }
}
