//! Production [`LedgerRpc`] over the nonblocking Solana RPC client

use super::{
    ConfirmationLevel, LedgerRpc, RetryPolicy, RpcError, SendOptions, SignatureState,
    TokenHolding,
};
use async_trait::async_trait;
use solana_account_decoder::UiAccountData;
use solana_client::{
    client_error::ClientError, nonblocking::rpc_client::RpcClient,
    rpc_config::RpcSendTransactionConfig, rpc_request::TokenAccountsFilter,
    rpc_response::RpcKeyedAccount,
};
use solana_sdk::{
    account::Account,
    address_lookup_table::{state::AddressLookupTable, AddressLookupTableAccount},
    commitment_config::CommitmentConfig,
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
use solana_transaction_status::TransactionConfirmationStatus;
use std::{future::Future, str::FromStr, time::Duration};
use tracing::{debug, warn};

/// getSignatureStatuses accepts at most this many signatures per call
const MAX_STATUS_BATCH: usize = 256;
/// getMultipleAccounts accepts at most this many keys per call
const MAX_ACCOUNTS_BATCH: usize = 100;

pub struct SolanaRpc {
    client: RpcClient,
    endpoint: String,
    commitment: CommitmentConfig,
    retry: RetryPolicy,
}

impl SolanaRpc {
    pub fn new(url: impl Into<String>, commitment: CommitmentConfig, timeout: Duration) -> Self {
        let endpoint = url.into();
        Self {
            client: RpcClient::new_with_timeout_and_commitment(
                endpoint.clone(),
                timeout,
                commitment,
            ),
            endpoint,
            commitment,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn with_retry<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T, RpcError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let err = RpcError::from_client_error(e, &self.endpoint);
                    match self.retry.calculate_delay(attempt) {
                        Some(delay) if err.is_retryable() => {
                            debug!(op, attempt, ?delay, error = %err, "Retrying RPC call");
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        _ => return Err(err),
                    }
                }
            }
        }
    }
}

#[async_trait]
impl LedgerRpc for SolanaRpc {
    async fn get_latest_blockhash(&self) -> Result<(Hash, u64), RpcError> {
        self.with_retry("get_latest_blockhash", || {
            self.client
                .get_latest_blockhash_with_commitment(self.commitment)
        })
        .await
    }

    async fn is_blockhash_valid(&self, blockhash: &Hash) -> Result<bool, RpcError> {
        self.with_retry("is_blockhash_valid", || {
            self.client.is_blockhash_valid(blockhash, self.commitment)
        })
        .await
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        options: SendOptions,
    ) -> Result<Signature, RpcError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: options.skip_preflight,
            preflight_commitment: Some(self.commitment.commitment),
            max_retries: options.max_retries,
            ..Default::default()
        };
        self.client
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(|e| RpcError::from_client_error(e, &self.endpoint))
    }

    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureState>>, RpcError> {
        let mut states = Vec::with_capacity(signatures.len());
        for chunk in signatures.chunks(MAX_STATUS_BATCH) {
            let response = self
                .with_retry("get_signature_statuses", || {
                    self.client.get_signature_statuses(chunk)
                })
                .await?;
            states.extend(response.value.into_iter().map(|status| {
                status.map(|status| SignatureState {
                    level: match status.confirmation_status {
                        Some(TransactionConfirmationStatus::Processed) => {
                            ConfirmationLevel::Processed
                        }
                        Some(TransactionConfirmationStatus::Confirmed) => {
                            ConfirmationLevel::Confirmed
                        }
                        Some(TransactionConfirmationStatus::Finalized) => {
                            ConfirmationLevel::Finalized
                        }
                        // Older nodes: rooted statuses carry no confirmation count
                        None if status.confirmations.is_none() => ConfirmationLevel::Finalized,
                        None => ConfirmationLevel::Processed,
                    },
                    err: status.err.map(|e| e.to_string()),
                })
            }));
        }
        Ok(states)
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, RpcError> {
        let response = self
            .with_retry("get_account", || {
                self.client
                    .get_account_with_commitment(address, self.commitment)
            })
            .await?;
        Ok(response.value)
    }

    async fn get_multiple_accounts(
        &self,
        addresses: &[Pubkey],
    ) -> Result<Vec<Option<Account>>, RpcError> {
        let mut accounts = Vec::with_capacity(addresses.len());
        for chunk in addresses.chunks(MAX_ACCOUNTS_BATCH) {
            let response = self
                .with_retry("get_multiple_accounts", || {
                    self.client
                        .get_multiple_accounts_with_commitment(chunk, self.commitment)
                })
                .await?;
            accounts.extend(response.value);
        }
        Ok(accounts)
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError> {
        let response = self
            .with_retry("get_balance", || {
                self.client
                    .get_balance_with_commitment(address, self.commitment)
            })
            .await?;
        Ok(response.value)
    }

    async fn get_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
    ) -> Result<Vec<TokenHolding>, RpcError> {
        let response = self
            .with_retry("get_token_accounts_by_owner", || {
                self.client.get_token_accounts_by_owner_with_commitment(
                    owner,
                    TokenAccountsFilter::ProgramId(spl_token::id()),
                    self.commitment,
                )
            })
            .await?;

        let mut holdings = Vec::with_capacity(response.value.len());
        for keyed in &response.value {
            match parse_keyed_token_account(keyed) {
                Some(holding) => holdings.push(holding),
                None => warn!(account = %keyed.pubkey, "Skipping undecodable token account"),
            }
        }
        Ok(holdings)
    }

    async fn get_address_lookup_table(
        &self,
        address: &Pubkey,
    ) -> Result<AddressLookupTableAccount, RpcError> {
        let account = self
            .get_account(address)
            .await?
            .ok_or_else(|| RpcError::AccountNotFound {
                account: address.to_string(),
                endpoint: self.endpoint.clone(),
            })?;
        let table =
            AddressLookupTable::deserialize(&account.data).map_err(|e| RpcError::Decode {
                account: address.to_string(),
                message: e.to_string(),
            })?;
        Ok(AddressLookupTableAccount {
            key: *address,
            addresses: table.addresses.to_vec(),
        })
    }

    async fn get_network_time(&self) -> Result<i64, RpcError> {
        let slot = self
            .with_retry("get_slot", || {
                self.client.get_slot_with_commitment(self.commitment)
            })
            .await?;
        match self.client.get_block_time(slot).await {
            Ok(time) => Ok(time),
            Err(e) => {
                // Block time is not always available for the freshest slot
                debug!(slot, error = %e, "No block time, using local clock");
                Ok(chrono::Utc::now().timestamp())
            }
        }
    }
}

/// Decode a keyed token account from either a jsonParsed or a binary payload
fn parse_keyed_token_account(keyed: &RpcKeyedAccount) -> Option<TokenHolding> {
    let address = Pubkey::from_str(&keyed.pubkey).ok()?;
    match &keyed.account.data {
        UiAccountData::Json(parsed) => {
            let info = parsed.parsed.get("info")?;
            let mint = Pubkey::from_str(info.get("mint")?.as_str()?).ok()?;
            let amount = info
                .get("tokenAmount")?
                .get("amount")?
                .as_str()?
                .parse::<u64>()
                .ok()?;
            Some(TokenHolding {
                address,
                mint,
                amount,
            })
        }
        _ => {
            let account: Account = keyed.account.decode()?;
            super::decode_token_account(address, &account.data)
        }
    }
}
