//! Signing and concurrent dispatch of a mint batch
//!
//! Dispatch is a structured join: every signed transaction is sent by its
//! own future and every outcome is collected, so one rejection never
//! cancels or delays a sibling. The batch verdict is computed afterwards
//! from the collected outcomes.

use crate::compat;
use crate::errors::MintError;
use crate::metrics::{metrics, Timer};
use crate::rpc_manager::{ConfirmationLevel, LedgerRpc, RpcError, SendOptions};
use crate::tx_builder::TransactionDraft;
use crate::types::SubmissionOutcome;
use crate::wallet::{WalletError, WalletSigner};
use futures::future::join_all;
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Fully signed batch, ready to dispatch
#[derive(Debug, Clone)]
pub struct SignedBatch {
    pub transactions: Vec<VersionedTransaction>,
    /// Asset mint of each transaction, same order
    pub mints: Vec<Pubkey>,
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

impl SignedBatch {
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

pub struct SubmissionCoordinator {
    rpc: Arc<dyn LedgerRpc>,
    wallet: Arc<dyn WalletSigner>,
    poll_interval: Duration,
}

impl SubmissionCoordinator {
    pub fn new(rpc: Arc<dyn LedgerRpc>, wallet: Arc<dyn WalletSigner>) -> Self {
        Self {
            rpc,
            wallet,
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sign, send and wait for the allowlist route transaction to reach
    /// `processed`. Nothing of the batch is built until this returns.
    #[instrument(skip_all)]
    pub async fn approve_route(&self, route_ix: Instruction) -> Result<Signature, MintError> {
        let payer = self.wallet.pubkey();
        let (blockhash, _) = self
            .rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| MintError::Approval(e.to_string()))?;

        let message = v0::Message::try_compile(&payer, &[route_ix], &[], blockhash)
            .map_err(|e| MintError::Approval(e.to_string()))?;
        let unsigned = compat::unsigned_transaction(VersionedMessage::V0(message));

        let signed = self.wallet.sign_all_transactions(vec![unsigned]).await?;
        let tx = signed
            .into_iter()
            .next()
            .ok_or_else(|| MintError::Approval("wallet returned no transaction".to_string()))?;

        let signature = self
            .rpc
            .send_transaction(&tx, SendOptions::default())
            .await
            .map_err(|e| MintError::Approval(e.to_string()))?;
        debug!(%signature, "Route transaction sent");

        self.wait_for(signature, &blockhash, ConfirmationLevel::Processed)
            .await?;
        Ok(signature)
    }

    async fn wait_for(
        &self,
        signature: Signature,
        blockhash: &Hash,
        level: ConfirmationLevel,
    ) -> Result<(), MintError> {
        loop {
            let statuses = self
                .rpc
                .get_signature_statuses(&[signature])
                .await
                .map_err(|e| MintError::Approval(e.to_string()))?;
            if let Some(Some(state)) = statuses.first() {
                if let Some(err) = &state.err {
                    return Err(MintError::Approval(format!("route transaction failed: {err}")));
                }
                if state.reached(level) {
                    return Ok(());
                }
            }

            let valid = self
                .rpc
                .is_blockhash_valid(blockhash)
                .await
                .map_err(|e| MintError::Approval(e.to_string()))?;
            if !valid {
                return Err(MintError::Approval(
                    "route transaction expired before it was processed".to_string(),
                ));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Co-sign every draft with its asset key, then ask the wallet to sign
    /// the whole batch at once
    #[instrument(skip_all, fields(drafts = drafts.len()))]
    pub async fn sign_batch(&self, drafts: Vec<TransactionDraft>) -> Result<SignedBatch, MintError> {
        let Some(first) = drafts.first() else {
            return Err(MintError::Build(
                crate::tx_builder::TransactionBuilderError::Internal("empty batch".to_string()),
            ));
        };
        let blockhash = first.blockhash;
        let last_valid_block_height = first.last_valid_block_height;

        let mut mints = Vec::with_capacity(drafts.len());
        let mut transactions = Vec::with_capacity(drafts.len());
        for mut draft in drafts {
            draft.sign_with_asset().map_err(WalletError::from)?;
            mints.push(draft.asset_mint());
            // asset keypair is dropped here
            transactions.push(draft.into_transaction());
        }

        let expected = transactions.len();
        let signed = self.wallet.sign_all_transactions(transactions).await?;
        if signed.len() != expected || !signed.iter().all(compat::is_fully_signed) {
            return Err(MintError::Signing(WalletError::Declined(format!(
                "wallet returned {} of {expected} fully signed transactions",
                signed.len()
            ))));
        }

        Ok(SignedBatch {
            transactions: signed,
            mints,
            blockhash,
            last_valid_block_height,
        })
    }

    /// Send every transaction concurrently; one outcome per transaction,
    /// in batch order
    #[instrument(skip_all, fields(count = batch.len()))]
    pub async fn dispatch(&self, batch: &SignedBatch) -> Vec<SubmissionOutcome> {
        let timer = Timer::new();
        let options = SendOptions {
            skip_preflight: true,
            max_retries: None,
        };

        let sends = batch.transactions.iter().map(|tx| {
            let rpc = Arc::clone(&self.rpc);
            async move { rpc.send_transaction(tx, options).await }
        });
        let outcomes: Vec<SubmissionOutcome> = join_all(sends)
            .await
            .into_iter()
            .map(outcome_of)
            .collect();

        timer.observe_duration(&metrics().dispatch_latency);
        for outcome in &outcomes {
            match outcome {
                SubmissionOutcome::Accepted(_) => metrics().dispatch_accepted.inc(),
                SubmissionOutcome::Rejected(err) => {
                    metrics().dispatch_rejected.inc();
                    warn!(error = %err, "Mint transaction rejected");
                }
            }
        }
        outcomes
    }
}

fn outcome_of(result: Result<Signature, RpcError>) -> SubmissionOutcome {
    match result {
        Ok(signature) => SubmissionOutcome::Accepted(signature),
        Err(err) => SubmissionOutcome::Rejected(err),
    }
}
