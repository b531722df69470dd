//! Builds the N unsigned mint drafts of one batch
//!
//! Every input is validated and every guard account derived before the
//! first asset keypair is generated, so a refused batch leaves no signer
//! material behind.

use super::accounts::{guard_remaining_accounts, GuardAccountContext};
use super::draft::TransactionDraft;
use super::instructions::{check_compute_budget, plan_mint_instructions, sanity_check_ix_order};
use super::mint_v2::{mint_v2_instruction, MintV2Params};
use super::TransactionBuilderError;
use crate::compat;
use crate::guards::{OwnedNft, WalletState};
use crate::state::{CandyGuardState, CandyMachineState, DEFAULT_GROUP};
use solana_sdk::{
    address_lookup_table::AddressLookupTableAccount,
    hash::Hash,
    instruction::AccountMeta,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use tracing::{debug, instrument};

/// Network and program state shared by every draft of a batch
pub struct BatchContext<'a> {
    pub machine: &'a CandyMachineState,
    pub guard: &'a CandyGuardState,
    pub wallet: &'a WalletState,
    pub payer: Pubkey,
    pub collection_update_authority: Pubkey,
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
    /// Empty when no lookup table is configured
    pub lookup_tables: &'a [AddressLookupTableAccount],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionBatchBuilder {
    cu_limit: u32,
    cu_price: u64,
}

impl TransactionBatchBuilder {
    pub fn new(cu_limit: u32, cu_price: u64) -> Self {
        Self { cu_limit, cu_price }
    }

    /// Build `quantity` drafts minting under `label`
    ///
    /// # Errors
    ///
    /// - `InvalidQuantity` when `quantity` is 0 or above `max_amount`
    /// - `Configuration` when the group does not exist or the wallet lacks
    ///   an account a guard needs (allowlist proof, payment NFT)
    /// - `UnsupportedGuard` when the group enables a guard this client
    ///   cannot supply accounts for
    /// - `Compile` when the message does not fit
    #[instrument(skip(self, ctx), fields(blockhash = %ctx.blockhash))]
    pub fn build(
        &self,
        ctx: &BatchContext<'_>,
        label: &str,
        quantity: u64,
        max_amount: u64,
    ) -> Result<Vec<TransactionDraft>, TransactionBuilderError> {
        if quantity == 0 || quantity > max_amount {
            return Err(TransactionBuilderError::InvalidQuantity {
                requested: quantity,
                max: max_amount,
            });
        }
        check_compute_budget(self.cu_limit, self.cu_price)?;

        let guards = ctx
            .guard
            .resolve(label)
            .ok_or_else(|| TransactionBuilderError::unknown_group(label))?;
        if let Some(kind) = guards.unsupported_guard() {
            return Err(TransactionBuilderError::UnsupportedGuard {
                label: label.to_string(),
                guard: kind.to_string(),
            });
        }

        let payment_nfts = payment_nfts(ctx.wallet, &guards, label, quantity)?;

        let remaining: Vec<Vec<AccountMeta>> = (0..quantity as usize)
            .map(|index| {
                let account_ctx = GuardAccountContext {
                    label,
                    payer: ctx.payer,
                    machine: ctx.machine,
                    guard: ctx.guard,
                    wallet: ctx.wallet,
                    payment_nft: payment_nfts.get(index).copied(),
                };
                guard_remaining_accounts(&guards, &account_ctx)
            })
            .collect::<Result<_, _>>()?;

        let group_label = (label != DEFAULT_GROUP).then_some(label);
        let mut drafts = Vec::with_capacity(remaining.len());
        for remaining_accounts in remaining {
            let asset = Keypair::new();
            let mint_ix = mint_v2_instruction(MintV2Params {
                machine: ctx.machine,
                guard: ctx.guard,
                payer: ctx.payer,
                nft_mint: asset.pubkey(),
                collection_update_authority: ctx.collection_update_authority,
                label: group_label,
                remaining_accounts,
            })?;

            let plan = plan_mint_instructions(self.cu_limit, self.cu_price, mint_ix)?;
            sanity_check_ix_order(&plan.instructions)?;

            let message = v0::Message::try_compile(
                &ctx.payer,
                &plan.instructions,
                ctx.lookup_tables,
                ctx.blockhash,
            )
            .map_err(|e| TransactionBuilderError::Compile(e.to_string()))?;

            drafts.push(TransactionDraft::new(
                asset,
                compat::unsigned_transaction(VersionedMessage::V0(message)),
                ctx.blockhash,
                ctx.last_valid_block_height,
            ));
        }

        debug!(
            label,
            drafts = drafts.len(),
            lookup_tables = ctx.lookup_tables.len(),
            "Built mint batch"
        );
        Ok(drafts)
    }
}

/// One distinct NFT per draft when the group pays with NFTs
fn payment_nfts<'a>(
    wallet: &'a WalletState,
    guards: &crate::state::GuardSet,
    label: &str,
    quantity: u64,
) -> Result<Vec<&'a OwnedNft>, TransactionBuilderError> {
    let Some(payment) = &guards.nft_payment else {
        return Ok(Vec::new());
    };
    let owned: Vec<&OwnedNft> = wallet
        .nfts_in(&payment.required_collection)
        .take(quantity as usize)
        .collect();
    if (owned.len() as u64) < quantity {
        return Err(TransactionBuilderError::Configuration(format!(
            "group '{label}' needs {quantity} NFTs to pay with, wallet holds {}",
            owned.len()
        )));
    }
    Ok(owned)
}
