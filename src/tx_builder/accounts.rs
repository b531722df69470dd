//! Remaining accounts the candy guard program reads for each enabled guard
//!
//! Accounts are appended in guard feature-bit order, which is the order the
//! program consumes them in.

use crate::guards::{AllowlistStatus, OwnedNft, WalletState};
use crate::state::{pdas, CandyGuardState, CandyMachineState, GuardKind, GuardSet};
use crate::tx_builder::TransactionBuilderError;
use solana_sdk::{instruction::AccountMeta, pubkey::Pubkey};

/// What one draft needs to know to derive its guard accounts
pub struct GuardAccountContext<'a> {
    pub label: &'a str,
    pub payer: Pubkey,
    pub machine: &'a CandyMachineState,
    pub guard: &'a CandyGuardState,
    pub wallet: &'a WalletState,
    /// NFT this draft pays with when the group has an nft payment guard
    pub payment_nft: Option<&'a OwnedNft>,
}

pub fn guard_remaining_accounts(
    guards: &GuardSet,
    ctx: &GuardAccountContext<'_>,
) -> Result<Vec<AccountMeta>, TransactionBuilderError> {
    let program = ctx.guard.program_id;
    let payer = ctx.payer;
    let mut accounts = Vec::new();

    for kind in guards.kinds() {
        match kind {
            GuardKind::BotTax
            | GuardKind::StartDate
            | GuardKind::EndDate
            | GuardKind::RedeemedAmount
            | GuardKind::AddressGate
            | GuardKind::ProgramGate => {}

            GuardKind::SolPayment => {
                let payment = guard_field(&guards.sol_payment, ctx.label, kind)?;
                accounts.push(AccountMeta::new(payment.destination, false));
            }
            GuardKind::TokenPayment => {
                let payment = guard_field(&guards.token_payment, ctx.label, kind)?;
                accounts.push(AccountMeta::new(
                    pdas::associated_token(&payer, &payment.mint),
                    false,
                ));
                accounts.push(AccountMeta::new(payment.destination_ata, false));
            }
            GuardKind::TokenGate => {
                let gate = guard_field(&guards.token_gate, ctx.label, kind)?;
                accounts.push(AccountMeta::new_readonly(
                    pdas::associated_token(&payer, &gate.mint),
                    false,
                ));
            }
            GuardKind::AllowList => {
                let allow_list = guard_field(&guards.allow_list, ctx.label, kind)?;
                if !matches!(ctx.wallet.allowlist(ctx.label), AllowlistStatus::Listed { .. }) {
                    return Err(TransactionBuilderError::Configuration(format!(
                        "wallet has no allowlist proof for group '{}'",
                        ctx.label
                    )));
                }
                accounts.push(AccountMeta::new_readonly(
                    pdas::allow_list_proof(
                        &program,
                        &allow_list.merkle_root,
                        &payer,
                        &ctx.guard.address,
                        &ctx.machine.address,
                    ),
                    false,
                ));
            }
            GuardKind::MintLimit => {
                let limit = guard_field(&guards.mint_limit, ctx.label, kind)?;
                accounts.push(AccountMeta::new(
                    pdas::mint_counter(
                        &program,
                        limit.id,
                        &payer,
                        &ctx.guard.address,
                        &ctx.machine.address,
                    ),
                    false,
                ));
            }
            GuardKind::NftPayment => {
                let payment = guard_field(&guards.nft_payment, ctx.label, kind)?;
                let nft = ctx.payment_nft.ok_or_else(|| {
                    TransactionBuilderError::Configuration(format!(
                        "no NFT left to pay with in group '{}'",
                        ctx.label
                    ))
                })?;
                accounts.push(AccountMeta::new(nft.token_account, false));
                accounts.push(AccountMeta::new(pdas::metadata(&nft.mint), false));
                accounts.push(AccountMeta::new_readonly(nft.mint, false));
                accounts.push(AccountMeta::new_readonly(payment.destination, false));
                accounts.push(AccountMeta::new(
                    pdas::associated_token(&payment.destination, &nft.mint),
                    false,
                ));
                accounts.push(AccountMeta::new_readonly(
                    spl_associated_token_account::id(),
                    false,
                ));
            }
            GuardKind::NftGate => {
                let gate = guard_field(&guards.nft_gate, ctx.label, kind)?;
                let nft = ctx
                    .wallet
                    .nfts_in(&gate.required_collection)
                    .next()
                    .ok_or_else(|| {
                        TransactionBuilderError::Configuration(format!(
                            "no NFT from the gate collection for group '{}'",
                            ctx.label
                        ))
                    })?;
                accounts.push(AccountMeta::new_readonly(nft.token_account, false));
                accounts.push(AccountMeta::new_readonly(pdas::metadata(&nft.mint), false));
            }
            GuardKind::TokenBurn => {
                let burn = guard_field(&guards.token_burn, ctx.label, kind)?;
                accounts.push(AccountMeta::new(
                    pdas::associated_token(&payer, &burn.mint),
                    false,
                ));
                accounts.push(AccountMeta::new(burn.mint, false));
            }
            GuardKind::Allocation => {
                let allocation = guard_field(&guards.allocation, ctx.label, kind)?;
                accounts.push(AccountMeta::new(
                    pdas::allocation_tracker(
                        &program,
                        allocation.id,
                        &ctx.guard.address,
                        &ctx.machine.address,
                    ),
                    false,
                ));
            }
            GuardKind::Token2022Payment => {
                let payment = guard_field(&guards.token2022_payment, ctx.label, kind)?;
                accounts.push(AccountMeta::new(
                    pdas::associated_token_with_program(
                        &payer,
                        &payment.mint,
                        &pdas::TOKEN_2022_PROGRAM_ID,
                    ),
                    false,
                ));
                accounts.push(AccountMeta::new_readonly(payment.mint, false));
                accounts.push(AccountMeta::new(payment.destination_ata, false));
                accounts.push(AccountMeta::new_readonly(
                    pdas::TOKEN_2022_PROGRAM_ID,
                    false,
                ));
            }

            GuardKind::ThirdPartySigner
            | GuardKind::Gatekeeper
            | GuardKind::NftBurn
            | GuardKind::FreezeSolPayment
            | GuardKind::FreezeTokenPayment => {
                return Err(TransactionBuilderError::UnsupportedGuard {
                    label: ctx.label.to_string(),
                    guard: kind.to_string(),
                });
            }
        }
    }

    Ok(accounts)
}

fn guard_field<'a, T>(
    field: &'a Option<T>,
    label: &str,
    kind: GuardKind,
) -> Result<&'a T, TransactionBuilderError> {
    field.as_ref().ok_or_else(|| {
        TransactionBuilderError::Internal(format!(
            "guard {kind} listed for group '{label}' but not set"
        ))
    })
}
