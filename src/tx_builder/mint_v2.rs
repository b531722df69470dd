//! `mint_v2` instruction of the candy guard program

use crate::state::{instruction_discriminator, pdas, CandyGuardState, CandyMachineState};
use crate::tx_builder::TransactionBuilderError;
use borsh::BorshSerialize;
use solana_program::system_program;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    sysvar,
};

#[derive(BorshSerialize)]
struct MintV2Args {
    mint_args: Vec<u8>,
    label: Option<String>,
}

/// Accounts of one mint that are not derivable from program state
pub struct MintV2Params<'a> {
    pub machine: &'a CandyMachineState,
    pub guard: &'a CandyGuardState,
    /// Fee payer, minter and mint authority of the new asset
    pub payer: Pubkey,
    /// Freshly generated asset identity
    pub nft_mint: Pubkey,
    pub collection_update_authority: Pubkey,
    /// `None` for the default group
    pub label: Option<&'a str>,
    pub remaining_accounts: Vec<AccountMeta>,
}

pub fn mint_v2_instruction(params: MintV2Params<'_>) -> Result<Instruction, TransactionBuilderError> {
    let MintV2Params {
        machine,
        guard,
        payer,
        nft_mint,
        collection_update_authority,
        label,
        remaining_accounts,
    } = params;

    let guard_program = guard.program_id;
    // Anchor encodes an absent optional account as the invoked program id
    let none = guard_program;
    let programmable = machine.token_standard.is_programmable();

    let authority_pda = pdas::candy_machine_authority(&machine.program_id, &machine.address);
    let token = pdas::associated_token(&payer, &nft_mint);
    let token_record = if programmable {
        pdas::token_record(&nft_mint, &token)
    } else {
        none
    };
    let auth_rules_program = if programmable {
        pdas::AUTH_RULES_PROGRAM_ID
    } else {
        none
    };

    let mut accounts = vec![
        AccountMeta::new_readonly(guard.address, false),
        AccountMeta::new_readonly(machine.program_id, false),
        AccountMeta::new(machine.address, false),
        AccountMeta::new(authority_pda, false),
        AccountMeta::new(payer, true),
        AccountMeta::new(payer, true),
        AccountMeta::new(nft_mint, true),
        AccountMeta::new_readonly(payer, true),
        AccountMeta::new(pdas::metadata(&nft_mint), false),
        AccountMeta::new(pdas::master_edition(&nft_mint), false),
        AccountMeta::new(token, false),
        AccountMeta::new(token_record, false),
        AccountMeta::new_readonly(
            pdas::collection_delegate_record(
                &machine.collection_mint,
                &collection_update_authority,
                &authority_pda,
            ),
            false,
        ),
        AccountMeta::new_readonly(machine.collection_mint, false),
        AccountMeta::new(pdas::metadata(&machine.collection_mint), false),
        AccountMeta::new_readonly(pdas::master_edition(&machine.collection_mint), false),
        AccountMeta::new_readonly(collection_update_authority, false),
        AccountMeta::new_readonly(pdas::TOKEN_METADATA_PROGRAM_ID, false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(spl_associated_token_account::id(), false),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(sysvar::instructions::id(), false),
        AccountMeta::new_readonly(sysvar::slot_hashes::id(), false),
        AccountMeta::new_readonly(auth_rules_program, false),
        AccountMeta::new_readonly(none, false),
    ];
    accounts.extend(remaining_accounts);

    let args = MintV2Args {
        mint_args: Vec::new(),
        label: label.map(str::to_string),
    };
    let mut data = instruction_discriminator("mint_v2").to_vec();
    data.extend(borsh::to_vec(&args).map_err(|e| {
        TransactionBuilderError::instruction_failed(guard_program.to_string(), e.to_string())
    })?);

    Ok(Instruction {
        program_id: guard_program,
        accounts,
        data,
    })
}
