//! `route` instruction carrying an allowlist proof
//!
//! Routing the proof once creates the proof PDA; later mints only reference
//! that account instead of carrying the proof themselves.

use crate::guards::allowlist::Node;
use crate::state::{instruction_discriminator, pdas, CandyGuardState, CandyMachineState, GuardKind};
use crate::tx_builder::TransactionBuilderError;
use borsh::BorshSerialize;
use solana_program::system_program;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

#[derive(BorshSerialize)]
struct RouteArgs {
    guard: u8,
    data: Vec<u8>,
}

pub fn allowlist_route_instruction(
    machine: &CandyMachineState,
    guard: &CandyGuardState,
    payer: Pubkey,
    merkle_root: &Node,
    proof: &[Node],
    label: Option<&str>,
) -> Result<Instruction, TransactionBuilderError> {
    let encode_err = |e: std::io::Error| {
        TransactionBuilderError::instruction_failed(guard.program_id.to_string(), e.to_string())
    };

    let args = RouteArgs {
        guard: GuardKind::AllowList as u8,
        data: borsh::to_vec(&proof.to_vec()).map_err(encode_err)?,
    };
    let mut data = instruction_discriminator("route").to_vec();
    data.extend(borsh::to_vec(&args).map_err(encode_err)?);
    data.extend(borsh::to_vec(&label.map(str::to_string)).map_err(encode_err)?);

    let proof_pda = pdas::allow_list_proof(
        &guard.program_id,
        merkle_root,
        &payer,
        &guard.address,
        &machine.address,
    );

    Ok(Instruction {
        program_id: guard.program_id,
        accounts: vec![
            AccountMeta::new_readonly(guard.address, false),
            AccountMeta::new(machine.address, false),
            AccountMeta::new(payer, true),
            AccountMeta::new(proof_pda, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{GuardSet, TokenStandard};

    #[test]
    fn test_route_data_layout() {
        let guard = CandyGuardState {
            address: Pubkey::new_unique(),
            program_id: Pubkey::new_unique(),
            base: Pubkey::new_unique(),
            bump: 1,
            authority: Pubkey::new_unique(),
            default_guards: GuardSet::default(),
            groups: vec![],
        };
        let machine = CandyMachineState {
            address: Pubkey::new_unique(),
            program_id: Pubkey::new_unique(),
            authority: Pubkey::new_unique(),
            mint_authority: guard.address,
            collection_mint: Pubkey::new_unique(),
            items_redeemed: 0,
            items_available: 1,
            token_standard: TokenStandard::NonFungible,
        };
        let payer = Pubkey::new_unique();
        let proof = vec![[7u8; 32]];

        let ix =
            allowlist_route_instruction(&machine, &guard, payer, &[1u8; 32], &proof, Some("WL"))
                .unwrap();

        let body = &ix.data[8..];
        assert_eq!(body[0], 8, "allow list guard index");
        // data: u32 byte length (4 + 32), then the proof vec (u32 count + nodes)
        assert_eq!(&body[1..5], &36u32.to_le_bytes());
        assert_eq!(&body[5..9], &1u32.to_le_bytes());
        assert!(ix
            .accounts
            .iter()
            .any(|a| a.pubkey.to_string() == "11111111111111111111111111111111" && !a.is_writable));
        assert_eq!(&body[9..41], &[7u8; 32]);
        assert_eq!(&body[41..], &[1, 2, 0, 0, 0, b'W', b'L']);

        assert_eq!(ix.accounts[2].pubkey, payer);
        assert!(ix.accounts[2].is_signer);
        assert_eq!(ix.accounts.len(), 5);
    }
}
