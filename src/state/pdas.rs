//! Program-derived addresses used by the mint and route instructions

use solana_sdk::{pubkey, pubkey::Pubkey};

pub const TOKEN_METADATA_PROGRAM_ID: Pubkey = pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");
pub const AUTH_RULES_PROGRAM_ID: Pubkey = pubkey!("auth9SigNpDKz4sJJ1DfCTuZrZNSAgh9sFD3rboVmgg");
pub const TOKEN_2022_PROGRAM_ID: Pubkey = pubkey!("TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb");

pub fn metadata(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"metadata",
            TOKEN_METADATA_PROGRAM_ID.as_ref(),
            mint.as_ref(),
        ],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .0
}

pub fn master_edition(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"metadata",
            TOKEN_METADATA_PROGRAM_ID.as_ref(),
            mint.as_ref(),
            b"edition",
        ],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .0
}

/// Token record of a programmable NFT held in `token_account`
pub fn token_record(mint: &Pubkey, token_account: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"metadata",
            TOKEN_METADATA_PROGRAM_ID.as_ref(),
            mint.as_ref(),
            b"token_record",
            token_account.as_ref(),
        ],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .0
}

/// Metadata delegate record granting `delegate` collection authority
pub fn collection_delegate_record(
    collection_mint: &Pubkey,
    update_authority: &Pubkey,
    delegate: &Pubkey,
) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"metadata",
            TOKEN_METADATA_PROGRAM_ID.as_ref(),
            collection_mint.as_ref(),
            b"collection_delegate",
            update_authority.as_ref(),
            delegate.as_ref(),
        ],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .0
}

/// Authority PDA owned by the candy machine program
pub fn candy_machine_authority(candy_machine_program: &Pubkey, candy_machine: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[b"candy_machine", candy_machine.as_ref()],
        candy_machine_program,
    )
    .0
}

pub fn mint_counter(
    candy_guard_program: &Pubkey,
    id: u8,
    wallet: &Pubkey,
    candy_guard: &Pubkey,
    candy_machine: &Pubkey,
) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"mint_limit",
            &[id],
            wallet.as_ref(),
            candy_guard.as_ref(),
            candy_machine.as_ref(),
        ],
        candy_guard_program,
    )
    .0
}

/// Proof account created by the allowlist route for `wallet`
pub fn allow_list_proof(
    candy_guard_program: &Pubkey,
    merkle_root: &[u8; 32],
    wallet: &Pubkey,
    candy_guard: &Pubkey,
    candy_machine: &Pubkey,
) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"allow_list",
            merkle_root.as_ref(),
            wallet.as_ref(),
            candy_guard.as_ref(),
            candy_machine.as_ref(),
        ],
        candy_guard_program,
    )
    .0
}

pub fn allocation_tracker(
    candy_guard_program: &Pubkey,
    id: u8,
    candy_guard: &Pubkey,
    candy_machine: &Pubkey,
) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"allocation",
            &[id],
            candy_guard.as_ref(),
            candy_machine.as_ref(),
        ],
        candy_guard_program,
    )
    .0
}

/// Associated token account under the classic token program
pub fn associated_token(wallet: &Pubkey, mint: &Pubkey) -> Pubkey {
    spl_associated_token_account::get_associated_token_address(wallet, mint)
}

/// Associated token account under an explicit token program
pub fn associated_token_with_program(
    wallet: &Pubkey,
    mint: &Pubkey,
    token_program: &Pubkey,
) -> Pubkey {
    spl_associated_token_account::get_associated_token_address_with_program_id(
        wallet,
        mint,
        token_program,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_and_edition_differ() {
        let mint = Pubkey::new_unique();
        assert_ne!(metadata(&mint), master_edition(&mint));
        assert_eq!(metadata(&mint), metadata(&mint));
    }

    #[test]
    fn test_mint_counter_depends_on_id_and_wallet() {
        let program = Pubkey::new_unique();
        let guard = Pubkey::new_unique();
        let cm = Pubkey::new_unique();
        let wallet = Pubkey::new_unique();
        let a = mint_counter(&program, 1, &wallet, &guard, &cm);
        let b = mint_counter(&program, 2, &wallet, &guard, &cm);
        let c = mint_counter(&program, 1, &Pubkey::new_unique(), &guard, &cm);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_ata_matches_token_program_variant() {
        let wallet = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        assert_eq!(
            associated_token(&wallet, &mint),
            associated_token_with_program(&wallet, &mint, &spl_token::id())
        );
        assert_ne!(
            associated_token(&wallet, &mint),
            associated_token_with_program(&wallet, &mint, &TOKEN_2022_PROGRAM_ID)
        );
    }
}
