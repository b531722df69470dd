//! One unsigned mint transaction and the signer of the asset it creates
//!
//! A draft owns the asset keypair for its whole lifetime. The keypair is
//! generated by the batch builder, used once to co-sign, then dropped with
//! the draft; it is never persisted.

use crate::compat::{self, SignError};
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::VersionedTransaction,
};

pub struct TransactionDraft {
    /// Freshly generated asset identity (the new mint account)
    pub asset: Keypair,

    /// Unsigned transaction; signature slots are empty until signing
    pub transaction: VersionedTransaction,

    /// Blockhash shared by every draft of the batch
    pub blockhash: Hash,

    /// Last block height at which `blockhash` is accepted
    pub last_valid_block_height: u64,

    /// Signers required by the message, in signature-slot order
    pub required_signers: Vec<Pubkey>,
}

impl TransactionDraft {
    pub fn new(
        asset: Keypair,
        transaction: VersionedTransaction,
        blockhash: Hash,
        last_valid_block_height: u64,
    ) -> Self {
        let required_signers = compat::get_required_signers(&transaction.message).to_vec();
        Self {
            asset,
            transaction,
            blockhash,
            last_valid_block_height,
            required_signers,
        }
    }

    pub fn asset_mint(&self) -> Pubkey {
        self.asset.pubkey()
    }

    /// Fill the asset's signature slot
    pub fn sign_with_asset(&mut self) -> Result<(), SignError> {
        compat::partial_sign(&mut self.transaction, &self.asset)
    }

    /// Consume the draft, keeping only the transaction
    pub fn into_transaction(self) -> VersionedTransaction {
        self.transaction
    }
}

impl std::fmt::Debug for TransactionDraft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionDraft")
            .field("asset", &self.asset.pubkey())
            .field("blockhash", &self.blockhash)
            .field("last_valid_block_height", &self.last_valid_block_height)
            .field("required_signers", &self.required_signers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{
        instruction::{AccountMeta, Instruction},
        message::{v0, VersionedMessage},
    };

    #[test]
    fn test_asset_signs_its_own_slot() {
        let payer = Pubkey::new_unique();
        let asset = Keypair::new();
        let ix = Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[0],
            vec![
                AccountMeta::new(payer, true),
                AccountMeta::new(asset.pubkey(), true),
            ],
        );
        let blockhash = Hash::new_unique();
        let message = v0::Message::try_compile(&payer, &[ix], &[], blockhash).unwrap();
        let tx = compat::unsigned_transaction(VersionedMessage::V0(message));

        let mut draft = TransactionDraft::new(asset, tx, blockhash, 150);
        assert_eq!(draft.required_signers, vec![payer, draft.asset_mint()]);

        draft.sign_with_asset().unwrap();
        assert!(!compat::is_fully_signed(&draft.transaction));
        assert_ne!(draft.transaction.signatures[1], Default::default());
        assert_eq!(draft.transaction.signatures[0], Default::default());
    }
}
