//! Candy machine account (mpl-candy-machine-core v3 layout)

use super::{decode_anchor_account, StateError};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use solana_sdk::{account::Account, pubkey::Pubkey};

/// Token standard the candy machine mints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStandard {
    NonFungible,
    ProgrammableNonFungible,
    Other(u8),
}

impl From<u8> for TokenStandard {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::NonFungible,
            4 => Self::ProgrammableNonFungible,
            other => Self::Other(other),
        }
    }
}

impl TokenStandard {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::NonFungible => 0,
            Self::ProgrammableNonFungible => 4,
            Self::Other(v) => v,
        }
    }

    pub fn is_programmable(self) -> bool {
        matches!(self, Self::ProgrammableNonFungible)
    }
}

/// Decoded candy machine state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandyMachineState {
    /// Address of the candy machine account
    pub address: Pubkey,
    /// Candy machine program (owner of the account)
    pub program_id: Pubkey,
    pub authority: Pubkey,
    /// The candy guard wrapping this machine
    pub mint_authority: Pubkey,
    pub collection_mint: Pubkey,
    pub items_redeemed: u64,
    pub items_available: u64,
    pub token_standard: TokenStandard,
}

/// Leading part of the account body: header, authorities, redeemed count and
/// the first field of the config data
#[derive(BorshSerialize, BorshDeserialize)]
struct RawCandyMachine {
    _version: u8,
    token_standard: u8,
    _features: [u8; 6],
    authority: Pubkey,
    mint_authority: Pubkey,
    collection_mint: Pubkey,
    items_redeemed: u64,
    items_available: u64,
}

impl CandyMachineState {
    pub fn decode(address: Pubkey, account: &Account) -> Result<Self, StateError> {
        let raw: RawCandyMachine =
            decode_anchor_account("candy machine", "CandyMachine", &account.data)?;

        Ok(Self {
            address,
            program_id: account.owner,
            authority: raw.authority,
            mint_authority: raw.mint_authority,
            collection_mint: raw.collection_mint,
            items_redeemed: raw.items_redeemed,
            items_available: raw.items_available,
            token_standard: TokenStandard::from(raw.token_standard),
        })
    }

    /// Remaining supply; never underflows on inconsistent state
    pub fn items_remaining(&self) -> u64 {
        self.items_available.saturating_sub(self.items_redeemed)
    }

    pub fn is_sold_out(&self) -> bool {
        self.items_remaining() == 0
    }
}

#[cfg(any(test, feature = "test_utils"))]
impl CandyMachineState {
    /// Serialize the decoded prefix back into account bytes (fixtures only)
    pub fn encode(&self) -> Vec<u8> {
        let raw = RawCandyMachine {
            _version: 1,
            token_standard: self.token_standard.as_u8(),
            _features: [0u8; 6],
            authority: self.authority,
            mint_authority: self.mint_authority,
            collection_mint: self.collection_mint,
            items_redeemed: self.items_redeemed,
            items_available: self.items_available,
        };
        let mut data = super::encode_anchor_account("CandyMachine", &raw);
        // rest of the config data
        data.extend_from_slice(&[0u8; 64]);
        data
    }
}
