//! On-chain account state for candy machines, candy guards and token metadata
//!
//! Accounts are fetched raw through the ledger RPC and borsh-decoded here.
//! Only the parts of each layout the mint flow consumes are decoded; the rest
//! of the account is ignored.

pub mod candy_guard;
pub mod candy_machine;
pub mod metadata;
pub mod pdas;

pub use candy_guard::{
    AddressGate, AllocationTracker, AllowList, Allocation, BotTax, CandyGuardState, EndDate,
    Gatekeeper, GuardGroup, GuardKind, GuardSet, MintCounter, MintLimit, NftGate, NftPayment,
    ProgramGate, RedeemedAmount, SolPayment, StartDate, ThirdPartySigner, TokenBurn, TokenGate,
    TokenPayment, DEFAULT_GROUP,
};
pub use candy_machine::{CandyMachineState, TokenStandard};
pub use metadata::{Collection, MetadataAccount};

use borsh::BorshDeserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors raised while decoding on-chain account data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Account data is shorter than its discriminator
    #[error("{account} account too short: needed {needed} bytes, have {len}")]
    AccountTooShort {
        account: &'static str,
        needed: usize,
        len: usize,
    },

    /// The 8-byte Anchor discriminator did not match the expected account type
    #[error("{account} account has an unexpected discriminator")]
    DiscriminatorMismatch { account: &'static str },

    /// Guard feature bit that this client does not know how to decode
    #[error("unknown guard feature bit {bit}")]
    UnknownGuard { bit: u32 },

    /// Group label is not valid UTF-8
    #[error("invalid group label: {0}")]
    InvalidLabel(String),

    /// Borsh payload could not be decoded
    #[error("{account} decode failed: {reason}")]
    Decode {
        account: &'static str,
        reason: String,
    },
}

impl StateError {
    /// Map a borsh failure to a state error. Errors raised by our own
    /// `deserialize_reader` impls travel inside the io error and are unwrapped.
    pub(crate) fn from_borsh(account: &'static str, err: std::io::Error) -> Self {
        match err.get_ref().and_then(|inner| inner.downcast_ref::<StateError>()) {
            Some(inner) => inner.clone(),
            None => StateError::Decode {
                account,
                reason: err.to_string(),
            },
        }
    }
}

/// Check the 8-byte Anchor discriminator of `name` and borsh-decode the body
/// after it. Trailing bytes past the decoded prefix are ignored.
pub(crate) fn decode_anchor_account<T: BorshDeserialize>(
    account: &'static str,
    name: &str,
    data: &[u8],
) -> Result<T, StateError> {
    if data.len() < 8 {
        return Err(StateError::AccountTooShort {
            account,
            needed: 8,
            len: data.len(),
        });
    }
    let (prefix, mut body) = data.split_at(8);
    if prefix != account_discriminator(name) {
        return Err(StateError::DiscriminatorMismatch { account });
    }
    T::deserialize(&mut body).map_err(|e| StateError::from_borsh(account, e))
}

/// Discriminator followed by the borsh body (fixtures only)
#[cfg(any(test, feature = "test_utils"))]
pub(crate) fn encode_anchor_account<T: borsh::BorshSerialize>(name: &str, body: &T) -> Vec<u8> {
    let mut data = account_discriminator(name).to_vec();
    body.serialize(&mut data).expect("serialize into a Vec");
    data
}

/// Anchor account discriminator: `sha256("account:<Name>")[..8]`
pub fn account_discriminator(name: &str) -> [u8; 8] {
    anchor_hash("account", name)
}

/// Anchor instruction discriminator: `sha256("global:<name>")[..8]`
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    anchor_hash("global", name)
}

fn anchor_hash(namespace: &str, name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("{namespace}:{name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminators_are_namespaced() {
        assert_ne!(
            account_discriminator("CandyGuard"),
            instruction_discriminator("CandyGuard")
        );
        assert_eq!(
            instruction_discriminator("mint_v2"),
            instruction_discriminator("mint_v2")
        );
    }

    #[derive(borsh::BorshSerialize, BorshDeserialize, Debug, PartialEq)]
    struct Counter {
        count: u16,
    }

    #[test]
    fn test_decode_anchor_account_checks_prefix() {
        let data = encode_anchor_account("MintCounter", &Counter { count: 3 });
        assert_eq!(
            decode_anchor_account::<Counter>("mint counter", "MintCounter", &data),
            Ok(Counter { count: 3 })
        );
        assert_eq!(
            decode_anchor_account::<Counter>("mint counter", "AllocationTracker", &data),
            Err(StateError::DiscriminatorMismatch {
                account: "mint counter"
            })
        );
        assert!(matches!(
            decode_anchor_account::<Counter>("mint counter", "MintCounter", &data[..9]),
            Err(StateError::Decode { .. })
        ));
        assert_eq!(
            decode_anchor_account::<Counter>("mint counter", "MintCounter", &data[..4]),
            Err(StateError::AccountTooShort {
                account: "mint counter",
                needed: 8,
                len: 4
            })
        );
    }
}
