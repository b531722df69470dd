//! Candy guard account (mpl-candy-guard v2 layout)
//!
//! After the Anchor header (`base`, `bump`, `authority`) the account stores the
//! default guard set followed by the group list. Each guard set starts with a
//! `u64` feature mask; guards whose bit is set follow in bit order. Groups are
//! stored as a `u32` count, then per group a 6-byte zero-padded label and a
//! guard set.

use super::{decode_anchor_account, StateError};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::{account::Account, pubkey::Pubkey};
use std::fmt;
use std::io::{self, Read, Write};

/// Reserved label of the guard set used when a machine has no groups
pub const DEFAULT_GROUP: &str = "default";

/// Maximum byte length of a group label
pub const MAX_LABEL_LEN: usize = 6;

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct BotTax {
    pub lamports: u64,
    pub last_instruction: bool,
}

/// Lamport payment; also the layout of the freeze variant
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct SolPayment {
    pub lamports: u64,
    pub destination: Pubkey,
}

/// SPL token payment; shared by the token-2022 and freeze variants
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenPayment {
    pub amount: u64,
    pub mint: Pubkey,
    pub destination_ata: Pubkey,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartDate {
    pub date: i64,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndDate {
    pub date: i64,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct ThirdPartySigner {
    pub signer_key: Pubkey,
}

/// Token holding requirement; also the layout of token burn
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenGate {
    pub amount: u64,
    pub mint: Pubkey,
}

pub type TokenBurn = TokenGate;

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct Gatekeeper {
    pub gatekeeper_network: Pubkey,
    pub expire_on_use: bool,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    pub merkle_root: [u8; 32],
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintLimit {
    pub id: u8,
    pub limit: u16,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct NftPayment {
    pub required_collection: Pubkey,
    pub destination: Pubkey,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedeemedAmount {
    pub maximum: u64,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct AddressGate {
    pub address: Pubkey,
}

/// Collection holding requirement; also the layout of nft burn
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct NftGate {
    pub required_collection: Pubkey,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProgramGate {
    pub additional: Vec<Pubkey>,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub id: u8,
    pub limit: u32,
}

/// Per-wallet counter account of the mint limit guard
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MintCounter {
    pub count: u16,
}

/// Per-guard counter account of the allocation guard
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationTracker {
    pub count: u32,
}

impl MintCounter {
    pub fn decode(data: &[u8]) -> Result<Self, StateError> {
        decode_anchor_account("mint counter", "MintCounter", data)
    }
}

impl AllocationTracker {
    pub fn decode(data: &[u8]) -> Result<Self, StateError> {
        decode_anchor_account("allocation tracker", "AllocationTracker", data)
    }
}

macro_rules! guard_set {
    ($( $bit:literal => $field:ident : $ty:ty as $kind:ident ),* $(,)?) => {
        /// Guard kinds, discriminant equal to the feature bit
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum GuardKind {
            $( $kind = $bit, )*
        }

        impl GuardKind {
            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$kind => stringify!($field), )*
                }
            }
        }

        /// The set of guards enabled for a group (or the default set)
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct GuardSet {
            $( pub $field: Option<$ty>, )*
        }

        impl GuardSet {
            const KNOWN_MASK: u64 = 0 $( | (1u64 << $bit) )*;

            /// Overlay this group's guards on the default set; a guard present
            /// in the group replaces the default guard of the same kind
            pub fn merged_over(&self, default: &GuardSet) -> GuardSet {
                GuardSet {
                    $( $field: self.$field.clone().or_else(|| default.$field.clone()), )*
                }
            }

            /// Enabled guard kinds in evaluation order
            pub fn kinds(&self) -> Vec<GuardKind> {
                let mut kinds = Vec::new();
                $( if self.$field.is_some() { kinds.push(GuardKind::$kind); } )*
                kinds
            }
        }

        /// A `u64` feature mask, then each enabled guard in bit order
        impl BorshDeserialize for GuardSet {
            fn deserialize_reader<R: Read>(reader: &mut R) -> io::Result<Self> {
                let features = u64::deserialize_reader(reader)?;
                let unknown = features & !Self::KNOWN_MASK;
                if unknown != 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        StateError::UnknownGuard {
                            bit: unknown.trailing_zeros(),
                        },
                    ));
                }

                let mut set = Self::default();
                $(
                    if features & (1u64 << $bit) != 0 {
                        set.$field = Some(<$ty>::deserialize_reader(reader)?);
                    }
                )*
                Ok(set)
            }
        }

        impl BorshSerialize for GuardSet {
            fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
                let mut features = 0u64;
                $( if self.$field.is_some() { features |= 1u64 << $bit; } )*
                features.serialize(writer)?;
                $(
                    if let Some(guard) = &self.$field {
                        guard.serialize(writer)?;
                    }
                )*
                Ok(())
            }
        }
    };
}

guard_set! {
    0 => bot_tax: BotTax as BotTax,
    1 => sol_payment: SolPayment as SolPayment,
    2 => token_payment: TokenPayment as TokenPayment,
    3 => start_date: StartDate as StartDate,
    4 => third_party_signer: ThirdPartySigner as ThirdPartySigner,
    5 => token_gate: TokenGate as TokenGate,
    6 => gatekeeper: Gatekeeper as Gatekeeper,
    7 => end_date: EndDate as EndDate,
    8 => allow_list: AllowList as AllowList,
    9 => mint_limit: MintLimit as MintLimit,
    10 => nft_payment: NftPayment as NftPayment,
    11 => redeemed_amount: RedeemedAmount as RedeemedAmount,
    12 => address_gate: AddressGate as AddressGate,
    13 => nft_gate: NftGate as NftGate,
    14 => nft_burn: NftGate as NftBurn,
    15 => token_burn: TokenBurn as TokenBurn,
    16 => freeze_sol_payment: SolPayment as FreezeSolPayment,
    17 => freeze_token_payment: TokenPayment as FreezeTokenPayment,
    18 => program_gate: ProgramGate as ProgramGate,
    19 => allocation: Allocation as Allocation,
    20 => token2022_payment: TokenPayment as Token2022Payment,
}

impl GuardKind {
    /// Guards whose client-side accounts this crate does not build
    pub fn is_client_supported(self) -> bool {
        !matches!(
            self,
            Self::ThirdPartySigner
                | Self::Gatekeeper
                | Self::NftBurn
                | Self::FreezeSolPayment
                | Self::FreezeTokenPayment
        )
    }
}

impl fmt::Display for GuardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl GuardSet {
    /// First enabled guard this client cannot mint with, if any
    pub fn unsupported_guard(&self) -> Option<GuardKind> {
        self.kinds().into_iter().find(|k| !k.is_client_supported())
    }
}

/// A labelled guard set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardGroup {
    pub label: String,
    pub guards: GuardSet,
}

/// Decoded candy guard account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandyGuardState {
    pub address: Pubkey,
    /// Candy guard program (owner of the account)
    pub program_id: Pubkey,
    pub base: Pubkey,
    pub bump: u8,
    pub authority: Pubkey,
    pub default_guards: GuardSet,
    pub groups: Vec<GuardGroup>,
}

/// Guard account body after the discriminator
#[derive(BorshSerialize, BorshDeserialize)]
struct RawCandyGuard {
    base: Pubkey,
    bump: u8,
    authority: Pubkey,
    default_guards: GuardSet,
    groups: Vec<RawGroup>,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct RawGroup {
    label: [u8; MAX_LABEL_LEN],
    guards: GuardSet,
}

impl CandyGuardState {
    pub fn decode(address: Pubkey, account: &Account) -> Result<Self, StateError> {
        let raw: RawCandyGuard = decode_anchor_account("candy guard", "CandyGuard", &account.data)?;
        let groups = raw
            .groups
            .into_iter()
            .map(|group| {
                Ok(GuardGroup {
                    label: decode_label(&group.label)?,
                    guards: group.guards,
                })
            })
            .collect::<Result<Vec<_>, StateError>>()?;

        Ok(Self {
            address,
            program_id: account.owner,
            base: raw.base,
            bump: raw.bump,
            authority: raw.authority,
            default_guards: raw.default_guards,
            groups,
        })
    }

    pub fn group(&self, label: &str) -> Option<&GuardGroup> {
        self.groups.iter().find(|g| g.label == label)
    }

    /// Effective guards for `label`: the group merged over the default set,
    /// or the default set itself for the reserved `default` label.
    /// Unknown labels resolve to `None`.
    pub fn resolve(&self, label: &str) -> Option<GuardSet> {
        if label == DEFAULT_GROUP {
            return Some(self.default_guards.clone());
        }
        self.group(label)
            .map(|group| group.guards.merged_over(&self.default_guards))
    }

    /// Groups a wallet can be evaluated against, in account order. A machine
    /// without groups exposes only the `default` set.
    pub fn evaluable_groups(&self) -> Vec<GuardGroup> {
        if self.groups.is_empty() {
            return vec![GuardGroup {
                label: DEFAULT_GROUP.to_string(),
                guards: self.default_guards.clone(),
            }];
        }
        self.groups
            .iter()
            .map(|group| GuardGroup {
                label: group.label.clone(),
                guards: group.guards.merged_over(&self.default_guards),
            })
            .collect()
    }
}

#[cfg(any(test, feature = "test_utils"))]
impl CandyGuardState {
    /// Serialize into account bytes (fixtures only)
    pub fn encode(&self) -> Vec<u8> {
        let raw = RawCandyGuard {
            base: self.base,
            bump: self.bump,
            authority: self.authority,
            default_guards: self.default_guards.clone(),
            groups: self
                .groups
                .iter()
                .map(|group| {
                    let mut label = [0u8; MAX_LABEL_LEN];
                    let bytes = group.label.as_bytes();
                    let len = bytes.len().min(MAX_LABEL_LEN);
                    label[..len].copy_from_slice(&bytes[..len]);
                    RawGroup {
                        label,
                        guards: group.guards.clone(),
                    }
                })
                .collect(),
        };
        super::encode_anchor_account("CandyGuard", &raw)
    }
}

fn decode_label(raw: &[u8; MAX_LABEL_LEN]) -> Result<String, StateError> {
    let end = raw.iter().position(|b| *b == 0).unwrap_or(MAX_LABEL_LEN);
    std::str::from_utf8(&raw[..end])
        .map(str::to_string)
        .map_err(|e| StateError::InvalidLabel(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(state: &CandyGuardState) -> Account {
        Account {
            lamports: 1,
            data: state.encode(),
            owner: state.program_id,
            executable: false,
            rent_epoch: 0,
        }
    }

    fn sample() -> CandyGuardState {
        let default_guards = GuardSet {
            sol_payment: Some(SolPayment {
                lamports: 10_000_000,
                destination: Pubkey::new_unique(),
            }),
            bot_tax: Some(BotTax {
                lamports: 1_000,
                last_instruction: true,
            }),
            ..GuardSet::default()
        };
        let wl = GuardSet {
            sol_payment: Some(SolPayment {
                lamports: 50_000_000,
                destination: Pubkey::new_unique(),
            }),
            allow_list: Some(AllowList {
                merkle_root: [7u8; 32],
            }),
            mint_limit: Some(MintLimit { id: 1, limit: 1 }),
            start_date: Some(StartDate { date: 1_700_000_000 }),
            ..GuardSet::default()
        };
        let public = GuardSet {
            end_date: Some(EndDate { date: 1_800_000_000 }),
            program_gate: Some(ProgramGate {
                additional: vec![Pubkey::new_unique()],
            }),
            allocation: Some(Allocation { id: 2, limit: 5000 }),
            ..GuardSet::default()
        };
        CandyGuardState {
            address: Pubkey::new_unique(),
            program_id: Pubkey::new_unique(),
            base: Pubkey::new_unique(),
            bump: 254,
            authority: Pubkey::new_unique(),
            default_guards,
            groups: vec![
                GuardGroup {
                    label: "WL".to_string(),
                    guards: wl,
                },
                GuardGroup {
                    label: "Public".to_string(),
                    guards: public,
                },
            ],
        }
    }

    #[test]
    fn test_decode_groups_and_guards() {
        let state = sample();
        let decoded = CandyGuardState::decode(state.address, &account(&state)).unwrap();
        assert_eq!(decoded, state);
        assert_eq!(decoded.groups[0].label, "WL");
        assert_eq!(decoded.groups[1].label, "Public");
    }

    #[test]
    fn test_unknown_feature_bit_rejected() {
        let state = CandyGuardState {
            groups: vec![],
            default_guards: GuardSet::default(),
            ..sample()
        };
        let mut data = state.encode();
        // default feature mask sits right after the 73-byte header
        data[73..81].copy_from_slice(&(1u64 << 40).to_le_bytes());
        let account = Account {
            lamports: 1,
            data,
            owner: state.program_id,
            executable: false,
            rent_epoch: 0,
        };
        assert_eq!(
            CandyGuardState::decode(state.address, &account),
            Err(StateError::UnknownGuard { bit: 40 })
        );
    }

    #[test]
    fn test_truncated_guard_set_is_decode_error() {
        let state = sample();
        let mut data = state.encode();
        data.truncate(data.len() - 3);
        let account = Account {
            lamports: 1,
            data,
            owner: state.program_id,
            executable: false,
            rent_epoch: 0,
        };
        assert!(matches!(
            CandyGuardState::decode(state.address, &account),
            Err(StateError::Decode { .. })
        ));
    }

    #[test]
    fn test_counters_decode_after_discriminator() {
        let data = super::super::encode_anchor_account("MintCounter", &MintCounter { count: 2 });
        assert_eq!(MintCounter::decode(&data), Ok(MintCounter { count: 2 }));
        assert!(AllocationTracker::decode(&data).is_err());

        let data = super::super::encode_anchor_account(
            "AllocationTracker",
            &AllocationTracker { count: 4_000 },
        );
        assert_eq!(AllocationTracker::decode(&data).map(|t| t.count), Ok(4_000));
    }

    #[test]
    fn test_resolve_merges_group_over_default() {
        let state = sample();
        let wl = state.resolve("WL").unwrap();
        // group payment overrides the default payment
        assert_eq!(wl.sol_payment.as_ref().unwrap().lamports, 50_000_000);
        // default bot tax is inherited
        assert!(wl.bot_tax.is_some());

        let public = state.resolve("Public").unwrap();
        assert_eq!(public.sol_payment.as_ref().unwrap().lamports, 10_000_000);

        assert!(state.resolve("nope").is_none());
        assert_eq!(state.resolve(DEFAULT_GROUP).unwrap(), state.default_guards);
    }

    #[test]
    fn test_evaluable_groups_falls_back_to_default() {
        let mut state = sample();
        assert_eq!(state.evaluable_groups().len(), 2);
        state.groups.clear();
        let groups = state.evaluable_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].label, DEFAULT_GROUP);
    }

    #[test]
    fn test_kinds_follow_bit_order() {
        let state = sample();
        let kinds = state.resolve("WL").unwrap().kinds();
        assert_eq!(
            kinds,
            vec![
                GuardKind::BotTax,
                GuardKind::SolPayment,
                GuardKind::StartDate,
                GuardKind::AllowList,
                GuardKind::MintLimit
            ]
        );
        assert!(state.resolve("WL").unwrap().unsupported_guard().is_none());
    }

    #[test]
    fn test_unsupported_guard_detected() {
        let set = GuardSet {
            gatekeeper: Some(Gatekeeper {
                gatekeeper_network: Pubkey::new_unique(),
                expire_on_use: false,
            }),
            ..GuardSet::default()
        };
        assert_eq!(set.unsupported_guard(), Some(GuardKind::Gatekeeper));
        assert_eq!(GuardKind::Gatekeeper.to_string(), "gatekeeper");
    }
}
