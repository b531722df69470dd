//! Token metadata account decoding
//!
//! Only the leading part of the metadata layout is decoded: key, authorities,
//! the data block, sale flags, edition nonce, token standard and collection.
//! Fields after the collection are ignored. Old accounts that end before the
//! optional tail decode with those fields unset.

use super::StateError;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::Serialize;
use solana_sdk::{account::Account, pubkey::Pubkey};

#[derive(BorshSerialize, BorshDeserialize)]
struct RawCreator {
    address: [u8; 32],
    verified: bool,
    share: u8,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct RawData {
    name: String,
    symbol: String,
    uri: String,
    seller_fee_basis_points: u16,
    creators: Option<Vec<RawCreator>>,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct RawHead {
    _key: u8,
    update_authority: [u8; 32],
    mint: [u8; 32],
    data: RawData,
    primary_sale_happened: bool,
    is_mutable: bool,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct RawCollection {
    verified: bool,
    key: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Creator {
    pub address: Pubkey,
    pub verified: bool,
    pub share: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Collection {
    pub verified: bool,
    pub key: Pubkey,
}

/// Decoded on-chain metadata for one mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataAccount {
    pub update_authority: Pubkey,
    pub mint: Pubkey,
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub seller_fee_basis_points: u16,
    pub creators: Vec<Creator>,
    pub primary_sale_happened: bool,
    pub is_mutable: bool,
    pub edition_nonce: Option<u8>,
    pub token_standard: Option<u8>,
    pub collection: Option<Collection>,
}

impl MetadataAccount {
    pub fn decode(account: &Account) -> Result<Self, StateError> {
        Self::decode_bytes(&account.data)
    }

    pub fn decode_bytes(data: &[u8]) -> Result<Self, StateError> {
        let mut buf = data;
        let head = RawHead::deserialize(&mut buf).map_err(decode_error)?;
        let edition_nonce = read_tail::<Option<u8>>(&mut buf)?.flatten();
        let token_standard = read_tail::<Option<u8>>(&mut buf)?.flatten();
        let collection = read_tail::<Option<RawCollection>>(&mut buf)?
            .flatten()
            .map(|c| Collection {
                verified: c.verified,
                key: Pubkey::new_from_array(c.key),
            });

        Ok(Self {
            update_authority: Pubkey::new_from_array(head.update_authority),
            mint: Pubkey::new_from_array(head.mint),
            name: trim_padding(head.data.name),
            symbol: trim_padding(head.data.symbol),
            uri: trim_padding(head.data.uri),
            seller_fee_basis_points: head.data.seller_fee_basis_points,
            creators: head
                .data
                .creators
                .unwrap_or_default()
                .into_iter()
                .map(|c| Creator {
                    address: Pubkey::new_from_array(c.address),
                    verified: c.verified,
                    share: c.share,
                })
                .collect(),
            primary_sale_happened: head.primary_sale_happened,
            is_mutable: head.is_mutable,
            edition_nonce,
            token_standard,
            collection,
        })
    }

    /// True when the metadata belongs to `collection` and the collection is verified
    pub fn in_verified_collection(&self, collection: &Pubkey) -> bool {
        self.collection
            .map(|c| c.verified && c.key == *collection)
            .unwrap_or(false)
    }
}

fn read_tail<T: BorshDeserialize>(buf: &mut &[u8]) -> Result<Option<T>, StateError> {
    if buf.is_empty() {
        return Ok(None);
    }
    T::deserialize(buf).map(Some).map_err(decode_error)
}

fn decode_error(err: std::io::Error) -> StateError {
    StateError::from_borsh("metadata", err)
}

fn trim_padding(value: String) -> String {
    value.trim_end_matches('\0').to_string()
}

#[cfg(any(test, feature = "test_utils"))]
impl MetadataAccount {
    /// Serialize into account bytes with fixed-width padded strings (fixtures only)
    pub fn encode(&self) -> Vec<u8> {
        fn padded(value: &str, width: usize) -> String {
            let mut value = value.to_string();
            while value.len() < width {
                value.push('\0');
            }
            value
        }

        let head = RawHead {
            _key: 4,
            update_authority: self.update_authority.to_bytes(),
            mint: self.mint.to_bytes(),
            data: RawData {
                name: padded(&self.name, 32),
                symbol: padded(&self.symbol, 10),
                uri: padded(&self.uri, 200),
                seller_fee_basis_points: self.seller_fee_basis_points,
                creators: (!self.creators.is_empty()).then(|| {
                    self.creators
                        .iter()
                        .map(|c| RawCreator {
                            address: c.address.to_bytes(),
                            verified: c.verified,
                            share: c.share,
                        })
                        .collect()
                }),
            },
            primary_sale_happened: self.primary_sale_happened,
            is_mutable: self.is_mutable,
        };
        let collection = self.collection.map(|c| RawCollection {
            verified: c.verified,
            key: c.key.to_bytes(),
        });

        let mut out = Vec::new();
        (head, self.edition_nonce, self.token_standard, collection)
            .serialize(&mut out)
            .expect("serialize into a Vec");
        // uses, collection details, programmable config
        out.extend_from_slice(&[0u8; 3]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MetadataAccount {
        MetadataAccount {
            update_authority: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            name: "Drop #12".to_string(),
            symbol: "DROP".to_string(),
            uri: "https://arweave.net/abc".to_string(),
            seller_fee_basis_points: 500,
            creators: vec![Creator {
                address: Pubkey::new_unique(),
                verified: true,
                share: 100,
            }],
            primary_sale_happened: false,
            is_mutable: true,
            edition_nonce: Some(255),
            token_standard: Some(4),
            collection: Some(Collection {
                verified: true,
                key: Pubkey::new_unique(),
            }),
        }
    }

    #[test]
    fn test_decode_trims_padding() {
        let meta = sample();
        let decoded = MetadataAccount::decode_bytes(&meta.encode()).unwrap();
        assert_eq!(decoded.name, "Drop #12");
        assert_eq!(decoded.uri, "https://arweave.net/abc");
        assert_eq!(decoded, meta);
    }

    #[test]
    fn test_truncated_tail_decodes_without_optionals() {
        let meta = MetadataAccount {
            edition_nonce: None,
            token_standard: None,
            collection: None,
            ..sample()
        };
        let mut data = meta.encode();
        // drop everything after is_mutable
        data.truncate(data.len() - 6);
        let decoded = MetadataAccount::decode_bytes(&data).unwrap();
        assert_eq!(decoded.collection, None);
        assert_eq!(decoded.token_standard, None);
    }

    #[test]
    fn test_verified_collection_check() {
        let meta = sample();
        let key = meta.collection.unwrap().key;
        assert!(meta.in_verified_collection(&key));
        assert!(!meta.in_verified_collection(&Pubkey::new_unique()));

        let unverified = MetadataAccount {
            collection: Some(Collection {
                verified: false,
                key,
            }),
            ..sample()
        };
        assert!(!unverified.in_verified_collection(&key));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        assert!(matches!(
            MetadataAccount::decode_bytes(&[4u8; 10]),
            Err(StateError::Decode { .. })
        ));
    }
}
