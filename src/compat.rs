//! Helpers over `VersionedMessage` / `VersionedTransaction`
//!
//! Mint drafts are compiled to v0 messages while the route approval may be a
//! legacy message; both need the same header/key access and the same
//! partial-signing flow (asset key first, wallet later).

use solana_sdk::{
    message::{MessageHeader, VersionedMessage},
    pubkey::Pubkey,
    signature::{Signature, Signer},
    transaction::VersionedTransaction,
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignError {
    /// The key is not one of the message's required signers
    #[error("{0} is not a required signer of this message")]
    NotASigner(Pubkey),
}

#[inline]
#[must_use]
pub fn get_message_header(message: &VersionedMessage) -> &MessageHeader {
    match message {
        VersionedMessage::Legacy(legacy_msg) => &legacy_msg.header,
        VersionedMessage::V0(v0_msg) => &v0_msg.header,
    }
}

/// Account keys embedded in the message (lookup-table addresses excluded)
#[inline]
#[must_use]
pub fn get_static_account_keys(message: &VersionedMessage) -> &[Pubkey] {
    match message {
        VersionedMessage::Legacy(legacy_msg) => &legacy_msg.account_keys,
        VersionedMessage::V0(v0_msg) => &v0_msg.account_keys,
    }
}

/// Signer keys, in signature-slot order
#[must_use]
pub fn get_required_signers(message: &VersionedMessage) -> &[Pubkey] {
    let num = get_message_header(message).num_required_signatures as usize;
    let keys = get_static_account_keys(message);
    &keys[..num.min(keys.len())]
}

/// Wrap a message in a transaction whose signature slots are all empty
pub fn unsigned_transaction(message: VersionedMessage) -> VersionedTransaction {
    let num = get_message_header(&message).num_required_signatures as usize;
    VersionedTransaction {
        signatures: vec![Signature::default(); num],
        message,
    }
}

/// Sign `transaction` with `signer`, filling only that signer's slot
pub fn partial_sign(
    transaction: &mut VersionedTransaction,
    signer: &dyn Signer,
) -> Result<(), SignError> {
    let pubkey = signer.pubkey();
    let index = get_required_signers(&transaction.message)
        .iter()
        .position(|key| *key == pubkey)
        .ok_or(SignError::NotASigner(pubkey))?;
    let signature = signer.sign_message(&transaction.message.serialize());
    if transaction.signatures.len() <= index {
        transaction.signatures.resize(index + 1, Signature::default());
    }
    transaction.signatures[index] = signature;
    Ok(())
}

/// Every required signature slot is filled
#[must_use]
pub fn is_fully_signed(transaction: &VersionedTransaction) -> bool {
    let num = get_message_header(&transaction.message).num_required_signatures as usize;
    transaction.signatures.len() >= num
        && transaction.signatures[..num]
            .iter()
            .all(|sig| *sig != Signature::default())
}

/// Signature identifying the transaction on the ledger (the fee payer's)
#[must_use]
pub fn transaction_id(transaction: &VersionedTransaction) -> Signature {
    transaction.signatures.first().copied().unwrap_or_default()
}
