//! Common types used throughout the mint flow

use crate::errors::MintError;
use crate::rpc_manager::{JsonMetadata, RpcError};
use crate::state::MetadataAccount;
use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use tokio::sync::mpsc;
use crate::observability::CorrelationId;

/// Eligibility of the wallet for one guard group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityResult {
    /// Group label (`default` when the machine has no groups)
    pub label: String,

    pub allowed: bool,

    /// Human-readable reason; empty when allowed
    pub reason: String,

    /// How many mints the wallet can still make in this group; 0 when denied
    pub max_amount: u64,
}

impl EligibilityResult {
    pub fn allowed(label: impl Into<String>, max_amount: u64) -> Self {
        Self {
            label: label.into(),
            allowed: true,
            reason: String::new(),
            max_amount,
        }
    }

    pub fn denied(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            allowed: false,
            reason: reason.into(),
            max_amount: 0,
        }
    }
}

/// Result of dispatching one signed draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Accepted(Signature),
    Rejected(RpcError),
}

impl SubmissionOutcome {
    pub fn signature(&self) -> Option<Signature> {
        match self {
            Self::Accepted(sig) => Some(*sig),
            Self::Rejected(_) => None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Confirmation state of one accepted signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Pending,
    Confirmed,
    /// The batch blockhash expired before the transaction landed
    Expired,
    /// The transaction landed but its execution failed
    Failed(String),
}

impl ConfirmationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Overall verdict of a mint attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchVerdict {
    /// Every dispatch was accepted
    Success,
    /// The first dispatch was accepted, some later ones were rejected
    PartialSuccess,
    /// The first dispatch was rejected
    Failed,
    /// The attempt stopped before dispatch
    Aborted(MintError),
}

impl BatchVerdict {
    /// Verdict over a dispatched batch.
    ///
    /// A rejected first dispatch fails the whole batch even if later ones
    /// were accepted: it is the likeliest sign of a systemic problem such
    /// as a stale blockhash. This is a heuristic, not proof that nothing
    /// landed.
    pub fn from_outcomes(outcomes: &[SubmissionOutcome]) -> Self {
        match outcomes.first() {
            None | Some(SubmissionOutcome::Rejected(_)) => Self::Failed,
            Some(SubmissionOutcome::Accepted(_)) => {
                if outcomes.iter().all(SubmissionOutcome::is_accepted) {
                    Self::Success
                } else {
                    Self::PartialSuccess
                }
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::PartialSuccess)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PartialSuccess => "partial_success",
            Self::Failed => "failed",
            Self::Aborted(_) => "aborted",
        }
    }
}

/// A confirmed mint whose on-chain record and off-chain document both resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MintedAsset {
    pub mint: Pubkey,
    pub signature: Signature,
    pub record: MetadataAccount,
    pub metadata: JsonMetadata,
}

/// Notifications for the UI layer
#[derive(Debug, Clone, PartialEq)]
pub enum MintEvent {
    /// The allowlist route needs an extra signature before minting
    AllowlistApprovalRequired { label: String },
    /// A lookup table is not configured; transactions will be larger
    LookupTableMissing,
    SignatureRequested { label: String, count: usize },
    TransactionsSent { label: String, count: usize },
    MintFailed { label: String, reason: String },
    AssetFetchFailed { mint: Pubkey },
    /// Non-empty list of resolved assets; the result view should open
    AssetsMinted(Vec<MintedAsset>),
    EligibilityRefreshed,
}

pub type EventSender = mpsc::UnboundedSender<MintEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<MintEvent>;

/// Everything one mint attempt produced
#[derive(Debug, Clone)]
pub struct MintReport {
    pub correlation_id: CorrelationId,
    pub label: String,
    pub quantity: u64,
    /// One entry per draft, in draft order
    pub outcomes: Vec<SubmissionOutcome>,
    pub verdict: BatchVerdict,
    /// Terminal status per accepted signature
    pub confirmations: Vec<(Signature, ConfirmationStatus)>,
    pub assets: Vec<MintedAsset>,
}

impl MintReport {
    pub fn aborted(correlation_id: CorrelationId, label: &str, quantity: u64, err: MintError) -> Self {
        Self {
            correlation_id,
            label: label.to_string(),
            quantity,
            outcomes: Vec::new(),
            verdict: BatchVerdict::Aborted(err),
            confirmations: Vec::new(),
            assets: Vec::new(),
        }
    }

    pub fn confirmed_count(&self) -> usize {
        self.confirmations
            .iter()
            .filter(|(_, status)| *status == ConfirmationStatus::Confirmed)
            .count()
    }

    pub fn expired_count(&self) -> usize {
        self.confirmations
            .iter()
            .filter(|(_, status)| *status == ConfirmationStatus::Expired)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected() -> SubmissionOutcome {
        SubmissionOutcome::Rejected(RpcError::Rejected("custom program error".to_string()))
    }

    fn accepted() -> SubmissionOutcome {
        SubmissionOutcome::Accepted(Signature::new_unique())
    }

    #[test]
    fn test_first_rejection_fails_batch() {
        let outcomes = vec![rejected(), accepted(), accepted()];
        assert_eq!(BatchVerdict::from_outcomes(&outcomes), BatchVerdict::Failed);
    }

    #[test]
    fn test_later_rejection_is_partial() {
        let outcomes = vec![accepted(), rejected(), accepted()];
        assert_eq!(
            BatchVerdict::from_outcomes(&outcomes),
            BatchVerdict::PartialSuccess
        );
        assert_eq!(
            BatchVerdict::from_outcomes(&[accepted(), accepted()]),
            BatchVerdict::Success
        );
    }

    #[test]
    fn test_empty_batch_is_failed() {
        assert_eq!(BatchVerdict::from_outcomes(&[]), BatchVerdict::Failed);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!ConfirmationStatus::Pending.is_terminal());
        assert!(ConfirmationStatus::Confirmed.is_terminal());
        assert!(ConfirmationStatus::Expired.is_terminal());
        assert!(ConfirmationStatus::Failed("InstructionError".to_string()).is_terminal());
    }
}
