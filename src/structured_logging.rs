//! Structured logging for mint attempts

use crate::observability::{short_signature, CorrelationId};
use crate::types::{BatchVerdict, ConfirmationStatus, SubmissionOutcome};
use solana_sdk::{pubkey::Pubkey, signature::Signature};

/// Logger bound to one mint attempt
#[derive(Debug, Clone)]
pub struct MintLogger {
    correlation_id: CorrelationId,
    label: String,
}

impl MintLogger {
    pub fn new(correlation_id: CorrelationId, label: &str) -> Self {
        Self {
            correlation_id,
            label: label.to_string(),
        }
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn log_attempt(&self, quantity: u64, max_amount: u64) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            group = %self.label,
            quantity,
            max_amount,
            "Mint attempt started"
        );
    }

    pub fn log_approval(&self, signature: &Signature) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            group = %self.label,
            signature = %short_signature(signature),
            "Allowlist route approved"
        );
    }

    pub fn log_outcome(&self, index: usize, outcome: &SubmissionOutcome) {
        match outcome {
            SubmissionOutcome::Accepted(signature) => tracing::debug!(
                correlation_id = %self.correlation_id,
                group = %self.label,
                index,
                signature = %short_signature(signature),
                "Dispatch accepted"
            ),
            SubmissionOutcome::Rejected(err) => tracing::warn!(
                correlation_id = %self.correlation_id,
                group = %self.label,
                index,
                error = %err,
                category = err.category(),
                "Dispatch rejected"
            ),
        }
    }

    pub fn log_verdict(&self, verdict: &BatchVerdict, accepted: usize, total: usize) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            group = %self.label,
            verdict = verdict.label(),
            accepted,
            total,
            "Batch dispatched"
        );
    }

    pub fn log_confirmation(&self, signature: &Signature, status: &ConfirmationStatus) {
        tracing::debug!(
            correlation_id = %self.correlation_id,
            signature = %short_signature(signature),
            status = ?status,
            "Signature reached terminal status"
        );
    }

    pub fn log_asset_dropped(&self, mint: &Pubkey, error: &str) {
        tracing::warn!(
            correlation_id = %self.correlation_id,
            mint = %mint,
            error,
            "Dropping minted asset from results"
        );
    }

    pub fn error(&self, message: &str) {
        tracing::error!(
            correlation_id = %self.correlation_id,
            group = %self.label,
            message,
            "Mint attempt failed"
        );
    }
}
