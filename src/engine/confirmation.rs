//! Confirmation polling bounded by the batch blockhash
//!
//! Signatures move from `Pending` to exactly one terminal status and never
//! move again. Once the shared blockhash stops being valid, signatures the
//! ledger has never reported are expired. Signatures already seen below the
//! target commitment were executed in time and keep being polled. Whatever is
//! still pending at the configured deadline expires.

use crate::metrics::{metrics, Timer};
use crate::rpc_manager::{ConfirmationLevel, LedgerRpc};
use crate::types::ConfirmationStatus;
use solana_sdk::{hash::Hash, signature::Signature};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub struct ConfirmationVerifier {
    rpc: Arc<dyn LedgerRpc>,
    poll_interval: Duration,
    max_wait: Duration,
}

const TARGET: ConfirmationLevel = ConfirmationLevel::Confirmed;

impl ConfirmationVerifier {
    pub fn new(rpc: Arc<dyn LedgerRpc>, poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            rpc,
            poll_interval,
            max_wait,
        }
    }

    /// Poll until every signature is terminal; returns one status per
    /// signature in input order
    #[instrument(skip_all, fields(signatures = signatures.len(), %blockhash))]
    pub async fn verify(
        &self,
        signatures: &[Signature],
        blockhash: &Hash,
    ) -> Vec<(Signature, ConfirmationStatus)> {
        let timer = Timer::new();
        let deadline = tokio::time::Instant::now() + self.max_wait;
        let mut statuses = vec![ConfirmationStatus::Pending; signatures.len()];
        // reported by the ledger at some commitment, not yet at the target
        let mut landed = vec![false; signatures.len()];
        let mut blockhash_expired = false;

        loop {
            self.poll_once(signatures, &mut statuses, &mut landed).await;
            if statuses.iter().all(ConfirmationStatus::is_terminal) {
                break;
            }

            if !blockhash_expired && !self.blockhash_valid(blockhash).await {
                // a transaction may have landed since the last poll
                self.poll_once(signatures, &mut statuses, &mut landed).await;
                blockhash_expired = true;
                expire_unlanded(&mut statuses, &landed);
                let waiting = statuses.iter().filter(|s| !s.is_terminal()).count();
                info!(waiting, "Batch blockhash expired");
                if waiting == 0 {
                    break;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(max_wait = ?self.max_wait, "Confirmation deadline reached");
                expire_pending(&mut statuses);
                break;
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        timer.observe_duration(&metrics().confirmation_latency);
        for status in &statuses {
            let label = match status {
                ConfirmationStatus::Confirmed => "confirmed",
                ConfirmationStatus::Expired => "expired",
                ConfirmationStatus::Failed(_) => "failed",
                ConfirmationStatus::Pending => "pending",
            };
            metrics().confirmations.with_label_values(&[label]).inc();
        }

        signatures.iter().copied().zip(statuses).collect()
    }

    async fn blockhash_valid(&self, blockhash: &Hash) -> bool {
        match self.rpc.is_blockhash_valid(blockhash).await {
            Ok(valid) => valid,
            Err(e) => {
                warn!(error = %e, "Blockhash validity check failed, assuming still valid");
                true
            }
        }
    }

    async fn poll_once(
        &self,
        signatures: &[Signature],
        statuses: &mut [ConfirmationStatus],
        landed: &mut [bool],
    ) {
        let pending: Vec<usize> = (0..signatures.len())
            .filter(|&i| !statuses[i].is_terminal())
            .collect();
        if pending.is_empty() {
            return;
        }
        let query: Vec<Signature> = pending.iter().map(|&i| signatures[i]).collect();

        let states = match self.rpc.get_signature_statuses(&query).await {
            Ok(states) => states,
            Err(e) => {
                warn!(error = %e, "Signature status query failed");
                return;
            }
        };

        for (index, state) in pending.into_iter().zip(states) {
            let Some(state) = state else { continue };
            if let Some(err) = state.err {
                debug!(signature = %signatures[index], %err, "Transaction landed with an error");
                statuses[index] = ConfirmationStatus::Failed(err);
            } else if state.reached(TARGET) {
                statuses[index] = ConfirmationStatus::Confirmed;
            } else {
                landed[index] = true;
            }
        }
    }
}

fn expire_unlanded(statuses: &mut [ConfirmationStatus], landed: &[bool]) {
    for (status, landed) in statuses.iter_mut().zip(landed) {
        if *status == ConfirmationStatus::Pending && !landed {
            *status = ConfirmationStatus::Expired;
        }
    }
}

fn expire_pending(statuses: &mut [ConfirmationStatus]) {
    for status in statuses.iter_mut() {
        if *status == ConfirmationStatus::Pending {
            *status = ConfirmationStatus::Expired;
        }
    }
}
