//! Mint session: owns the collaborators, the decoded program state and the
//! per-group store, and runs one mint attempt end to end.
//!
//! Only configuration errors leave [`MintSession::mint`] as `Err`. Every
//! other failure becomes part of the returned [`MintReport`] and a
//! [`MintEvent`] on the session channel.

use super::confirmation::ConfirmationVerifier;
use super::resolver::PostMintResolver;
use super::submission::SubmissionCoordinator;
use crate::config::{Config, GroupDisplay};
use crate::errors::MintError;
use crate::guards::{
    evaluate, window_display, AllowlistStatus, GuardEntry, GuardStore, TimeWindowTracker,
    WalletState, WindowDisplay,
};
use crate::metrics::{metrics, Timer};
use crate::observability::CorrelationId;
use crate::rpc_manager::{LedgerRpc, MetadataFetcher};
use crate::state::{
    pdas, CandyGuardState, CandyMachineState, GuardSet, MetadataAccount, DEFAULT_GROUP,
};
use crate::structured_logging::MintLogger;
use crate::tx_builder::{
    allowlist_route_instruction, BatchContext, TransactionBatchBuilder, TransactionBuilderError,
};
use crate::types::{
    BatchVerdict, ConfirmationStatus, EligibilityResult, EventSender, MintEvent, MintReport,
    SubmissionOutcome,
};
use crate::wallet::WalletSigner;
use arc_swap::ArcSwap;
use solana_sdk::{
    address_lookup_table::AddressLookupTableAccount, pubkey::Pubkey, signature::Signature,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

const TEXT_SIGN: &str = "Please sign";
const TEXT_FINALIZING: &str = "Finalizing";
const TEXT_FETCHING: &str = "Fetching your NFT";

/// Session settings derived from [`Config`]
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub candy_machine: Pubkey,
    pub lookup_table: Option<Pubkey>,
    pub multi_mint: bool,
    pub compute_unit_limit: u32,
    pub compute_unit_price: u64,
    pub poll_interval: Duration,
    pub confirmation_timeout: Duration,
    pub allowlists: HashMap<String, Vec<Pubkey>>,
}

impl SessionConfig {
    pub fn from_config(config: &Config) -> Result<Self, MintError> {
        config.validate()?;
        Ok(Self {
            candy_machine: config.candy_machine_id()?,
            lookup_table: config.lookup_table()?,
            multi_mint: config.candy_machine.multi_mint,
            compute_unit_limit: config.fees.compute_unit_limit,
            compute_unit_price: config.fees.compute_unit_price,
            poll_interval: config.poll_interval(),
            confirmation_timeout: config.confirmation_timeout(),
            allowlists: config.allowlist_wallets()?,
        })
    }
}

/// Decoded on-chain state the session mints against
#[derive(Debug, Clone)]
pub struct ProgramState {
    pub machine: CandyMachineState,
    pub guard: CandyGuardState,
    pub collection_update_authority: Pubkey,
}

impl ProgramState {
    #[instrument(skip(rpc))]
    pub async fn load(rpc: &dyn LedgerRpc, candy_machine: Pubkey) -> Result<Self, MintError> {
        let account = rpc
            .get_account(&candy_machine)
            .await
            .map_err(|e| MintError::from_state_rpc("candy machine", e))?
            .ok_or_else(|| {
                MintError::Configuration(format!("candy machine {candy_machine} not found"))
            })?;
        let machine = CandyMachineState::decode(candy_machine, &account)?;

        let guard_address = machine.mint_authority;
        let account = rpc
            .get_account(&guard_address)
            .await
            .map_err(|e| MintError::from_state_rpc("candy guard", e))?
            .ok_or_else(|| {
                MintError::Configuration(format!("candy guard {guard_address} not found"))
            })?;
        let guard = CandyGuardState::decode(guard_address, &account)?;

        let collection_metadata = pdas::metadata(&machine.collection_mint);
        let account = rpc
            .get_account(&collection_metadata)
            .await
            .map_err(|e| MintError::from_state_rpc("collection metadata", e))?
            .ok_or_else(|| {
                MintError::Configuration(format!(
                    "collection metadata {collection_metadata} not found"
                ))
            })?;
        let collection_update_authority = MetadataAccount::decode(&account)?.update_authority;

        Ok(Self {
            machine,
            guard,
            collection_update_authority,
        })
    }
}

/// One row of the mint button list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedGroup {
    pub entry: GuardEntry,
    pub display: GroupDisplay,
    pub window: Option<WindowDisplay>,
}

pub struct MintSession {
    rpc: Arc<dyn LedgerRpc>,
    wallet: Arc<dyn WalletSigner>,
    fetcher: Arc<dyn MetadataFetcher>,
    config: SessionConfig,
    program: ArcSwap<ProgramState>,
    wallet_state: ArcSwap<WalletState>,
    lookup_tables: Vec<AddressLookupTableAccount>,
    network_time: AtomicI64,
    store: GuardStore,
    events: EventSender,
}

impl MintSession {
    /// Load program state and lookup table, then run a first eligibility
    /// evaluation
    pub async fn connect(
        rpc: Arc<dyn LedgerRpc>,
        wallet: Arc<dyn WalletSigner>,
        fetcher: Arc<dyn MetadataFetcher>,
        config: SessionConfig,
        events: EventSender,
    ) -> Result<Self, MintError> {
        let program = ProgramState::load(rpc.as_ref(), config.candy_machine).await?;

        let lookup_tables = match config.lookup_table {
            Some(address) => vec![rpc
                .get_address_lookup_table(&address)
                .await
                .map_err(|e| MintError::from_state_rpc("lookup table", e))?],
            None => Vec::new(),
        };

        let session = Self {
            rpc,
            wallet,
            fetcher,
            config,
            program: ArcSwap::from_pointee(program),
            wallet_state: ArcSwap::from_pointee(WalletState::default()),
            lookup_tables,
            network_time: AtomicI64::new(0),
            store: GuardStore::new(),
            events,
        };
        session.refresh_eligibility().await;
        Ok(session)
    }

    pub fn store(&self) -> &GuardStore {
        &self.store
    }

    pub fn program(&self) -> Arc<ProgramState> {
        self.program.load_full()
    }

    pub fn wallet_state(&self) -> Arc<WalletState> {
        self.wallet_state.load_full()
    }

    pub fn network_time(&self) -> i64 {
        self.network_time.load(Ordering::Relaxed)
    }

    pub fn multi_mint(&self) -> bool {
        self.config.multi_mint
    }

    fn emit(&self, event: MintEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Event receiver dropped");
        }
    }

    /// Re-read program state, network time and wallet state, then evaluate
    /// every group again.
    ///
    /// A failed program reload keeps the previous state. A failed wallet
    /// load denies every group instead of failing the session.
    #[instrument(skip(self))]
    pub async fn refresh_eligibility(&self) -> Vec<EligibilityResult> {
        match ProgramState::load(self.rpc.as_ref(), self.config.candy_machine).await {
            Ok(program) => self.program.store(Arc::new(program)),
            Err(e) => warn!(error = %e, "Program state reload failed, keeping previous state"),
        }
        let program = self.program.load_full();

        let now = match self.rpc.get_network_time().await {
            Ok(now) => now,
            Err(e) => {
                warn!(error = %e, "Network time unavailable, using local clock");
                chrono::Utc::now().timestamp()
            }
        };
        self.network_time.store(now, Ordering::Relaxed);

        let groups = program.guard.evaluable_groups();
        let results = match WalletState::load(
            self.rpc.as_ref(),
            self.wallet.pubkey(),
            &program.machine,
            &program.guard,
            &self.config.allowlists,
        )
        .await
        {
            Ok(wallet_state) => {
                let results = evaluate(&program.machine, &groups, &wallet_state, now);
                self.wallet_state.store(Arc::new(wallet_state));
                results
            }
            Err(e) => {
                warn!(error = %e, "Wallet state unavailable");
                groups
                    .iter()
                    .map(|g| {
                        EligibilityResult::denied(
                            g.label.clone(),
                            format!("Wallet state unavailable: {e}"),
                        )
                    })
                    .collect()
            }
        };

        self.store.ingest(results);
        metrics().eligibility_refreshes.inc();
        self.emit(MintEvent::EligibilityRefreshed);
        self.store.snapshot().iter().map(|e| e.result.clone()).collect()
    }

    /// Countdown tracker over the current groups at the last network time
    pub fn time_windows(&self) -> TimeWindowTracker {
        let groups = self.program.load().guard.evaluable_groups();
        TimeWindowTracker::from_groups(&groups, self.network_time())
    }

    /// Tracker for the windows still ahead of the last network time, `None`
    /// once every start and end date has passed. Block time can trail the
    /// local countdown, so an edge that fired locally may still be ahead here.
    pub fn pending_windows(&self) -> Option<TimeWindowTracker> {
        Some(self.time_windows()).filter(|windows| !windows.is_idle())
    }

    /// Button list joined with the display table
    pub fn presented(&self, config: &Config) -> Vec<PresentedGroup> {
        let program = self.program.load();
        let now = self.network_time();
        self.store
            .snapshot()
            .iter()
            .map(|entry| {
                let guards = program.guard.resolve(&entry.result.label).unwrap_or_default();
                PresentedGroup {
                    entry: entry.clone(),
                    display: config.display_for(&entry.result.label),
                    window: window_display(
                        guards.start_date.map(|d| d.date),
                        guards.end_date.map(|d| d.date),
                        now,
                    ),
                }
            })
            .collect()
    }

    pub fn set_quantity(&self, label: &str, quantity: u64) {
        let quantity = if self.config.multi_mint { quantity } else { 1 };
        self.store.set_quantity(label, quantity);
    }

    pub fn increment(&self, label: &str) {
        if self.config.multi_mint {
            self.store.increment(label);
        }
    }

    pub fn decrement(&self, label: &str) {
        self.store.decrement(label);
    }

    /// Run one mint attempt for `label`.
    ///
    /// The group's minting flag and loading text are reset on every exit
    /// path. Eligibility is refreshed afterwards.
    pub async fn mint(&self, label: &str, quantity: u64) -> Result<MintReport, MintError> {
        let correlation_id = CorrelationId::new();
        let logger = MintLogger::new(correlation_id, label);
        let quantity = if self.config.multi_mint { quantity } else { 1 };

        if self.program.load().guard.resolve(label).is_none() {
            return Err(MintError::Configuration(format!(
                "no guard group labelled '{label}'"
            )));
        }
        metrics().mint_attempts.inc();

        let report = {
            self.store.set_minting(label, true);
            metrics().active_mints.inc();
            let _reset = scopeguard::guard((), |_| {
                self.store.set_minting(label, false);
                self.store.set_loading_text(label, None);
                metrics().active_mints.dec();
            });

            match self.attempt(&logger, label, quantity).await {
                Ok(report) => report,
                Err(e) => {
                    logger.error(&e.to_string());
                    self.emit(MintEvent::MintFailed {
                        label: label.to_string(),
                        reason: e.to_string(),
                    });
                    MintReport::aborted(correlation_id, label, quantity, e)
                }
            }
        };
        metrics()
            .batch_verdicts
            .with_label_values(&[report.verdict.label()])
            .inc();

        self.refresh_eligibility().await;
        Ok(report)
    }

    async fn attempt(
        &self,
        logger: &MintLogger,
        label: &str,
        quantity: u64,
    ) -> Result<MintReport, MintError> {
        let entry = self.store.get(label).ok_or_else(|| MintError::Eligibility {
            label: label.to_string(),
            reason: "Group is not available for this wallet".to_string(),
        })?;
        if !entry.result.allowed {
            return Err(MintError::Eligibility {
                label: label.to_string(),
                reason: entry.result.reason,
            });
        }
        logger.log_attempt(quantity, entry.result.max_amount);

        let program = self.program.load_full();
        let guards = program
            .guard
            .resolve(label)
            .ok_or_else(|| MintError::Build(TransactionBuilderError::unknown_group(label)))?;

        let coordinator = SubmissionCoordinator::new(Arc::clone(&self.rpc), Arc::clone(&self.wallet))
            .with_poll_interval(self.config.poll_interval);

        self.approve_allowlist(logger, &coordinator, &program, &guards, label)
            .await?;

        if self.lookup_tables.is_empty() {
            self.emit(MintEvent::LookupTableMissing);
        }

        let (blockhash, last_valid_block_height) = self
            .rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| TransactionBuilderError::blockhash_unavailable(e.to_string()))?;

        let wallet_state = self.wallet_state.load_full();
        let timer = Timer::new();
        let drafts = TransactionBatchBuilder::new(
            self.config.compute_unit_limit,
            self.config.compute_unit_price,
        )
        .build(
            &BatchContext {
                machine: &program.machine,
                guard: &program.guard,
                wallet: &wallet_state,
                payer: self.wallet.pubkey(),
                collection_update_authority: program.collection_update_authority,
                blockhash,
                last_valid_block_height,
                lookup_tables: &self.lookup_tables,
            },
            label,
            quantity,
            entry.result.max_amount,
        )?;
        timer.observe_duration(&metrics().build_latency);

        self.store.set_loading_text(label, Some(TEXT_SIGN));
        self.emit(MintEvent::SignatureRequested {
            label: label.to_string(),
            count: drafts.len(),
        });
        let batch = coordinator.sign_batch(drafts).await?;

        let outcomes = coordinator.dispatch(&batch).await;
        self.emit(MintEvent::TransactionsSent {
            label: label.to_string(),
            count: outcomes.len(),
        });
        for (index, outcome) in outcomes.iter().enumerate() {
            logger.log_outcome(index, outcome);
        }
        let verdict = BatchVerdict::from_outcomes(&outcomes);
        let accepted = outcomes.iter().filter(|o| o.is_accepted()).count();
        logger.log_verdict(&verdict, accepted, outcomes.len());

        let mut report = MintReport {
            correlation_id: logger.correlation_id(),
            label: label.to_string(),
            quantity,
            outcomes,
            verdict,
            confirmations: Vec::new(),
            assets: Vec::new(),
        };

        if report.verdict == BatchVerdict::Failed {
            let reason = match report.outcomes.first() {
                Some(SubmissionOutcome::Rejected(err)) => format!("Mint failed: {err}"),
                _ => "Mint failed".to_string(),
            };
            self.emit(MintEvent::MintFailed {
                label: label.to_string(),
                reason,
            });
            return Ok(report);
        }

        // accepted signature with the mint its draft created
        let sent: Vec<(Signature, Pubkey)> = report
            .outcomes
            .iter()
            .zip(&batch.mints)
            .filter_map(|(outcome, mint)| outcome.signature().map(|sig| (sig, *mint)))
            .collect();
        let signatures: Vec<Signature> = sent.iter().map(|(sig, _)| *sig).collect();

        self.store.set_loading_text(label, Some(TEXT_FINALIZING));
        report.confirmations = ConfirmationVerifier::new(
            Arc::clone(&self.rpc),
            self.config.poll_interval,
            self.config.confirmation_timeout,
        )
        .verify(&signatures, &batch.blockhash)
        .await;
        for (signature, status) in &report.confirmations {
            logger.log_confirmation(signature, status);
        }

        let not_landed = report.confirmations.len() - report.confirmed_count();
        if not_landed > 0 {
            self.emit(MintEvent::MintFailed {
                label: label.to_string(),
                reason: format!(
                    "{not_landed} of {} transactions did not land",
                    report.confirmations.len()
                ),
            });
        }

        let confirmed: Vec<(Pubkey, Signature)> = sent
            .iter()
            .zip(&report.confirmations)
            .filter(|(_, (_, status))| *status == ConfirmationStatus::Confirmed)
            .map(|((sig, mint), _)| (*mint, *sig))
            .collect();
        if confirmed.is_empty() {
            return Ok(report);
        }

        self.store.set_loading_text(label, Some(TEXT_FETCHING));
        let resolved = PostMintResolver::new(Arc::clone(&self.rpc), Arc::clone(&self.fetcher))
            .resolve(&confirmed)
            .await;
        for (mint, reason) in &resolved.dropped {
            logger.log_asset_dropped(mint, reason);
            self.emit(MintEvent::AssetFetchFailed { mint: *mint });
        }
        report.assets = resolved.assets;
        if !report.assets.is_empty() {
            info!(assets = report.assets.len(), "Minted assets resolved");
            self.emit(MintEvent::AssetsMinted(report.assets.clone()));
        }

        Ok(report)
    }

    /// Send the allowlist route first when the proof account does not exist
    /// yet
    async fn approve_allowlist(
        &self,
        logger: &MintLogger,
        coordinator: &SubmissionCoordinator,
        program: &ProgramState,
        guards: &GuardSet,
        label: &str,
    ) -> Result<(), MintError> {
        let Some(allow_list) = &guards.allow_list else {
            return Ok(());
        };
        let wallet_state = self.wallet_state.load_full();
        let status = wallet_state.allowlist(label);
        let Some(proof) = status.proof().filter(|_| status.needs_approval()) else {
            return Ok(());
        };

        self.emit(MintEvent::AllowlistApprovalRequired {
            label: label.to_string(),
        });
        self.store.set_loading_text(label, Some(TEXT_SIGN));

        let group_label = (label != DEFAULT_GROUP).then_some(label);
        let route_ix = allowlist_route_instruction(
            &program.machine,
            &program.guard,
            self.wallet.pubkey(),
            &allow_list.merkle_root,
            proof,
            group_label,
        )?;
        let signature = coordinator.approve_route(route_ix).await?;
        logger.log_approval(&signature);

        let approved = AllowlistStatus::Listed {
            proof: proof.to_vec(),
            approved: true,
        };
        self.wallet_state.rcu(|current| {
            let mut next = WalletState::clone(current);
            next.allowlists.insert(label.to_string(), approved.clone());
            next
        });
        Ok(())
    }
}
