//! End-to-end mint flow against the in-memory ledger
//!
//! Run with: cargo test --test mint_flow_integration_test

use candy_minter::engine::{MintSession, SessionConfig};
use candy_minter::guards::{Countdown, MerkleTree, WindowEdge};
use candy_minter::rpc_manager::{ConfirmationLevel, JsonMetadata, RpcError};
use candy_minter::state::{AllowList, GuardGroup, GuardSet, MintLimit, SolPayment, StartDate};
use candy_minter::test_utils::{MockLedger, MockMetadataFetcher, MockWallet, ProgramFixture};
use candy_minter::types::{
    BatchVerdict, ConfirmationStatus, EventReceiver, MintEvent, SubmissionOutcome,
};
use candy_minter::wallet::WalletSigner;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const SOL: u64 = 1_000_000_000;

struct Harness {
    ledger: Arc<MockLedger>,
    wallet: Arc<MockWallet>,
    session: MintSession,
    events: EventReceiver,
}

impl Harness {
    fn drain_events(&mut self) -> Vec<MintEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

fn paid(lamports: u64) -> GuardSet {
    GuardSet {
        sol_payment: Some(SolPayment {
            lamports,
            destination: Pubkey::new_unique(),
        }),
        ..GuardSet::default()
    }
}

async fn harness(
    wallet: Arc<MockWallet>,
    groups: Vec<GuardGroup>,
    multi_mint: bool,
    allowlists: HashMap<String, Vec<Pubkey>>,
    script: impl FnOnce(&MockLedger),
) -> Harness {
    let ledger = Arc::new(MockLedger::new());
    let fetcher = Arc::new(MockMetadataFetcher::new());
    fetcher.set_fallback(JsonMetadata {
        name: "Candy".to_string(),
        image: Some("https://arweave.net/candy.png".to_string()),
        ..JsonMetadata::default()
    });

    let fixture = ProgramFixture::new(paid(SOL / 10), groups);
    fixture.install(&ledger);
    ledger.set_balance(wallet.pubkey(), 10 * SOL);
    script(&ledger);

    let config = SessionConfig {
        candy_machine: fixture.machine.address,
        lookup_table: None,
        multi_mint,
        compute_unit_limit: 800_000,
        compute_unit_price: 10_000,
        poll_interval: Duration::from_millis(50),
        confirmation_timeout: Duration::from_secs(30),
        allowlists,
    };
    let (tx, events) = mpsc::unbounded_channel();
    let session = MintSession::connect(ledger.clone(), wallet.clone(), fetcher, config, tx)
        .await
        .expect("session connects");

    Harness {
        ledger,
        wallet,
        session,
        events,
    }
}

#[tokio::test(start_paused = true)]
async fn test_allowlisted_wallet_approves_then_mints_one() {
    let wallet = Arc::new(MockWallet::new());
    let list = vec![Pubkey::new_unique(), wallet.pubkey(), Pubkey::new_unique()];
    let mut h = harness(
        wallet,
        vec![GuardGroup {
            label: "WL".to_string(),
            guards: GuardSet {
                allow_list: Some(AllowList {
                    merkle_root: MerkleTree::from_wallets(&list).root(),
                }),
                mint_limit: Some(MintLimit { id: 1, limit: 1 }),
                ..GuardSet::default()
            },
        }],
        true,
        HashMap::from([("WL".to_string(), list)]),
        |ledger| {
            ledger.land_sends(ConfirmationLevel::Confirmed);
            ledger.create_metadata_on_land("https://arweave.net");
        },
    )
    .await;

    let results = h.session.refresh_eligibility().await;
    assert_eq!(results.len(), 1);
    assert!(results[0].allowed, "{}", results[0].reason);
    assert_eq!(results[0].max_amount, 1);
    assert!(h.session.wallet_state().allowlist("WL").needs_approval());
    h.drain_events();

    let report = h.session.mint("WL", 1).await.unwrap();

    assert_eq!(report.verdict, BatchVerdict::Success);
    // route first, then the mint
    assert_eq!(h.ledger.send_count(), 2);
    // route and batch are separate wallet requests
    assert_eq!(h.wallet.sign_requests(), 2);
    assert_eq!(report.confirmed_count(), 1);
    assert_eq!(report.assets.len(), 1);
    assert_eq!(report.assets[0].metadata.name, "Candy");

    let events = h.drain_events();
    assert!(matches!(
        events.first(),
        Some(MintEvent::AllowlistApprovalRequired { label }) if label == "WL"
    ));
    assert!(events.iter().any(|e| matches!(e, MintEvent::AssetsMinted(a) if a.len() == 1)));

    let entry = h.session.store().get("WL").unwrap();
    assert!(!entry.minting);
    assert_eq!(entry.loading_text, None);
}

#[tokio::test(start_paused = true)]
async fn test_partial_dispatch_keeps_accepted_mints() {
    let mut h = harness(
        Arc::new(MockWallet::new()),
        vec![GuardGroup {
            label: "Public".to_string(),
            guards: GuardSet::default(),
        }],
        true,
        HashMap::new(),
        |ledger| {
            ledger.land_sends(ConfirmationLevel::Confirmed);
            ledger.create_metadata_on_land("https://arweave.net");
            ledger.fail_send(1, RpcError::Rejected("account in use".to_string()));
        },
    )
    .await;
    h.drain_events();

    let report = h.session.mint("Public", 3).await.unwrap();

    assert_eq!(report.verdict, BatchVerdict::PartialSuccess);
    assert_eq!(report.outcomes.len(), 3);
    assert!(matches!(report.outcomes[1], SubmissionOutcome::Rejected(_)));
    // only accepted signatures are polled
    assert_eq!(report.confirmations.len(), 2);
    assert!(report.assets.len() <= 2);
    assert_eq!(report.assets.len(), 2);

    let events = h.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, MintEvent::TransactionsSent { count: 3, .. })));
    assert!(events.iter().any(|e| matches!(e, MintEvent::AssetsMinted(_))));
}

#[tokio::test(start_paused = true)]
async fn test_expired_blockhash_mints_nothing() {
    let mut h = harness(
        Arc::new(MockWallet::new()),
        vec![GuardGroup {
            label: "Public".to_string(),
            guards: GuardSet::default(),
        }],
        true,
        HashMap::new(),
        |ledger| ledger.expire_blockhash_after(0),
    )
    .await;
    h.drain_events();

    let report = h.session.mint("Public", 2).await.unwrap();

    assert_eq!(report.verdict, BatchVerdict::Success);
    assert_eq!(report.confirmations.len(), 2);
    assert!(report
        .confirmations
        .iter()
        .all(|(_, status)| *status == ConfirmationStatus::Expired));
    assert!(report.assets.is_empty());

    let events = h.drain_events();
    assert!(!events.iter().any(|e| matches!(e, MintEvent::AssetsMinted(_))));
    assert!(events
        .iter()
        .any(|e| matches!(e, MintEvent::MintFailed { reason, .. } if reason.contains("did not land"))));
}

#[tokio::test(start_paused = true)]
async fn test_first_rejection_skips_confirmation() {
    let mut h = harness(
        Arc::new(MockWallet::new()),
        vec![GuardGroup {
            label: "Public".to_string(),
            guards: GuardSet::default(),
        }],
        true,
        HashMap::new(),
        |ledger| {
            ledger.land_sends(ConfirmationLevel::Confirmed);
            ledger.fail_send(0, RpcError::Rejected("blockhash not found".to_string()));
        },
    )
    .await;
    h.drain_events();

    let report = h.session.mint("Public", 2).await.unwrap();

    assert_eq!(report.verdict, BatchVerdict::Failed);
    assert!(report.confirmations.is_empty());
    assert!(report.assets.is_empty());
    let events = h.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, MintEvent::MintFailed { reason, .. } if reason.starts_with("Mint failed"))));
}

#[tokio::test(start_paused = true)]
async fn test_declined_signature_sends_nothing() {
    let mut h = harness(
        Arc::new(MockWallet::new()),
        vec![GuardGroup {
            label: "Public".to_string(),
            guards: GuardSet::default(),
        }],
        false,
        HashMap::new(),
        |_| {},
    )
    .await;
    h.wallet.decline(true);
    h.drain_events();

    let report = h.session.mint("Public", 5).await.unwrap();

    assert!(matches!(report.verdict, BatchVerdict::Aborted(_)));
    // single mint only when multi-mint is off
    assert_eq!(report.quantity, 1);
    assert_eq!(h.ledger.send_count(), 0);
    let entry = h.session.store().get("Public").unwrap();
    assert!(!entry.minting);
    assert!(h
        .drain_events()
        .iter()
        .any(|e| matches!(e, MintEvent::MintFailed { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_group_is_a_configuration_error() {
    let h = harness(
        Arc::new(MockWallet::new()),
        vec![GuardGroup {
            label: "Public".to_string(),
            guards: GuardSet::default(),
        }],
        false,
        HashMap::new(),
        |_| {},
    )
    .await;

    assert!(h.session.mint("VIP", 1).await.is_err());
    assert_eq!(h.ledger.send_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_windows_rearm_while_block_time_lags() {
    let start = 1_700_000_010;
    let h = harness(
        Arc::new(MockWallet::new()),
        vec![GuardGroup {
            label: "Public".to_string(),
            guards: GuardSet {
                start_date: Some(StartDate { date: start }),
                ..GuardSet::default()
            },
        }],
        false,
        HashMap::new(),
        |_| {},
    )
    .await;

    // the local countdown hit zero but block time is one second behind
    h.ledger.set_network_time(start - 1);
    h.session.refresh_eligibility().await;
    let windows = h.session.pending_windows().expect("start still ahead on chain");
    assert_eq!(
        windows
            .countdown("Public", WindowEdge::Start)
            .map(Countdown::remaining),
        Some(1)
    );

    h.ledger.set_network_time(start);
    h.session.refresh_eligibility().await;
    assert!(h.session.pending_windows().is_none());
}
