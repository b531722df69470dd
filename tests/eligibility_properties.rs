//! Property tests for the guard list invariants: unique labels, no
//! `default` entry next to real groups, and quantities within the allowance

use candy_minter::guards::allowlist::{leaf, verify};
use candy_minter::guards::{evaluate, normalize, GuardStore, MerkleTree, WalletState};
use candy_minter::state::{CandyMachineState, GuardGroup, GuardSet, TokenStandard, DEFAULT_GROUP};
use candy_minter::types::EligibilityResult;
use proptest::prelude::*;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;

fn label_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(DEFAULT_GROUP.to_string()),
        Just("WL".to_string()),
        Just("OG".to_string()),
        Just("Public".to_string()),
        "[a-z]{1,6}",
    ]
}

fn result_strategy() -> impl Strategy<Value = EligibilityResult> {
    (label_strategy(), any::<bool>(), 0u64..20).prop_map(|(label, allowed, max)| {
        if allowed {
            EligibilityResult::allowed(label, max)
        } else {
            EligibilityResult::denied(label, "denied")
        }
    })
}

fn machine() -> CandyMachineState {
    CandyMachineState {
        address: Pubkey::new_unique(),
        program_id: Pubkey::new_unique(),
        authority: Pubkey::new_unique(),
        mint_authority: Pubkey::new_unique(),
        collection_mint: Pubkey::new_unique(),
        items_redeemed: 0,
        items_available: 50,
        token_standard: TokenStandard::NonFungible,
    }
}

fn assert_invariants(labels: &[&str]) -> Result<(), TestCaseError> {
    let unique: HashSet<&str> = labels.iter().copied().collect();
    prop_assert_eq!(unique.len(), labels.len(), "duplicate label in {:?}", labels);
    if labels.len() > 1 {
        prop_assert!(!labels.contains(&DEFAULT_GROUP), "default listed in {:?}", labels);
    }
    Ok(())
}

/// Property: normalized results have unique labels and hide `default`
#[test]
fn prop_normalize_restores_invariants() {
    proptest!(|(results in prop::collection::vec(result_strategy(), 0..12))| {
        let normalized = normalize(results.clone());
        let labels: Vec<&str> = normalized.iter().map(|r| r.label.as_str()).collect();
        assert_invariants(&labels)?;

        // first occurrence wins
        for result in &normalized {
            let first = results.iter().find(|r| r.label == result.label).unwrap();
            prop_assert_eq!(first, result);
        }

        // idempotent
        prop_assert_eq!(normalize(normalized.clone()), normalized);
    });
}

/// Property: evaluation over arbitrary group lists keeps the invariants
#[test]
fn prop_evaluate_yields_unique_labels() {
    proptest!(|(labels in prop::collection::vec(label_strategy(), 1..10))| {
        let groups: Vec<GuardGroup> = labels
            .iter()
            .map(|label| GuardGroup { label: label.clone(), guards: GuardSet::default() })
            .collect();
        let wallet = WalletState {
            wallet: Pubkey::new_unique(),
            sol_balance: 1_000_000_000,
            ..Default::default()
        };

        let results = evaluate(&machine(), &groups, &wallet, 0);
        let result_labels: Vec<&str> = results.iter().map(|r| r.label.as_str()).collect();
        assert_invariants(&result_labels)?;
        for result in &results {
            prop_assert_eq!(result.allowed, result.max_amount > 0);
        }
    });
}

/// Property: stored quantities never leave 1..=max(1, max_amount)
#[test]
fn prop_store_quantity_stays_in_range() {
    proptest!(|(
        max in 0u64..10,
        steps in prop::collection::vec((0u8..3, 0u64..20), 1..30),
    )| {
        let store = GuardStore::new();
        store.ingest(vec![EligibilityResult::allowed("Public", max)]);
        for (op, value) in steps {
            match op {
                0 => store.increment("Public"),
                1 => store.decrement("Public"),
                _ => store.set_quantity("Public", value),
            }
            let quantity = store.get("Public").unwrap().quantity;
            prop_assert!(quantity >= 1 && quantity <= max.max(1));
        }
    });
}

/// Property: every listed wallet gets a proof that verifies against the root
#[test]
fn prop_allowlist_proofs_verify() {
    proptest!(|(size in 1usize..40)| {
        let wallets: Vec<Pubkey> = (0..size).map(|_| Pubkey::new_unique()).collect();
        let tree = MerkleTree::from_wallets(&wallets);
        let root = tree.root();
        for wallet in &wallets {
            let proof = tree.proof_for_wallet(wallet).unwrap();
            prop_assert!(verify(&proof, &root, &leaf(wallet)));
        }
        let stranger = Pubkey::new_unique();
        prop_assert!(tree.proof_for_wallet(&stranger).is_none());
    });
}
