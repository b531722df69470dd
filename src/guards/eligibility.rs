//! Client-side eligibility pre-check
//!
//! Mirrors the candy guard program's checks so the UI can disable groups the
//! wallet cannot use. The program still enforces every rule; a result here
//! is advisory.

use super::wallet_state::{AllowlistStatus, WalletState};
use crate::state::{CandyMachineState, GuardGroup, GuardSet, DEFAULT_GROUP};
use crate::types::EligibilityResult;
use itertools::Itertools;

/// Lamports kept aside per mint for rent of the new mint, metadata and
/// edition accounts plus transaction fees
pub const MINT_FEE_RESERVE_LAMPORTS: u64 = 12_000_000;

/// Keep the first item per label, preserving order. Idempotent.
pub fn dedup_by_label<T, F>(items: Vec<T>, label: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    items
        .into_iter()
        .unique_by(|item| label(item).to_string())
        .collect()
}

/// Drop the reserved `default` group whenever a real group is present
pub fn exclude_default<T, F>(items: Vec<T>, label: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    if items.iter().any(|item| label(item) != DEFAULT_GROUP) {
        items
            .into_iter()
            .filter(|item| label(item) != DEFAULT_GROUP)
            .collect()
    } else {
        items
    }
}

/// Restore the presentation invariants on a result list: unique labels,
/// and no `default` entry alongside other entries
pub fn normalize(results: Vec<EligibilityResult>) -> Vec<EligibilityResult> {
    let results = dedup_by_label(results, |r| r.label.as_str());
    if results.len() > 1 {
        exclude_default(results, |r| r.label.as_str())
    } else {
        results
    }
}

/// Evaluate every group for `wallet` at network time `now`.
///
/// Returns one result per distinct label in group order.
pub fn evaluate(
    machine: &CandyMachineState,
    groups: &[GuardGroup],
    wallet: &WalletState,
    now: i64,
) -> Vec<EligibilityResult> {
    let groups = dedup_by_label(groups.to_vec(), |g| g.label.as_str());
    let groups = exclude_default(groups, |g| g.label.as_str());
    groups
        .iter()
        .map(|group| evaluate_group(&group.label, &group.guards, machine, wallet, now))
        .collect()
}

pub fn evaluate_group(
    label: &str,
    guards: &GuardSet,
    machine: &CandyMachineState,
    wallet: &WalletState,
    now: i64,
) -> EligibilityResult {
    match check(label, guards, machine, wallet, now) {
        Ok(max) if max > 0 => EligibilityResult::allowed(label, max),
        Ok(_) => EligibilityResult::denied(label, "No mints left for this wallet"),
        Err(reason) => EligibilityResult::denied(label, reason),
    }
}

/// First failing check as `Err(reason)`, otherwise the allowance
fn check(
    label: &str,
    guards: &GuardSet,
    machine: &CandyMachineState,
    wallet: &WalletState,
    now: i64,
) -> Result<u64, String> {
    if machine.is_sold_out() {
        return Err("Sold out".to_string());
    }
    if let Some(kind) = guards.unsupported_guard() {
        return Err(format!("The {kind} guard is not supported by this minter"));
    }
    if let Some(start) = guards.start_date {
        if now < start.date {
            return Err("Mint has not started yet".to_string());
        }
    }
    if let Some(end) = guards.end_date {
        if now >= end.date {
            return Err("Mint has ended".to_string());
        }
    }
    if let Some(gate) = &guards.address_gate {
        if gate.address != wallet.wallet {
            return Err("Wallet address is not allowed in this group".to_string());
        }
    }
    if guards.allow_list.is_some() {
        match wallet.allowlist(label) {
            AllowlistStatus::NotConfigured => {
                return Err("Allowlist is not configured for this group".to_string())
            }
            AllowlistStatus::NotListed => return Err("Wallet is not on the allowlist".to_string()),
            AllowlistStatus::Listed { .. } => {}
        }
    }

    let mut max = machine.items_remaining();

    if let Some(limit) = guards.mint_limit {
        let used = wallet.mint_counts.get(&limit.id).copied().unwrap_or(0);
        if used >= limit.limit {
            return Err("Mint limit reached".to_string());
        }
        max = max.min(u64::from(limit.limit - used));
    }
    if let Some(allocation) = guards.allocation {
        let used = wallet
            .allocation_counts
            .get(&allocation.id)
            .copied()
            .unwrap_or(0);
        if used >= allocation.limit {
            return Err("Allocation for this group is exhausted".to_string());
        }
        max = max.min(u64::from(allocation.limit - used));
    }
    if let Some(redeemed) = guards.redeemed_amount {
        if machine.items_redeemed >= redeemed.maximum {
            return Err("Redeemed amount reached".to_string());
        }
        max = max.min(redeemed.maximum - machine.items_redeemed);
    }

    let lamports = guards.sol_payment.as_ref().map_or(0, |p| p.lamports);
    let per_mint = lamports + MINT_FEE_RESERVE_LAMPORTS;
    if wallet.sol_balance < per_mint {
        return Err("Not enough SOL".to_string());
    }
    max = max.min(wallet.sol_balance / per_mint);

    for payment in [&guards.token_payment, &guards.token2022_payment]
        .into_iter()
        .flatten()
    {
        let balance = wallet.token_balance(&payment.mint);
        if balance < payment.amount {
            return Err("Not enough tokens to pay".to_string());
        }
        if payment.amount > 0 {
            max = max.min(balance / payment.amount);
        }
    }
    if let Some(burn) = &guards.token_burn {
        let balance = wallet.token_balance(&burn.mint);
        if balance < burn.amount {
            return Err("Not enough tokens to burn".to_string());
        }
        if burn.amount > 0 {
            max = max.min(balance / burn.amount);
        }
    }
    if let Some(gate) = &guards.token_gate {
        if wallet.token_balance(&gate.mint) < gate.amount {
            return Err("Missing required token".to_string());
        }
    }
    if let Some(gate) = &guards.nft_gate {
        if wallet.nfts_in(&gate.required_collection).next().is_none() {
            return Err("Missing NFT from the required collection".to_string());
        }
    }
    if let Some(payment) = &guards.nft_payment {
        let owned = wallet.nfts_in(&payment.required_collection).count() as u64;
        if owned == 0 {
            return Err("Missing NFT from the required collection".to_string());
        }
        max = max.min(owned);
    }

    Ok(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guards::wallet_state::OwnedNft;
    use crate::state::{
        AllowList, EndDate, MintLimit, NftPayment, SolPayment, StartDate, TokenPayment,
        TokenStandard,
    };
    use solana_sdk::{native_token::LAMPORTS_PER_SOL, pubkey::Pubkey};

    fn machine(redeemed: u64, available: u64) -> CandyMachineState {
        CandyMachineState {
            address: Pubkey::new_unique(),
            program_id: Pubkey::new_unique(),
            authority: Pubkey::new_unique(),
            mint_authority: Pubkey::new_unique(),
            collection_mint: Pubkey::new_unique(),
            items_redeemed: redeemed,
            items_available: available,
            token_standard: TokenStandard::NonFungible,
        }
    }

    fn rich_wallet() -> WalletState {
        WalletState {
            wallet: Pubkey::new_unique(),
            sol_balance: 100 * LAMPORTS_PER_SOL,
            ..Default::default()
        }
    }

    fn group(label: &str, guards: GuardSet) -> GuardGroup {
        GuardGroup {
            label: label.to_string(),
            guards,
        }
    }

    #[test]
    fn test_allowance_is_min_of_limits() {
        let guards = GuardSet {
            mint_limit: Some(MintLimit { id: 1, limit: 5 }),
            ..GuardSet::default()
        };
        let mut wallet = rich_wallet();
        wallet.mint_counts.insert(1, 2);

        let result = evaluate_group("Public", &guards, &machine(0, 100), &wallet, 0);
        assert!(result.allowed);
        assert_eq!(result.max_amount, 3);

        // supply is tighter than the wallet cap
        let result = evaluate_group("Public", &guards, &machine(99, 100), &wallet, 0);
        assert_eq!(result.max_amount, 1);
    }

    #[test]
    fn test_mint_limit_reached_denies_with_zero() {
        let guards = GuardSet {
            mint_limit: Some(MintLimit { id: 1, limit: 1 }),
            ..GuardSet::default()
        };
        let mut wallet = rich_wallet();
        wallet.mint_counts.insert(1, 1);
        let result = evaluate_group("WL", &guards, &machine(0, 100), &wallet, 0);
        assert!(!result.allowed);
        assert_eq!(result.max_amount, 0);
        assert_eq!(result.reason, "Mint limit reached");
    }

    #[test]
    fn test_sold_out_wins_over_everything() {
        let guards = GuardSet {
            start_date: Some(StartDate { date: i64::MAX }),
            ..GuardSet::default()
        };
        let result = evaluate_group("WL", &guards, &machine(10, 10), &rich_wallet(), 0);
        assert_eq!(result.reason, "Sold out");
    }

    #[test]
    fn test_time_window_checks() {
        let guards = GuardSet {
            start_date: Some(StartDate { date: 1_000 }),
            end_date: Some(EndDate { date: 2_000 }),
            ..GuardSet::default()
        };
        let m = machine(0, 10);
        let w = rich_wallet();
        assert_eq!(
            evaluate_group("Public", &guards, &m, &w, 999).reason,
            "Mint has not started yet"
        );
        assert!(evaluate_group("Public", &guards, &m, &w, 1_000).allowed);
        assert_eq!(
            evaluate_group("Public", &guards, &m, &w, 2_000).reason,
            "Mint has ended"
        );
    }

    #[test]
    fn test_sol_affordability_caps_allowance() {
        let price = LAMPORTS_PER_SOL;
        let guards = GuardSet {
            sol_payment: Some(SolPayment {
                lamports: price,
                destination: Pubkey::new_unique(),
            }),
            ..GuardSet::default()
        };
        let mut wallet = rich_wallet();
        wallet.sol_balance = 2 * (price + MINT_FEE_RESERVE_LAMPORTS) + 1;
        let result = evaluate_group("Public", &guards, &machine(0, 100), &wallet, 0);
        assert_eq!(result.max_amount, 2);

        wallet.sol_balance = price;
        let result = evaluate_group("Public", &guards, &machine(0, 100), &wallet, 0);
        assert_eq!(result.reason, "Not enough SOL");
    }

    #[test]
    fn test_token_payment_balance() {
        let mint = Pubkey::new_unique();
        let guards = GuardSet {
            token_payment: Some(TokenPayment {
                amount: 10,
                mint,
                destination_ata: Pubkey::new_unique(),
            }),
            ..GuardSet::default()
        };
        let mut wallet = rich_wallet();
        wallet.token_balances.insert(mint, 35);
        assert_eq!(
            evaluate_group("Public", &guards, &machine(0, 100), &wallet, 0).max_amount,
            3
        );
        wallet.token_balances.insert(mint, 9);
        assert!(!evaluate_group("Public", &guards, &machine(0, 100), &wallet, 0).allowed);
    }

    #[test]
    fn test_allowlist_standing() {
        let guards = GuardSet {
            allow_list: Some(AllowList {
                merkle_root: [3u8; 32],
            }),
            ..GuardSet::default()
        };
        let mut wallet = rich_wallet();
        let m = machine(0, 10);
        assert_eq!(
            evaluate_group("WL", &guards, &m, &wallet, 0).reason,
            "Allowlist is not configured for this group"
        );

        wallet
            .allowlists
            .insert("WL".to_string(), AllowlistStatus::NotListed);
        assert_eq!(
            evaluate_group("WL", &guards, &m, &wallet, 0).reason,
            "Wallet is not on the allowlist"
        );

        wallet.allowlists.insert(
            "WL".to_string(),
            AllowlistStatus::Listed {
                proof: vec![],
                approved: false,
            },
        );
        assert!(evaluate_group("WL", &guards, &m, &wallet, 0).allowed);
    }

    #[test]
    fn test_nft_payment_counts_owned() {
        let collection = Pubkey::new_unique();
        let guards = GuardSet {
            nft_payment: Some(NftPayment {
                required_collection: collection,
                destination: Pubkey::new_unique(),
            }),
            ..GuardSet::default()
        };
        let mut wallet = rich_wallet();
        for _ in 0..2 {
            wallet.nfts.push(OwnedNft {
                mint: Pubkey::new_unique(),
                token_account: Pubkey::new_unique(),
                collection,
            });
        }
        assert_eq!(
            evaluate_group("Burn", &guards, &machine(0, 100), &wallet, 0).max_amount,
            2
        );
    }

    #[test]
    fn test_evaluate_dedups_and_excludes_default() {
        let groups = vec![
            group(DEFAULT_GROUP, GuardSet::default()),
            group("WL", GuardSet::default()),
            group(
                "WL",
                GuardSet {
                    start_date: Some(StartDate { date: i64::MAX }),
                    ..GuardSet::default()
                },
            ),
            group("Public", GuardSet::default()),
        ];
        let results = evaluate(&machine(0, 10), &groups, &rich_wallet(), 0);
        let labels: Vec<_> = results.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["WL", "Public"]);
        // first WL wins, so it is open
        assert!(results[0].allowed);
    }

    #[test]
    fn test_default_kept_when_alone() {
        let groups = vec![group(DEFAULT_GROUP, GuardSet::default())];
        let results = evaluate(&machine(0, 10), &groups, &rich_wallet(), 0);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].label, DEFAULT_GROUP);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = vec![
            EligibilityResult::allowed("WL", 1),
            EligibilityResult::denied("WL", "dup"),
            EligibilityResult::allowed(DEFAULT_GROUP, 1),
            EligibilityResult::allowed("Public", 3),
        ];
        let once = normalize(raw);
        assert_eq!(once.len(), 2);
        assert!(once[0].allowed);
        let twice = normalize(once.clone());
        assert_eq!(once, twice);
    }
}
