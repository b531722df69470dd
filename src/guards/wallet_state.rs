//! Wallet-specific state the eligibility check runs against

use super::allowlist::{MerkleTree, Node};
use crate::rpc_manager::{decode_token_account, LedgerRpc, RpcError, TokenHolding};
use crate::state::{
    pdas, AllocationTracker, CandyGuardState, CandyMachineState, GuardGroup, MetadataAccount,
    MintCounter,
};
use solana_sdk::pubkey::Pubkey;
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument, warn};

/// Allowlist standing of the wallet for one group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowlistStatus {
    /// No local list for this label, or the list's root differs from the
    /// on-chain root
    NotConfigured,
    NotListed,
    Listed {
        proof: Vec<Node>,
        /// The route approval already created the proof account
        approved: bool,
    },
}

impl AllowlistStatus {
    pub fn needs_approval(&self) -> bool {
        matches!(self, Self::Listed { approved: false, .. })
    }

    pub fn proof(&self) -> Option<&[Node]> {
        match self {
            Self::Listed { proof, .. } => Some(proof),
            _ => None,
        }
    }
}

/// An NFT held by the wallet that belongs to a verified collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedNft {
    pub mint: Pubkey,
    pub token_account: Pubkey,
    pub collection: Pubkey,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletState {
    pub wallet: Pubkey,
    pub sol_balance: u64,
    /// Total balance per token mint (classic and token-2022)
    pub token_balances: HashMap<Pubkey, u64>,
    pub nfts: Vec<OwnedNft>,
    /// Mint-limit counter per guard id
    pub mint_counts: HashMap<u8, u16>,
    /// Allocation tracker per guard id
    pub allocation_counts: HashMap<u8, u32>,
    /// Allowlist standing per group label
    pub allowlists: HashMap<String, AllowlistStatus>,
}

impl WalletState {
    pub fn token_balance(&self, mint: &Pubkey) -> u64 {
        self.token_balances.get(mint).copied().unwrap_or(0)
    }

    pub fn nfts_in(&self, collection: &Pubkey) -> impl Iterator<Item = &OwnedNft> {
        let collection = *collection;
        self.nfts.iter().filter(move |nft| nft.collection == collection)
    }

    pub fn allowlist(&self, label: &str) -> &AllowlistStatus {
        self.allowlists
            .get(label)
            .unwrap_or(&AllowlistStatus::NotConfigured)
    }

    /// Load everything the guards of `guard` need to know about `wallet`
    #[instrument(skip_all, fields(wallet = %wallet))]
    pub async fn load(
        rpc: &dyn LedgerRpc,
        wallet: Pubkey,
        machine: &CandyMachineState,
        guard: &CandyGuardState,
        allowlists: &HashMap<String, Vec<Pubkey>>,
    ) -> Result<Self, RpcError> {
        let groups = guard.evaluable_groups();
        let mut state = WalletState {
            wallet,
            sol_balance: rpc.get_balance(&wallet).await?,
            ..Default::default()
        };

        let holdings = rpc.get_token_accounts_by_owner(&wallet).await?;
        for holding in &holdings {
            *state.token_balances.entry(holding.mint).or_default() += holding.amount;
        }

        let probes = Probe::collect(&groups, wallet, machine, guard, allowlists);
        let addresses: Vec<Pubkey> = probes.iter().map(|(_, address)| *address).collect();
        let accounts = if addresses.is_empty() {
            Vec::new()
        } else {
            rpc.get_multiple_accounts(&addresses).await?
        };

        for ((probe, address), account) in probes.into_iter().zip(accounts) {
            let data = account.as_ref().map(|a| a.data.as_slice());
            match probe {
                Probe::MintCounter(id) => {
                    let counter = data.map(MintCounter::decode).transpose().unwrap_or_else(|e| {
                        warn!(id, error = %e, "Unreadable mint counter, assuming none minted");
                        None
                    });
                    state
                        .mint_counts
                        .insert(id, counter.unwrap_or_default().count);
                }
                Probe::Allocation(id) => {
                    let tracker = data
                        .map(AllocationTracker::decode)
                        .transpose()
                        .unwrap_or_else(|e| {
                            warn!(id, error = %e, "Unreadable allocation tracker");
                            None
                        });
                    state
                        .allocation_counts
                        .insert(id, tracker.unwrap_or_default().count);
                }
                Probe::AllowlistProof { label, proof } => {
                    let approved = account.is_some();
                    state
                        .allowlists
                        .insert(label, AllowlistStatus::Listed { proof, approved });
                }
                Probe::Token2022(mint) => {
                    if let Some(holding) = data.and_then(|d| decode_token_account(address, d)) {
                        *state.token_balances.entry(mint).or_default() += holding.amount;
                    }
                }
            }
        }

        // Labels whose allowlist did not produce a proof probe
        for group in &groups {
            if let Some(allow_list) = &group.guards.allow_list {
                state
                    .allowlists
                    .entry(group.label.clone())
                    .or_insert_with(|| match allowlists.get(&group.label) {
                        Some(list)
                            if MerkleTree::from_wallets(list).root() == allow_list.merkle_root =>
                        {
                            AllowlistStatus::NotListed
                        }
                        _ => AllowlistStatus::NotConfigured,
                    });
            }
        }

        let collections: HashSet<Pubkey> = groups
            .iter()
            .flat_map(|g| {
                [
                    g.guards.nft_gate.as_ref().map(|n| n.required_collection),
                    g.guards.nft_burn.as_ref().map(|n| n.required_collection),
                    g.guards.nft_payment.as_ref().map(|n| n.required_collection),
                ]
            })
            .flatten()
            .collect();
        if !collections.is_empty() {
            state.nfts = load_collection_nfts(rpc, &holdings, &collections).await?;
        }

        debug!(
            sol = state.sol_balance,
            tokens = state.token_balances.len(),
            nfts = state.nfts.len(),
            "Wallet state loaded"
        );
        Ok(state)
    }
}

enum Probe {
    MintCounter(u8),
    Allocation(u8),
    AllowlistProof { label: String, proof: Vec<Node> },
    Token2022(Pubkey),
}

impl Probe {
    fn collect(
        groups: &[GuardGroup],
        wallet: Pubkey,
        machine: &CandyMachineState,
        guard: &CandyGuardState,
        allowlists: &HashMap<String, Vec<Pubkey>>,
    ) -> Vec<(Probe, Pubkey)> {
        let program = guard.program_id;
        let mut seen_limits = HashSet::new();
        let mut seen_allocations = HashSet::new();
        let mut seen_token2022 = HashSet::new();
        let mut probes = Vec::new();

        for group in groups {
            let guards = &group.guards;
            if let Some(limit) = guards.mint_limit {
                if seen_limits.insert(limit.id) {
                    let address = pdas::mint_counter(
                        &program,
                        limit.id,
                        &wallet,
                        &guard.address,
                        &machine.address,
                    );
                    probes.push((Probe::MintCounter(limit.id), address));
                }
            }
            if let Some(allocation) = guards.allocation {
                if seen_allocations.insert(allocation.id) {
                    let address = pdas::allocation_tracker(
                        &program,
                        allocation.id,
                        &guard.address,
                        &machine.address,
                    );
                    probes.push((Probe::Allocation(allocation.id), address));
                }
            }
            if let Some(payment) = &guards.token2022_payment {
                if seen_token2022.insert(payment.mint) {
                    let address = pdas::associated_token_with_program(
                        &wallet,
                        &payment.mint,
                        &pdas::TOKEN_2022_PROGRAM_ID,
                    );
                    probes.push((Probe::Token2022(payment.mint), address));
                }
            }
            if let Some(allow_list) = &guards.allow_list {
                let Some(list) = allowlists.get(&group.label) else {
                    warn!(label = %group.label, "No local allowlist for group");
                    continue;
                };
                let tree = MerkleTree::from_wallets(list);
                if tree.root() != allow_list.merkle_root {
                    warn!(label = %group.label, "Local allowlist root differs from on-chain root");
                    continue;
                }
                if let Some(proof) = tree.proof_for_wallet(&wallet) {
                    let address = pdas::allow_list_proof(
                        &program,
                        &allow_list.merkle_root,
                        &wallet,
                        &guard.address,
                        &machine.address,
                    );
                    probes.push((
                        Probe::AllowlistProof {
                            label: group.label.clone(),
                            proof,
                        },
                        address,
                    ));
                }
            }
        }
        probes
    }
}

async fn load_collection_nfts(
    rpc: &dyn LedgerRpc,
    holdings: &[TokenHolding],
    collections: &HashSet<Pubkey>,
) -> Result<Vec<OwnedNft>, RpcError> {
    let singles: Vec<_> = holdings.iter().filter(|h| h.amount == 1).collect();
    if singles.is_empty() {
        return Ok(Vec::new());
    }
    let metadata_addresses: Vec<Pubkey> = singles.iter().map(|h| pdas::metadata(&h.mint)).collect();
    let accounts = rpc.get_multiple_accounts(&metadata_addresses).await?;

    let mut nfts = Vec::new();
    for (holding, account) in singles.into_iter().zip(accounts) {
        let Some(account) = account else { continue };
        let metadata = match MetadataAccount::decode(&account) {
            Ok(m) => m,
            Err(e) => {
                debug!(mint = %holding.mint, error = %e, "Skipping undecodable metadata");
                continue;
            }
        };
        if let Some(collection) = metadata.collection.filter(|c| c.verified) {
            if collections.contains(&collection.key) {
                nfts.push(OwnedNft {
                    mint: holding.mint,
                    token_account: holding.address,
                    collection: collection.key,
                });
            }
        }
    }
    Ok(nfts)
}
