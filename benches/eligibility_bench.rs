//! Benchmarks for the per-refresh guard work: eligibility evaluation and
//! allowlist proof generation

use candy_minter::guards::{evaluate, MerkleTree, WalletState};
use candy_minter::state::{
    CandyMachineState, GuardGroup, GuardSet, MintLimit, SolPayment, StartDate, TokenStandard,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use solana_sdk::pubkey::Pubkey;

fn machine() -> CandyMachineState {
    CandyMachineState {
        address: Pubkey::new_unique(),
        program_id: Pubkey::new_unique(),
        authority: Pubkey::new_unique(),
        mint_authority: Pubkey::new_unique(),
        collection_mint: Pubkey::new_unique(),
        items_redeemed: 1_200,
        items_available: 5_000,
        token_standard: TokenStandard::NonFungible,
    }
}

fn groups(count: usize) -> Vec<GuardGroup> {
    (0..count)
        .map(|i| GuardGroup {
            label: format!("G{i}"),
            guards: GuardSet {
                sol_payment: Some(SolPayment {
                    lamports: 100_000_000,
                    destination: Pubkey::new_unique(),
                }),
                mint_limit: Some(MintLimit {
                    id: i as u8,
                    limit: 3,
                }),
                start_date: Some(StartDate { date: 1_000 }),
                ..GuardSet::default()
            },
        })
        .collect()
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("eligibility");
    let machine = machine();
    let wallet = WalletState {
        wallet: Pubkey::new_unique(),
        sol_balance: 5_000_000_000,
        ..Default::default()
    };

    for count in [1, 4, 16].iter() {
        let groups = groups(*count);
        group.bench_with_input(BenchmarkId::new("evaluate", count), &groups, |b, groups| {
            b.iter(|| black_box(evaluate(&machine, black_box(groups), &wallet, 2_000)));
        });
    }

    group.finish();
}

fn bench_allowlist(c: &mut Criterion) {
    let mut group = c.benchmark_group("allowlist");

    for size in [100, 1_000, 10_000].iter() {
        let wallets: Vec<Pubkey> = (0..*size).map(|_| Pubkey::new_unique()).collect();
        let target = wallets[size / 2];

        group.bench_with_input(BenchmarkId::new("build_tree", size), &wallets, |b, w| {
            b.iter(|| black_box(MerkleTree::from_wallets(black_box(w)).root()));
        });

        let tree = MerkleTree::from_wallets(&wallets);
        group.bench_with_input(BenchmarkId::new("proof", size), &target, |b, t| {
            b.iter(|| black_box(tree.proof_for_wallet(black_box(t))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_evaluate, bench_allowlist);
criterion_main!(benches);
