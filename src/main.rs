//! Candy Minter
//!
//! Command line front end for the mint flow: inspect which guard groups the
//! wallet can mint from, mint from one, or watch group windows and re-check
//! eligibility as they open and close.

#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use candy_minter::config::Config;
use candy_minter::engine::{MintSession, PresentedGroup, SessionConfig};
use candy_minter::guards::{RecheckRequest, TimeWindowTracker, WindowDisplay};
use candy_minter::metrics;
use candy_minter::rpc_manager::{HttpMetadataFetcher, LedgerRpc, RetryPolicy, SolanaRpc};
use candy_minter::types::{EventReceiver, MintEvent, MintReport};
use candy_minter::wallet::{KeypairWallet, WalletSigner};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show every guard group and whether the wallet can mint from it
    Status,
    /// Mint from one guard group
    Mint {
        /// Group label (`default` when the machine has no groups)
        #[arg(short, long)]
        group: String,

        #[arg(short, long, default_value_t = 1)]
        quantity: u64,
    },
    /// Follow group start/end dates and re-check eligibility as they pass
    Watch,
    /// Print the metrics registry in Prometheus text format
    Metrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.json_logs)?;

    info!("Candy Minter v{}", env!("CARGO_PKG_VERSION"));

    if let Command::Metrics = args.command {
        println!("{}", metrics::metrics().gather_text());
        return Ok(());
    }

    info!("Loading configuration from: {}", args.config);
    let config = load_config(&args.config)?;
    let session_config = SessionConfig::from_config(&config).context("Invalid configuration")?;

    let keypair_path = expand_home(&config.wallet.keypair_path);
    info!("Loading wallet from: {}", keypair_path);
    let wallet = KeypairWallet::from_file(&keypair_path).context("Failed to load wallet")?;
    info!("Wallet address: {}", wallet.pubkey());

    let rpc = SolanaRpc::new(
        config.rpc.url.clone(),
        config.commitment()?,
        config.rpc_timeout(),
    )
    .with_retry_policy(RetryPolicy {
        max_attempts: config.rpc.max_retries.max(1),
        ..RetryPolicy::default()
    });
    info!("RPC endpoint: {}", rpc.endpoint());
    let rpc = Arc::new(rpc);

    let fetcher = HttpMetadataFetcher::new(std::time::Duration::from_secs(
        config.metadata.timeout_secs,
    ))
    .context("Failed to build metadata client")?;

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let events = tokio::spawn(log_events(event_rx));

    let session = MintSession::connect(
        rpc.clone(),
        Arc::new(wallet),
        Arc::new(fetcher),
        session_config,
        event_tx,
    )
    .await
    .context("Failed to load candy machine")?;

    match args.command {
        Command::Status => print_status(&session.presented(&config)),
        Command::Mint { group, quantity } => {
            let report = session.mint(&group, quantity).await?;
            print_report(&report);
        }
        Command::Watch => {
            print_status(&session.presented(&config));
            watch(&session, &config, rpc).await;
        }
        Command::Metrics => {}
    }

    drop(session);
    let _ = events.await;
    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "candy_minter=debug,info"
    } else {
        "candy_minter=info,warn,error"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        warn!("Config file '{}' not found, using defaults", path);
        let mut config = Config::default();
        config.apply_env_overrides();
        Ok(config)
    }
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{home}/{rest}"),
        _ => path.to_string(),
    }
}

async fn log_events(mut rx: EventReceiver) {
    while let Some(event) = rx.recv().await {
        match event {
            MintEvent::AllowlistApprovalRequired { label } => {
                info!(%label, "Allowlist approval required")
            }
            MintEvent::LookupTableMissing => {
                warn!("No lookup table configured, transactions may exceed size limits")
            }
            MintEvent::SignatureRequested { label, count } => {
                info!(%label, count, "Waiting for wallet signature")
            }
            MintEvent::TransactionsSent { label, count } => {
                info!(%label, count, "Transactions sent")
            }
            MintEvent::MintFailed { label, reason } => error!(%label, %reason, "Mint failed"),
            MintEvent::AssetFetchFailed { mint } => {
                warn!(%mint, "Minted asset could not be fetched")
            }
            MintEvent::AssetsMinted(assets) => {
                for asset in &assets {
                    info!(mint = %asset.mint, name = %asset.metadata.name, "Minted");
                }
            }
            MintEvent::EligibilityRefreshed => {}
        }
    }
}

fn print_status(groups: &[PresentedGroup]) {
    if groups.is_empty() {
        println!("No mintable groups");
    }
    for group in groups {
        let result = &group.entry.result;
        let window = match group.window {
            Some(WindowDisplay::StartingIn(secs)) => format!(" (starting in {secs}s)"),
            Some(WindowDisplay::EndingIn(secs)) => format!(" (ending in {secs}s)"),
            None => String::new(),
        };
        if result.allowed {
            println!(
                "[{}] {}: {} up to {}{}",
                result.label,
                group.display.header(),
                group.display.button_label(),
                result.max_amount,
                window
            );
        } else {
            println!(
                "[{}] {}: {}{}",
                result.label,
                group.display.header(),
                result.reason,
                window
            );
        }
    }
}

fn print_report(report: &MintReport) {
    println!(
        "{} [{}] verdict={} confirmed={} expired={} assets={}",
        report.correlation_id,
        report.label,
        report.verdict.label(),
        report.confirmed_count(),
        report.expired_count(),
        report.assets.len()
    );
    for asset in &report.assets {
        println!(
            "  {} {} {}",
            asset.mint,
            asset.metadata.name,
            asset.metadata.image.as_deref().unwrap_or("-")
        );
    }
}

/// Run the window countdowns until Ctrl-C, refreshing eligibility whenever
/// a start or end date passes
async fn watch(session: &MintSession, config: &Config, rpc: Arc<SolanaRpc>) {
    let (recheck_tx, mut recheck_rx) = mpsc::unbounded_channel::<RecheckRequest>();
    let rpc: Arc<dyn LedgerRpc> = rpc;
    let resync = Some((rpc, config.rpc.time_resync_ticks));
    let spawn_tracker = |windows: TimeWindowTracker| {
        tokio::spawn(windows.run(recheck_tx.clone(), resync.clone()))
    };
    let mut tracker = spawn_tracker(session.time_windows());

    loop {
        tokio::select! {
            Some(request) = recheck_rx.recv() => {
                info!(labels = ?request.labels, "Re-checking eligibility");
                session.refresh_eligibility().await;
                print_status(&session.presented(config));
                if let Some(windows) = session.pending_windows() {
                    tracker.abort();
                    tracker = spawn_tracker(windows);
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    tracker.abort();
}
