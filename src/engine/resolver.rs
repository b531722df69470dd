//! Resolution of confirmed mints into displayable assets

use crate::metrics::metrics;
use crate::rpc_manager::{LedgerRpc, MetadataFetcher};
use crate::state::{pdas, MetadataAccount};
use crate::types::MintedAsset;
use futures::future::join_all;
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Assets that resolved, and the mints dropped with the reason
#[derive(Debug, Default)]
pub struct ResolvedAssets {
    pub assets: Vec<MintedAsset>,
    pub dropped: Vec<(Pubkey, String)>,
}

pub struct PostMintResolver {
    rpc: Arc<dyn LedgerRpc>,
    fetcher: Arc<dyn MetadataFetcher>,
}

impl PostMintResolver {
    pub fn new(rpc: Arc<dyn LedgerRpc>, fetcher: Arc<dyn MetadataFetcher>) -> Self {
        Self { rpc, fetcher }
    }

    /// Resolve every confirmed `(mint, signature)` concurrently. A failed
    /// lookup drops that asset only.
    #[instrument(skip_all, fields(confirmed = confirmed.len()))]
    pub async fn resolve(&self, confirmed: &[(Pubkey, Signature)]) -> ResolvedAssets {
        let lookups = confirmed
            .iter()
            .map(|(mint, signature)| self.resolve_one(*mint, *signature));
        let results = join_all(lookups).await;

        let mut resolved = ResolvedAssets::default();
        for ((mint, _), result) in confirmed.iter().zip(results) {
            match result {
                Ok(asset) => {
                    metrics().assets_resolved.inc();
                    resolved.assets.push(asset);
                }
                Err(reason) => {
                    metrics().assets_dropped.inc();
                    resolved.dropped.push((*mint, reason));
                }
            }
        }
        debug!(
            resolved = resolved.assets.len(),
            dropped = resolved.dropped.len(),
            "Asset resolution settled"
        );
        resolved
    }

    async fn resolve_one(&self, mint: Pubkey, signature: Signature) -> Result<MintedAsset, String> {
        let address = pdas::metadata(&mint);
        let account = self
            .rpc
            .get_account(&address)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("metadata account {address} not found"))?;
        let record = MetadataAccount::decode(&account).map_err(|e| e.to_string())?;

        let metadata = self
            .fetcher
            .fetch_json(&record.uri)
            .await
            .map_err(|e| e.to_string())?;

        Ok(MintedAsset {
            mint,
            signature,
            record,
            metadata,
        })
    }
}
