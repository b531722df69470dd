//! Configuration for the candy machine minter
//!
//! Settings are loaded from a TOML file, then `.env` and process
//! environment overrides are applied. Program addresses are only parsed in
//! [`Config::validate`] and the typed accessors, so a bad address surfaces
//! once as a configuration error instead of a panic at load time.

use crate::errors::MintError;
use serde::{Deserialize, Serialize};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub wallet: WalletConfig,

    #[serde(default)]
    pub candy_machine: CandyMachineConfig,

    #[serde(default)]
    pub fees: FeeConfig,

    #[serde(default)]
    pub metadata: MetadataConfig,

    /// Display text per group label
    #[serde(default)]
    pub groups: Vec<GroupDisplay>,

    /// Group label to the base58 wallet addresses of its allowlist
    #[serde(default)]
    pub allowlists: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_url")]
    pub url: String,

    /// processed | confirmed | finalized
    #[serde(default = "default_commitment")]
    pub commitment: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,

    /// Max retries per request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Signature status polling interval
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Upper bound on confirmation polling, on top of blockhash expiry
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,

    /// Re-read network time every N countdown ticks (0 disables)
    #[serde(default = "default_time_resync")]
    pub time_resync_ticks: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to keypair file
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandyMachineConfig {
    /// Candy machine address (base58)
    #[serde(default)]
    pub id: Option<String>,

    /// Address lookup table shared by every mint transaction
    #[serde(default)]
    pub lookup_table: Option<String>,

    /// Allow minting more than one asset per attempt
    #[serde(default)]
    pub multi_mint: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    #[serde(default = "default_cu_limit")]
    pub compute_unit_limit: u32,

    /// Priority fee in micro-lamports per compute unit
    #[serde(default = "default_cu_price")]
    pub compute_unit_price: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Off-chain metadata request timeout in seconds
    #[serde(default = "default_metadata_timeout")]
    pub timeout_secs: u64,
}

/// Text shown for one group's mint button
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDisplay {
    pub label: String,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub mint_text: Option<String>,
    #[serde(default)]
    pub button_label: Option<String>,
}

// Default value functions
fn default_rpc_url() -> String { "https://api.devnet.solana.com".to_string() }
fn default_commitment() -> String { "confirmed".to_string() }
fn default_rpc_timeout() -> u64 { 30 }
fn default_max_retries() -> u32 { 3 }
fn default_poll_interval() -> u64 { 500 }
fn default_confirmation_timeout() -> u64 { 90 }
fn default_time_resync() -> u32 { 30 }
fn default_keypair_path() -> String { "~/.config/solana/id.json".to_string() }
fn default_cu_limit() -> u32 { 800_000 }
fn default_cu_price() -> u64 { 10_000 }
fn default_metadata_timeout() -> u64 { 10 }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            commitment: default_commitment(),
            timeout_secs: default_rpc_timeout(),
            max_retries: default_max_retries(),
            poll_interval_ms: default_poll_interval(),
            confirmation_timeout_secs: default_confirmation_timeout(),
            time_resync_ticks: default_time_resync(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keypair_path: default_keypair_path(),
        }
    }
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            compute_unit_limit: default_cu_limit(),
            compute_unit_price: default_cu_price(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_metadata_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with `.env` and environment variable overrides
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = get("CANDY_MACHINE_ID") {
            self.candy_machine.id = Some(id);
        }
        if let Some(table) = get("LOOKUP_TABLE") {
            self.candy_machine.lookup_table = (!table.is_empty()).then_some(table);
        }
        if let Some(flag) = get("MULTIMINT") {
            self.candy_machine.multi_mint = matches!(flag.as_str(), "true" | "1" | "yes");
        }
        if let Some(url) = get("RPC_URL") {
            self.rpc.url = url;
        }
        if let Some(path) = get("KEYPAIR_PATH") {
            self.wallet.keypair_path = path;
        }
    }

    /// Check every address the session needs
    pub fn validate(&self) -> Result<(), MintError> {
        self.candy_machine_id()?;
        self.lookup_table()?;
        self.allowlist_wallets()?;
        self.commitment()?;
        if self.rpc.poll_interval_ms == 0 {
            return Err(MintError::Configuration(
                "rpc.poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.fees.compute_unit_limit == 0 || self.fees.compute_unit_price == 0 {
            return Err(MintError::Configuration(
                "fees.compute_unit_limit and fees.compute_unit_price must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn candy_machine_id(&self) -> Result<Pubkey, MintError> {
        let id = self
            .candy_machine
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| MintError::Configuration("no candy machine id configured".to_string()))?;
        parse_pubkey("candy machine id", id)
    }

    pub fn lookup_table(&self) -> Result<Option<Pubkey>, MintError> {
        self.candy_machine
            .lookup_table
            .as_deref()
            .map(|table| parse_pubkey("lookup table", table))
            .transpose()
    }

    pub fn allowlist_wallets(&self) -> Result<HashMap<String, Vec<Pubkey>>, MintError> {
        self.allowlists
            .iter()
            .map(|(label, wallets)| {
                let parsed = wallets
                    .iter()
                    .map(|w| parse_pubkey(&format!("allowlist '{label}' entry"), w))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((label.clone(), parsed))
            })
            .collect()
    }

    pub fn commitment(&self) -> Result<CommitmentConfig, MintError> {
        CommitmentConfig::from_str(&self.rpc.commitment).map_err(|_| {
            MintError::Configuration(format!("unknown commitment '{}'", self.rpc.commitment))
        })
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.rpc.poll_interval_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.confirmation_timeout_secs)
    }

    /// Display text for `label`, with placeholders for unconfigured groups
    pub fn display_for(&self, label: &str) -> GroupDisplay {
        self.groups
            .iter()
            .find(|g| g.label == label)
            .cloned()
            .unwrap_or_else(|| GroupDisplay {
                label: label.to_string(),
                header: None,
                mint_text: None,
                button_label: None,
            })
    }
}

impl GroupDisplay {
    pub fn header(&self) -> &str {
        self.header.as_deref().unwrap_or("header missing in settings")
    }

    pub fn mint_text(&self) -> &str {
        self.mint_text.as_deref().unwrap_or("")
    }

    pub fn button_label(&self) -> &str {
        self.button_label.as_deref().unwrap_or("Mint")
    }
}

fn parse_pubkey(what: &str, value: &str) -> Result<Pubkey, MintError> {
    Pubkey::from_str(value.trim())
        .map_err(|e| MintError::Configuration(format!("invalid {what} '{value}': {e}")))
}
