//! Configuration for the payout engine

use crate::{chain, Error, Result};
use num_bigint::BigUint;
use payout_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Payout engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Record store configuration
    pub store: StoreConfig,

    /// Ledger connection and sender account
    pub chain: ChainConfig,

    /// Disbursement generation
    pub generation: GenerationConfig,

    /// Claim / broadcast / confirm loop
    pub processing: ProcessingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "payout-engine".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            store: StoreConfig::default(),
            chain: ChainConfig::default(),
            generation: GenerationConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint
    pub endpoint: String,

    /// Network / chain identifier
    pub chain_id: u64,

    /// Custodial sender address
    pub sender_address: String,

    /// Sender signing key (32-byte hex seed)
    pub signing_key: String,

    /// Gas limit per transfer
    pub gas_limit: u64,

    /// Added to the suggested fee price (base units, decimal string)
    pub fee_bump: String,

    /// RPC request timeout in seconds
    pub request_timeout_secs: u64,

    /// Raise the stored nonce checkpoint to at least this value at startup
    ///
    /// Needed once when the sender account already has history.
    pub initial_nonce_checkpoint: Option<u64>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8545".to_string(),
            chain_id: 1,
            sender_address: String::new(),
            signing_key: String::new(),
            gas_limit: chain::SIMPLE_TRANSFER_GAS,
            fee_bump: (5 * chain::GWEI).to_string(), // 5 gwei
            request_timeout_secs: 30,
            initial_nonce_checkpoint: None,
        }
    }
}

/// Recipient and its share weight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientWeight {
    /// Destination address
    pub address: String,
    /// Relative weight
    pub weight: u64,
}

/// Disbursement generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Recipients and weights
    pub recipients: Vec<RecipientWeight>,

    /// Withheld for network fees (base units, decimal string)
    pub reserve: String,

    /// Seconds between generation cycles (default: 24h)
    pub interval_secs: u64,

    /// Balance read attempts per cycle
    pub balance_retry_attempts: u32,

    /// Delay between balance read attempts (seconds)
    pub balance_retry_delay_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            reserve: chain::ether().to_string(), // 1 ether
            interval_secs: 24 * 60 * 60,
            balance_retry_attempts: 5,
            balance_retry_delay_secs: 1,
        }
    }
}

/// Processing loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Sleep between iterations (seconds)
    pub interval_secs: u64,

    /// Non-pending sightings required to confirm
    pub confirmation_threshold: u32,

    /// Give up confirming after this many seconds
    pub confirmation_timeout_secs: u64,

    /// Seconds between pending-state polls
    pub poll_interval_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60 * 60,
            confirmation_threshold: 3,
            confirmation_timeout_secs: 40 * 60,
            poll_interval_secs: 30,
        }
    }
}

impl GenerationConfig {
    /// Period between generation cycles
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl ProcessingConfig {
    /// Confirmation deadline
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    /// Poll period
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Sleep between iterations
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load defaults, then apply environment variable overrides
    pub fn from_env() -> Result<Self> {
        Config::default().with_env_overrides()
    }

    /// Apply `PAYOUT_*` environment variable overrides
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(data_dir) = std::env::var("PAYOUT_DATA_DIR") {
            self.store.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(endpoint) = std::env::var("PAYOUT_RPC_ENDPOINT") {
            self.chain.endpoint = endpoint;
        }

        if let Ok(address) = std::env::var("PAYOUT_SENDER_ADDRESS") {
            self.chain.sender_address = address;
        }

        if let Ok(key) = std::env::var("PAYOUT_SIGNING_KEY") {
            self.chain.signing_key = key;
        }

        if let Ok(chain_id) = std::env::var("PAYOUT_CHAIN_ID") {
            self.chain.chain_id = chain_id
                .parse()
                .map_err(|e| Error::Config(format!("PAYOUT_CHAIN_ID: {}", e)))?;
        }

        Ok(self)
    }

    /// Check everything the engine relies on at startup
    pub fn validate(&self) -> Result<()> {
        if self.chain.sender_address.is_empty() {
            return Err(Error::Config("chain.sender_address is required".to_string()));
        }

        if self.chain.gas_limit == 0 {
            return Err(Error::Config("chain.gas_limit must be positive".to_string()));
        }

        self.fee_bump()?;
        self.reserve()?;

        if !self.generation.recipients.is_empty()
            && self.generation.recipients.iter().map(|r| r.weight).sum::<u64>() == 0
        {
            return Err(Error::Config(
                "generation.recipients weights sum to zero".to_string(),
            ));
        }

        if self.generation.balance_retry_attempts == 0 {
            return Err(Error::Config(
                "generation.balance_retry_attempts must be at least 1".to_string(),
            ));
        }

        if self.generation.interval_secs == 0 || self.processing.interval_secs == 0 {
            return Err(Error::Config(
                "generation and processing intervals must be positive".to_string(),
            ));
        }

        if self.processing.confirmation_threshold == 0 {
            return Err(Error::Config(
                "processing.confirmation_threshold must be at least 1".to_string(),
            ));
        }

        if self.processing.poll_interval_secs == 0 {
            return Err(Error::Config(
                "processing.poll_interval_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Fee bump as an integer
    pub fn fee_bump(&self) -> Result<BigUint> {
        parse_amount("chain.fee_bump", &self.chain.fee_bump)
    }

    /// Reserve as an integer
    pub fn reserve(&self) -> Result<BigUint> {
        parse_amount("generation.reserve", &self.generation.reserve)
    }
}

fn parse_amount(field: &str, value: &str) -> Result<BigUint> {
    value
        .trim()
        .parse::<BigUint>()
        .map_err(|e| Error::Config(format!("{} is not a base-unit integer: {}", field, e)))
}
