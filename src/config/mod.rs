pub mod networks;

pub use networks::{chain_name, default_registry, NetworkConfig, Registry, RegistryError, TokenConfig};

use std::time::Duration;

use alloy_primitives::{address, Address, U256};

use crate::amount::parse_units;

pub const SEPOLIA_CHAIN_ID: u64 = 11155111;
pub const FILECOIN_CALIBRATION_CHAIN_ID: u64 = 314159;

pub const DEFAULT_MERCHANT_WALLET: Address = address!("286bd33A27079f28a4B4351a85Ad7f23A04BDdfC");
pub const DEFAULT_PAYMENT_PROCESSOR: Address = address!("210c251e5a39bd12234d3564ce61168c1bec5922");

/// How the payment reaches the merchant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentRoute {
    /// Plain ERC-20 `transfer` to the merchant wallet.
    Direct,
    /// `processPayment` on the PaymentProcessor contract, which records the
    /// receipt on-chain and emits `PaymentProcessed`.
    Processor { address: Address },
}

impl PaymentRoute {
    pub fn spender(&self, merchant: Address) -> Address {
        match self {
            PaymentRoute::Direct => merchant,
            PaymentRoute::Processor { address } => *address,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentConfig {
    /// The only chain payments are accepted on
    pub chain_id: u64,
    pub merchant_wallet: Address,
    pub route: PaymentRoute,
    /// Minimum native balance, in wei, required before any transaction
    pub min_gas_reserve: U256,
    /// Stop after receipt persistence and report a simulated success
    pub simulation_mode: bool,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            chain_id: SEPOLIA_CHAIN_ID,
            merchant_wallet: DEFAULT_MERCHANT_WALLET,
            route: PaymentRoute::Processor {
                address: DEFAULT_PAYMENT_PROCESSOR,
            },
            // 0.0005 ETH
            min_gas_reserve: U256::from(500_000_000_000_000u64),
            simulation_mode: false,
        }
    }
}

/// Receipt upload target (Lighthouse-compatible)
#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    pub endpoint: String,
    pub gateway: String,
    /// Uploads are skipped (placeholder CID) when no key is configured
    pub api_key: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://node.lighthouse.storage/api/v0/add".to_string(),
            gateway: "https://gateway.lighthouse.storage/ipfs".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Round-trip window for ordinary wallet operations
    pub request_timeout: Duration,
    /// Round-trip window for PROCESS_PAYMENT, which waits on user prompts
    /// and two confirmations
    pub payment_timeout: Duration,
    /// How long the content relay waits for the page agent to load
    pub agent_load_timeout: Duration,
    /// Delay after injecting the content script before retrying delivery
    pub injection_retry_delay: Duration,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub payment: PaymentConfig,
    pub storage: StorageConfig,
    /// Optional networks.json overriding the embedded registry
    pub registry_path: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            payment_timeout: Duration::from_secs(60),
            agent_load_timeout: Duration::from_millis(1000),
            injection_retry_delay: Duration::from_millis(500),
            poll_interval: Duration::from_secs(2),
            max_poll_attempts: 30,
            payment: PaymentConfig::default(),
            storage: StorageConfig::default(),
            registry_path: None,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let route = match std::env::var("LEMO_PAYMENT_ROUTE")
            .map(|v| v.to_lowercase())
            .as_deref()
        {
            Ok("direct") => PaymentRoute::Direct,
            _ => PaymentRoute::Processor {
                address: env_parse("LEMO_PAYMENT_PROCESSOR").unwrap_or(DEFAULT_PAYMENT_PROCESSOR),
            },
        };

        let payment = PaymentConfig {
            chain_id: env_parse("LEMO_PAYMENT_CHAIN_ID").unwrap_or(defaults.payment.chain_id),
            merchant_wallet: env_parse("LEMO_MERCHANT_WALLET")
                .unwrap_or(defaults.payment.merchant_wallet),
            route,
            min_gas_reserve: std::env::var("LEMO_MIN_GAS_RESERVE")
                .ok()
                .and_then(|v| parse_units(&v, 18).ok())
                .unwrap_or(defaults.payment.min_gas_reserve),
            simulation_mode: std::env::var("LEMO_SIMULATION_MODE")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false),
        };

        let storage = StorageConfig {
            endpoint: std::env::var("LIGHTHOUSE_ENDPOINT").unwrap_or(defaults.storage.endpoint),
            gateway: std::env::var("LIGHTHOUSE_GATEWAY").unwrap_or(defaults.storage.gateway),
            api_key: std::env::var("LIGHTHOUSE_API_KEY").ok().filter(|k| !k.is_empty()),
        };

        Self {
            request_timeout: env_millis("LEMO_REQUEST_TIMEOUT_MS").unwrap_or(defaults.request_timeout),
            payment_timeout: env_millis("LEMO_PAYMENT_TIMEOUT_MS").unwrap_or(defaults.payment_timeout),
            agent_load_timeout: env_millis("LEMO_AGENT_LOAD_TIMEOUT_MS")
                .unwrap_or(defaults.agent_load_timeout),
            injection_retry_delay: env_millis("LEMO_INJECTION_RETRY_DELAY_MS")
                .unwrap_or(defaults.injection_retry_delay),
            poll_interval: env_millis("LEMO_POLL_INTERVAL_MS").unwrap_or(defaults.poll_interval),
            max_poll_attempts: env_parse("LEMO_POLL_ATTEMPTS").unwrap_or(defaults.max_poll_attempts),
            payment,
            storage,
            registry_path: std::env::var("LEMO_REGISTRY_PATH").ok(),
        }
    }

    /// Registry named by `registry_path`, or the embedded one.
    pub fn registry(&self) -> Registry {
        Registry::from_path_or_default(self.registry_path.as_deref())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.payment_timeout, Duration::from_secs(60));
        assert_eq!(config.agent_load_timeout, Duration::from_millis(1000));
        assert_eq!(config.injection_retry_delay, Duration::from_millis(500));
        assert_eq!(config.payment.chain_id, SEPOLIA_CHAIN_ID);
        assert!(!config.payment.simulation_mode);
        assert!(config.storage.api_key.is_none());
    }

    #[test]
    fn test_spender_follows_route() {
        let merchant = DEFAULT_MERCHANT_WALLET;
        assert_eq!(PaymentRoute::Direct.spender(merchant), merchant);
        let route = PaymentRoute::Processor {
            address: DEFAULT_PAYMENT_PROCESSOR,
        };
        assert_eq!(route.spender(merchant), DEFAULT_PAYMENT_PROCESSOR);
    }

    #[test]
    fn test_from_env_overrides() {
        // Only this test touches these variables
        std::env::set_var("LEMO_REQUEST_TIMEOUT_MS", "2500");
        std::env::set_var("LEMO_PAYMENT_ROUTE", "direct");
        std::env::set_var("LEMO_MIN_GAS_RESERVE", "0.01");
        std::env::set_var("LEMO_SIMULATION_MODE", "TRUE");

        let config = BridgeConfig::from_env();
        assert_eq!(config.request_timeout, Duration::from_millis(2500));
        assert_eq!(config.payment.route, PaymentRoute::Direct);
        assert_eq!(config.payment.min_gas_reserve, U256::from(10_000_000_000_000_000u64));
        assert!(config.payment.simulation_mode);

        std::env::remove_var("LEMO_REQUEST_TIMEOUT_MS");
        std::env::remove_var("LEMO_PAYMENT_ROUTE");
        std::env::remove_var("LEMO_MIN_GAS_RESERVE");
        std::env::remove_var("LEMO_SIMULATION_MODE");
    }
}
