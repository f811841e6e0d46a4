use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Other symbols users type for the native coin (e.g. "FIL" for "tFIL")
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub name: String,
    pub short_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub explorer_url: String,
}

impl NetworkConfig {
    pub fn chain_id_hex(&self) -> String {
        format!("{:#x}", self.chain_id)
    }

    /// Parameters for `wallet_addEthereumChain`.
    pub fn add_chain_params(&self) -> Value {
        json!({
            "chainId": self.chain_id_hex(),
            "chainName": self.name,
            "nativeCurrency": {
                "name": self.native_currency.name,
                "symbol": self.native_currency.symbol,
                "decimals": self.native_currency.decimals,
            },
            "rpcUrls": self.rpc_urls,
            "blockExplorerUrls": [self.explorer_url],
        })
    }

    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), tx_hash)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenConfig {
    pub chain_id: u64,
    pub symbol: String,
    pub name: String,
    pub contract_address: String,
    pub decimals: u8,
}

impl TokenConfig {
    pub fn address(&self) -> Result<Address, RegistryError> {
        self.contract_address
            .parse()
            .map_err(|_| RegistryError::InvalidAddress {
                symbol: self.symbol.clone(),
                address: self.contract_address.clone(),
            })
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse registry JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("token {symbol} has an invalid contract address {address}")]
    InvalidAddress { symbol: String, address: String },
    #[error("token {symbol} references unknown network {chain_id}")]
    OrphanToken { symbol: String, chain_id: u64 },
}

#[derive(Deserialize)]
struct RegistryFile {
    networks: Vec<NetworkConfig>,
    #[serde(default)]
    tokens: Vec<TokenConfig>,
}

/// Networks and ERC-20 tokens the bridge knows about.
#[derive(Clone, Debug, PartialEq)]
pub struct Registry {
    networks: HashMap<u64, NetworkConfig>,
    tokens: Vec<TokenConfig>,
}

// Embedded at compile time so the bridge works without any files on disk
static NETWORKS_JSON: &str = include_str!("../../assets/networks.json");

static DEFAULT_REGISTRY: LazyLock<Registry> = LazyLock::new(|| {
    match Registry::from_json(NETWORKS_JSON) {
        Ok(registry) => {
            log::info!(
                "[Registry] Loaded {} networks and {} tokens",
                registry.networks.len(),
                registry.tokens.len()
            );
            registry
        }
        Err(e) => {
            log::error!("[Registry] Failed to parse embedded networks JSON: {}", e);
            log::warn!("[Registry] Using fallback registry (Sepolia + PYUSD only)");
            Registry::fallback()
        }
    }
});

/// The registry embedded in the crate.
pub fn default_registry() -> &'static Registry {
    &DEFAULT_REGISTRY
}

impl Registry {
    pub fn from_json(json_str: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = serde_json::from_str(json_str)?;

        let networks: HashMap<u64, NetworkConfig> = file
            .networks
            .into_iter()
            .map(|network| (network.chain_id, network))
            .collect();

        for token in &file.tokens {
            token.address()?;
            if !networks.contains_key(&token.chain_id) {
                return Err(RegistryError::OrphanToken {
                    symbol: token.symbol.clone(),
                    chain_id: token.chain_id,
                });
            }
        }

        Ok(Self {
            networks,
            tokens: file.tokens,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let json_str = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json_str)
    }

    /// Loads `path` when given, otherwise (or when loading fails) the
    /// embedded registry.
    pub fn from_path_or_default(path: Option<&str>) -> Self {
        match path {
            Some(path) => match Self::load(path) {
                Ok(registry) => {
                    log::info!("[Registry] Loaded registry override from {}", path);
                    registry
                }
                Err(e) => {
                    log::error!("[Registry] {}; using embedded registry", e);
                    default_registry().clone()
                }
            },
            None => default_registry().clone(),
        }
    }

    fn fallback() -> Self {
        let sepolia = NetworkConfig {
            chain_id: 11155111,
            name: "Sepolia Testnet".to_string(),
            short_name: "sepolia".to_string(),
            native_currency: NativeCurrency {
                name: "Sepolia Ether".to_string(),
                symbol: "ETH".to_string(),
                decimals: 18,
                aliases: Vec::new(),
            },
            rpc_urls: vec!["https://rpc.sepolia.org".to_string()],
            explorer_url: "https://sepolia.etherscan.io".to_string(),
        };

        let pyusd = TokenConfig {
            chain_id: 11155111,
            symbol: "PYUSD".to_string(),
            name: "PayPal USD".to_string(),
            contract_address: "0xCaC524BcA292aaade2DF8A05cC58F0a65B1B3bB9".to_string(),
            decimals: 6,
        };

        Self {
            networks: HashMap::from([(sepolia.chain_id, sepolia)]),
            tokens: vec![pyusd],
        }
    }

    pub fn network(&self, chain_id: u64) -> Option<&NetworkConfig> {
        self.networks.get(&chain_id)
    }

    /// Tokens configured on a chain, in registry order.
    pub fn tokens_on(&self, chain_id: u64) -> Vec<&TokenConfig> {
        self.tokens
            .iter()
            .filter(|token| token.chain_id == chain_id)
            .collect()
    }

    /// Case-insensitive symbol lookup.
    pub fn token(&self, chain_id: u64, symbol: &str) -> Option<&TokenConfig> {
        self.tokens
            .iter()
            .find(|token| token.chain_id == chain_id && token.symbol.eq_ignore_ascii_case(symbol))
    }

    /// Whether `symbol` names the chain's native coin. On chains we don't
    /// know, only "ETH" does.
    pub fn is_native(&self, chain_id: u64, symbol: &str) -> bool {
        match self.network(chain_id) {
            Some(network) => {
                let native = &network.native_currency;
                native.symbol.eq_ignore_ascii_case(symbol)
                    || native.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(symbol))
            }
            None => symbol.eq_ignore_ascii_case("ETH"),
        }
    }

    /// Native symbol and decimals, defaulting to ETH/18.
    pub fn native_currency(&self, chain_id: u64) -> (String, u8) {
        self.network(chain_id)
            .map(|n| (n.native_currency.symbol.clone(), n.native_currency.decimals))
            .unwrap_or_else(|| ("ETH".to_string(), 18))
    }
}

/// Short name for a chain id, as reported in wallet status.
pub fn chain_name(chain_id: u64) -> &'static str {
    match chain_id {
        1 => "mainnet",
        5 => "goerli",
        56 => "bsc",
        137 => "polygon",
        8453 => "base",
        42161 => "arbitrum",
        314159 => "filecoin-calibration",
        11155111 => "sepolia",
        _ => "unknown",
    }
}
