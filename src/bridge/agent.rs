use std::sync::Arc;

use alloy_primitives::Address;
use futures_util::future::join_all;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::protocol::{
    BridgeRequest, BridgeResponse, NetworkInfo, NetworkSwitch, ProductData, RequestId, TokenBalance,
    TokenBalances, WalletAction, WalletStatus, REQUEST_SOURCE,
};
use crate::amount::format_units;
use crate::config::{chain_name, BridgeConfig, Registry, TokenConfig};
use crate::contracts::IERC20;
use crate::error::BridgeError;
use crate::payment::PaymentOrchestrator;
use crate::receipt::{LighthouseStore, ReceiptStore};
use crate::wallet::{WalletClient, WalletProvider};

/// Runs inside the page and is the only component that talks to the
/// wallet provider. Holds no mutable state; every request is independent.
pub struct BridgeAgent {
    wallet: Option<WalletClient>,
    reader: Option<WalletClient>,
    registry: Arc<Registry>,
    config: Arc<BridgeConfig>,
    store: Arc<dyn ReceiptStore>,
}

impl BridgeAgent {
    pub fn new(
        provider: Option<Arc<dyn WalletProvider>>,
        registry: Arc<Registry>,
        config: Arc<BridgeConfig>,
        store: Arc<dyn ReceiptStore>,
    ) -> Self {
        Self {
            wallet: provider.map(WalletClient::new),
            reader: None,
            registry,
            config,
            store,
        }
    }

    /// Registry from `config.registry_path` and a Lighthouse receipt store.
    pub fn from_config(provider: Option<Arc<dyn WalletProvider>>, config: BridgeConfig) -> Self {
        let registry = Arc::new(config.registry());
        let store: Arc<dyn ReceiptStore> = Arc::new(LighthouseStore::new(config.storage.clone()));
        Self::new(provider, registry, Arc::new(config), store)
    }

    /// Watch payment confirmations through a separate node.
    pub fn with_chain_reader(mut self, reader: Arc<dyn WalletProvider>) -> Self {
        self.reader = Some(WalletClient::new(reader));
        self
    }

    pub fn has_provider(&self) -> bool {
        self.wallet.is_some()
    }

    /// Handles one window message. Returns `None` for messages that are not
    /// bridge requests, including our own responses.
    pub async fn handle_message(&self, message: &Value) -> Option<BridgeResponse> {
        if message.get("source").and_then(Value::as_str) != Some(REQUEST_SOURCE) {
            return None;
        }

        match BridgeRequest::from_message(message) {
            Ok(request) => Some(self.handle_request(request).await),
            Err(e) => {
                // Without an id there is nobody to answer
                let id = message.get("requestId").and_then(Value::as_u64)?;
                log::warn!("[Agent] Rejecting malformed request {}: {}", id, e);
                Some(BridgeResponse::err(RequestId(id), &e))
            }
        }
    }

    pub async fn handle_request(&self, request: BridgeRequest) -> BridgeResponse {
        let id = request.request_id;
        log::info!("[Agent] {} ({})", request.action.name(), id);

        let response = match request.action {
            WalletAction::CheckWallet => BridgeResponse::ok(id, &self.check_wallet().await),
            WalletAction::ConnectWallet => respond(id, self.connect_wallet().await),
            WalletAction::GetTokenBalances => respond(id, self.token_balances().await),
            WalletAction::GetSpecificTokenBalance {
                token_symbol,
                account,
            } => respond(id, self.specific_token_balance(&token_symbol, &account).await),
            WalletAction::SwitchNetwork { target_chain_id } => {
                respond(id, self.switch_network(target_chain_id).await)
            }
            WalletAction::ProcessPayment {
                product_data,
                payment_method,
                wallet_address,
            } => {
                self.process_payment(id, &product_data, &payment_method, &wallet_address)
                    .await
            }
            WalletAction::GetPaymentDetails { payment_id } => {
                respond(id, self.payments().payment_details(payment_id).await)
            }
            WalletAction::GetPaymentsByBuyer { account } => {
                respond(id, self.payments().payments_by_buyer(&account).await)
            }
        };

        if let Some(error) = &response.error {
            log::warn!("[Agent] {} failed: {}", id, error);
        }
        response
    }

    fn wallet(&self) -> Result<&WalletClient, BridgeError> {
        self.wallet.as_ref().ok_or(BridgeError::Unavailable)
    }

    async fn check_wallet(&self) -> WalletStatus {
        let Some(wallet) = &self.wallet else {
            return WalletStatus::not_installed();
        };

        let status = async {
            let accounts = wallet.accounts().await?;
            let chain_id = wallet.chain_id().await?;
            Ok::<_, BridgeError>((accounts, chain_id))
        }
        .await;

        match status {
            Ok((accounts, chain_id)) => WalletStatus {
                is_installed: true,
                accounts,
                network: Some(NetworkInfo::new(chain_id)),
                error: None,
            },
            Err(e) => WalletStatus {
                is_installed: true,
                accounts: Vec::new(),
                network: None,
                error: Some(e.to_string()),
            },
        }
    }

    async fn connect_wallet(&self) -> Result<WalletStatus, BridgeError> {
        let wallet = self.wallet()?;
        let accounts = wallet.request_accounts().await?;
        let chain_id = wallet.chain_id().await?;
        Ok(WalletStatus {
            is_installed: true,
            accounts,
            network: Some(NetworkInfo::new(chain_id)),
            error: None,
        })
    }

    async fn token_balances(&self) -> Result<TokenBalances, BridgeError> {
        let wallet = self.wallet()?;
        let account = wallet
            .accounts()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BridgeError::NotConnected("No accounts connected".to_string()))?;
        let owner = parse_account(&account).map_err(BridgeError::InvalidRequest)?;

        let chain_id = wallet.chain_id().await?;
        let (symbol, decimals) = self.registry.native_currency(chain_id);
        let native_balance = wallet.balance(owner).await?;
        let native = TokenBalance {
            symbol,
            balance: native_balance.to_string(),
            decimals,
            contract_address: None,
            formatted: Some(format_units(native_balance, decimals)),
            error: None,
        };

        let tokens = join_all(
            self.registry
                .tokens_on(chain_id)
                .into_iter()
                .map(|token| erc20_balance(wallet, token, owner)),
        )
        .await;

        Ok(TokenBalances {
            account,
            native,
            tokens,
            network: NetworkInfo::new(chain_id),
        })
    }

    /// Fails closed: anything that goes wrong past the provider check comes
    /// back as a zero balance with an error.
    async fn specific_token_balance(
        &self,
        symbol: &str,
        account: &str,
    ) -> Result<TokenBalance, BridgeError> {
        let wallet = self.wallet()?;

        let chain_id = match wallet.chain_id().await {
            Ok(chain_id) => chain_id,
            Err(e) => return Ok(TokenBalance::unavailable(symbol, 18, e.to_string())),
        };

        if self.registry.is_native(chain_id, symbol) {
            let (_, decimals) = self.registry.native_currency(chain_id);
            let owner = match parse_account(account) {
                Ok(owner) => owner,
                Err(e) => return Ok(TokenBalance::unavailable(symbol, decimals, e)),
            };
            return Ok(match wallet.balance(owner).await {
                Ok(balance) => TokenBalance {
                    symbol: symbol.to_string(),
                    balance: balance.to_string(),
                    decimals,
                    contract_address: None,
                    formatted: Some(format_units(balance, decimals)),
                    error: None,
                },
                Err(e) => TokenBalance::unavailable(symbol, decimals, e.to_string()),
            });
        }

        let Some(token) = self.registry.token(chain_id, symbol) else {
            let err = BridgeError::UnsupportedToken {
                symbol: symbol.to_string(),
                chain_id,
            };
            return Ok(TokenBalance::unavailable(symbol, 18, err.to_string()));
        };
        let address = match token.address() {
            Ok(address) => address,
            Err(e) => return Ok(TokenBalance::unavailable(symbol, token.decimals, e.to_string())),
        };
        let owner = match parse_account(account) {
            Ok(owner) => owner,
            Err(e) => return Ok(TokenBalance::unavailable(&token.symbol, token.decimals, e)),
        };

        let balance_call = IERC20::balanceOfCall { owner };
        let decimals_call = IERC20::decimalsCall {};
        let (balance, decimals) = futures_util::join!(
            wallet.call(address, &balance_call),
            wallet.call(address, &decimals_call),
        );
        Ok(match (balance, decimals) {
            (Ok(balance), Ok(decimals)) => TokenBalance {
                symbol: token.symbol.clone(),
                balance: balance._0.to_string(),
                decimals: decimals._0,
                contract_address: Some(token.contract_address.clone()),
                formatted: Some(format_units(balance._0, decimals._0)),
                error: None,
            },
            (Err(e), _) | (_, Err(e)) => {
                log::warn!("[Agent] {} balance lookup failed: {}", token.symbol, e);
                let mut entry = TokenBalance::unavailable(&token.symbol, token.decimals, e.to_string());
                entry.contract_address = Some(token.contract_address.clone());
                entry
            }
        })
    }

    async fn switch_network(&self, chain_id: u64) -> Result<NetworkSwitch, BridgeError> {
        let wallet = self.wallet()?;
        let network = self.registry.network(chain_id);
        let name = network
            .map(|n| n.name.clone())
            .unwrap_or_else(|| chain_name(chain_id).to_string());

        let switch_err = match wallet.switch_chain(chain_id).await {
            Ok(()) => {
                return Ok(NetworkSwitch {
                    chain_id,
                    message: format!("Switched to {} network", name),
                    name,
                    added: false,
                })
            }
            Err(e) => e,
        };

        if !switch_err.is_unrecognized_chain() {
            return Err(switch_err.into());
        }
        let Some(network) = network else {
            log::warn!("[Agent] Wallet does not know chain {} and neither do we", chain_id);
            return Err(switch_err.into());
        };

        log::info!("[Agent] Adding {} to the wallet", network.name);
        if let Err(add_err) = wallet.add_chain(network).await {
            log::warn!("[Agent] wallet_addEthereumChain failed: {}", add_err);
            return Err(switch_err.into());
        }
        wallet.switch_chain(chain_id).await?;

        Ok(NetworkSwitch {
            chain_id,
            message: format!("Added and switched to {} network", name),
            name,
            added: true,
        })
    }

    fn payments(&self) -> PaymentOrchestrator<'_> {
        PaymentOrchestrator::new(
            self.wallet.as_ref(),
            &self.registry,
            &self.config,
            self.store.as_ref(),
        )
        .with_reader(self.reader.as_ref())
    }

    async fn process_payment(
        &self,
        id: RequestId,
        product: &ProductData,
        payment_method: &str,
        wallet_address: &str,
    ) -> BridgeResponse {
        match self.payments().process(product, payment_method, wallet_address).await {
            Ok(result) => BridgeResponse::ok(id, &result),
            Err(failure) => BridgeResponse::failed_with(id, &failure.error, &failure.result),
        }
    }

    /// Serves requests from the page's window bus, one task per request so a
    /// pending wallet prompt never blocks the others.
    pub fn listen(
        self: Arc<Self>,
        mut window: broadcast::Receiver<Value>,
        outbox: broadcast::Sender<Value>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let message = match window.recv().await {
                    Ok(message) => message,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("[Agent] Window listener lagged, {} messages dropped", skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                let agent = Arc::clone(&self);
                let outbox = outbox.clone();
                tokio::spawn(async move {
                    if let Some(response) = agent.handle_message(&message).await {
                        match serde_json::to_value(&response) {
                            Ok(value) => {
                                let _ = outbox.send(value);
                            }
                            Err(e) => log::error!("[Agent] Could not serialize response: {}", e),
                        }
                    }
                });
            }
        })
    }
}

fn parse_account(account: &str) -> Result<Address, String> {
    account
        .parse()
        .map_err(|_| format!("Invalid account address {}", account))
}

fn respond<T: serde::Serialize>(id: RequestId, result: Result<T, BridgeError>) -> BridgeResponse {
    match result {
        Ok(value) => BridgeResponse::ok(id, &value),
        Err(e) => BridgeResponse::err(id, &e),
    }
}

async fn erc20_balance(wallet: &WalletClient, token: &TokenConfig, owner: Address) -> TokenBalance {
    let address = match token.address() {
        Ok(address) => address,
        Err(e) => return TokenBalance::unavailable(&token.symbol, token.decimals, e.to_string()),
    };

    match wallet.call(address, &IERC20::balanceOfCall { owner }).await {
        Ok(balance) => TokenBalance {
            symbol: token.symbol.clone(),
            balance: balance._0.to_string(),
            decimals: token.decimals,
            contract_address: Some(token.contract_address.clone()),
            formatted: Some(format_units(balance._0, token.decimals)),
            error: None,
        },
        Err(e) => {
            let mut entry = TokenBalance::unavailable(&token.symbol, token.decimals, e.to_string());
            entry.contract_address = Some(token.contract_address.clone());
            entry
        }
    }
}
