//! Scriptable in-memory wallet and receipt store for tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::{Address, U256};
use alloy_sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::{default_registry, BridgeConfig, DEFAULT_PAYMENT_PROCESSOR, SEPOLIA_CHAIN_ID};
use crate::contracts::{IPaymentProcessor, PaymentRecord, IERC20};
use crate::receipt::{placeholder_cid, ReceiptDocument, ReceiptError, ReceiptStore};
use crate::wallet::{ProviderError, WalletProvider};

/// Config with fast confirmation polling and injection retry.
pub fn test_config() -> BridgeConfig {
    BridgeConfig {
        injection_retry_delay: Duration::from_millis(20),
        poll_interval: Duration::from_millis(10),
        max_poll_attempts: 3,
        ..BridgeConfig::default()
    }
}

#[derive(Default)]
struct FakeState {
    accounts: Vec<Address>,
    authorized: bool,
    chain_id: u64,
    known_chains: HashSet<u64>,
    native: HashMap<Address, U256>,
    decimals: HashMap<Address, u8>,
    balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    receipts: HashMap<String, Value>,
    calls: Vec<String>,
    sent: Vec<&'static str>,
    tx_count: u64,
    payment_count: u64,
    payments: Vec<PaymentRecord>,
    token_failure: Option<String>,
    reject_connect: bool,
    reject_sends: bool,
    approve_noop: bool,
    never_mine: bool,
    nested_switch_error: bool,
    add_chain_fails: bool,
}

/// An EIP-1193 wallet that runs ERC-20 and PaymentProcessor semantics in
/// memory.
pub struct FakeWallet {
    state: Mutex<FakeState>,
}

fn bad_params(message: &str) -> ProviderError {
    ProviderError::new(-32602, message)
}

fn word(value: U256) -> String {
    format!("0x{}", hex::encode(value.to_be_bytes::<32>()))
}

impl FakeWallet {
    /// Connected on Sepolia with 1 ETH and the registry's Sepolia tokens
    /// deployed (all balances zero).
    pub fn sepolia() -> Arc<Self> {
        let account: Address = "0x1000000000000000000000000000000000000001".parse().unwrap();
        let mut state = FakeState {
            accounts: vec![account],
            authorized: true,
            chain_id: SEPOLIA_CHAIN_ID,
            ..Default::default()
        };
        state.known_chains.insert(SEPOLIA_CHAIN_ID);
        state.native.insert(account, U256::from(1_000_000_000_000_000_000u64));
        for token in default_registry().tokens_on(SEPOLIA_CHAIN_ID) {
            state.decimals.insert(token.address().unwrap(), token.decimals);
        }
        Arc::new(Self {
            state: Mutex::new(state),
        })
    }

    /// Installed but not yet authorized for the page.
    pub fn locked() -> Arc<Self> {
        let wallet = Self::sepolia();
        wallet.state().authorized = false;
        wallet
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn account(&self) -> Address {
        self.state().accounts[0]
    }

    pub fn pyusd(&self) -> Address {
        default_registry().token(SEPOLIA_CHAIN_ID, "PYUSD").unwrap().address().unwrap()
    }

    pub fn set_chain(&self, chain_id: u64) {
        let mut state = self.state();
        state.chain_id = chain_id;
        state.known_chains.insert(chain_id);
    }

    pub fn current_chain(&self) -> u64 {
        self.state().chain_id
    }

    pub fn set_native_balance(&self, owner: Address, amount: U256) {
        self.state().native.insert(owner, amount);
    }

    pub fn set_token_balance(&self, token: Address, owner: Address, amount: U256) {
        self.state().balances.insert((token, owner), amount);
    }

    pub fn token_balance(&self, token: Address, owner: Address) -> U256 {
        self.state().balances.get(&(token, owner)).copied().unwrap_or_default()
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.state().allowances.insert((token, owner, spender), amount);
    }

    pub fn fail_token_calls(&self, message: &str) {
        self.state().token_failure = Some(message.to_string());
    }

    pub fn reject_connect(&self) {
        self.state().reject_connect = true;
    }

    pub fn reject_transactions(&self) {
        self.state().reject_sends = true;
    }

    /// `approve` is mined but leaves the allowance unchanged.
    pub fn approve_without_effect(&self) {
        self.state().approve_noop = true;
    }

    pub fn never_mine(&self) {
        self.state().never_mine = true;
    }

    /// Report unknown chains MetaMask-mobile style, nested in `data`.
    pub fn nest_switch_errors(&self) {
        self.state().nested_switch_error = true;
    }

    pub fn fail_add_chain(&self) {
        self.state().add_chain_fails = true;
    }

    /// Every RPC method called, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Kinds of transactions submitted, in order.
    pub fn sent(&self) -> Vec<&'static str> {
        self.state().sent.clone()
    }

    fn handle(&self, method: &str, params: &Value) -> Result<Value, ProviderError> {
        let mut state = self.state();
        state.calls.push(method.to_string());

        match method {
            "eth_accounts" => Ok(if state.authorized {
                json!(state.accounts.iter().map(|a| a.to_string()).collect::<Vec<_>>())
            } else {
                json!([])
            }),
            "eth_requestAccounts" => {
                if state.reject_connect {
                    return Err(ProviderError::new(4001, "User rejected the request."));
                }
                state.authorized = true;
                Ok(json!(state.accounts.iter().map(|a| a.to_string()).collect::<Vec<_>>()))
            }
            "eth_chainId" => Ok(json!(format!("{:#x}", state.chain_id))),
            "net_version" => Ok(json!(state.chain_id.to_string())),
            "eth_getBalance" => {
                let owner = param_address(params, 0, None)?;
                let balance = state.native.get(&owner).copied().unwrap_or_default();
                Ok(json!(format!("0x{:x}", balance)))
            }
            "eth_call" => {
                let to = param_address(params, 0, Some("to"))?;
                let data = param_data(params)?;
                Self::call(&state, to, &data)
            }
            "eth_sendTransaction" => {
                if state.reject_sends {
                    return Err(ProviderError::new(
                        4001,
                        "MetaMask Tx Signature: User denied transaction signature.",
                    ));
                }
                let from = param_address(params, 0, Some("from"))?;
                let to = param_address(params, 0, Some("to"))?;
                let data = param_data(params)?;
                Self::send(&mut state, from, to, &data)
            }
            "eth_getTransactionReceipt" => {
                let hash = params[0].as_str().ok_or_else(|| bad_params("hash"))?;
                Ok(state.receipts.get(hash).cloned().unwrap_or(Value::Null))
            }
            "wallet_switchEthereumChain" => {
                let chain_id = param_chain(params)?;
                if state.known_chains.contains(&chain_id) {
                    state.chain_id = chain_id;
                    Ok(Value::Null)
                } else if state.nested_switch_error {
                    Err(ProviderError::new(ProviderError::INTERNAL, "Internal JSON-RPC error.")
                        .with_data(json!({ "originalError": { "code": 4902 } })))
                } else {
                    Err(ProviderError::new(
                        4902,
                        format!("Unrecognized chain ID \"{:#x}\".", chain_id),
                    ))
                }
            }
            "wallet_addEthereumChain" => {
                if state.add_chain_fails {
                    return Err(ProviderError::new(4001, "User rejected adding the network."));
                }
                let chain_id = param_chain(params)?;
                state.known_chains.insert(chain_id);
                Ok(Value::Null)
            }
            other => Err(ProviderError::new(
                ProviderError::UNSUPPORTED_METHOD,
                format!("{} is not supported", other),
            )),
        }
    }

    fn call(state: &FakeState, to: Address, data: &[u8]) -> Result<Value, ProviderError> {
        if to == DEFAULT_PAYMENT_PROCESSOR {
            return Self::processor_call(state, data);
        }
        let decimals = match state.decimals.get(&to) {
            Some(decimals) => *decimals,
            None => return Ok(json!("0x")),
        };
        if let Some(message) = &state.token_failure {
            return Err(ProviderError::new(3, message.clone()));
        }

        if let Ok(call) = IERC20::balanceOfCall::abi_decode(data, true) {
            let balance = state.balances.get(&(to, call.owner)).copied().unwrap_or_default();
            return Ok(json!(word(balance)));
        }
        if let Ok(call) = IERC20::allowanceCall::abi_decode(data, true) {
            let allowance = state
                .allowances
                .get(&(to, call.owner, call.spender))
                .copied()
                .unwrap_or_default();
            return Ok(json!(word(allowance)));
        }
        if IERC20::decimalsCall::abi_decode(data, true).is_ok() {
            return Ok(json!(word(U256::from(decimals))));
        }
        Err(ProviderError::new(3, "execution reverted"))
    }

    fn processor_call(state: &FakeState, data: &[u8]) -> Result<Value, ProviderError> {
        if let Ok(call) = IPaymentProcessor::getPaymentDetailsCall::abi_decode(data, true) {
            let record = state
                .payments
                .iter()
                .find(|p| p.paymentId == call.paymentId)
                .cloned()
                .ok_or_else(|| ProviderError::new(3, "execution reverted: Payment does not exist"))?;
            let encoded = IPaymentProcessor::getPaymentDetailsCall::abi_encode_returns(&(record,));
            return Ok(json!(format!("0x{}", hex::encode(encoded))));
        }
        if let Ok(call) = IPaymentProcessor::getPaymentsByBuyerCall::abi_decode(data, true) {
            let ids: Vec<U256> = state
                .payments
                .iter()
                .filter(|p| p.buyer == call.buyer)
                .map(|p| p.paymentId)
                .collect();
            let encoded = IPaymentProcessor::getPaymentsByBuyerCall::abi_encode_returns(&(ids,));
            return Ok(json!(format!("0x{}", hex::encode(encoded))));
        }
        Err(ProviderError::new(3, "execution reverted"))
    }

    fn send(state: &mut FakeState, from: Address, to: Address, data: &[u8]) -> Result<Value, ProviderError> {
        state.tx_count += 1;
        let tx_hash = format!("0x{:064x}", state.tx_count);
        let mut logs = Vec::new();

        let status = if let Ok(call) = IERC20::approveCall::abi_decode(data, true) {
            state.sent.push("approve");
            if !state.approve_noop {
                state.allowances.insert((to, from, call.spender), call.amount);
            }
            1
        } else if let Ok(call) = IERC20::transferCall::abi_decode(data, true) {
            state.sent.push("transfer");
            u64::from(Self::move_tokens(state, to, from, call.to, call.amount))
        } else if let Ok(call) = IPaymentProcessor::processPaymentCall::abi_decode(data, true) {
            state.sent.push("processPayment");
            let token = call.paymentToken;
            let allowance = state.allowances.get(&(token, from, to)).copied().unwrap_or_default();
            if to != DEFAULT_PAYMENT_PROCESSOR || allowance < call.amount {
                0
            } else if !Self::move_tokens(state, token, from, to, call.amount) {
                0
            } else {
                state
                    .allowances
                    .insert((token, from, to), allowance - call.amount);
                state.payment_count += 1;
                let id = U256::from(state.payment_count);
                state.payments.push(PaymentRecord {
                    paymentId: id,
                    buyer: from,
                    productId: call.productId.clone(),
                    amount: call.amount,
                    paymentToken: token,
                    currency: call.currency.clone(),
                    receiptId: id,
                    receiptCid: call.receiptCid.clone(),
                    timestamp: U256::from(1_700_000_000u64),
                    completed: true,
                });
                let event = IPaymentProcessor::PaymentProcessed {
                    paymentId: id,
                    buyer: from,
                    productId: call.productId,
                    amount: call.amount,
                    paymentToken: token,
                    receiptId: id,
                    receiptCid: call.receiptCid,
                    timestamp: U256::from(1_700_000_000u64),
                };
                let log = event.encode_log_data();
                logs.push(json!({
                    "address": to.to_string(),
                    "topics": log
                        .topics()
                        .iter()
                        .map(|t| format!("0x{}", hex::encode(t)))
                        .collect::<Vec<_>>(),
                    "data": format!("0x{}", hex::encode(&log.data)),
                }));
                1
            }
        } else {
            state.sent.push("unknown");
            0
        };

        if !state.never_mine {
            let receipt = json!({
                "transactionHash": tx_hash,
                "blockNumber": format!("{:#x}", 1000 + state.tx_count),
                "status": format!("{:#x}", status),
                "logs": logs,
            });
            state.receipts.insert(tx_hash.clone(), receipt);
        }
        Ok(json!(tx_hash))
    }

    fn move_tokens(state: &mut FakeState, token: Address, from: Address, to: Address, amount: U256) -> bool {
        let available = state.balances.get(&(token, from)).copied().unwrap_or_default();
        if available < amount {
            return false;
        }
        state.balances.insert((token, from), available - amount);
        *state.balances.entry((token, to)).or_default() += amount;
        true
    }
}

fn param_address(params: &Value, index: usize, field: Option<&str>) -> Result<Address, ProviderError> {
    let value = match field {
        Some(field) => &params[index][field],
        None => &params[index],
    };
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| bad_params("invalid address"))
}

fn param_data(params: &Value) -> Result<Vec<u8>, ProviderError> {
    let data = params[0]["data"].as_str().ok_or_else(|| bad_params("missing data"))?;
    hex::decode(data.trim_start_matches("0x")).map_err(|_| bad_params("invalid data"))
}

fn param_chain(params: &Value) -> Result<u64, ProviderError> {
    let chain = params[0]["chainId"].as_str().ok_or_else(|| bad_params("missing chainId"))?;
    u64::from_str_radix(chain.trim_start_matches("0x"), 16).map_err(|_| bad_params("invalid chainId"))
}

#[async_trait]
impl WalletProvider for FakeWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.handle(method, &params)
    }
}

/// Receipt store that keeps documents in memory.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<Vec<ReceiptDocument>>,
    fail: bool,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self {
            documents: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn documents(&self) -> Vec<ReceiptDocument> {
        self.documents.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReceiptStore for MemoryStore {
    async fn upload(&self, document: &ReceiptDocument) -> Result<String, ReceiptError> {
        if self.fail {
            return Err(ReceiptError::Http("storage offline".to_string()));
        }
        let cid = placeholder_cid(&document.to_bytes()?);
        self.documents.lock().unwrap().push(document.clone());
        Ok(cid)
    }

    fn gateway_url(&self, cid: &str) -> String {
        format!("https://gateway.test/ipfs/{}", cid)
    }
}
