//! Pay-for-product sequence run inside the page context.
//!
//! Steps run strictly in order: preflight, amount resolution, receipt
//! persistence, allowance check (approve if needed), transfer, result
//! assembly. The first failure stops the sequence and is reported together
//! with whatever was already done (e.g. a submitted approval).

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolEvent;
use serde::{Deserialize, Serialize};

use crate::amount::{format_units, to_smallest_unit, AmountError};
use crate::bridge::protocol::{BuyerPayments, PaymentDetails, ProductData};
use crate::config::{chain_name, BridgeConfig, PaymentRoute, Registry, TokenConfig};
use crate::contracts::{IPaymentProcessor, PaymentRecord, IERC20};
use crate::error::{BridgeError, ErrorCode};
use crate::receipt::{persist_receipt, ReceiptDocument, ReceiptStore, RECEIPT_TYPE, RECEIPT_VERSION};
use crate::wallet::{TxReceipt, WalletClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStep {
    Preflight,
    AmountResolution,
    ReceiptPersistence,
    AllowanceCheck,
    Transfer,
    ResultAssembly,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_paid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_raw: Option<String>,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_cid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
    #[serde(default)]
    pub receipt_uploaded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_wallet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    #[serde(default)]
    pub simulated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<PaymentStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
}

/// A payment that stopped early, with the partial result.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentFailure {
    pub error: BridgeError,
    pub result: PaymentResult,
}

/// Everything preflight establishes.
struct Checked<'r> {
    wallet: &'r WalletClient,
    buyer: Address,
    chain_id: u64,
    token: &'r TokenConfig,
    token_address: Address,
}

pub struct PaymentOrchestrator<'a> {
    wallet: Option<&'a WalletClient>,
    reader: Option<&'a WalletClient>,
    registry: &'a Registry,
    config: &'a BridgeConfig,
    store: &'a dyn ReceiptStore,
}

impl<'a> PaymentOrchestrator<'a> {
    pub fn new(
        wallet: Option<&'a WalletClient>,
        registry: &'a Registry,
        config: &'a BridgeConfig,
        store: &'a dyn ReceiptStore,
    ) -> Self {
        Self {
            wallet,
            reader: None,
            registry,
            config,
            store,
        }
    }

    /// Watch confirmations through `reader` instead of the wallet.
    pub fn with_reader(mut self, reader: Option<&'a WalletClient>) -> Self {
        self.reader = reader;
        self
    }

    pub async fn process(
        &self,
        product: &ProductData,
        payment_method: &str,
        wallet_address: &str,
    ) -> Result<PaymentResult, PaymentFailure> {
        log::info!(
            "[Payment] Starting {} payment for {} from {}",
            payment_method,
            product.receipt_id(),
            wallet_address
        );

        let mut result = PaymentResult {
            currency: payment_method.to_uppercase(),
            ..Default::default()
        };
        let mut step = PaymentStep::Preflight;

        match self
            .run(product, payment_method, wallet_address, &mut result, &mut step)
            .await
        {
            Ok(()) => Ok(result),
            Err(error) => {
                log::error!("[Payment] Failed at {:?}: {}", step, error);
                result.success = false;
                result.error = Some(error.to_string());
                result.error_code = Some(error.code());
                result.failed_step = Some(step);
                Err(PaymentFailure { error, result })
            }
        }
    }

    async fn run(
        &self,
        product: &ProductData,
        payment_method: &str,
        wallet_address: &str,
        result: &mut PaymentResult,
        step: &mut PaymentStep,
    ) -> Result<(), BridgeError> {
        *step = PaymentStep::Preflight;
        let checked = self.preflight(payment_method, wallet_address).await?;
        let token = checked.token;
        result.currency = token.symbol.clone();
        result.payment_token = Some(token.contract_address.clone());
        result.merchant_wallet = Some(self.config.payment.merchant_wallet.to_string());

        *step = PaymentStep::AmountResolution;
        let amount = resolve_amount(product, token.decimals)?;
        let amount_display = format_units(amount, token.decimals);
        result.amount_paid = Some(amount_display.clone());
        result.amount_raw = Some(amount.to_string());
        log::info!("[Payment] Amount: {} {} ({} units)", amount_display, token.symbol, amount);

        *step = PaymentStep::ReceiptPersistence;
        let document = ReceiptDocument {
            version: RECEIPT_VERSION.to_string(),
            kind: RECEIPT_TYPE.to_string(),
            product_id: product.receipt_id(),
            buyer_address: checked.buyer.to_string(),
            amount: amount_display,
            amount_raw: amount.to_string(),
            currency: token.symbol.clone(),
            chain_id: checked.chain_id,
            payment_token: token.contract_address.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            product_details: product.clone(),
        };
        let stored = persist_receipt(self.store, &document).await;
        result.receipt_cid = Some(stored.cid.clone());
        result.receipt_url = Some(stored.url);
        result.receipt_uploaded = stored.uploaded;

        if self.config.payment.simulation_mode {
            log::warn!("[Payment] Simulation mode: no transactions sent");
            result.simulated = true;
            result.success = true;
            return Ok(());
        }

        *step = PaymentStep::AllowanceCheck;
        let merchant = self.config.payment.merchant_wallet;
        let spender = self.config.payment.route.spender(merchant);
        self.ensure_allowance(&checked, spender, amount, result).await?;

        *step = PaymentStep::Transfer;
        let tx_hash = match self.config.payment.route {
            PaymentRoute::Direct => {
                let call = IERC20::transferCall { to: merchant, amount };
                checked
                    .wallet
                    .send_transaction(checked.buyer, checked.token_address, &call)
                    .await
            }
            PaymentRoute::Processor { address } => {
                let call = IPaymentProcessor::processPaymentCall {
                    productId: document.product_id.clone(),
                    amount,
                    receiptCid: stored.cid.clone(),
                    paymentToken: checked.token_address,
                    currency: token.symbol.clone(),
                };
                checked.wallet.send_transaction(checked.buyer, address, &call).await
            }
        }
        .map_err(|e| keep_or_wrap(e, BridgeError::TransferFailed))?;
        log::info!("[Payment] Payment transaction sent: {}", tx_hash);
        result.tx_hash = Some(tx_hash.clone());

        let receipt = match self.confirm(checked.wallet, &tx_hash).await {
            Some(receipt) if receipt.succeeded() => receipt,
            Some(_) => {
                return Err(BridgeError::TransferFailed(format!(
                    "transaction {} reverted",
                    tx_hash
                )))
            }
            None => return Err(BridgeError::TransferTimeout { tx_hash }),
        };

        *step = PaymentStep::ResultAssembly;
        result.block_number = receipt.block_number;
        result.explorer_url = self
            .registry
            .network(checked.chain_id)
            .map(|network| network.tx_url(&tx_hash));
        if let PaymentRoute::Processor { address } = self.config.payment.route {
            match find_payment_event(&receipt, address) {
                Some(event) => {
                    result.payment_id = Some(event.paymentId.to_string());
                    result.receipt_id = Some(event.receiptId.to_string());
                }
                None => log::warn!("[Payment] No PaymentProcessed event in {}", tx_hash),
            }
        }
        result.success = true;
        log::info!(
            "[Payment] Payment confirmed in block {:?}: {}",
            receipt.block_number,
            tx_hash
        );
        Ok(())
    }

    async fn preflight(
        &self,
        payment_method: &str,
        wallet_address: &str,
    ) -> Result<Checked<'a>, BridgeError> {
        let wallet = self.wallet.ok_or(BridgeError::Unavailable)?;

        let accounts = wallet.accounts().await?;
        if accounts.is_empty() {
            return Err(BridgeError::NotConnected(
                "No accounts connected. Please connect your wallet first.".to_string(),
            ));
        }
        if !accounts.iter().any(|a| a.eq_ignore_ascii_case(wallet_address)) {
            return Err(BridgeError::NotConnected(format!(
                "Wallet {} is not connected to this page",
                wallet_address
            )));
        }
        let buyer: Address = wallet_address
            .parse()
            .map_err(|_| BridgeError::InvalidRequest(format!("Invalid wallet address {}", wallet_address)))?;

        let chain_id = wallet.chain_id().await?;
        self.expect_payment_chain(chain_id)?;

        let token = self
            .registry
            .token(chain_id, payment_method)
            .ok_or_else(|| BridgeError::UnsupportedToken {
                symbol: payment_method.to_string(),
                chain_id,
            })?;
        let token_address = token
            .address()
            .map_err(|e| BridgeError::InvalidRequest(e.to_string()))?;

        let reserve = self.config.payment.min_gas_reserve;
        if !reserve.is_zero() {
            let native = wallet.balance(buyer).await?;
            if native < reserve {
                let (symbol, decimals) = self.registry.native_currency(chain_id);
                return Err(BridgeError::InsufficientGas(format!(
                    "You have {} {} but at least {} {} is needed.",
                    format_units(native, decimals),
                    symbol,
                    format_units(reserve, decimals),
                    symbol
                )));
            }
        }

        Ok(Checked {
            wallet,
            buyer,
            chain_id,
            token,
            token_address,
        })
    }

    async fn ensure_allowance(
        &self,
        checked: &Checked<'a>,
        spender: Address,
        amount: U256,
        result: &mut PaymentResult,
    ) -> Result<(), BridgeError> {
        let wallet = checked.wallet;
        let token = checked.token;
        let allowance_call = IERC20::allowanceCall {
            owner: checked.buyer,
            spender,
        };

        let allowance = wallet.call(checked.token_address, &allowance_call).await?._0;
        // Read on every run, so a standing allowance never lets a transfer
        // through that the balance cannot cover.
        let balance = wallet
            .call(checked.token_address, &IERC20::balanceOfCall { owner: checked.buyer })
            .await?
            ._0;

        if balance < amount {
            return Err(BridgeError::InsufficientBalance {
                symbol: token.symbol.clone(),
                available: format_units(balance, token.decimals),
                required: format_units(amount, token.decimals),
            });
        }

        if allowance >= amount {
            log::info!("[Payment] Sufficient allowance already exists");
            return Ok(());
        }

        log::info!("[Payment] Requesting {} approval for {}", token.symbol, spender);
        let approve = IERC20::approveCall { spender, amount };
        let tx_hash = wallet
            .send_transaction(checked.buyer, checked.token_address, &approve)
            .await
            .map_err(|e| keep_or_wrap(e, BridgeError::ApprovalFailed))?;
        result.approval_tx_hash = Some(tx_hash.clone());

        match self.confirm(wallet, &tx_hash).await {
            Some(receipt) if receipt.succeeded() => {
                log::info!("[Payment] Approval confirmed in block {:?}", receipt.block_number);
            }
            Some(_) => {
                return Err(BridgeError::ApprovalFailed(format!(
                    "transaction {} reverted",
                    tx_hash
                )))
            }
            None => return Err(BridgeError::ApprovalTimeout { tx_hash }),
        }

        let allowance = wallet.call(checked.token_address, &allowance_call).await?._0;
        if allowance < amount {
            return Err(BridgeError::ApprovalFailed(format!(
                "allowance is {} {} after approval, {} {} required",
                format_units(allowance, token.decimals),
                token.symbol,
                format_units(amount, token.decimals),
                token.symbol
            )));
        }
        Ok(())
    }

    fn expect_payment_chain(&self, chain_id: u64) -> Result<(), BridgeError> {
        let expected = self.config.payment.chain_id;
        if chain_id == expected {
            return Ok(());
        }
        let expected_name = self
            .registry
            .network(expected)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| chain_name(expected).to_string());
        Err(BridgeError::WrongNetwork {
            expected,
            expected_name,
            actual: chain_id,
        })
    }

    /// Client and address for processor reads. The chain reader is used
    /// as is; the wallet must be on the payment chain.
    async fn processor(&self) -> Result<(&'a WalletClient, Address), BridgeError> {
        let PaymentRoute::Processor { address } = self.config.payment.route else {
            return Err(BridgeError::InvalidRequest(
                "No payment processor configured".to_string(),
            ));
        };
        if let Some(reader) = self.reader {
            return Ok((reader, address));
        }
        let wallet = self.wallet.ok_or(BridgeError::Unavailable)?;
        self.expect_payment_chain(wallet.chain_id().await?)?;
        Ok((wallet, address))
    }

    /// Reads a recorded payment back from the processor.
    pub async fn payment_details(&self, payment_id: U256) -> Result<PaymentDetails, BridgeError> {
        let (client, processor) = self.processor().await?;
        let call = IPaymentProcessor::getPaymentDetailsCall { paymentId: payment_id };
        let record = client.call(processor, &call).await?._0;
        log::info!("[Payment] Read back payment {}", payment_id);
        Ok(payment_details(record))
    }

    pub async fn payments_by_buyer(&self, account: &str) -> Result<BuyerPayments, BridgeError> {
        let buyer: Address = account
            .parse()
            .map_err(|_| BridgeError::InvalidRequest(format!("Invalid account address {}", account)))?;
        let (client, processor) = self.processor().await?;
        let ids = client
            .call(processor, &IPaymentProcessor::getPaymentsByBuyerCall { buyer })
            .await?
            ._0;
        Ok(BuyerPayments {
            buyer: buyer.to_string(),
            payment_ids: ids.iter().map(U256::to_string).collect(),
        })
    }

    async fn confirm(&self, wallet: &WalletClient, tx_hash: &str) -> Option<TxReceipt> {
        self.reader
            .unwrap_or(wallet)
            .wait_for_receipt(tx_hash, self.config.poll_interval, self.config.max_poll_attempts)
            .await
    }
}

/// `usdPrice` wins over the displayed price; the displayed price may carry
/// a foreign currency marker.
pub fn resolve_amount(product: &ProductData, decimals: u8) -> Result<U256, AmountError> {
    if let Some(usd) = product.usd_price.as_deref().filter(|p| !p.trim().is_empty()) {
        return to_smallest_unit(usd, Some("USD"), decimals);
    }
    match product.price.as_deref() {
        Some(price) => to_smallest_unit(price, product.currency.as_deref(), decimals),
        None => Err(AmountError::Missing),
    }
}

/// User rejections and gas shortfalls keep their own kind; everything else
/// becomes the step's failure.
fn keep_or_wrap(err: BridgeError, wrap: fn(String) -> BridgeError) -> BridgeError {
    match err {
        BridgeError::UserRejected(_) | BridgeError::InsufficientGas(_) => err,
        other => wrap(other.to_string()),
    }
}

fn payment_details(record: PaymentRecord) -> PaymentDetails {
    PaymentDetails {
        payment_id: record.paymentId.to_string(),
        buyer: record.buyer.to_string(),
        product_id: record.productId,
        amount: record.amount.to_string(),
        payment_token: record.paymentToken.to_string(),
        currency: record.currency,
        receipt_id: record.receiptId.to_string(),
        receipt_cid: record.receiptCid,
        timestamp: record.timestamp.saturating_to::<u64>(),
        completed: record.completed,
    }
}

fn find_payment_event(
    receipt: &TxReceipt,
    processor: Address,
) -> Option<IPaymentProcessor::PaymentProcessed> {
    receipt
        .logs
        .iter()
        .filter(|log| log.address == processor)
        .filter(|log| log.topics.first() == Some(&IPaymentProcessor::PaymentProcessed::SIGNATURE_HASH))
        .find_map(|log| {
            IPaymentProcessor::PaymentProcessed::decode_raw_log(log.topics.iter().copied(), &log.data, true)
                .ok()
        })
}
