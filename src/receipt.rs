//! Purchase receipts and where they are stored.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::bridge::protocol::ProductData;
use crate::config::StorageConfig;

pub const RECEIPT_VERSION: &str = "1.0";
pub const RECEIPT_TYPE: &str = "purchase_receipt";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptDocument {
    pub version: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub product_id: String,
    pub buyer_address: String,
    /// Human-readable amount, e.g. "359.88"
    pub amount: String,
    /// Amount in the token's smallest unit
    pub amount_raw: String,
    pub currency: String,
    pub chain_id: u64,
    pub payment_token: String,
    /// RFC 3339
    pub timestamp: String,
    pub product_details: ProductData,
}

impl ReceiptDocument {
    pub fn to_bytes(&self) -> Result<Vec<u8>, ReceiptError> {
        serde_json::to_vec(self).map_err(|e| ReceiptError::Serialize(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReceiptError {
    #[error("no receipt storage API key configured")]
    MissingApiKey,
    #[error("upload request failed: {0}")]
    Http(String),
    #[error("upload rejected with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("upload response carried no CID")]
    MissingCid,
    #[error("could not serialize receipt: {0}")]
    Serialize(String),
}

/// Content-addressed storage for receipt documents.
#[async_trait]
pub trait ReceiptStore: Send + Sync {
    /// Uploads the document and returns its CID.
    async fn upload(&self, document: &ReceiptDocument) -> Result<String, ReceiptError>;

    fn gateway_url(&self, cid: &str) -> String;
}

/// Lighthouse `api/v0/add` uploader.
pub struct LighthouseStore {
    client: Client,
    config: StorageConfig,
}

impl LighthouseStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl ReceiptStore for LighthouseStore {
    async fn upload(&self, document: &ReceiptDocument) -> Result<String, ReceiptError> {
        let api_key = self.config.api_key.as_ref().ok_or(ReceiptError::MissingApiKey)?;

        log::info!("[Lighthouse] Uploading receipt for product {}", document.product_id);
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(document)
            .send()
            .await
            .map_err(|e| ReceiptError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReceiptError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ReceiptError::Http(format!("invalid JSON response: {}", e)))?;
        let cid = cid_from_response(&json)?;
        log::info!("[Lighthouse] Receipt stored as {}", cid);
        Ok(cid)
    }

    fn gateway_url(&self, cid: &str) -> String {
        format!("{}/{}", self.config.gateway.trim_end_matches('/'), cid)
    }
}

/// Lighthouse answers with `{ "Hash": .. }`; some gateways use `cid`.
pub fn cid_from_response(json: &Value) -> Result<String, ReceiptError> {
    json.get("Hash")
        .or_else(|| json.get("cid"))
        .and_then(Value::as_str)
        .filter(|cid| !cid.is_empty())
        .map(str::to_string)
        .ok_or(ReceiptError::MissingCid)
}

/// CIDv0-shaped identifier for a document that could not be uploaded:
/// base58 of the sha2-256 multihash of its bytes.
pub fn placeholder_cid(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut multihash = Vec::with_capacity(34);
    multihash.push(0x12);
    multihash.push(0x20);
    multihash.extend_from_slice(&digest);
    bs58::encode(multihash).into_string()
}

/// Outcome of best-effort receipt persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredReceipt {
    pub cid: String,
    pub url: String,
    pub uploaded: bool,
}

/// Uploads the receipt, falling back to a placeholder CID on any failure.
pub async fn persist_receipt(store: &dyn ReceiptStore, document: &ReceiptDocument) -> StoredReceipt {
    match store.upload(document).await {
        Ok(cid) => StoredReceipt {
            url: store.gateway_url(&cid),
            cid,
            uploaded: true,
        },
        Err(e) => {
            log::warn!("[Lighthouse] Receipt upload failed, using placeholder CID: {}", e);
            let bytes = document.to_bytes().unwrap_or_default();
            let cid = placeholder_cid(&bytes);
            StoredReceipt {
                url: store.gateway_url(&cid),
                cid,
                uploaded: false,
            }
        }
    }
}
