//! # EVM JSON-RPC Ledger Backend
//!
//! Anchors analysis records on an EVM-compatible chain via JSON-RPC.
//!
//! ## How It Works
//!
//! 1. `submit` calls the anchoring contract's
//!    `anchorRecord(bytes32,bytes32,uint64,string)` function via
//!    `eth_sendTransaction`, then polls `eth_getTransactionReceipt` until
//!    the transaction has the configured number of confirmations (default
//!    one) or the submit window elapses.
//! 2. Reads use `eth_call` against the contract's view functions.
//! 3. The JSON-RPC endpoint handles transaction signing. The `from`
//!    address must be unlocked or managed by the RPC provider's signing
//!    service; the node does NOT hold private keys.
//!
//! ## Security
//!
//! - The `from` address must be funded with sufficient native token for gas.
//! - All RPC calls should use HTTPS in production.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use pneuma_core::ContentDigest;

use crate::abi;
use crate::{AnchorRequest, Ledger, LedgerEntry, LedgerError, LedgerReceipt, TxStatus};

/// 4-byte function selector for `anchorRecord(bytes32,bytes32,uint64,string)`.
/// keccak256("anchorRecord(bytes32,bytes32,uint64,string)") = 0x4f0cd27e...
const ANCHOR_RECORD_SELECTOR: &str = "4f0cd27e";

/// 4-byte function selector for `records(uint256)`.
/// keccak256("records(uint256)") = 0x1e7a5029...
const RECORDS_SELECTOR: &str = "1e7a5029";

/// 4-byte function selector for `recordCount()`.
/// keccak256("recordCount()") = 0x8eff3c29...
const RECORD_COUNT_SELECTOR: &str = "8eff3c29";

/// 4-byte function selector for `indexOf(bytes32)`.
/// keccak256("indexOf(bytes32)") = 0x7a1237c6...
const INDEX_OF_SELECTOR: &str = "7a1237c6";

/// Configuration for the EVM ledger backend.
#[derive(Debug, Clone)]
pub struct EvmLedgerConfig {
    /// JSON-RPC endpoint URL (must be HTTPS in production).
    pub rpc_url: String,
    /// Anchoring contract address (0x-prefixed, 40 hex chars).
    pub contract_address: String,
    /// Sender address whose transactions are signed by the RPC provider
    /// (0x-prefixed). This is the node's signing credential.
    pub from_address: String,
    /// Human-readable chain name (e.g., "ethereum", "sepolia").
    pub chain_name: String,
    /// Number of block confirmations required before `submit` returns.
    pub confirmations: u64,
    /// Maximum time `submit` waits for confirmation, in seconds.
    pub submit_timeout_secs: u64,
    /// Interval between receipt polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Per-request HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl EvmLedgerConfig {
    /// Create a configuration with defaults: one confirmation, 120s submit
    /// window, 2s poll interval, 30s request timeout.
    pub fn new(
        rpc_url: impl Into<String>,
        contract_address: impl Into<String>,
        from_address: impl Into<String>,
        chain_name: impl Into<String>,
    ) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            contract_address: contract_address.into(),
            from_address: from_address.into(),
            chain_name: chain_name.into(),
            confirmations: 1,
            submit_timeout_secs: 120,
            poll_interval_ms: 2_000,
            timeout_secs: 30,
        }
    }

    /// Set the confirmation threshold.
    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations;
        self
    }

    /// Set the submit window and poll interval.
    pub fn with_submit_window(mut self, timeout_secs: u64, poll_interval_ms: u64) -> Self {
        self.submit_timeout_secs = timeout_secs;
        self.poll_interval_ms = poll_interval_ms;
        self
    }
}

/// JSON-RPC ledger backend for an EVM anchoring contract.
#[derive(Debug)]
pub struct EvmLedger {
    client: reqwest::Client,
    config: EvmLedgerConfig,
}

impl EvmLedger {
    /// Create a new EVM ledger from configuration.
    pub fn new(config: EvmLedgerConfig) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                LedgerError::Unavailable(format!(
                    "{}: failed to build HTTP client: {e}",
                    config.chain_name
                ))
            })?;

        if !is_valid_eth_address(&config.contract_address) {
            return Err(LedgerError::Rejected(format!(
                "invalid contract address: {}",
                config.contract_address
            )));
        }
        if !is_valid_eth_address(&config.from_address) {
            return Err(LedgerError::Rejected(format!(
                "invalid from address: {}",
                config.from_address
            )));
        }

        Ok(Self { client, config })
    }

    /// Send a JSON-RPC request and return the result field.
    async fn rpc_call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, LedgerError> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp = self
            .client
            .post(&self.config.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LedgerError::Unavailable(format!(
                        "{}: request timed out",
                        self.config.chain_name
                    ))
                } else {
                    LedgerError::Unavailable(format!("{}: {e}", self.config.chain_name))
                }
            })?;

        if !resp.status().is_success() {
            return Err(LedgerError::Unavailable(format!(
                "{}: HTTP {}",
                self.config.chain_name,
                resp.status()
            )));
        }

        let json: serde_json::Value = resp.json().await.map_err(|e| {
            LedgerError::Unavailable(format!(
                "{}: invalid JSON response: {e}",
                self.config.chain_name
            ))
        })?;

        if let Some(error) = json.get("error") {
            let msg = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown RPC error");
            return Err(LedgerError::TransactionFailed(format!(
                "{}: {msg}",
                self.config.chain_name
            )));
        }

        json.get("result").cloned().ok_or_else(|| {
            LedgerError::InvalidResponse(format!(
                "{}: JSON-RPC response missing 'result' field",
                self.config.chain_name
            ))
        })
    }

    /// Call a contract view function and return the hex-encoded result.
    async fn eth_call(&self, data: String) -> Result<String, LedgerError> {
        let call = json!({
            "to": self.config.contract_address,
            "data": data,
        });
        let result = self.rpc_call("eth_call", json!([call, "latest"])).await?;
        result.as_str().map(|s| s.to_string()).ok_or_else(|| {
            LedgerError::InvalidResponse("eth_call returned non-string result".to_string())
        })
    }

    /// Poll for the transaction receipt until confirmed or the submit
    /// window elapses.
    async fn wait_for_confirmation(
        &self,
        tx_hash: &str,
    ) -> Result<LedgerReceipt, LedgerError> {
        let deadline = Duration::from_secs(self.config.submit_timeout_secs);
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        let mut waited = Duration::ZERO;

        loop {
            let receipt = self
                .rpc_call("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;

            if !receipt.is_null() {
                let status_hex = receipt
                    .get("status")
                    .and_then(|s| s.as_str())
                    .unwrap_or("0x0");
                if status_hex == "0x0" {
                    return Err(LedgerError::TransactionFailed(format!(
                        "transaction {tx_hash} reverted"
                    )));
                }

                let tx_block = parse_hex_quantity(&receipt, "blockNumber")?;
                let gas_used = parse_hex_quantity(&receipt, "gasUsed")?;

                let current = self.rpc_call("eth_blockNumber", json!([])).await?;
                let current_block = current
                    .as_str()
                    .and_then(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok())
                    .unwrap_or(0);

                let confirmations = current_block.saturating_sub(tx_block) + 1;
                if confirmations >= self.config.confirmations {
                    return Ok(LedgerReceipt {
                        transaction_id: tx_hash.to_string(),
                        block_number: tx_block,
                        gas_used,
                        status: TxStatus::Confirmed,
                    });
                }
            }

            if waited >= deadline {
                return Err(LedgerError::ConfirmationTimeout {
                    transaction_id: tx_hash.to_string(),
                    waited_secs: waited.as_secs(),
                });
            }
            tokio::time::sleep(poll).await;
            waited += poll;
        }
    }
}

#[async_trait]
impl Ledger for EvmLedger {
    async fn submit(&self, request: AnchorRequest) -> Result<LedgerReceipt, LedgerError> {
        let data = abi::encode_anchor_record(
            ANCHOR_RECORD_SELECTOR,
            request.fingerprint.as_bytes(),
            request.content_id.as_bytes(),
            request.timestamp,
            &request.device_id,
        );

        let tx = json!({
            "from": self.config.from_address,
            "to": self.config.contract_address,
            "data": data,
        });

        let result = self.rpc_call("eth_sendTransaction", json!([tx])).await?;
        let tx_hash = result.as_str().map(|s| s.to_string()).ok_or_else(|| {
            LedgerError::InvalidResponse(
                "eth_sendTransaction returned non-string result".to_string(),
            )
        })?;

        tracing::debug!(
            transaction_id = %tx_hash,
            device_id = %request.device_id,
            "anchor transaction submitted, awaiting confirmation"
        );

        self.wait_for_confirmation(&tx_hash).await
    }

    async fn read(&self, index: u64) -> Result<Option<LedgerEntry>, LedgerError> {
        // The auto-generated array getter reverts on out-of-range access,
        // so bounds are checked against the counter first.
        if index >= self.count().await? {
            return Ok(None);
        }

        let data = abi::encode_uint_call(RECORDS_SELECTOR, index);
        let result = self.eth_call(data).await?;
        let tuple = abi::decode_record(&result)?;

        Ok(Some(LedgerEntry {
            content_id: ContentDigest {
                algorithm: pneuma_core::DigestAlgorithm::Sha256,
                bytes: tuple.content_id,
            },
            fingerprint: ContentDigest {
                algorithm: pneuma_core::DigestAlgorithm::Sha256,
                bytes: tuple.fingerprint,
            },
            timestamp: tuple.timestamp,
            device_id: tuple.device_id,
        }))
    }

    async fn count(&self) -> Result<u64, LedgerError> {
        let data = format!("0x{RECORD_COUNT_SELECTOR}");
        let result = self.eth_call(data).await?;
        abi::decode_uint(&result)
    }

    async fn find(&self, fingerprint: &ContentDigest) -> Result<Option<u64>, LedgerError> {
        let data = abi::encode_bytes32_call(INDEX_OF_SELECTOR, fingerprint.as_bytes());
        let result = self.eth_call(data).await?;
        abi::decode_index_of(&result)
    }

    async fn health(&self) -> Result<(), LedgerError> {
        self.rpc_call("eth_blockNumber", json!([])).await?;
        Ok(())
    }
}

/// Extract a hex quantity field (`"0x..."`) from a receipt object.
fn parse_hex_quantity(receipt: &serde_json::Value, field: &str) -> Result<u64, LedgerError> {
    receipt
        .get(field)
        .and_then(|v| v.as_str())
        .and_then(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok())
        .ok_or_else(|| {
            LedgerError::InvalidResponse(format!("receipt missing hex quantity {field:?}"))
        })
}

/// Validate that a string is a well-formed Ethereum address (0x + 40 hex chars).
fn is_valid_eth_address(addr: &str) -> bool {
    addr.len() == 42
        && addr.starts_with("0x")
        && addr[2..].chars().all(|c| c.is_ascii_hexdigit())
}
