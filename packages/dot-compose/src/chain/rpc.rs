//! JSON-RPC chain client for Substrate nodes

use crate::chain::call::encode_call;
use crate::chain::{ChainClient, SignableCall};
use crate::config::RpcConfig;
use crate::error::DotError;
use crate::extrinsic::Extrinsic;
use crate::types::{BlockInfo, Material};
use async_trait::async_trait;
use parity_scale_codec::Decode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use subxt_core::metadata::Metadata;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Chain material and metadata, fetched once per client
struct Runtime {
    material: Material,
    metadata: Metadata,
}

/// [`ChainClient`] backed by a node's HTTP JSON-RPC endpoint
pub struct RpcChainClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
    runtime: OnceCell<Runtime>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

impl<T> RpcResponse<T> {
    fn into_result(self, method: &str) -> Result<T, DotError> {
        if let Some(error) = self.error {
            return Err(DotError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        self.result
            .ok_or_else(|| DotError::InvalidInput(format!("{} returned no result", method)))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuntimeVersion {
    spec_name: String,
    spec_version: u32,
    transaction_version: u32,
}

#[derive(Debug, Deserialize)]
struct Header {
    number: String,
}

impl RpcChainClient {
    pub fn new(config: RpcConfig) -> Result<Self, DotError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(RpcChainClient {
            http,
            url: config.url,
            next_id: AtomicU64::new(1),
            runtime: OnceCell::new(),
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, DotError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, "rpc request");

        let response: RpcResponse<T> = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response.into_result(method)
    }

    async fn runtime(&self) -> Result<&Runtime, DotError> {
        self.runtime.get_or_try_init(|| self.fetch_runtime()).await
    }

    async fn fetch_runtime(&self) -> Result<Runtime, DotError> {
        let (genesis_hash, version, metadata_hex) = tokio::try_join!(
            self.request::<String>("chain_getBlockHash", json!([0])),
            self.request::<RuntimeVersion>("state_getRuntimeVersion", json!([])),
            self.request::<String>("state_getMetadata", json!([])),
        )?;

        let bytes = hex::decode(metadata_hex.trim_start_matches("0x"))
            .map_err(|e| DotError::InvalidInput(format!("Invalid metadata hex: {}", e)))?;
        let metadata = Metadata::decode(&mut &bytes[..])?;

        info!(
            spec_name = %version.spec_name,
            spec_version = version.spec_version,
            tx_version = version.transaction_version,
            "loaded runtime metadata"
        );

        Ok(Runtime {
            material: Material {
                genesis_hash,
                spec_version: version.spec_version,
                tx_version: version.transaction_version,
            },
            metadata,
        })
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn current_block(&self) -> Result<BlockInfo, DotError> {
        let header: Header = self.request("chain_getHeader", json!([])).await?;
        let number = parse_block_number(&header.number)?;
        let hash: String = self.request("chain_getBlockHash", json!([number])).await?;
        Ok(BlockInfo { hash, number })
    }

    async fn account_nonce(&self, account: &str) -> Result<u64, DotError> {
        self.request("system_accountNextIndex", json!([account])).await
    }

    async fn build_call(
        &self,
        module: &str,
        call: &str,
        params: &[String],
    ) -> Result<Box<dyn SignableCall>, DotError> {
        let runtime = self.runtime().await?;
        let call_data = encode_call(&runtime.metadata, module, call, params)?;
        Ok(Box::new(Extrinsic::new(call_data, runtime.material.clone())))
    }
}

/// Block numbers come back as 0x-prefixed hex
fn parse_block_number(number: &str) -> Result<u64, DotError> {
    u64::from_str_radix(number.trim_start_matches("0x"), 16)
        .map_err(|e| DotError::InvalidInput(format!("Invalid block number {}: {}", number, e)))
}
