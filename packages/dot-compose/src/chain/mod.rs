//! Chain client collaborator
//!
//! The compose service never talks to a node directly; it goes through a
//! [`ChainClient`] for chain state and call building, and signs through the
//! [`SignableCall`] it gets back.

pub mod call;
pub mod rpc;

use crate::error::DotError;
use crate::signer::Signer;
use crate::types::{BlockInfo, SigningOptions};
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

pub use rpc::RpcChainClient;

/// Access to chain state and call construction
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current head of the chain
    async fn current_block(&self) -> Result<BlockInfo, DotError>;

    /// Next nonce of `account`
    async fn account_nonce(&self, account: &str) -> Result<u64, DotError>;

    /// Build `module.call(params...)`; params are forwarded untouched
    async fn build_call(
        &self,
        module: &str,
        call: &str,
        params: &[String],
    ) -> Result<Box<dyn SignableCall>, DotError>;
}

/// A call that can be signed through a signing callback
#[async_trait]
pub trait SignableCall: Send + Sync {
    /// Sign as `account` with `options`, invoking `signer` for the signature
    async fn sign(
        &mut self,
        account: &str,
        options: &SigningOptions,
        signer: &dyn Signer,
    ) -> Result<(), DotError>;

    /// Hex encoded extrinsic
    fn to_hex(&self) -> String;
}
