//! dot-compose: offline transaction composition for Polkadot/Substrate chains
//!
//! Two round trips build a signed extrinsic without the service ever
//! holding a private key:
//! - **Round 1** (`build_unsigned`): build the signing payload, return what
//!   to sign and a session key
//! - **Round 2** (`finalize`): inject the external signature using the
//!   session's signing options and return the signed extrinsic
//!
//! # Architecture
//!
//! - **Protocol layer** (`compose`, `session`, `signer`, `signature`):
//!   the handshake itself, independent of any node
//! - **Chain layer** (`chain/*`, `extrinsic`): chain state, call encoding
//!   and extrinsic assembly behind the `ChainClient` trait

pub mod address;
pub mod chain;
pub mod compose;
pub mod config;
pub mod error;
pub mod extrinsic;
pub mod session;
pub mod signature;
pub mod signer;
pub mod types;

// Re-export main types for convenience
pub use chain::{ChainClient, RpcChainClient, SignableCall};
pub use compose::ComposeService;
pub use config::{ComposeConfig, RpcConfig};
pub use error::{ComposeError, DotError, ErrorResponse};
pub use extrinsic::Extrinsic;
pub use session::{Session, SessionStore};
pub use signature::{Signature, SignatureType, SignedPayload};
pub use signer::{OfflineSigner, Signer, SignerResult};
pub use types::{ComposePhase, ComposeRequest, ComposeResult, Era, SigningOptions};
