//! Signing callback used while building an extrinsic

use crate::error::DotError;
use crate::extrinsic::{blake2_256, MAX_UNHASHED_PAYLOAD};
use crate::signature::{self, Signature};
use async_trait::async_trait;
use std::sync::Mutex;

/// What a signer hands back to the extrinsic builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerResult {
    /// Request id; -1 marks a placeholder result
    pub id: i64,
    /// Encoded `MultiSignature` (tag byte followed by the signature)
    pub signature: Vec<u8>,
}

/// Signing callback invoked with the raw signing payload
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign_raw(&self, payload: &[u8]) -> Result<SignerResult, DotError>;
}

/// Signer that never holds a key
///
/// Without a signature it answers with the placeholder and records what the
/// caller has to sign. With a signature it injects that signature verbatim.
#[derive(Debug)]
pub struct OfflineSigner {
    signature: Option<Signature>,
    recorded: Mutex<Recorded>,
}

/// What round 1 observed when the signer was invoked
#[derive(Debug)]
struct Recorded {
    /// Raw payload handed to the signer
    payload: Vec<u8>,
    /// Hash of a long payload, or the placeholder
    unsigned: Vec<u8>,
}

impl OfflineSigner {
    /// Round 1: no signature known yet
    pub fn unsigned() -> Self {
        OfflineSigner {
            signature: None,
            recorded: Mutex::new(Recorded::new()),
        }
    }

    /// Round 2: inject a caller-supplied signature
    pub fn with_signature(signature: Signature) -> Self {
        OfflineSigner {
            signature: Some(signature),
            recorded: Mutex::new(Recorded::new()),
        }
    }

    /// Value the caller has to sign, 0x-prefixed hex
    ///
    /// Only meaningful once the signer has been invoked without a signature.
    pub fn unsigned_payload(&self) -> String {
        format!("0x{}", hex::encode(&self.recorded().unsigned))
    }

    /// Raw signing payload seen in round 1, 0x-prefixed hex
    pub fn signing_payload(&self) -> String {
        format!("0x{}", hex::encode(&self.recorded().payload))
    }

    fn recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Recorded {
    fn new() -> Self {
        Recorded {
            payload: Vec::new(),
            unsigned: signature::placeholder().to_vec(),
        }
    }
}

#[async_trait]
impl Signer for OfflineSigner {
    async fn sign_raw(&self, payload: &[u8]) -> Result<SignerResult, DotError> {
        if let Some(signature) = &self.signature {
            return Ok(SignerResult {
                id: 0,
                signature: signature::encode(signature)?,
            });
        }

        let unsigned = if payload.len() > MAX_UNHASHED_PAYLOAD {
            blake2_256(payload).to_vec()
        } else {
            signature::placeholder().to_vec()
        };
        *self.recorded() = Recorded {
            payload: payload.to_vec(),
            unsigned,
        };

        Ok(SignerResult {
            id: -1,
            signature: signature::placeholder().to_vec(),
        })
    }
}
