//! Shared types for composing DOT transactions

use crate::signature::SignedPayload;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Chain material required for building the signing payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    /// Chain genesis hash (e.g., "0x91b171bb158e2d...")
    pub genesis_hash: String,
    /// Runtime spec version
    pub spec_version: u32,
    /// Transaction format version
    pub tx_version: u32,
}

/// Transaction era (mortal or immortal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Era {
    /// Immortal transaction (never expires)
    Immortal,
    /// Mortal transaction with period and phase
    Mortal { period: u64, phase: u64 },
}

impl Era {
    /// Mortal era anchored at `current` block, valid for `period` blocks
    ///
    /// The period is rounded up to a power of two in `[4, 65536]` and the
    /// phase is quantized the way the runtime decodes it.
    pub fn mortal(current: u64, period: u64) -> Self {
        let period = period
            .checked_next_power_of_two()
            .unwrap_or(1 << 16)
            .clamp(4, 1 << 16);
        let quantize_factor = (period >> 12).max(1);
        let phase = current % period / quantize_factor * quantize_factor;
        Era::Mortal { period, phase }
    }

}

/// Head of the chain as seen by the chain client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Block hash (0x-prefixed hex)
    pub hash: String,
    /// Block number
    pub number: u64,
}

/// Everything that must be identical between building a payload and
/// finalizing it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningOptions {
    /// Hash of the block the era is anchored at
    pub block_hash: String,
    /// Mortality window
    pub era: Era,
    /// Account nonce
    pub nonce: u64,
    /// Tip (in planck)
    #[serde(serialize_with = "serialize_u128", deserialize_with = "deserialize_u128")]
    pub tip: u128,
}

fn serialize_u128<S>(value: &u128, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

/// Deserialize u128 from either a number or string
fn deserialize_u128<'de, D>(deserializer: D) -> Result<u128, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum U128Repr {
        Number(u64),
        String(String),
    }

    match U128Repr::deserialize(deserializer)? {
        U128Repr::Number(n) => Ok(n as u128),
        U128Repr::String(s) => s.parse().map_err(de::Error::custom),
    }
}

/// Where a compose request is in the two round-trip workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComposePhase {
    /// Payload built, waiting for an external signature
    SignatureRequired,
    /// Signed transaction ready for broadcast
    TransactionReady,
}

/// What the caller has to sign, and the session to quote when returning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedPayload {
    /// Blake2-256 hash of a long payload, or the placeholder signature
    pub unsigned: String,
    /// Session key correlating this payload with the finalize call
    pub session: String,
    /// Exact bytes handed to the signing callback (hex)
    pub signing_payload: String,
}

/// Response of either compose round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeResult {
    pub phase: ComposePhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<UnsignedPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx: Option<String>,
}

impl ComposeResult {
    pub fn signature_required(payload: UnsignedPayload) -> Self {
        ComposeResult {
            phase: ComposePhase::SignatureRequired,
            payload: Some(payload),
            tx: None,
        }
    }

    pub fn transaction_ready(tx: String) -> Self {
        ComposeResult {
            phase: ComposePhase::TransactionReady,
            payload: None,
            tx: Some(tx),
        }
    }
}

/// Request body of the compose operation
///
/// Without a `signature` the request starts round 1; with one it finalizes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComposeRequest {
    pub account: Option<String>,
    pub target: Option<String>,
    pub params: Option<Vec<String>>,
    pub signature: Option<SignedPayload>,
}
