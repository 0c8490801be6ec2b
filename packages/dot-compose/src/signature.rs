//! Signature codec
//!
//! Encodes an externally produced signature into the `MultiSignature`
//! segment of a signed extrinsic: one algorithm tag byte followed by the raw
//! signature bytes.

use crate::error::DotError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

/// Tag byte of `MultiSignature::Ed25519`
pub const ED25519_TAG: u8 = 0x00;
/// Tag byte of `MultiSignature::Sr25519`
pub const SR25519_TAG: u8 = 0x01;
/// Largest signature payload among the supported schemes
pub const SIGNATURE_LEN: usize = 64;

/// Signature scheme named by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureType {
    Ed25519,
    Sr25519,
    Ecdsa,
    /// Anything else; encoded with the sr25519 tag
    Other(String),
}

/// How a signature type was mapped to its wire tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagResolution {
    /// The scheme's own tag
    Exact,
    /// ECDSA shares the sr25519 tag on this chain family
    EcdsaAlias,
    /// Unrecognized scheme, sr25519 tag assumed
    UnknownFallback,
}

impl SignatureType {
    /// Wire tag for this scheme, and whether a fallback was taken
    pub fn wire_tag(&self) -> (u8, TagResolution) {
        match self {
            SignatureType::Ed25519 => (ED25519_TAG, TagResolution::Exact),
            SignatureType::Sr25519 => (SR25519_TAG, TagResolution::Exact),
            SignatureType::Ecdsa => (SR25519_TAG, TagResolution::EcdsaAlias),
            SignatureType::Other(_) => (SR25519_TAG, TagResolution::UnknownFallback),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SignatureType::Ed25519 => "ed25519",
            SignatureType::Sr25519 => "sr25519",
            SignatureType::Ecdsa => "ecdsa",
            SignatureType::Other(other) => other,
        }
    }
}

impl From<&str> for SignatureType {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "ed25519" => SignatureType::Ed25519,
            "sr25519" => SignatureType::Sr25519,
            "ecdsa" => SignatureType::Ecdsa,
            _ => SignatureType::Other(s.to_string()),
        }
    }
}

impl Serialize for SignatureType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SignatureType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(SignatureType::from(s.as_str()))
    }
}

/// Signature supplied by the caller in round 2
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(rename = "type")]
    pub signature_type: SignatureType,
    /// Hex encoded signature, with or without 0x prefix
    pub value: String,
}

/// Signature together with the session it answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayload {
    #[serde(flatten)]
    pub signature: Signature,
    pub session: String,
}

/// Encode a signature as `tag || signature bytes`
pub fn encode(signature: &Signature) -> Result<Vec<u8>, DotError> {
    let value = signature
        .value
        .strip_prefix("0x")
        .unwrap_or(&signature.value);
    let payload = hex::decode(value)
        .map_err(|e| DotError::InvalidSignature(format!("Invalid hex: {}", e)))?;

    let (tag, resolution) = signature.signature_type.wire_tag();
    match resolution {
        TagResolution::Exact => {}
        TagResolution::EcdsaAlias => {
            warn!("encoding ecdsa signature with the sr25519 tag");
        }
        TagResolution::UnknownFallback => {
            warn!(
                signature_type = signature.signature_type.as_str(),
                "unknown signature type, assuming sr25519"
            );
        }
    }

    let mut encoded = Vec::with_capacity(1 + payload.len());
    encoded.push(tag);
    encoded.extend_from_slice(&payload);
    Ok(encoded)
}

/// All-zero sr25519 signature, used to keep the extrinsic length stable
/// before the real signature is known
pub fn placeholder() -> [u8; 1 + SIGNATURE_LEN] {
    let mut blank = [0u8; 1 + SIGNATURE_LEN];
    blank[0] = SR25519_TAG;
    blank
}
