//! Signing-capable DOT extrinsic
//!
//! Builds the signing payload for a call, hands it to a [`Signer`] and
//! assembles the signed extrinsic from whatever signature comes back.

use crate::address::account_id;
use crate::chain::SignableCall;
use crate::error::DotError;
use crate::signature::SIGNATURE_LEN;
use crate::signer::Signer;
use crate::types::{Era, Material, SigningOptions};
use async_trait::async_trait;
use blake2::{digest::consts::U32, Blake2b, Digest};
use parity_scale_codec::{Compact, Decode, Encode};

/// Signing payloads longer than this are hashed before signing
pub const MAX_UNHASHED_PAYLOAD: usize = 256;

/// Version byte of a signed v4 extrinsic
const SIGNED_V4: u8 = 0x84;
/// Version byte of an unsigned v4 extrinsic
const UNSIGNED_V4: u8 = 0x04;
/// `MultiAddress::Id`
const ADDRESS_ID: u8 = 0x00;

/// Signature section of a signed extrinsic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedParts {
    pub signer: [u8; 32],
    /// Encoded `MultiSignature` (tag byte followed by the signature)
    pub signature: Vec<u8>,
    pub era: Era,
    pub nonce: u64,
    pub tip: u128,
}

/// A call ready to be signed for a specific chain
#[derive(Debug, Clone)]
pub struct Extrinsic {
    call_data: Vec<u8>,
    material: Material,
    signed: Option<SignedParts>,
}

impl Extrinsic {
    pub fn new(call_data: Vec<u8>, material: Material) -> Self {
        Extrinsic {
            call_data,
            material,
            signed: None,
        }
    }

    /// SCALE encoded call
    pub fn call_data(&self) -> &[u8] {
        &self.call_data
    }

    pub fn signed(&self) -> Option<&SignedParts> {
        self.signed.as_ref()
    }

    /// Bytes the account has to sign for `options`
    pub fn signing_payload(&self, options: &SigningOptions) -> Result<Vec<u8>, DotError> {
        let mut payload = self.call_data.clone();
        encode_era(&options.era, &mut payload);
        Compact(options.nonce).encode_to(&mut payload);
        Compact(options.tip).encode_to(&mut payload);
        self.material.spec_version.encode_to(&mut payload);
        self.material.tx_version.encode_to(&mut payload);
        payload.extend_from_slice(&parse_hex_hash(&self.material.genesis_hash)?);
        payload.extend_from_slice(&parse_hex_hash(&options.block_hash)?);
        Ok(payload)
    }

    /// Serialize to extrinsic bytes (length prefixed)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = Vec::new();
        match &self.signed {
            Some(parts) => {
                body.push(SIGNED_V4);
                body.push(ADDRESS_ID);
                body.extend_from_slice(&parts.signer);
                body.extend_from_slice(&parts.signature);
                encode_era(&parts.era, &mut body);
                Compact(parts.nonce).encode_to(&mut body);
                Compact(parts.tip).encode_to(&mut body);
            }
            None => body.push(UNSIGNED_V4),
        }
        body.extend_from_slice(&self.call_data);

        let mut result = Compact(body.len() as u32).encode();
        result.extend(body);
        result
    }

    /// Split raw extrinsic bytes into the signature section and the call
    pub fn parse(bytes: &[u8]) -> Result<(Option<SignedParts>, Vec<u8>), DotError> {
        let mut input = bytes;
        let Compact(length) = Compact::<u32>::decode(&mut input)?;
        if length as usize != input.len() {
            return Err(DotError::InvalidInput(format!(
                "Length prefix {} does not match body length {}",
                length,
                input.len()
            )));
        }

        let version = u8::decode(&mut input)?;
        if version & 0x80 == 0 {
            return Ok((None, input.to_vec()));
        }

        if u8::decode(&mut input)? != ADDRESS_ID {
            return Err(DotError::InvalidInput(
                "Unsupported address type".to_string(),
            ));
        }
        let signer = <[u8; 32]>::decode(&mut input)?;

        let tag = u8::decode(&mut input)?;
        // ECDSA signatures carry a recovery byte
        let signature_len = if tag == 0x02 { 65 } else { 64 };
        if input.len() < signature_len {
            return Err(DotError::InvalidInput("Truncated signature".to_string()));
        }
        let mut signature = vec![tag];
        signature.extend_from_slice(&input[..signature_len]);
        input = &input[signature_len..];

        let era = decode_era(&mut input)?;
        let Compact(nonce) = Compact::<u64>::decode(&mut input)?;
        let Compact(tip) = Compact::<u128>::decode(&mut input)?;

        let parts = SignedParts {
            signer,
            signature,
            era,
            nonce,
            tip,
        };
        Ok((Some(parts), input.to_vec()))
    }
}

#[async_trait]
impl SignableCall for Extrinsic {
    async fn sign(
        &mut self,
        account: &str,
        options: &SigningOptions,
        signer: &dyn Signer,
    ) -> Result<(), DotError> {
        let signer_id = account_id(account)?;
        let payload = self.signing_payload(options)?;
        let result = signer.sign_raw(&payload).await?;
        if result.signature.len() < 1 + SIGNATURE_LEN {
            return Err(DotError::Signer(format!(
                "signer {} returned {} signature bytes",
                result.id,
                result.signature.len()
            )));
        }

        self.signed = Some(SignedParts {
            signer: signer_id,
            signature: result.signature,
            era: options.era,
            nonce: options.nonce,
            tip: options.tip,
        });
        Ok(())
    }

    fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }
}

/// Encode era
fn encode_era(era: &Era, out: &mut Vec<u8>) {
    match era {
        Era::Immortal => out.push(0x00),
        Era::Mortal { period, phase } => {
            let quantize_factor = (period >> 12).max(1);
            let low = (period.trailing_zeros().saturating_sub(1)).clamp(1, 15) as u16;
            let high = ((phase / quantize_factor) << 4) as u16;
            out.extend_from_slice(&(low | high).to_le_bytes());
        }
    }
}

/// Decode era
fn decode_era(input: &mut &[u8]) -> Result<Era, DotError> {
    let first = u8::decode(input)?;
    if first == 0x00 {
        return Ok(Era::Immortal);
    }
    let second = u8::decode(input)?;
    let encoded = u16::from_le_bytes([first, second]) as u64;
    let period = 2u64 << (encoded % (1 << 4));
    let quantize_factor = (period >> 12).max(1);
    let phase = (encoded >> 4) * quantize_factor;
    if period < 4 || phase >= period {
        return Err(DotError::InvalidInput("Invalid mortal era".to_string()));
    }
    Ok(Era::Mortal { period, phase })
}

/// Parse hex string to 32-byte hash
pub(crate) fn parse_hex_hash(hex_str: &str) -> Result<[u8; 32], DotError> {
    let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    let bytes =
        hex::decode(hex_str).map_err(|e| DotError::InvalidInput(format!("Invalid hex: {}", e)))?;
    bytes.try_into().map_err(|v: Vec<u8>| {
        DotError::InvalidInput(format!("Hash must be 32 bytes, got {}", v.len()))
    })
}

/// Blake2-256 hash
pub fn blake2_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(data);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hasher.finalize());
    hash
}
