//! SS58 address handling for Polkadot/Substrate chains
//!
//! See: https://docs.substrate.io/reference/address-formats/

use crate::error::DotError;
use blake2::{Blake2b512, Digest};

/// SS58 prefix for checksum calculation
const SS58_PREFIX: &[u8] = b"SS58PRE";

/// Encode a 32-byte account id to SS58 address format
pub fn encode_ss58(account_id: &[u8; 32], prefix: u16) -> Result<String, DotError> {
    let mut payload = encode_prefix(prefix)?;
    payload.extend_from_slice(account_id);

    let checksum = ss58_checksum(&payload);
    payload.extend_from_slice(&checksum[..2]);

    Ok(bs58::encode(&payload).into_string())
}

/// Decode an SS58 address to its account id and network prefix
pub fn decode_ss58(address: &str) -> Result<([u8; 32], u16), DotError> {
    let decoded = bs58::decode(address)
        .into_vec()
        .map_err(|e| DotError::InvalidAddress(format!("Invalid base58: {}", e)))?;

    if decoded.len() < 35 {
        return Err(DotError::InvalidAddress("Address too short".to_string()));
    }

    let (prefix, prefix_len) = decode_prefix(&decoded)?;

    let checksum_start = decoded.len() - 2;
    let account_id: [u8; 32] = decoded[prefix_len..checksum_start]
        .try_into()
        .map_err(|_| {
            DotError::InvalidAddress(format!(
                "Invalid account id length: {}",
                checksum_start - prefix_len
            ))
        })?;

    let expected_checksum = ss58_checksum(&decoded[..checksum_start]);
    if decoded[checksum_start..] != expected_checksum[..2] {
        return Err(DotError::InvalidAddress("Invalid checksum".to_string()));
    }

    Ok((account_id, prefix))
}

/// Resolve an account given either as SS58 or as 0x-prefixed hex
pub fn account_id(account: &str) -> Result<[u8; 32], DotError> {
    if let Some(hex_str) = account.strip_prefix("0x") {
        let bytes = hex::decode(hex_str)
            .map_err(|e| DotError::InvalidAddress(format!("Invalid hex: {}", e)))?;
        return bytes.try_into().map_err(|v: Vec<u8>| {
            DotError::InvalidAddress(format!("Account id must be 32 bytes, got {}", v.len()))
        });
    }
    decode_ss58(account).map(|(id, _)| id)
}

/// Encode SS58 prefix (supports single and two-byte prefixes)
fn encode_prefix(prefix: u16) -> Result<Vec<u8>, DotError> {
    if prefix < 64 {
        Ok(vec![prefix as u8])
    } else if prefix < 16384 {
        let first = ((prefix & 0b0000_0000_1111_1100) as u8) >> 2 | 0b0100_0000;
        let second = ((prefix >> 8) as u8) | ((prefix & 0b0000_0000_0000_0011) as u8) << 6;
        Ok(vec![first, second])
    } else {
        Err(DotError::InvalidAddress(format!("Invalid prefix: {}", prefix)))
    }
}

/// Decode SS58 prefix from raw bytes
fn decode_prefix(data: &[u8]) -> Result<(u16, usize), DotError> {
    match data[0] {
        0..=63 => Ok((data[0] as u16, 1)),
        64..=127 => {
            let lower = (data[0] & 0b0011_1111) << 2 | (data[1] >> 6);
            let upper = data[1] & 0b0011_1111;
            Ok((((upper as u16) << 8) | (lower as u16), 2))
        }
        byte => Err(DotError::InvalidAddress(format!(
            "Invalid prefix byte: {}",
            byte
        ))),
    }
}

/// Blake2b-512 of "SS58PRE" || payload
fn ss58_checksum(payload: &[u8]) -> [u8; 64] {
    let mut hasher = Blake2b512::new();
    hasher.update(SS58_PREFIX);
    hasher.update(payload);
    let mut checksum = [0u8; 64];
    checksum.copy_from_slice(&hasher.finalize());
    checksum
}
