//! Call encoding using subxt dynamic API
//!
//! Targets arrive the way wallets spell them (`balances.transferKeepAlive`)
//! and are resolved against runtime metadata (`Balances::transfer_keep_alive`).

use crate::address::decode_ss58;
use crate::error::DotError;
use subxt_core::{
    ext::scale_value::{Composite, Value},
    metadata::Metadata,
    tx::payload::{dynamic, Payload},
};

/// Encode `module.call(params...)` to call data bytes
pub fn encode_call(
    metadata: &Metadata,
    module: &str,
    call: &str,
    params: &[String],
) -> Result<Vec<u8>, DotError> {
    let (pallet, method) = resolve_call(metadata, module, call)?;
    let args = params.iter().map(String::as_str).map(param_value).collect();

    dynamic(pallet, method, Composite::Unnamed(args))
        .encode_call_data(metadata)
        .map_err(|e| DotError::CallEncoding(format!("{}.{}: {}", module, call, e)))
}

/// Find the metadata names of a pallet and call, ignoring case and
/// camelCase/snake_case differences
fn resolve_call(
    metadata: &Metadata,
    module: &str,
    call: &str,
) -> Result<(String, String), DotError> {
    let pallet = metadata
        .pallets()
        .find(|p| p.name().eq_ignore_ascii_case(module))
        .ok_or_else(|| DotError::UnknownCall(format!("{} pallet not found", module)))?;

    let wanted = snake_case(call);
    let variant = pallet
        .call_variants()
        .and_then(|variants| variants.iter().find(|v| v.name == wanted))
        .ok_or_else(|| DotError::UnknownCall(format!("{}.{} not found", module, call)))?;

    Ok((pallet.name().to_string(), variant.name.clone()))
}

/// Convert one opaque string parameter into a dynamic value
///
/// SS58 addresses become `MultiAddress::Id`, integers and booleans keep
/// their type, 0x-hex becomes bytes and anything else stays a string.
pub fn param_value(param: &str) -> Value<()> {
    if let Ok((account_id, _)) = decode_ss58(param) {
        return Value::unnamed_variant("Id", [Value::from_bytes(account_id)]);
    }
    if let Ok(n) = param.parse::<u128>() {
        return Value::u128(n);
    }
    if let Ok(n) = param.parse::<i128>() {
        return Value::i128(n);
    }
    match param {
        "true" => return Value::bool(true),
        "false" => return Value::bool(false),
        _ => {}
    }
    if let Some(bytes) = param.strip_prefix("0x").and_then(|h| hex::decode(h).ok()) {
        return Value::from_bytes(bytes);
    }
    Value::string(param)
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
