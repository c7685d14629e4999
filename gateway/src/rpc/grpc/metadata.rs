//! JSON metadata object -> gRPC request metadata.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use tonic::metadata::{
    AsciiMetadataKey, AsciiMetadataValue, BinaryMetadataKey, BinaryMetadataValue, MetadataMap,
};

use crate::rpc::RpcError;

/// Append every entry of a JSON object to `target`.
///
/// Strings are used as-is, other scalars by their JSON text, arrays add one
/// entry per element and `null` is skipped. Keys ending in `-bin` carry
/// base64-encoded binary values.
pub fn apply(metadata: &Value, target: &mut MetadataMap) -> Result<(), RpcError> {
    let entries = metadata
        .as_object()
        .ok_or_else(|| RpcError::invalid_argument("metadata must be a JSON object"))?;

    for (key, value) in entries {
        match value {
            Value::Array(items) => {
                for item in items {
                    append(target, key, item)?;
                }
            }
            other => append(target, key, other)?,
        }
    }
    Ok(())
}

fn append(target: &mut MetadataMap, key: &str, value: &Value) -> Result<(), RpcError> {
    let text = match value {
        Value::Null => return Ok(()),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let key = key.to_ascii_lowercase();

    if key.ends_with("-bin") {
        let bytes = STANDARD.decode(text.as_bytes()).map_err(|e| {
            RpcError::invalid_argument(format!("Invalid base64 in metadata {}: {}", key, e))
        })?;
        let name = BinaryMetadataKey::from_bytes(key.as_bytes()).map_err(|e| invalid_key(&key, e))?;
        target.append_bin(name, BinaryMetadataValue::from_bytes(&bytes));
    } else {
        let name = AsciiMetadataKey::from_bytes(key.as_bytes()).map_err(|e| invalid_key(&key, e))?;
        let value = AsciiMetadataValue::try_from(text.as_str()).map_err(|e| {
            RpcError::invalid_argument(format!("Invalid metadata value for {}: {}", key, e))
        })?;
        target.append(name, value);
    }
    Ok(())
}

fn invalid_key(key: &str, error: impl std::fmt::Display) -> RpcError {
    RpcError::invalid_argument(format!("Invalid metadata key {}: {}", key, error))
}
