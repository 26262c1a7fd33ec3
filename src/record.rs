use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

/// Key used when an inbound payload carries no identifier. All such payloads
/// collapse into a single store slot.
pub const UNKNOWN_KEY: &str = "unknown_key";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload root is not a JSON object")]
    NotAnObject,
}

/// A live record as held by the store. The original payload bytes are kept
/// verbatim for re-emission and never re-encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    /// Absolute expiry in epoch milliseconds. `None` never expires.
    pub expiry: Option<u64>,
    pub payload: Bytes,
}

impl Record {
    pub fn expired(&self, now_ms: u64) -> bool {
        match self.expiry {
            Some(expiry) => expiry <= now_ms,
            None => false,
        }
    }
}

/// The effect of one decoded inbound payload on the store.
#[derive(Debug, PartialEq)]
pub enum Update {
    Put(Record),
    Cancel { id: String },
}

/// Parses a raw feed payload. Expects a JSON object with an optional
/// `properties` object holding `id`, `expiryTime` and `isCancelled`.
pub fn decode(payload: Bytes) -> Result<Update, DecodeError> {
    let document: Value = serde_json::from_slice(&payload)?;
    let properties = match &document {
        Value::Object(fields) => fields.get("properties").and_then(Value::as_object),
        _ => return Err(DecodeError::NotAnObject),
    };

    let id = properties
        .and_then(|p| p.get("id"))
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_KEY)
        .to_string();

    let cancelled = properties
        .and_then(|p| p.get("isCancelled"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if cancelled {
        return Ok(Update::Cancel { id });
    }

    // A missing, zero or malformed expiry means the record never expires.
    let expiry = properties
        .and_then(|p| p.get("expiryTime"))
        .and_then(Value::as_u64)
        .filter(|&t| t != 0);

    Ok(Update::Put(Record {
        id,
        expiry,
        payload,
    }))
}
