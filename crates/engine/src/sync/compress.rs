// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

//! Optional payload compression for large messages.
//!
//! Payloads over the configured threshold are zstd-compressed and
//! carried as a hex string, with the message's `compressed` flag set.
//! Small payloads pass through untouched.

use serde_json::Value;

use tether_core::SyncMessage;

use super::SyncError;

/// Zstd level 0 maps to the library default (currently 3).
const LEVEL: i32 = 0;

/// Compress the payload in place if it exceeds `threshold` bytes.
///
/// Returns whether the payload was compressed.
pub fn compress_payload(msg: &mut SyncMessage, threshold: usize) -> Result<bool, SyncError> {
    if msg.compressed {
        return Ok(false);
    }

    let raw = serde_json::to_vec(&msg.payload).map_err(|e| SyncError::Codec(e.to_string()))?;
    if raw.len() < threshold {
        return Ok(false);
    }

    let packed = zstd::encode_all(raw.as_slice(), LEVEL)
        .map_err(|e| SyncError::Codec(e.to_string()))?;

    msg.payload = Value::String(hex::encode(packed));
    msg.compressed = true;
    Ok(true)
}

/// Undo [`compress_payload`] on an inbound message.
///
/// No-op when the `compressed` flag is unset.
pub fn decompress_payload(msg: &mut SyncMessage) -> Result<(), SyncError> {
    if !msg.compressed {
        return Ok(());
    }

    let encoded = msg
        .payload
        .as_str()
        .ok_or_else(|| SyncError::Codec("compressed payload is not a string".to_string()))?;
    let packed = hex::decode(encoded).map_err(|e| SyncError::Codec(e.to_string()))?;
    let raw = zstd::decode_all(packed.as_slice()).map_err(|e| SyncError::Codec(e.to_string()))?;

    msg.payload = serde_json::from_slice(&raw).map_err(|e| SyncError::Codec(e.to_string()))?;
    msg.compressed = false;
    Ok(())
}

#[cfg(test)]
#[path = "compress_tests.rs"]
mod compress_tests;
