// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

//! State checksums.
//!
//! The checksum is SHA-256 over the canonical JSON serialization of the
//! state with its `checksum` field blanked. `ProjectState` uses `BTreeMap`
//! for its maps, so key order (and therefore the digest) is deterministic
//! across processes.

use sha2::{Digest, Sha256};

use crate::state::ProjectState;

/// Computes the checksum for a state, ignoring its stored checksum field.
pub fn compute(state: &ProjectState) -> String {
    let mut normalized = state.clone();
    normalized.checksum = String::new();

    // Serialization of an in-memory state cannot fail; fall back to the
    // Debug form rather than panicking if it ever does.
    let canonical = serde_json::to_string(&normalized)
        .unwrap_or_else(|_| format!("{normalized:?}"));

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
#[path = "checksum_tests.rs"]
mod tests;
