// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pathway hash chain.
//!
//! ```text
//! node_hash = fnv1a_64(service ++ env ++ tag_0 ++ tag_1 ++ ...)
//! new_hash  = fnv1a_64(le_u64(node_hash) ++ le_u64(parent_hash))
//! ```
//!
//! Tags are hashed in sorted order. Every tracer runtime computes the same
//! chain byte for byte, so pathways stitch together across languages.

use std::hash::Hasher;

use fnv::FnvHasher;

use crate::constants::{DEFAULT_ENV, DEFAULT_SERVICE};

/// 64-bit FNV-1a over raw bytes.
#[must_use]
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    // `FnvHasher::write` is FNV-1a with the standard offset basis; `finish`
    // adds nothing beyond the running state.
    let mut hasher = FnvHasher::default();
    hasher.write(bytes);
    hasher.finish()
}

/// Service identity mixed into every node hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathwayIdentity {
    pub service: String,
    pub env: String,
}

impl PathwayIdentity {
    #[must_use]
    pub fn new(service: Option<&str>, env: Option<&str>) -> Self {
        Self {
            service: service
                .filter(|s| !s.is_empty())
                .unwrap_or(DEFAULT_SERVICE)
                .to_string(),
            env: env.filter(|e| !e.is_empty()).unwrap_or(DEFAULT_ENV).to_string(),
        }
    }

    /// Hash of this service's node for the given edge tags.
    ///
    /// `sorted_tags` must already be sorted; the order is part of the hash.
    #[must_use]
    pub fn node_hash<S: AsRef<str>>(&self, sorted_tags: &[S]) -> u64 {
        let mut hasher = FnvHasher::default();
        hasher.write(self.service.as_bytes());
        hasher.write(self.env.as_bytes());
        for tag in sorted_tags {
            hasher.write(tag.as_ref().as_bytes());
        }
        hasher.finish()
    }

    #[must_use]
    pub fn compute_pathway_hash<S: AsRef<str>>(&self, parent_hash: u64, sorted_tags: &[S]) -> u64 {
        compute_pathway_hash(self.node_hash(sorted_tags), parent_hash)
    }
}

impl Default for PathwayIdentity {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Chains a node hash onto its parent.
///
/// Both halves are packed little-endian whatever the host byte order.
#[must_use]
pub fn compute_pathway_hash(node_hash: u64, parent_hash: u64) -> u64 {
    let mut combined = [0u8; 16];
    combined[..8].copy_from_slice(&node_hash.to_le_bytes());
    combined[8..].copy_from_slice(&parent_hash.to_le_bytes());
    fnv1a_64(&combined)
}
