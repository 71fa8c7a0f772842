// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The propagatable pathway state.
//!
//! A [`PathwayContext`] says where in the pipeline DAG the current unit of
//! work sits (`hash`) and since when (`pathway_start_ns`,
//! `current_edge_start_ns`). Only those three fields cross process
//! boundaries; the loop-detection anchors are local and are reset whenever
//! a context is adopted from a carrier.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::codec;
use crate::constants::DIRECTION_TAG_PREFIX;

/// Direction of a checkpoint's edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Data flowing in (consume).
    In,
    /// Data flowing out (produce).
    Out,
    /// Any other `direction:` value. Loop detection compares it verbatim,
    /// so two consecutive `direction:foo` checkpoints count as a repeat.
    Other(String),
}

impl Direction {
    /// Parses a `direction:<value>` tag. Tags without the prefix carry no
    /// direction.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.strip_prefix(DIRECTION_TAG_PREFIX)? {
            "in" => Some(Self::In),
            "out" => Some(Self::Out),
            other => Some(Self::Other(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathwayContext {
    /// Current position in the pathway DAG. Zero means "no pathway yet".
    pub hash: u64,
    /// Start of the whole pipeline traversal, nanoseconds since the epoch.
    pub pathway_start_ns: i64,
    /// Start of the current hop, nanoseconds since the epoch.
    pub current_edge_start_ns: i64,
    /// Hash before the last transition.
    pub parent_hash: Option<u64>,
    /// Direction of the last checkpoint set on this context.
    pub previous_direction: Option<Direction>,
    /// Hash at the most recent checkpoint of the opposite direction.
    pub closest_opposite_direction_hash: u64,
    pub closest_opposite_direction_edge_start_ns: i64,
}

impl PathwayContext {
    /// A fresh context with no pathway, starting at `now_ns`.
    #[must_use]
    pub fn new(now_ns: i64) -> Self {
        Self::from_wire(0, now_ns, now_ns)
    }

    /// A fresh context starting at the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self::new(unix_nanos(SystemTime::now()))
    }

    /// Builds a context from the three propagated fields, with loop
    /// detection anchored at the incoming edge.
    #[must_use]
    pub fn from_wire(hash: u64, pathway_start_ns: i64, current_edge_start_ns: i64) -> Self {
        Self {
            hash,
            pathway_start_ns,
            current_edge_start_ns,
            parent_hash: None,
            previous_direction: None,
            closest_opposite_direction_hash: 0,
            closest_opposite_direction_edge_start_ns: current_edge_start_ns,
        }
    }

    /// Forgets local loop-detection state. Called when a context received
    /// from another service becomes the current one.
    pub fn reset_loop_detection(&mut self) {
        self.previous_direction = None;
        self.closest_opposite_direction_hash = 0;
        self.closest_opposite_direction_edge_start_ns = self.current_edge_start_ns;
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        codec::encode(self)
    }

    #[must_use]
    pub fn encode_b64(&self) -> String {
        codec::encode_b64(self)
    }

    /// Decodes a binary context. Malformed input yields `None`.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        codec::decode(bytes)
            .map_err(|e| debug!("Discarding malformed pathway context: {e}"))
            .ok()
    }

    /// Decodes a base64 context. Malformed input yields `None`.
    #[must_use]
    pub fn decode_b64(encoded: &str) -> Option<Self> {
        codec::decode_b64(encoded)
            .map_err(|e| debug!("Discarding malformed pathway context: {e}"))
            .ok()
    }
}

/// Nanoseconds since the epoch; negative for times before it.
#[must_use]
pub fn unix_nanos(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => i64::try_from(since.as_nanos()).unwrap_or(i64::MAX),
        Err(e) => i64::try_from(e.duration().as_nanos()).map_or(i64::MIN, |before| -before),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_direction_from_tag() {
        assert_eq!(Direction::from_tag("direction:in"), Some(Direction::In));
        assert_eq!(Direction::from_tag("direction:out"), Some(Direction::Out));
        assert_eq!(
            Direction::from_tag("direction:sideways"),
            Some(Direction::Other("sideways".to_string()))
        );
        assert_eq!(Direction::from_tag("topic:direction:in"), None);
    }

    #[test]
    fn test_new_context_has_no_pathway() {
        let ctx = PathwayContext::new(42);
        assert_eq!(ctx.hash, 0);
        assert_eq!(ctx.pathway_start_ns, 42);
        assert_eq!(ctx.current_edge_start_ns, 42);
        assert_eq!(ctx.parent_hash, None);
        assert_eq!(ctx.previous_direction, None);
        assert_eq!(ctx.closest_opposite_direction_hash, 0);
    }

    #[test]
    fn test_reset_loop_detection() {
        let mut ctx = PathwayContext::from_wire(7, 100, 200);
        ctx.previous_direction = Some(Direction::Out);
        ctx.closest_opposite_direction_hash = 99;
        ctx.closest_opposite_direction_edge_start_ns = 150;

        ctx.reset_loop_detection();

        assert_eq!(ctx.previous_direction, None);
        assert_eq!(ctx.closest_opposite_direction_hash, 0);
        assert_eq!(ctx.closest_opposite_direction_edge_start_ns, 200);
        assert_eq!(ctx.hash, 7);
    }

    #[test]
    fn test_unix_nanos_before_epoch() {
        let before = UNIX_EPOCH - Duration::from_nanos(5);
        assert_eq!(unix_nanos(before), -5);
        assert_eq!(unix_nanos(UNIX_EPOCH + Duration::from_secs(1)), 1_000_000_000);
    }

    #[test]
    fn test_decode_b64_garbage_is_absent() {
        assert_eq!(PathwayContext::decode_b64("!!not base64!!"), None);
        assert_eq!(PathwayContext::decode(&[1, 2, 3]), None);
    }
}
