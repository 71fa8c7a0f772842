// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Checkpoint state transition.
//!
//! [`advance`] is a pure function from `(context, tags, now)` to the next
//! context and the stats the checkpoint emits. It owns loop detection:
//! two consecutive checkpoints in the same direction (a service that
//! consumes twice before producing, or produces to two topics) must hang
//! off the same parent instead of chaining onto each other.

use std::time::Duration;

use crate::constants::{
    DIRECTION_IN_TAG, DIRECTION_OUT_TAG, DIRECTION_TAG_PREFIX, MANUAL_CHECKPOINT_TAG,
};
use crate::hash::PathwayIdentity;
use crate::pathway::{Direction, PathwayContext};

/// Something a checkpoint can annotate with the pathway hash, usually the
/// active tracing span.
pub trait SpanTagger {
    fn set_tag(&mut self, key: &str, value: &str);
}

/// What a single checkpoint contributes to the stats aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointStats {
    /// Sorted edge tags.
    pub edge_tags: Vec<String>,
    pub hash: u64,
    pub parent_hash: u64,
    pub edge_latency: Duration,
    pub full_pathway_latency: Duration,
    pub timestamp_ns: i64,
    pub payload_size: u64,
}

/// Advances `ctx` through one checkpoint.
///
/// Latencies are clamped at zero when `now_ns` precedes the recorded
/// starts, which happens with clock skew between producer and consumer.
#[must_use]
pub fn advance(
    identity: &PathwayIdentity,
    ctx: &PathwayContext,
    mut tags: Vec<String>,
    now_ns: i64,
    payload_size: u64,
) -> (PathwayContext, CheckpointStats) {
    tags.sort_unstable();
    let direction = tags
        .iter()
        .find(|tag| tag.starts_with(DIRECTION_TAG_PREFIX))
        .and_then(|tag| Direction::from_tag(tag));

    let mut next = ctx.clone();
    if direction.is_some() && next.previous_direction == direction {
        next.hash = next.closest_opposite_direction_hash;
        if next.hash == 0 {
            next.current_edge_start_ns = now_ns;
            next.pathway_start_ns = now_ns;
        } else {
            next.current_edge_start_ns = next.closest_opposite_direction_edge_start_ns;
        }
    } else {
        next.previous_direction = direction;
        next.closest_opposite_direction_hash = next.hash;
        next.closest_opposite_direction_edge_start_ns = next.current_edge_start_ns;
    }

    let parent_hash = next.hash;
    let hash = identity.compute_pathway_hash(parent_hash, &tags);
    let edge_latency = elapsed(now_ns, next.current_edge_start_ns);
    let full_pathway_latency = elapsed(now_ns, next.pathway_start_ns);

    next.parent_hash = Some(parent_hash);
    next.hash = hash;
    next.current_edge_start_ns = now_ns;

    let stats = CheckpointStats {
        edge_tags: tags,
        hash,
        parent_hash,
        edge_latency,
        full_pathway_latency,
        timestamp_ns: now_ns,
        payload_size,
    };
    (next, stats)
}

fn elapsed(now_ns: i64, since_ns: i64) -> Duration {
    u64::try_from(now_ns.saturating_sub(since_ns)).map_or(Duration::ZERO, Duration::from_nanos)
}

/// Canonical tags of a produce checkpoint.
#[must_use]
pub fn produce_edge_tags(
    kind: &str,
    destination: &str,
    manual_checkpoint: bool,
    extra: &[String],
) -> Vec<String> {
    edge_tags(kind, destination, DIRECTION_OUT_TAG, manual_checkpoint, extra)
}

/// Canonical tags of a consume checkpoint.
#[must_use]
pub fn consume_edge_tags(
    kind: &str,
    source: &str,
    manual_checkpoint: bool,
    extra: &[String],
) -> Vec<String> {
    edge_tags(kind, source, DIRECTION_IN_TAG, manual_checkpoint, extra)
}

fn edge_tags(
    kind: &str,
    topic: &str,
    direction: &str,
    manual_checkpoint: bool,
    extra: &[String],
) -> Vec<String> {
    let mut tags = Vec::with_capacity(4 + extra.len());
    tags.push(format!("type:{kind}"));
    tags.push(format!("topic:{topic}"));
    tags.push(direction.to_string());
    if manual_checkpoint {
        tags.push(MANUAL_CHECKPOINT_TAG.to_string());
    }
    tags.extend(extra.iter().cloned());
    tags
}
