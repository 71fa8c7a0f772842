// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Time-bucketed pathway stats.
//!
//! The aggregator itself is not synchronized; the processor keeps it behind
//! a single `Mutex` shared by the checkpoint hot path and the flusher.

use std::hash::Hash;
use std::time::Duration;

use hashbrown::HashMap;

use crate::checkpoint::CheckpointStats;
use crate::errors::Creation;
use crate::kafka::{CommitKey, ConsumerEvent, LagEvent, PartitionKey};
use crate::payload::{Backlog, StatsBucket, StatsPoint};
use crate::sketch::LatencySketch;

/// Stats of one `(edge tags, hash, parent hash)` within a bucket.
#[derive(Default)]
pub struct PathwayStats {
    pub edge_latency: LatencySketch,
    pub full_pathway_latency: LatencySketch,
    pub payload_size_sum: u64,
    pub payload_size_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregationKey {
    /// Sorted edge tags.
    pub edge_tags: Vec<String>,
    pub hash: u64,
    pub parent_hash: u64,
}

/// Offsets keyed by the start of their 10 second window, then by partition.
pub type OffsetWindows<K> = HashMap<i64, HashMap<K, i64>>;

#[derive(Default)]
pub struct Bucket {
    pub pathway_stats: HashMap<AggregationKey, PathwayStats>,
    pub latest_produce_offsets: OffsetWindows<PartitionKey>,
    pub latest_commit_offsets: OffsetWindows<CommitKey>,
}

pub struct Aggregator {
    bucket_size_ns: i64,
    pub(crate) buckets: HashMap<i64, Bucket>,
    pub(crate) consumer_events: Vec<ConsumerEvent>,
    pub(crate) latest_consumer_offsets: HashMap<PartitionKey, i64>,
    pub(crate) consumer_lag_events: Vec<LagEvent>,
}

impl Aggregator {
    pub fn new(bucket_size: Duration) -> Result<Self, Creation> {
        let bucket_size_ns = i64::try_from(bucket_size.as_nanos()).unwrap_or(i64::MAX);
        if bucket_size_ns == 0 {
            return Err(Creation::ZeroBucketSize);
        }
        Ok(Self {
            bucket_size_ns,
            buckets: HashMap::new(),
            consumer_events: Vec::new(),
            latest_consumer_offsets: HashMap::new(),
            consumer_lag_events: Vec::new(),
        })
    }

    #[must_use]
    pub fn bucket_size_ns(&self) -> i64 {
        self.bucket_size_ns
    }

    /// Start of the bucket containing `timestamp_ns`.
    #[must_use]
    pub fn bucket_start(&self, timestamp_ns: i64) -> i64 {
        align(timestamp_ns, self.bucket_size_ns)
    }

    pub fn record_checkpoint(&mut self, stats: CheckpointStats) {
        let bucket_start = self.bucket_start(stats.timestamp_ns);
        let key = AggregationKey {
            edge_tags: stats.edge_tags,
            hash: stats.hash,
            parent_hash: stats.parent_hash,
        };
        let entry = self
            .buckets
            .entry(bucket_start)
            .or_default()
            .pathway_stats
            .entry(key)
            .or_default();
        entry.edge_latency.add(stats.edge_latency.as_secs_f64());
        entry
            .full_pathway_latency
            .add(stats.full_pathway_latency.as_secs_f64());
        entry.payload_size_sum = entry.payload_size_sum.saturating_add(stats.payload_size);
        entry.payload_size_count += 1;
    }

    #[must_use]
    pub fn bucket(&self, bucket_start: i64) -> Option<&Bucket> {
        self.buckets.get(&bucket_start)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty() && self.consumer_events.is_empty()
    }

    /// Serializes every bucket, oldest first, and removes them together
    /// with the raw consumer events. Nothing survives the call, so a bucket
    /// is never sent twice.
    ///
    /// Every drained consumer event is appended to every serialized bucket,
    /// whatever its timestamp.
    pub fn serialize_and_clear(&mut self) -> Vec<StatsBucket> {
        let consumer_events = std::mem::take(&mut self.consumer_events);
        let mut buckets: Vec<(i64, Bucket)> = self.buckets.drain().collect();
        buckets.sort_unstable_by_key(|(start, _)| *start);

        buckets
            .into_iter()
            .map(|(start, bucket)| {
                serialize_bucket(start, self.bucket_size_ns, bucket, &consumer_events)
            })
            .collect()
    }
}

pub(crate) fn align(timestamp_ns: i64, width_ns: i64) -> i64 {
    timestamp_ns - timestamp_ns.rem_euclid(width_ns)
}

fn serialize_bucket(
    start: i64,
    duration: i64,
    bucket: Bucket,
    consumer_events: &[ConsumerEvent],
) -> StatsBucket {
    let mut stats: Vec<StatsPoint> = bucket
        .pathway_stats
        .into_iter()
        .map(|(key, entry)| StatsPoint {
            edge_tags: key.edge_tags,
            hash: key.hash,
            parent_hash: key.parent_hash,
            pathway_latency: entry.full_pathway_latency.encode(),
            edge_latency: entry.edge_latency.encode(),
        })
        .collect();
    stats.sort_unstable_by_key(|point| (point.hash, point.parent_hash));

    let mut backlogs: Vec<Backlog> = highest_offsets(bucket.latest_produce_offsets)
        .map(|(key, offset)| key.produce_backlog(offset))
        .chain(
            highest_offsets(bucket.latest_commit_offsets)
                .map(|(key, offset)| key.commit_backlog(offset)),
        )
        .collect();
    backlogs.sort_unstable();
    backlogs.extend(consumer_events.iter().map(ConsumerEvent::backlog));

    StatsBucket {
        start,
        duration,
        stats,
        backlogs,
    }
}

/// Collapses the 10 second windows of a bucket into one offset per key.
fn highest_offsets<K: Eq + Hash>(windows: OffsetWindows<K>) -> impl Iterator<Item = (K, i64)> {
    let mut highest: HashMap<K, i64> = HashMap::new();
    for (key, offset) in windows.into_values().flatten() {
        highest
            .entry(key)
            .and_modify(|latest| *latest = (*latest).max(offset))
            .or_insert(offset);
    }
    highest.into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::advance;
    use crate::hash::PathwayIdentity;
    use crate::pathway::PathwayContext;
    use crate::sketch::encoded_count;

    const SEC: i64 = 1_000_000_000;
    const BUCKET: i64 = 10 * SEC;
    const T0: i64 = 1_700_000_000 * SEC;

    fn aggregator() -> Aggregator {
        Aggregator::new(Duration::from_secs(10)).expect("valid bucket size")
    }

    fn stats_at(timestamp_ns: i64, topic: &str) -> CheckpointStats {
        let tags = vec![
            "type:kafka".to_string(),
            format!("topic:{topic}"),
            "direction:out".to_string(),
        ];
        let (_, stats) = advance(
            &PathwayIdentity::default(),
            &PathwayContext::new(timestamp_ns - SEC),
            tags,
            timestamp_ns,
            128,
        );
        stats
    }

    #[test]
    fn test_zero_bucket_size_is_rejected() {
        assert!(matches!(
            Aggregator::new(Duration::ZERO),
            Err(Creation::ZeroBucketSize)
        ));
    }

    #[test]
    fn test_bucket_boundaries() {
        let aggregator = aggregator();
        let t = T0 + 3 * SEC;
        let start = aggregator.bucket_start(t);
        assert_eq!(start, T0);
        assert_eq!(aggregator.bucket_start(start + BUCKET - 1), start);
        assert_eq!(aggregator.bucket_start(start + BUCKET), start + BUCKET);
        assert_eq!(align(-1, BUCKET), -BUCKET);
    }

    #[test]
    fn test_checkpoints_in_same_window_share_a_bucket() {
        let mut aggregator = aggregator();
        aggregator.record_checkpoint(stats_at(T0, "orders"));
        aggregator.record_checkpoint(stats_at(T0 + BUCKET - 1, "orders"));
        aggregator.record_checkpoint(stats_at(T0 + BUCKET, "orders"));

        assert_eq!(aggregator.buckets.len(), 2);
        let first = aggregator.bucket(T0).expect("first bucket");
        assert_eq!(first.pathway_stats.len(), 1);
        let stats = first.pathway_stats.values().next().expect("entry");
        assert_eq!(stats.edge_latency.count(), 2.0);
        assert_eq!(stats.full_pathway_latency.count(), 2.0);
        assert_eq!(stats.payload_size_sum, 256);
        assert_eq!(stats.payload_size_count, 2);

        let second = aggregator.bucket(T0 + BUCKET).expect("second bucket");
        assert_eq!(second.pathway_stats.len(), 1);
    }

    #[test]
    fn test_distinct_edges_get_distinct_entries() {
        let mut aggregator = aggregator();
        aggregator.record_checkpoint(stats_at(T0, "orders"));
        aggregator.record_checkpoint(stats_at(T0, "payments"));

        let bucket = aggregator.bucket(T0).expect("bucket");
        assert_eq!(bucket.pathway_stats.len(), 2);
    }

    #[test]
    fn test_serialize_and_clear() {
        let mut aggregator = aggregator();
        let stats = stats_at(T0 + BUCKET + 1, "orders");
        let (hash, edge_tags) = (stats.hash, stats.edge_tags.clone());
        aggregator.record_checkpoint(stats);
        aggregator.record_checkpoint(stats_at(T0, "orders"));

        let serialized = aggregator.serialize_and_clear();

        assert!(aggregator.is_empty());
        assert_eq!(serialized.len(), 2);
        assert_eq!(serialized[0].start, T0);
        assert_eq!(serialized[1].start, T0 + BUCKET);
        assert_eq!(serialized[1].duration, BUCKET);
        let point = &serialized[1].stats[0];
        assert_eq!(point.hash, hash);
        assert_eq!(point.parent_hash, 0);
        assert_eq!(point.edge_tags, edge_tags);
        assert_eq!(encoded_count(&point.edge_latency), 1.0);
        assert_eq!(encoded_count(&point.pathway_latency), 1.0);

        assert!(aggregator.serialize_and_clear().is_empty());
    }
}
