// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Kafka offset tracking.
//!
//! Produce and commit offsets become per-partition backlogs of the
//! aggregation bucket they land in. Inside a bucket the highest offset is
//! kept per 10 second window. Consumed offsets are kept as raw events and
//! feed a gap detector.

use std::hash::Hash;

use crate::aggregator::{align, Aggregator, OffsetWindows};
use crate::constants::OFFSET_BUCKET_NS;
use crate::payload::Backlog;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    pub topic: String,
    pub partition: i32,
}

impl PartitionKey {
    #[must_use]
    pub fn new(topic: &str, partition: i32) -> Self {
        Self {
            topic: topic.to_string(),
            partition,
        }
    }

    pub(crate) fn produce_backlog(self, offset: i64) -> Backlog {
        Backlog {
            tags: vec![
                "type:kafka_produce".to_string(),
                format!("topic:{}", self.topic),
                format!("partition:{}", self.partition),
            ],
            value: offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitKey {
    pub group: String,
    pub topic: String,
    pub partition: i32,
}

impl CommitKey {
    pub(crate) fn commit_backlog(self, offset: i64) -> Backlog {
        Backlog {
            tags: vec![
                "type:kafka_commit".to_string(),
                format!("consumer_group:{}", self.group),
                format!("topic:{}", self.topic),
                format!("partition:{}", self.partition),
            ],
            value: offset,
        }
    }
}

/// A consumed message's offset, reported as a backlog on the next flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerEvent {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub timestamp_ns: i64,
}

impl ConsumerEvent {
    // Consumed offsets are reported under the commit type and attached to
    // every bucket of the flush that drains them.
    // TODO: confirm with the DSM backend whether a kafka_consume type exists.
    pub(crate) fn backlog(&self) -> Backlog {
        Backlog {
            tags: vec![
                "type:kafka_commit".to_string(),
                format!("topic:{}", self.topic),
                format!("partition:{}", self.partition),
            ],
            value: self.offset,
        }
    }
}

/// Consumed offsets skipped between two consecutive consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LagEvent {
    pub topic: String,
    pub partition: i32,
    pub expected_offset: i64,
    pub actual_offset: i64,
    pub gap_size: i64,
    pub timestamp_ns: i64,
}

impl Aggregator {
    pub fn track_produce(&mut self, topic: &str, partition: i32, offset: i64, now_ns: i64) {
        let bucket_start = self.bucket_start(now_ns);
        let bucket = self.buckets.entry(bucket_start).or_default();
        keep_highest(
            &mut bucket.latest_produce_offsets,
            now_ns,
            PartitionKey::new(topic, partition),
            offset,
        );
    }

    pub fn track_commit(
        &mut self,
        group: &str,
        topic: &str,
        partition: i32,
        offset: i64,
        now_ns: i64,
    ) {
        let key = CommitKey {
            group: group.to_string(),
            topic: topic.to_string(),
            partition,
        };
        let bucket_start = self.bucket_start(now_ns);
        let bucket = self.buckets.entry(bucket_start).or_default();
        keep_highest(&mut bucket.latest_commit_offsets, now_ns, key, offset);
    }

    /// Records a consumed offset and checks it against the previous one
    /// seen on the partition, which starts at zero.
    pub fn track_consume(&mut self, topic: &str, partition: i32, offset: i64, now_ns: i64) {
        self.consumer_events.push(ConsumerEvent {
            topic: topic.to_string(),
            partition,
            offset,
            timestamp_ns: now_ns,
        });
        // The event's window must flush even if no checkpoint lands in it.
        let bucket_start = self.bucket_start(now_ns);
        self.buckets.entry(bucket_start).or_default();

        let key = PartitionKey::new(topic, partition);
        let previous = self.latest_consumer_offsets.get(&key).copied().unwrap_or(0);
        let expected = previous.saturating_add(1);
        if offset > expected {
            self.consumer_lag_events.push(LagEvent {
                topic: key.topic.clone(),
                partition,
                expected_offset: expected,
                actual_offset: offset,
                gap_size: offset - expected,
                timestamp_ns: now_ns,
            });
        }
        self.latest_consumer_offsets.insert(key, previous.max(offset));
    }

    /// Gaps seen since the process started. Never drained by flushes.
    #[must_use]
    pub fn consumer_lag_events(&self) -> &[LagEvent] {
        &self.consumer_lag_events
    }

    #[must_use]
    pub fn latest_consumer_offset(&self, topic: &str, partition: i32) -> Option<i64> {
        self.latest_consumer_offsets
            .get(&PartitionKey::new(topic, partition))
            .copied()
    }
}

fn keep_highest<K: Eq + Hash>(
    windows: &mut OffsetWindows<K>,
    now_ns: i64,
    key: K,
    offset: i64,
) {
    windows
        .entry(align(now_ns, OFFSET_BUCKET_NS))
        .or_default()
        .entry(key)
        .and_modify(|latest| *latest = (*latest).max(offset))
        .or_insert(offset);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const SEC: i64 = 1_000_000_000;
    const T0: i64 = 1_700_000_000 * SEC;

    fn aggregator(bucket_secs: u64) -> Aggregator {
        Aggregator::new(Duration::from_secs(bucket_secs)).expect("valid bucket size")
    }

    #[test]
    fn test_produce_keeps_max_offset_per_window() {
        let mut aggregator = aggregator(10);
        aggregator.track_produce("orders", 0, 100, T0);
        aggregator.track_produce("orders", 0, 103, T0 + SEC);
        aggregator.track_produce("orders", 0, 101, T0 + 2 * SEC);
        aggregator.track_produce("orders", 1, 7, T0 + 3 * SEC);

        let window = &aggregator.bucket(T0).expect("bucket").latest_produce_offsets[&T0];
        assert_eq!(window[&PartitionKey::new("orders", 0)], 103);
        assert_eq!(window[&PartitionKey::new("orders", 1)], 7);
    }

    #[test]
    fn test_offsets_use_ten_second_windows_regardless_of_bucket_size() {
        let mut aggregator = aggregator(60);
        let t0 = align(T0, 60 * SEC);
        aggregator.track_produce("orders", 0, 100, t0 + 5 * SEC);
        aggregator.track_produce("orders", 0, 90, t0 + 15 * SEC);
        aggregator.track_commit("billing", "orders", 0, 80, t0 + 25 * SEC);
        aggregator.track_produce("orders", 0, 130, t0 + 65 * SEC);

        assert_eq!(aggregator.buckets.len(), 2);
        assert!(aggregator.bucket(t0 + 10 * SEC).is_none());
        let windows = &aggregator.bucket(t0).expect("bucket").latest_produce_offsets;
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[&t0][&PartitionKey::new("orders", 0)], 100);
        assert_eq!(windows[&(t0 + 10 * SEC)][&PartitionKey::new("orders", 0)], 90);

        let serialized = aggregator.serialize_and_clear();
        for bucket in &serialized {
            assert_eq!(bucket.duration, 60 * SEC);
            assert_eq!(bucket.start % bucket.duration, 0);
        }
        let values: Vec<Vec<i64>> = serialized
            .iter()
            .map(|bucket| bucket.backlogs.iter().map(|backlog| backlog.value).collect())
            .collect();
        assert_eq!(values, vec![vec![80, 100], vec![130]]);
    }

    #[test]
    fn test_commit_keeps_max_offset() {
        let mut aggregator = aggregator(10);
        aggregator.track_commit("billing", "orders", 2, 40, T0);
        aggregator.track_commit("billing", "orders", 2, 39, T0 + SEC);

        let serialized = aggregator.serialize_and_clear();
        assert_eq!(serialized.len(), 1);
        assert_eq!(
            serialized[0].backlogs,
            vec![Backlog {
                tags: vec![
                    "type:kafka_commit".to_string(),
                    "consumer_group:billing".to_string(),
                    "topic:orders".to_string(),
                    "partition:2".to_string(),
                ],
                value: 40,
            }]
        );
    }

    #[test]
    fn test_consume_gap_detection() {
        let mut aggregator = aggregator(10);
        aggregator.track_consume("orders", 0, 100, T0);
        aggregator.track_consume("orders", 0, 105, T0 + 1);

        let gap = aggregator.consumer_lag_events().last().expect("gap recorded");
        assert_eq!(gap.expected_offset, 101);
        assert_eq!(gap.actual_offset, 105);
        assert_eq!(gap.gap_size, 4);
        assert_eq!(gap.timestamp_ns, T0 + 1);
        assert_eq!(aggregator.latest_consumer_offset("orders", 0), Some(105));
    }

    #[test]
    fn test_sequential_consume_records_no_new_gap() {
        let mut aggregator = aggregator(10);
        aggregator.track_consume("orders", 0, 1, T0);
        aggregator.track_consume("orders", 0, 2, T0 + 1);
        aggregator.track_consume("orders", 0, 2, T0 + 2);
        aggregator.track_consume("orders", 0, 1, T0 + 3);

        assert!(aggregator.consumer_lag_events().is_empty());
        assert_eq!(aggregator.latest_consumer_offset("orders", 0), Some(2));
    }

    #[test]
    fn test_first_consume_counts_from_zero() {
        let mut aggregator = aggregator(10);
        aggregator.track_consume("orders", 3, 10, T0);

        assert_eq!(
            aggregator.consumer_lag_events(),
            &[LagEvent {
                topic: "orders".to_string(),
                partition: 3,
                expected_offset: 1,
                actual_offset: 10,
                gap_size: 9,
                timestamp_ns: T0,
            }]
        );
    }

    #[test]
    fn test_consume_backlogs_are_attached_to_every_bucket() {
        let mut aggregator = aggregator(10);
        aggregator.track_consume("orders", 0, 1, T0);
        aggregator.track_consume("orders", 0, 2, T0 + 10 * SEC);
        aggregator.track_produce("orders", 0, 5, T0);

        let consumed = |value| Backlog {
            tags: vec![
                "type:kafka_commit".to_string(),
                "topic:orders".to_string(),
                "partition:0".to_string(),
            ],
            value,
        };
        let serialized = aggregator.serialize_and_clear();
        assert_eq!(serialized.len(), 2);
        assert_eq!(
            serialized[0].backlogs,
            vec![
                Backlog {
                    tags: vec![
                        "type:kafka_produce".to_string(),
                        "topic:orders".to_string(),
                        "partition:0".to_string(),
                    ],
                    value: 5,
                },
                consumed(1),
                consumed(2),
            ]
        );
        assert_eq!(serialized[1].backlogs, vec![consumed(1), consumed(2)]);

        // Lag tracking is process-lifetime state.
        assert_eq!(aggregator.latest_consumer_offset("orders", 0), Some(2));
        assert!(aggregator.is_empty());
        assert!(aggregator.serialize_and_clear().is_empty());
    }
}
