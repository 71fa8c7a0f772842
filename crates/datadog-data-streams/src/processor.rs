// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Application-facing entry points.
//!
//! A [`Processor`] owns the process-wide pathway context, the stats
//! aggregator and the flusher. Checkpoint calls are synchronous and only
//! take short locks; network I/O happens on the flush loop.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use tracing::{debug, trace};

use crate::aggregator::Aggregator;
use crate::carrier::{self, Extractor, Injector};
use crate::checkpoint::{advance, consume_edge_tags, produce_edge_tags, SpanTagger};
use crate::config::Config;
use crate::constants::PATHWAY_HASH_TAG;
use crate::datadog::{AgentApi, Transport};
use crate::errors::Creation;
use crate::flusher::{Flusher, FlusherConfig, FlusherHandle};
use crate::hash::PathwayIdentity;
use crate::kafka::LagEvent;
use crate::pathway::{unix_nanos, PathwayContext};
use crate::sketch::LatencySketch;

/// A produce or consume hop through a queue or stream.
#[derive(Debug, Clone)]
pub struct EdgeCheckpoint {
    /// Transport kind, such as `kafka` or `sqs`.
    pub kind: String,
    /// Topic or queue name.
    pub topic: String,
    pub manual_checkpoint: bool,
    /// Extra edge tags.
    pub tags: Vec<String>,
    pub payload_size: u64,
    pub now: SystemTime,
}

impl EdgeCheckpoint {
    /// A manual checkpoint at the current time.
    #[must_use]
    pub fn new(kind: &str, topic: &str) -> Self {
        EdgeCheckpoint {
            kind: kind.to_string(),
            topic: topic.to_string(),
            manual_checkpoint: true,
            tags: Vec::new(),
            payload_size: 0,
            now: SystemTime::now(),
        }
    }

    /// Marks the checkpoint as set by an integration rather than by hand.
    #[must_use]
    pub fn automatic(mut self) -> Self {
        self.manual_checkpoint = false;
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn with_payload_size(mut self, payload_size: u64) -> Self {
        self.payload_size = payload_size;
        self
    }

    #[must_use]
    pub fn at(mut self, now: SystemTime) -> Self {
        self.now = now;
        self
    }
}

pub struct Processor {
    identity: PathwayIdentity,
    enabled: bool,
    context: Mutex<PathwayContext>,
    aggregator: Arc<Mutex<Aggregator>>,
    flusher: Flusher,
}

impl Processor {
    /// Builds a processor that ships stats through `transport`.
    ///
    /// Fails when latency sketches cannot be encoded or the flush interval
    /// is zero.
    pub fn new(config: &Config, transport: Arc<dyn Transport>) -> Result<Self, Creation> {
        LatencySketch::check_available()?;
        let aggregator = Arc::new(Mutex::new(Aggregator::new(config.flush_interval)?));
        let flusher = Flusher::new(FlusherConfig {
            aggregator: Arc::clone(&aggregator),
            transport,
            service: config.service.clone(),
            hostname: config.hostname.clone(),
            interval: config.flush_interval,
        });
        if !config.enabled {
            debug!("Data streams monitoring is disabled");
        }
        Ok(Processor {
            identity: PathwayIdentity::new(Some(&config.service), Some(&config.env)),
            enabled: config.enabled,
            context: Mutex::new(PathwayContext::now()),
            aggregator,
            flusher,
        })
    }

    /// Builds a processor that ships stats to the trace agent at
    /// `config.agent_url`.
    pub fn from_config(config: &Config) -> Result<Self, Creation> {
        let transport = AgentApi::new(&config.agent_url, config.timeout)?;
        Self::new(config, Arc::new(transport))
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Snapshot of the process-wide context.
    #[must_use]
    pub fn pathway_context(&self) -> PathwayContext {
        self.lock_context().clone()
    }

    /// Advances the process-wide context through one checkpoint and returns
    /// the new context in base64 form, or `None` when disabled.
    pub fn set_checkpoint(
        &self,
        tags: Vec<String>,
        now: SystemTime,
        payload_size: u64,
        span: Option<&mut dyn SpanTagger>,
    ) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let mut ctx = self.lock_context();
        Some(self.checkpoint(&mut ctx, tags, now, payload_size, span))
    }

    /// Like [`Processor::set_checkpoint`], on a caller-owned context.
    pub fn set_checkpoint_with_context(
        &self,
        ctx: &mut PathwayContext,
        tags: Vec<String>,
        now: SystemTime,
        payload_size: u64,
        span: Option<&mut dyn SpanTagger>,
    ) -> Option<String> {
        if !self.enabled {
            return None;
        }
        Some(self.checkpoint(ctx, tags, now, payload_size, span))
    }

    /// Checkpoints a produce and writes the resulting context into
    /// `carrier`, if given.
    pub fn set_produce_checkpoint(
        &self,
        edge: EdgeCheckpoint,
        carrier: Option<&mut dyn Injector>,
        span: Option<&mut dyn SpanTagger>,
    ) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let tags = produce_edge_tags(&edge.kind, &edge.topic, edge.manual_checkpoint, &edge.tags);
        let mut ctx = self.lock_context();
        let encoded = self.checkpoint(&mut ctx, tags, edge.now, edge.payload_size, span);
        if let Some(carrier) = carrier {
            carrier::inject(&ctx, carrier);
        }
        Some(encoded)
    }

    /// Checkpoints a consume. A context found in `carrier` replaces the
    /// current one first; a missing or malformed one is ignored.
    pub fn set_consume_checkpoint(
        &self,
        edge: EdgeCheckpoint,
        carrier: Option<&dyn Extractor>,
        span: Option<&mut dyn SpanTagger>,
    ) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let tags = consume_edge_tags(&edge.kind, &edge.topic, edge.manual_checkpoint, &edge.tags);
        let mut ctx = self.lock_context();
        if let Some(mut inbound) = carrier.and_then(carrier::extract) {
            inbound.reset_loop_detection();
            *ctx = inbound;
        }
        Some(self.checkpoint(&mut ctx, tags, edge.now, edge.payload_size, span))
    }

    pub fn track_kafka_produce(&self, topic: &str, partition: i32, offset: i64, now: SystemTime) {
        if self.enabled {
            self.lock_aggregator()
                .track_produce(topic, partition, offset, unix_nanos(now));
        }
    }

    pub fn track_kafka_commit(
        &self,
        group: &str,
        topic: &str,
        partition: i32,
        offset: i64,
        now: SystemTime,
    ) {
        if self.enabled {
            self.lock_aggregator()
                .track_commit(group, topic, partition, offset, unix_nanos(now));
        }
    }

    pub fn track_kafka_consume(&self, topic: &str, partition: i32, offset: i64, now: SystemTime) {
        if self.enabled {
            self.lock_aggregator()
                .track_consume(topic, partition, offset, unix_nanos(now));
        }
    }

    /// Consumption gaps seen so far.
    #[must_use]
    pub fn consumer_lag_events(&self) -> Vec<LagEvent> {
        self.lock_aggregator().consumer_lag_events().to_vec()
    }

    /// Ships aggregated stats now.
    pub async fn flush(&self) {
        if self.enabled {
            self.flusher.flush().await;
        }
    }

    /// Starts the periodic flush loop on the current tokio runtime. A
    /// disabled processor starts nothing and returns an idle handle.
    #[must_use]
    pub fn start(&self) -> FlusherHandle {
        if !self.enabled {
            return FlusherHandle::idle();
        }
        self.flusher.clone().start()
    }

    fn checkpoint(
        &self,
        ctx: &mut PathwayContext,
        tags: Vec<String>,
        now: SystemTime,
        payload_size: u64,
        span: Option<&mut dyn SpanTagger>,
    ) -> String {
        let (next, stats) = advance(&self.identity, ctx, tags, unix_nanos(now), payload_size);
        if let Some(span) = span {
            span.set_tag(PATHWAY_HASH_TAG, &stats.hash.to_string());
        }
        trace!(
            "Checkpoint {:?}: {} -> {}",
            stats.edge_tags,
            stats.parent_hash,
            stats.hash
        );
        self.lock_aggregator().record_checkpoint(stats);
        *ctx = next;
        ctx.encode_b64()
    }

    fn lock_context(&self) -> MutexGuard<'_, PathwayContext> {
        self.context.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_aggregator(&self) -> MutexGuard<'_, Aggregator> {
        self.aggregator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
