// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Data Streams Monitoring pathway tracking.
//!
//! Applications mark checkpoints when they produce or consume a message
//! through a queue or stream. Each checkpoint advances a propagatable
//! [`pathway::PathwayContext`], records edge and end-to-end latency into
//! time-bucketed sketches, and a background [`flusher::Flusher`] ships the
//! aggregated buckets to the trace agent.
//!
//! ```text
//! set_produce_checkpoint / set_consume_checkpoint      (hot path, sync)
//!        │
//!        ▼
//!   checkpoint::advance ──► hash::compute_pathway_hash
//!        │
//!        ▼
//!   Aggregator (Mutex) ◄── kafka::track_{produce,commit,consume}
//!        │
//!        ▼ every interval
//!   Flusher ──► datadog::AgentApi ──► POST /v0.1/pipeline_stats
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod aggregator;
pub mod carrier;
pub mod checkpoint;
pub mod codec;
pub mod config;
pub mod constants;
pub mod datadog;
pub mod errors;
pub mod flusher;
pub mod hash;
pub mod hostname;
pub mod kafka;
pub mod pathway;
pub mod payload;
pub mod processor;
pub mod sketch;

pub use constants::PROPAGATION_KEY;
pub use pathway::PathwayContext;
pub use processor::Processor;
