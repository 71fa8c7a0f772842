// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Periodic shipping of aggregated buckets.
//!
//! A flush takes the aggregator lock only long enough to serialize and
//! clear the buckets; the network send happens after the lock is released
//! so checkpoints are never blocked on the agent. Failed sends are logged
//! and dropped.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::aggregator::Aggregator;
use crate::constants::{LANG, TRACER_VERSION};
use crate::datadog::Transport;
use crate::payload::StatsPayload;

#[derive(Clone)]
pub struct Flusher {
    aggregator: Arc<Mutex<Aggregator>>,
    transport: Arc<dyn Transport>,
    service: String,
    hostname: String,
    interval: Duration,
}

pub struct FlusherConfig {
    pub aggregator: Arc<Mutex<Aggregator>>,
    pub transport: Arc<dyn Transport>,
    pub service: String,
    pub hostname: String,
    pub interval: Duration,
}

impl Flusher {
    #[must_use]
    pub fn new(config: FlusherConfig) -> Self {
        Flusher {
            aggregator: config.aggregator,
            transport: config.transport,
            service: config.service,
            hostname: config.hostname,
            interval: config.interval,
        }
    }

    /// Ships everything aggregated so far. Does nothing when the aggregator
    /// is empty.
    pub async fn flush(&self) {
        let Some(payload) = self.take_payload() else {
            return;
        };
        let n_buckets = payload.stats.len();
        match self.transport.send(&payload).await {
            Ok(status) => debug!("Flushed {n_buckets} pathway stats buckets: {status}"),
            Err(e) => debug!("Failed to flush {n_buckets} pathway stats buckets: {e}"),
        }
    }

    fn take_payload(&self) -> Option<StatsPayload> {
        let mut aggregator = self
            .aggregator
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if aggregator.is_empty() {
            return None;
        }
        Some(StatsPayload {
            service: self.service.clone(),
            tracer_version: TRACER_VERSION.to_string(),
            lang: LANG.to_string(),
            stats: aggregator.serialize_and_clear(),
            hostname: self.hostname.clone(),
        })
    }

    /// Flushes every interval until `cancel_token` fires, then flushes one
    /// last time.
    pub async fn spin(self, cancel_token: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // discard first tick

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush().await;
                }
                () = cancel_token.cancelled() => {
                    debug!("Final flush of pathway stats");
                    self.flush().await;
                    break;
                }
            }
        }
    }

    /// Runs [`Flusher::spin`] on the current tokio runtime.
    #[must_use]
    pub fn start(self) -> FlusherHandle {
        let cancel_token = CancellationToken::new();
        let join_handle = tokio::spawn(self.spin(cancel_token.clone()));
        FlusherHandle {
            cancel_token,
            join_handle: Some(join_handle),
        }
    }
}

/// Owner of a flush loop, or of none when flushing is disabled.
pub struct FlusherHandle {
    cancel_token: CancellationToken,
    join_handle: Option<JoinHandle<()>>,
}

impl FlusherHandle {
    /// A handle with no loop behind it. Its token is already cancelled.
    #[must_use]
    pub fn idle() -> Self {
        let cancel_token = CancellationToken::new();
        cancel_token.cancel();
        FlusherHandle {
            cancel_token,
            join_handle: None,
        }
    }

    /// Stops the loop and waits for its final flush.
    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        let Some(join_handle) = self.join_handle else {
            return;
        };
        if let Err(e) = join_handle.await {
            debug!("Flush loop ended abnormally: {e}");
        }
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }
}
