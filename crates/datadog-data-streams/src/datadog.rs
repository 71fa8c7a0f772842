// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of pipeline stats to the trace agent.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::StatusCode;
use tracing::debug;

use crate::constants::{LANG, PIPELINE_STATS_PATH, TRACER_VERSION};
use crate::errors::{Creation, Shipping};
use crate::payload::StatsPayload;

/// Where flushed payloads go. Implemented by [`AgentApi`] and by test doubles.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, payload: &StatsPayload) -> Result<StatusCode, Shipping>;
}

/// Client for the agent's `pipeline_stats` endpoint.
#[derive(Debug, Clone)]
pub struct AgentApi {
    client: reqwest::Client,
    url: String,
}

impl AgentApi {
    pub fn new(agent_url: &str, timeout: Duration) -> Result<Self, Creation> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Creation::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            url: format!("{}{PIPELINE_STATS_PATH}", agent_url.trim_end_matches('/')),
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// msgpack with named fields, then gzip.
pub fn encode_payload(payload: &StatsPayload) -> Result<Vec<u8>, Shipping> {
    let msgpack =
        rmp_serde::to_vec_named(payload).map_err(|e| Shipping::Payload(e.to_string()))?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&msgpack)
        .map_err(|e| Shipping::Payload(e.to_string()))?;
    encoder.finish().map_err(|e| Shipping::Payload(e.to_string()))
}

#[async_trait]
impl Transport for AgentApi {
    async fn send(&self, payload: &StatsPayload) -> Result<StatusCode, Shipping> {
        let body = encode_payload(payload)?;
        debug!(
            "Sending {} stats buckets ({} bytes) to {}",
            payload.stats.len(),
            body.len(),
            self.url
        );

        let resp = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/msgpack")
            .header(CONTENT_ENCODING, "gzip")
            .header("Datadog-Meta-Lang", LANG)
            .header("Datadog-Meta-Tracer-Version", TRACER_VERSION)
            .body(body)
            .send()
            .await
            .map_err(|e| Shipping::Destination(e.status(), e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            Ok(status)
        } else {
            let text = resp.text().await.unwrap_or_default();
            Err(Shipping::Destination(Some(status), text))
        }
    }
}
