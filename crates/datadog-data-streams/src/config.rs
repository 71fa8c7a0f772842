// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::time::Duration;

use tracing::debug;

use crate::constants::{
    DEFAULT_AGENT_HOST, DEFAULT_AGENT_PORT, DEFAULT_AGENT_TIMEOUT, DEFAULT_ENV,
    DEFAULT_FLUSH_INTERVAL, DEFAULT_SERVICE,
};
use crate::hostname::get_hostname;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub service: String,
    pub env: String,
    /// When false every checkpoint is a no-op.
    pub enabled: bool,
    /// How often stats are flushed. Also the stats bucket width.
    pub flush_interval: Duration,
    /// Base URL of the trace agent, without path.
    pub agent_url: String,
    pub timeout: Duration,
    pub hostname: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            service: DEFAULT_SERVICE.to_string(),
            env: DEFAULT_ENV.to_string(),
            enabled: true,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            agent_url: format!("http://{DEFAULT_AGENT_HOST}:{DEFAULT_AGENT_PORT}"),
            timeout: DEFAULT_AGENT_TIMEOUT,
            hostname: get_hostname(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn from_env() -> Config {
        let service = non_empty_var("DD_SERVICE").unwrap_or_else(|| DEFAULT_SERVICE.to_string());
        let env = non_empty_var("DD_ENV").unwrap_or_else(|| DEFAULT_ENV.to_string());
        let enabled = non_empty_var("DD_DATA_STREAMS_ENABLED")
            .map_or(true, |value| parse_enabled(&value));

        let flush_interval = non_empty_var("_DD_TRACE_STATS_WRITER_INTERVAL")
            .and_then(|value| {
                let parsed = parse_seconds(&value);
                if parsed.is_none() {
                    debug!("Ignoring invalid _DD_TRACE_STATS_WRITER_INTERVAL: {value}");
                }
                parsed
            })
            .unwrap_or(DEFAULT_FLUSH_INTERVAL);

        let timeout = non_empty_var("DD_TRACE_AGENT_TIMEOUT_SECONDS")
            .and_then(|value| {
                let parsed = parse_seconds(&value);
                if parsed.is_none() {
                    debug!("Ignoring invalid DD_TRACE_AGENT_TIMEOUT_SECONDS: {value}");
                }
                parsed
            })
            .unwrap_or(DEFAULT_AGENT_TIMEOUT);

        let agent_url = non_empty_var("DD_TRACE_AGENT_URL").unwrap_or_else(|| {
            let host =
                non_empty_var("DD_AGENT_HOST").unwrap_or_else(|| DEFAULT_AGENT_HOST.to_string());
            let port = non_empty_var("DD_TRACE_AGENT_PORT")
                .and_then(|port| match port.parse::<u16>() {
                    Ok(port) => Some(port),
                    Err(e) => {
                        debug!("Ignoring invalid DD_TRACE_AGENT_PORT {port}: {e}");
                        None
                    }
                })
                .unwrap_or(DEFAULT_AGENT_PORT);
            format!("http://{host}:{port}")
        });

        Config {
            service,
            env,
            enabled,
            flush_interval,
            agent_url,
            timeout,
            hostname: get_hostname(),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_enabled(value: &str) -> bool {
    !matches!(value.trim().to_lowercase().as_str(), "false" | "0")
}

/// Parses a positive, finite number of seconds.
fn parse_seconds(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}
