// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Carrier key under which the base64 pathway context travels.
pub const PROPAGATION_KEY: &str = "dd-pathway-ctx-base64";

/// Service name hashed into the pathway when none is configured.
pub const DEFAULT_SERVICE: &str = "unnamed-rust-service";

/// Environment hashed into the pathway when none is configured.
pub const DEFAULT_ENV: &str = "none";

pub const LANG: &str = "rust";

pub const TRACER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const NS_PER_SEC: i64 = 1_000_000_000;
pub const NS_PER_MS: i64 = 1_000_000;

/// Default flush interval, which is also the stats bucket width.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);

/// Kafka produce and commit offsets are kept per 10s window regardless of
/// the configured bucket width.
pub const OFFSET_BUCKET_NS: i64 = 10 * NS_PER_SEC;

pub const DEFAULT_AGENT_HOST: &str = "localhost";
pub const DEFAULT_AGENT_PORT: u16 = 8126;
pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(2);

pub const PIPELINE_STATS_PATH: &str = "/v0.1/pipeline_stats";

/// Span tag linking a span to the pathway hash it produced.
pub const PATHWAY_HASH_TAG: &str = "pathway.hash";

pub const DIRECTION_TAG_PREFIX: &str = "direction:";
pub const DIRECTION_IN_TAG: &str = "direction:in";
pub const DIRECTION_OUT_TAG: &str = "direction:out";
pub const MANUAL_CHECKPOINT_TAG: &str = "manual_checkpoint:true";
