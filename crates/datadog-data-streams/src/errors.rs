// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for pathway tracking.
//!
//! Only [`Creation`] ever reaches an application: it is returned when the
//! processor cannot be built. Decode and shipping errors are handled inside
//! the crate, logged at debug and turned into "no context" or a dropped
//! flush respectively.

use reqwest::StatusCode;

/// Failure to construct a processor or one of its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum Creation {
    #[error("latency sketch encoding is unavailable: {0}")]
    SketchUnavailable(String),
    #[error("bucket size must be greater than zero")]
    ZeroBucketSize,
    #[error("failed to build agent http client: {0}")]
    HttpClient(String),
}

/// Malformed propagated pathway data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Decode {
    #[error("buffer holds {0} bytes, the hash alone needs 8")]
    TooShort(usize),
    #[error("varint does not fit in 64 bits")]
    VarintOverflow,
    #[error("varint truncated by end of buffer")]
    Truncated,
    #[error("invalid base64: {0}")]
    InvalidBase64(String),
}

/// Failure to deliver a payload to the agent.
#[derive(Debug, thiserror::Error)]
pub enum Shipping {
    #[error("failed to prepare payload: {0}")]
    Payload(String),
    #[error("failed to reach agent ({0:?}): {1}")]
    Destination(Option<StatusCode>, String),
}
