// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Hostname reported in every stats payload.

use std::env;

use tracing::debug;

const UNKNOWN_HOSTNAME: &str = "unknown";

/// Resolves the hostname from, in order: `DD_HOSTNAME`, `HOSTNAME`, the
/// system hostname, and finally `"unknown"`. Empty values are skipped.
#[must_use]
pub fn get_hostname() -> String {
    for var in ["DD_HOSTNAME", "HOSTNAME"] {
        if let Ok(hostname) = env::var(var) {
            if !hostname.is_empty() {
                return hostname;
            }
        }
    }

    match nix::unistd::gethostname() {
        Ok(hostname) => match hostname.into_string() {
            Ok(hostname) if !hostname.is_empty() => return hostname,
            Ok(_) => debug!("System hostname is empty"),
            Err(_) => debug!("System hostname is not valid UTF-8"),
        },
        Err(e) => debug!("Failed to get system hostname: {e}"),
    }

    UNKNOWN_HOSTNAME.to_string()
}
