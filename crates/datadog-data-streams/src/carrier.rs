// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Carriers move the pathway context across a message boundary, usually
//! as a message header.
//!
//! Keys are lowercased on both sides so a context survives header
//! normalization by brokers and HTTP stacks.

use std::collections::HashMap;

use serde_json::Value;

use crate::constants::PROPAGATION_KEY;
use crate::pathway::PathwayContext;

/// Writes into outgoing message metadata.
pub trait Injector {
    fn set(&mut self, key: &str, value: String);
}

/// Reads from incoming message metadata.
pub trait Extractor {
    fn get(&self, key: &str) -> Option<&str>;
}

impl<S: std::hash::BuildHasher> Injector for HashMap<String, String, S> {
    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_lowercase(), value);
    }
}

impl<S: std::hash::BuildHasher> Extractor for HashMap<String, String, S> {
    fn get(&self, key: &str) -> Option<&str> {
        self.get(&key.to_lowercase()).map(String::as_str)
    }
}

/// Only `Value::Object` carries anything; other values are ignored.
impl Injector for Value {
    fn set(&mut self, key: &str, value: String) {
        if let Value::Object(map) = self {
            map.insert(key.to_lowercase(), Value::String(value));
        }
    }
}

impl Extractor for Value {
    fn get(&self, key: &str) -> Option<&str> {
        if let Value::Object(map) = self {
            map.get(&key.to_lowercase()).and_then(Value::as_str)
        } else {
            None
        }
    }
}

/// Writes `ctx` under [`PROPAGATION_KEY`].
pub fn inject(ctx: &PathwayContext, carrier: &mut dyn Injector) {
    carrier.set(PROPAGATION_KEY, ctx.encode_b64());
}

/// Reads the context under [`PROPAGATION_KEY`], if present and well formed.
#[must_use]
pub fn extract(carrier: &dyn Extractor) -> Option<PathwayContext> {
    carrier.get(PROPAGATION_KEY).and_then(PathwayContext::decode_b64)
}

#[cfg(test)]
mod test {
    use super::*;

    const T0: i64 = 1_700_000_000_000_000_000;

    #[test]
    fn hash_map_get() {
        let mut carrier = HashMap::new();
        carrier.set("Dd-Pathway-Ctx-Base64", "value".to_string());

        assert_eq!(
            Extractor::get(&carrier, "DD-PATHWAY-CTX-BASE64"),
            Some("value"),
            "case insensitive extraction"
        );
    }

    #[test]
    fn serde_value_get() {
        let mut carrier = Value::Object(serde_json::Map::new());
        carrier.set("Dd-Pathway-Ctx-Base64", "value".to_string());

        assert_eq!(Extractor::get(&carrier, PROPAGATION_KEY), Some("value"));
        assert_eq!(Extractor::get(&Value::Null, PROPAGATION_KEY), None);
    }

    #[test]
    fn inject_then_extract() {
        let ctx = PathwayContext::from_wire(42, T0, T0 + 1_000_000);
        let mut carrier: HashMap<String, String> = HashMap::new();
        inject(&ctx, &mut carrier);

        assert_eq!(carrier[PROPAGATION_KEY], ctx.encode_b64());
        let extracted = extract(&carrier).expect("context present");
        assert_eq!(extracted.hash, 42);
        assert_eq!(extracted.pathway_start_ns, T0);
        assert_eq!(extracted.current_edge_start_ns, T0 + 1_000_000);
    }

    #[test]
    fn extract_missing_or_malformed() {
        let mut carrier: HashMap<String, String> = HashMap::new();
        assert!(extract(&carrier).is_none());

        carrier.set(PROPAGATION_KEY, "not base64!".to_string());
        assert!(extract(&carrier).is_none());

        carrier.set(PROPAGATION_KEY, "AAAA".to_string());
        assert!(extract(&carrier).is_none());
    }
}
