// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Latency sketches.
//!
//! Latencies are summarized with libdatadog's DDSketch and shipped as the
//! `DDSketch` protobuf message (mapping, positive and negative stores, zero
//! count), which is what the pipeline stats intake decodes.

use datadog_ddsketch::DDSketch;
use tracing::debug;

use crate::errors::Creation;

#[derive(Default)]
pub struct LatencySketch {
    inner: DDSketch,
}

impl LatencySketch {
    /// Adds one observation, in seconds.
    pub fn add(&mut self, seconds: f64) {
        if let Err(e) = self.inner.add(seconds) {
            debug!("Dropping latency {seconds}: {e}");
        }
    }

    #[must_use]
    pub fn count(&self) -> f64 {
        self.inner.count()
    }

    /// Encodes the sketch as a `DDSketch` protobuf message.
    #[must_use]
    pub fn encode(self) -> Vec<u8> {
        self.inner.encode_to_vec()
    }

    /// Verifies that sketches can be built and encoded on this platform.
    /// Every stat depends on it, so a processor refuses to start without it.
    pub fn check_available() -> Result<(), Creation> {
        let mut sketch = DDSketch::default();
        sketch
            .add(1.0)
            .map_err(|e| Creation::SketchUnavailable(e.to_string()))?;
        if sketch.encode_to_vec().is_empty() {
            return Err(Creation::SketchUnavailable(
                "sketch encoded to an empty buffer".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reads back the total count of an encoded `DDSketch` message: the zero
/// count plus every bin of both stores.
#[cfg(test)]
pub(crate) fn encoded_count(bytes: &[u8]) -> f64 {
    use protobuf::CodedInputStream;

    let mut input = CodedInputStream::from_bytes(bytes);
    let mut count = 0.0;
    while let Some(tag) = input.read_raw_tag_or_eof().unwrap() {
        match (tag >> 3, tag & 7) {
            // mapping
            (1, 2) => {
                input.read_bytes().unwrap();
            }
            // positiveValues, negativeValues
            (2 | 3, 2) => count += store_count(&input.read_bytes().unwrap()),
            // zeroCount
            (4, 1) => count += input.read_double().unwrap(),
            other => panic!("unexpected DDSketch field {other:?}"),
        }
    }
    count
}

#[cfg(test)]
fn store_count(bytes: &[u8]) -> f64 {
    use protobuf::CodedInputStream;

    let mut input = CodedInputStream::from_bytes(bytes);
    let mut count = 0.0;
    while let Some(tag) = input.read_raw_tag_or_eof().unwrap() {
        match (tag >> 3, tag & 7) {
            // binCounts map entry
            (1, 2) => {
                let entry_bytes = input.read_bytes().unwrap();
                let mut entry = CodedInputStream::from_bytes(&entry_bytes);
                while let Some(tag) = entry.read_raw_tag_or_eof().unwrap() {
                    match (tag >> 3, tag & 7) {
                        (1, 0) => {
                            entry.read_sint32().unwrap();
                        }
                        (2, 1) => count += entry.read_double().unwrap(),
                        other => panic!("unexpected bin entry field {other:?}"),
                    }
                }
            }
            // contiguousBinCounts, packed or not
            (2, 2) => {
                let mut values = Vec::new();
                input.read_repeated_packed_double_into(&mut values).unwrap();
                count += values.iter().sum::<f64>();
            }
            (2, 1) => count += input.read_double().unwrap(),
            // contiguousBinIndexOffset
            (3, 0) => {
                input.read_sint32().unwrap();
            }
            other => panic!("unexpected store field {other:?}"),
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sketches_are_available() {
        assert!(LatencySketch::check_available().is_ok());
    }

    #[test]
    fn test_add_counts_observations() {
        let mut sketch = LatencySketch::default();
        assert_eq!(sketch.count(), 0.0);
        sketch.add(0.25);
        sketch.add(1.5);
        sketch.add(0.0);
        assert_eq!(sketch.count(), 3.0);
    }

    #[test]
    fn test_encode_is_a_ddsketch_message() {
        let mut sketch = LatencySketch::default();
        sketch.add(0.5);
        sketch.add(2.0);
        sketch.add(0.0);

        let bytes = sketch.encode();
        // Field 1 (mapping), length-delimited. The agent-metrics sketch
        // would start with a varint count instead.
        assert_eq!(bytes[0], 0x0a);
        assert_eq!(encoded_count(&bytes), 3.0);
    }
}
