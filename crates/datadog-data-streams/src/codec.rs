// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Binary wire format of a pathway context.
//!
//! ```text
//! bytes[0..8) : hash, u64 little-endian
//! uvarint     : pathway start, milliseconds since the epoch
//! uvarint     : current edge start, milliseconds since the epoch
//! ```
//!
//! Varints are unsigned LEB128: seven data bits per byte, least significant
//! group first, high bit set on every byte but the last. The same bytes are
//! shared with every other tracer runtime, so the layout is fixed.

use base64::Engine;

use crate::constants::NS_PER_MS;
use crate::errors::Decode;
use crate::pathway::PathwayContext;

const HASH_LEN: usize = 8;

/// Appends `value` as an unsigned LEB128 varint.
pub fn write_uvarint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        // Truncation keeps the low seven bits, the continuation bit is set.
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Reads an unsigned LEB128 varint from the front of `buf`, returning the
/// value and the number of bytes consumed.
pub fn read_uvarint(buf: &[u8]) -> Result<(u64, usize), Decode> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;
    for (i, &byte) in buf.iter().enumerate() {
        // The tenth byte holds bit 63 only.
        if shift >= 64 || (shift == 63 && byte > 1) {
            return Err(Decode::VarintOverflow);
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        shift += 7;
    }
    Err(Decode::Truncated)
}

#[must_use]
pub fn encode(ctx: &PathwayContext) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HASH_LEN + 2 * 6);
    buf.extend_from_slice(&ctx.hash.to_le_bytes());
    write_uvarint(&mut buf, nanos_to_millis(ctx.pathway_start_ns));
    write_uvarint(&mut buf, nanos_to_millis(ctx.current_edge_start_ns));
    buf
}

pub fn decode(bytes: &[u8]) -> Result<PathwayContext, Decode> {
    let Some((hash_bytes, rest)) = bytes.split_first_chunk::<HASH_LEN>() else {
        return Err(Decode::TooShort(bytes.len()));
    };
    let hash = u64::from_le_bytes(*hash_bytes);
    let (pathway_start_ms, read) = read_uvarint(rest)?;
    let (current_edge_start_ms, _) = read_uvarint(&rest[read..])?;

    Ok(PathwayContext::from_wire(
        hash,
        millis_to_nanos(pathway_start_ms),
        millis_to_nanos(current_edge_start_ms),
    ))
}

#[must_use]
pub fn encode_b64(ctx: &PathwayContext) -> String {
    base64::engine::general_purpose::STANDARD.encode(encode(ctx))
}

pub fn decode_b64(encoded: &str) -> Result<PathwayContext, Decode> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| Decode::InvalidBase64(e.to_string()))?;
    decode(&bytes)
}

/// Timestamps before the epoch cannot be represented on the wire and are
/// sent as zero.
fn nanos_to_millis(ns: i64) -> u64 {
    u64::try_from(ns.div_euclid(NS_PER_MS)).unwrap_or(0)
}

fn millis_to_nanos(ms: u64) -> i64 {
    i64::try_from(ms)
        .ok()
        .and_then(|ms| ms.checked_mul(NS_PER_MS))
        .unwrap_or(i64::MAX)
}
