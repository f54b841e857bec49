// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chunked transfer for payloads over the wire limit.
//!
//! The sender base64-encodes the (already compressed) packet bytes and
//! slices the text into envelopes; the receiver buffers envelopes per
//! correlation id and reassembles once every index is present. Partial
//! sets age out after a timeout.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::packet::WireError;

/// Envelope overhead budget: fixed JSON keys, a uuid correlation id,
/// and index digits.
pub const CHUNK_ENVELOPE_OVERHEAD: usize = 150;

/// Safety factor on top of the overhead budget.
pub const CHUNK_SAFETY_MARGIN: usize = 32;

/// One fragment of an oversize packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkEnvelope {
    #[serde(rename = "chunkIndex")]
    pub chunk_index: u32,
    #[serde(rename = "totalChunks")]
    pub total_chunks: u32,
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
    #[serde(rename = "serviceType")]
    pub service_type: String,
    #[serde(rename = "operationName")]
    pub operation_name: String,
    /// base64 slice, safe for JSON embedding.
    #[serde(rename = "chunkData")]
    pub chunk_data: String,
}

/// Split packet bytes into serialized chunk envelopes, each within the
/// wire limit.
pub fn plan_chunks(
    bytes: &[u8],
    max_wire_length: usize,
    service_type: &str,
    operation_name: &str,
) -> Result<Vec<Vec<u8>>, WireError> {
    let budget = CHUNK_ENVELOPE_OVERHEAD
        + CHUNK_SAFETY_MARGIN
        + service_type.len()
        + operation_name.len();
    let slice_len = max_wire_length.saturating_sub(budget);
    if slice_len == 0 {
        return Err(WireError::Oversize { size: bytes.len(), limit: max_wire_length });
    }

    let encoded = BASE64.encode(bytes);
    let slices: Vec<&str> = encoded
        .as_bytes()
        .chunks(slice_len)
        // base64 output is ASCII, byte chunks stay on char boundaries
        .map(|c| std::str::from_utf8(c).unwrap_or(""))
        .collect();
    let total = slices.len() as u32;
    let correlation_id = uuid::Uuid::new_v4().to_string();

    let mut out = Vec::with_capacity(slices.len());
    for (i, slice) in slices.iter().enumerate() {
        let envelope = ChunkEnvelope {
            chunk_index: i as u32,
            total_chunks: total,
            correlation_id: correlation_id.clone(),
            service_type: service_type.to_string(),
            operation_name: operation_name.to_string(),
            chunk_data: (*slice).to_string(),
        };
        let datagram =
            serde_json::to_vec(&envelope).map_err(|e| WireError::BadChunk(e.to_string()))?;
        if datagram.len() > max_wire_length {
            return Err(WireError::Oversize { size: datagram.len(), limit: max_wire_length });
        }
        out.push(datagram);
    }
    Ok(out)
}

/// A partial reassembly that aged out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredChunkSet {
    pub correlation_id: String,
    pub received: usize,
    pub total: usize,
}

struct PartialSet {
    total: u32,
    parts: HashMap<u32, String>,
    first_seen_ms: u64,
}

/// Per-correlation-id reassembly buffer.
pub struct Reassembler {
    sets: HashMap<String, PartialSet>,
    timeout_ms: u64,
}

impl Reassembler {
    pub fn new(timeout_ms: u64) -> Self {
        Self { sets: HashMap::new(), timeout_ms }
    }

    /// Accept one envelope. Returns the reassembled packet bytes once
    /// every index is present.
    pub fn accept(
        &mut self,
        envelope: ChunkEnvelope,
        now_ms: u64,
    ) -> Result<Option<Vec<u8>>, WireError> {
        if envelope.total_chunks == 0 || envelope.chunk_index >= envelope.total_chunks {
            return Err(WireError::BadChunk(format!(
                "index {} out of range for {} chunks",
                envelope.chunk_index, envelope.total_chunks
            )));
        }

        let set = self
            .sets
            .entry(envelope.correlation_id.clone())
            .or_insert_with(|| PartialSet {
                total: envelope.total_chunks,
                parts: HashMap::new(),
                first_seen_ms: now_ms,
            });
        if set.total != envelope.total_chunks {
            return Err(WireError::BadChunk(format!(
                "total mismatch for {}: {} vs {}",
                envelope.correlation_id, set.total, envelope.total_chunks
            )));
        }
        // Duplicate datagrams overwrite in place; content is identical.
        set.parts.insert(envelope.chunk_index, envelope.chunk_data);

        if set.parts.len() < set.total as usize {
            return Ok(None);
        }

        let correlation_id = envelope.correlation_id;
        let set = match self.sets.remove(&correlation_id) {
            Some(s) => s,
            None => return Ok(None),
        };
        let mut encoded = String::new();
        for i in 0..set.total {
            match set.parts.get(&i) {
                Some(part) => encoded.push_str(part),
                None => {
                    return Err(WireError::BadChunk(format!(
                        "reassembly of {correlation_id} missing index {i}"
                    )))
                }
            }
        }
        let bytes = BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| WireError::BadChunk(e.to_string()))?;
        Ok(Some(bytes))
    }

    /// Drop partial sets older than the timeout, reporting what was lost.
    pub fn sweep(&mut self, now_ms: u64) -> Vec<ExpiredChunkSet> {
        let timeout = self.timeout_ms;
        let expired: Vec<String> = self
            .sets
            .iter()
            .filter(|(_, set)| now_ms.saturating_sub(set.first_seen_ms) >= timeout)
            .map(|(id, _)| id.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|id| {
                self.sets.remove(&id).map(|set| ExpiredChunkSet {
                    correlation_id: id,
                    received: set.parts.len(),
                    total: set.total as usize,
                })
            })
            .collect()
    }

    /// Number of in-flight partial sets.
    pub fn pending(&self) -> usize {
        self.sets.len()
    }
}

#[cfg(test)]
#[path = "chunk_tests.rs"]
mod tests;
