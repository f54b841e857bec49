// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Packet encode/decode and datagram classification.
//!
//! Three packet kinds share the token and rule listeners: full token
//! packets, chunk envelopes, and rule-install packets. Classification
//! is structural (which top-level fields are present) so the listeners
//! stay format-agnostic.

use crate::chunk::{plan_chunks, ChunkEnvelope};
use crate::compress::{gzip, maybe_gunzip};
use serde::{Deserialize, Serialize};
use tf_core::Token;
use thiserror::Error;

/// Default datagram size limit, bytes.
pub const DEFAULT_MAX_WIRE_LENGTH: usize = 4096;

/// Errors from wire encode/decode.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed packet: {0}")]
    Malformed(String),
    #[error("missing or invalid envelope field: {0}")]
    MissingField(String),
    #[error("datagram exceeds wire limit even after chunk planning ({size} > {limit})")]
    Oversize { size: usize, limit: usize },
    #[error("chunk envelope invalid: {0}")]
    BadChunk(String),
    #[error("compression: {0}")]
    Compression(#[from] std::io::Error),
    #[error("malformed commitment ack: {0}")]
    BadAck(String),
}

/// One decoded datagram from either listener.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Token(Box<Token>),
    Chunk(ChunkEnvelope),
    RuleInstall(Box<RuleInstallPacket>),
}

/// Rule-install packet header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleInstallHeader {
    #[serde(rename = "ruleBaseVersion")]
    pub rule_base_version: String,
    #[serde(rename = "ruleBaseCommitment")]
    pub rule_base_commitment: bool,
}

/// Target of a rule installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetService {
    #[serde(rename = "serviceName")]
    pub service_name: String,
    #[serde(rename = "operationName")]
    pub operation_name: String,
}

/// The rule bundle text being installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFileData {
    pub data: String,
}

/// A rule-install request as it travels on the rule listener port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleInstallPacket {
    pub header: RuleInstallHeader,
    #[serde(rename = "targetservice")]
    pub target_service: TargetService,
    #[serde(rename = "rulefiledata")]
    pub rule_file_data: RuleFileData,
}

/// Commitment acknowledgement line: `CONFIRMED:<version>:<count>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentAck {
    pub version: String,
    pub count: usize,
}

impl CommitmentAck {
    pub fn to_line(&self) -> String {
        format!("CONFIRMED:{}:{}", self.version, self.count)
    }

    pub fn parse(line: &str) -> Result<Self, WireError> {
        let mut parts = line.trim_end().splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("CONFIRMED"), Some(version), Some(count)) => {
                let count = count
                    .parse()
                    .map_err(|_| WireError::BadAck(format!("bad count in {line:?}")))?;
                Ok(Self { version: version.to_string(), count })
            }
            _ => Err(WireError::BadAck(line.to_string())),
        }
    }
}

/// Sender-side transport options.
#[derive(Debug, Clone, Copy)]
pub struct WireOptions {
    pub max_wire_length: usize,
    pub compression_enabled: bool,
}

impl Default for WireOptions {
    fn default() -> Self {
        Self { max_wire_length: DEFAULT_MAX_WIRE_LENGTH, compression_enabled: true }
    }
}

/// What the publisher actually puts on the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WirePayload {
    Single(Vec<u8>),
    Chunked(Vec<Vec<u8>>),
}

/// Serialize a token packet (uncompressed).
pub fn encode_token(token: &Token) -> Result<Vec<u8>, WireError> {
    serde_json::to_vec(token).map_err(|e| WireError::Malformed(e.to_string()))
}

/// Decode a token packet from (possibly compressed) datagram bytes.
/// Every envelope field is mandatory; any missing field is an error.
pub fn decode_token(bytes: &[u8]) -> Result<Token, WireError> {
    let plain = maybe_gunzip(bytes)?;
    serde_json::from_slice(&plain).map_err(|e| {
        if e.is_data() {
            WireError::MissingField(e.to_string())
        } else {
            WireError::Malformed(e.to_string())
        }
    })
}

/// Classify one datagram from either listener.
pub fn classify(bytes: &[u8]) -> Result<Frame, WireError> {
    let plain = maybe_gunzip(bytes)?;
    let value: serde_json::Value =
        serde_json::from_slice(&plain).map_err(|e| WireError::Malformed(e.to_string()))?;
    let (is_chunk, is_rule_install) = match value.as_object() {
        Some(obj) => (obj.contains_key("chunkIndex"), obj.contains_key("rulefiledata")),
        None => return Err(WireError::Malformed("packet is not an object".to_string())),
    };

    if is_chunk {
        let envelope: ChunkEnvelope = serde_json::from_value(value)
            .map_err(|e| WireError::BadChunk(e.to_string()))?;
        return Ok(Frame::Chunk(envelope));
    }
    if is_rule_install {
        let packet: RuleInstallPacket = serde_json::from_value(value)
            .map_err(|e| WireError::MissingField(e.to_string()))?;
        return Ok(Frame::RuleInstall(Box::new(packet)));
    }
    let token: Token = serde_json::from_value(value).map_err(|e| {
        if e.is_data() {
            WireError::MissingField(e.to_string())
        } else {
            WireError::Malformed(e.to_string())
        }
    })?;
    Ok(Frame::Token(Box::new(token)))
}

/// Prepare a token for the socket: compress when enabled, then either a
/// single datagram or an ordered chunk set.
pub fn encode_for_wire(token: &Token, opts: WireOptions) -> Result<WirePayload, WireError> {
    let plain = encode_token(token)?;
    let bytes = if opts.compression_enabled { gzip(&plain)? } else { plain };
    if bytes.len() <= opts.max_wire_length {
        return Ok(WirePayload::Single(bytes));
    }
    let chunks = plan_chunks(
        &bytes,
        opts.max_wire_length,
        &token.service.service_name,
        &token.service.operation_name,
    )?;
    Ok(WirePayload::Chunked(chunks))
}

/// Prepare a rule-install packet the same way.
pub fn encode_rule_install(
    packet: &RuleInstallPacket,
    opts: WireOptions,
) -> Result<WirePayload, WireError> {
    let plain = serde_json::to_vec(packet).map_err(|e| WireError::Malformed(e.to_string()))?;
    let bytes = if opts.compression_enabled { gzip(&plain)? } else { plain };
    if bytes.len() <= opts.max_wire_length {
        return Ok(WirePayload::Single(bytes));
    }
    let chunks = plan_chunks(
        &bytes,
        opts.max_wire_length,
        &packet.target_service.service_name,
        &packet.target_service.operation_name,
    )?;
    Ok(WirePayload::Chunked(chunks))
}

#[cfg(test)]
#[path = "packet_tests.rs"]
mod tests;
