// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire formats for the Tokenflow UDP transport.
//!
//! Token packets and rule-install packets travel as JSON datagrams,
//! optionally gzip-compressed. Payloads larger than the wire limit are
//! split into chunk envelopes and reassembled per correlation id.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod chunk;
mod compress;
mod packet;

pub use chunk::{
    plan_chunks, ChunkEnvelope, Reassembler, ExpiredChunkSet, CHUNK_ENVELOPE_OVERHEAD,
    CHUNK_SAFETY_MARGIN,
};
pub use compress::{gzip, maybe_gunzip, is_gzip};
pub use packet::{
    classify, decode_token, encode_for_wire, encode_rule_install, encode_token, CommitmentAck,
    Frame, RuleFileData, RuleInstallHeader, RuleInstallPacket, TargetService, WireError,
    WireOptions, WirePayload, DEFAULT_MAX_WIRE_LENGTH,
};
