// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deployment description for one node: its place identity, the logical
//! channel map, and the operations it hosts.
//!
//! Port bands are part of the external contract:
//! token listeners at `10_000 + channelIndex*1_000 + basePort`, rule
//! listeners at `20_000 + ...`, rule ACKs at `30_000` (local) or
//! `35_000 + versionNumber` (remote).

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Token listener port band.
pub const TOKEN_PORT_BASE: u16 = 10_000;
/// Rule listener port band.
pub const RULE_PORT_BASE: u16 = 20_000;
/// Fixed ACK port in local mode.
pub const RULE_ACK_LOCAL_PORT: u16 = 30_000;
/// ACK band in remote mode, offset by the rule-base version number.
pub const RULE_ACK_REMOTE_BASE: u16 = 35_000;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("failed to read deployment: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse deployment: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown channel: {0}")]
    UnknownChannel(String),
}

/// One logical channel endpoint (`ip0`, `ip1`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Channel {
    pub host: String,
    pub channel_index: u16,
}

impl Channel {
    pub fn token_port(&self, base_port: u16) -> u16 {
        TOKEN_PORT_BASE + self.channel_index * 1_000 + base_port
    }

    pub fn rule_port(&self, base_port: u16) -> u16 {
        RULE_PORT_BASE + self.channel_index * 1_000 + base_port
    }
}

/// ACK destination port for a commitment, by deployment mode.
pub fn rule_ack_port(remote: bool, version_number: u32) -> u16 {
    if remote {
        RULE_ACK_REMOTE_BASE + version_number as u16
    } else {
        RULE_ACK_LOCAL_PORT
    }
}

/// One node's deployment description, read from `deployment.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Deployment {
    /// The service this node hosts; the admission filter.
    pub service_name: String,
    /// The place id used as the response-envelope key by prior hops.
    pub place_id: String,
    /// This node's own channel position and port offset.
    pub channel_index: u16,
    #[serde(default)]
    pub base_port: u16,
    /// Build identifier threaded into the invocation context.
    #[serde(default)]
    pub build_version: String,
    /// Operations hosted at this place.
    #[serde(default)]
    pub operations: Vec<String>,
    /// Logical channel map used for routing targets.
    #[serde(default)]
    pub channels: HashMap<String, Channel>,
}

impl Deployment {
    pub fn load(path: &Path) -> Result<Self, DeployError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn parse(text: &str) -> Result<Self, DeployError> {
        Ok(toml::from_str(text)?)
    }

    /// This node's token listener port.
    pub fn token_port(&self) -> u16 {
        TOKEN_PORT_BASE + self.channel_index * 1_000 + self.base_port
    }

    /// This node's rule listener port.
    pub fn rule_port(&self) -> u16 {
        RULE_PORT_BASE + self.channel_index * 1_000 + self.base_port
    }

    pub fn channel(&self, id: &str) -> Result<&Channel, DeployError> {
        self.channels.get(id).ok_or_else(|| DeployError::UnknownChannel(id.to_string()))
    }
}

#[cfg(test)]
#[path = "deploy_tests.rs"]
mod tests;
