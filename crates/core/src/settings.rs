// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loader settings for a node, read from `loaderSettings.toml`.
//!
//! Unknown keys are ignored; a missing file yields defaults so a bare
//! node can start without any configuration on disk.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Reactor queue and worker-pool sizing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReactorSettings {
    /// Priority-queue capacity. Joins in progress may grow past it.
    pub max_queue: usize,
    /// Workers draining the priority queue.
    pub pool_size: usize,
    /// Age-out for partial chunk reassemblies.
    pub chunk_timeout_ms: u64,
}

impl Default for ReactorSettings {
    fn default() -> Self {
        Self { max_queue: 64, pool_size: 2, chunk_timeout_ms: 30_000 }
    }
}

/// Monitoring observer switches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub monitor_incoming_events: bool,
    /// When true, a completed-join survivor preempts FIFO order.
    pub enable_completed_join_priority: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self { monitor_incoming_events: true, enable_completed_join_priority: false }
    }
}

/// Publisher transport tuning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PublisherSettings {
    /// Largest datagram the publisher will emit, in bytes.
    pub max_wire_length: usize,
    pub socket_timeout_ms: u64,
    pub compression_enabled: bool,
    /// Pause between chunk datagrams of one logical token.
    pub chunk_delay_ms: u64,
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            max_wire_length: 4096,
            socket_timeout_ms: 5_000,
            compression_enabled: true,
            chunk_delay_ms: 10,
        }
    }
}

/// Complete node settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    pub reactor: ReactorSettings,
    pub monitor: MonitorSettings,
    pub publisher: PublisherSettings,
}

impl LoaderSettings {
    /// Load from a TOML file; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(toml::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn parse(text: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
