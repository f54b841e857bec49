// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the node crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Resolve state directory: TF_STATE_DIR > XDG_STATE_HOME/tokenflow > ~/.local/state/tokenflow
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("TF_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("tokenflow"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/tokenflow"))
}

/// Remote-deployment host flag. Presence switches the rule handler and
/// address resolution into remote mode (bind all interfaces, versioned
/// ACK ports).
pub fn remote_host() -> Option<String> {
    std::env::var("SERVICE_REMOTE_HOST").ok().filter(|s| !s.is_empty())
}

/// Shutdown drain timeout (default 5s, configurable via `TF_DRAIN_TIMEOUT_MS`).
pub fn drain_timeout() -> Duration {
    std::env::var("TF_DRAIN_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}
