// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sequence-id arithmetic.
//!
//! The 64-bit sequence id is the fork-correlation protocol: there is no
//! wire-level correlation field. Encoded structure:
//!
//! `sequenceId = versionBase + workflowOrdinal * TOKEN_INCREMENT + branch`
//!
//! Branch 0 is the parent; branches 1..=9999 are fork children. All
//! siblings of a fork share the same parent id, recovered by rounding
//! down to the nearest `TOKEN_INCREMENT`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Spacing between workflow instances within one version band.
pub const TOKEN_INCREMENT: u64 = 10_000;

/// Spacing between rule-base version bands.
pub const VERSION_BASE: u64 = 1_000_000;

/// Version number reserved for admin traffic (skips monitor emission).
pub const ADMIN_VERSION: u32 = 999;

/// Highest legal fork branch. Arity 10_000 is rejected at deploy time.
pub const MAX_BRANCH: u64 = TOKEN_INCREMENT - 1;

/// Errors from sequence-id construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeqError {
    #[error("fork branch {0} out of range 1..={MAX_BRANCH}")]
    BranchOutOfRange(u64),
    #[error("version number {0} out of range 1..={ADMIN_VERSION}")]
    VersionOutOfRange(u32),
}

/// Globally unique per-token identifier carrying version, workflow
/// ordinal, and fork branch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct SequenceId(pub u64);

impl SequenceId {
    /// Compose a parent (branch 0) id from a version band and workflow ordinal.
    pub fn compose(version: u32, ordinal: u64) -> Result<Self, SeqError> {
        if version == 0 || version > ADMIN_VERSION {
            return Err(SeqError::VersionOutOfRange(version));
        }
        Ok(Self(u64::from(version) * VERSION_BASE + ordinal * TOKEN_INCREMENT))
    }

    /// The fork branch: 0 for a parent, 1..=9999 for fork children.
    pub fn branch(self) -> u64 {
        self.0 % TOKEN_INCREMENT
    }

    /// True for fork children (non-zero branch).
    pub fn is_child(self) -> bool {
        self.branch() != 0
    }

    /// The parent id shared by all siblings of a fork.
    pub fn parent(self) -> SequenceId {
        SequenceId(self.0 - self.0 % TOKEN_INCREMENT)
    }

    /// The id of fork child `k` of this parent.
    pub fn child(self, k: u64) -> Result<SequenceId, SeqError> {
        if k == 0 || k > MAX_BRANCH {
            return Err(SeqError::BranchOutOfRange(k));
        }
        Ok(SequenceId(self.parent().0 + k))
    }

    /// The rule-base version number encoded in the id band.
    pub fn version_number(self) -> u32 {
        (self.0 / VERSION_BASE) as u32
    }

    /// The rule-base version string (`v001` style) for this id.
    pub fn rule_base_version(self) -> RuleBaseVersion {
        RuleBaseVersion::from_number(self.version_number())
    }

    /// The workflow ordinal within the version band.
    pub fn workflow_ordinal(self) -> u64 {
        (self.0 % VERSION_BASE) / TOKEN_INCREMENT
    }

    /// Admin-band ids bypass monitor emission but route normally.
    pub fn is_admin(self) -> bool {
        self.version_number() == ADMIN_VERSION
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SequenceId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Rule-base version tag as carried on the wire (`v001`, `v002`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleBaseVersion(pub String);

impl RuleBaseVersion {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Format a version number as its wire tag.
    pub fn from_number(n: u32) -> Self {
        Self(format!("v{n:03}"))
    }

    /// Parse the numeric version, if the tag is well-formed.
    pub fn number(&self) -> Option<u32> {
        self.0.strip_prefix('v').and_then(|digits| digits.parse().ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Admin-range versions (`v999`) skip monitor emission.
    pub fn is_admin(&self) -> bool {
        self.number() == Some(ADMIN_VERSION)
    }
}

impl fmt::Display for RuleBaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RuleBaseVersion {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
#[path = "seq_tests.rs"]
mod tests;
