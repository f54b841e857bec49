// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Version-indexed store of committed rule bundles.
//!
//! Shared across every task in the node; reads vastly outnumber writes,
//! so the index lives behind a reader-preferring `RwLock`. A version
//! becomes visible to readers only as a whole: the rule handler builds
//! the complete operation map, then swaps it in under the write lock.

use crate::bundle::RuleBundle;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RuleStoreError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("bundle parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// All bundles of one committed version, keyed by operation name.
type VersionBundles = HashMap<String, RuleBundle>;

/// The node's committed rule bases. Cheap to clone the handle.
#[derive(Default)]
pub struct RuleStore {
    versions: RwLock<HashMap<String, VersionBundles>>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The admission predicate: true only for a committed
    /// `(version, service, operation)` triple.
    pub fn accepts(&self, version: &str, service: &str, operation: &str) -> bool {
        let versions = self.versions.read();
        versions
            .get(version)
            .and_then(|ops| ops.get(operation))
            .is_some_and(|bundle| bundle.service == service)
    }

    /// Whether any bundle set is committed under this version.
    pub fn has_version(&self, version: &str) -> bool {
        self.versions.read().contains_key(version)
    }

    /// Bundle lookup for guard/routing evaluation.
    pub fn bundle(&self, version: &str, operation: &str) -> Option<RuleBundle> {
        self.versions.read().get(version).and_then(|ops| ops.get(operation)).cloned()
    }

    /// Join arity for an operation under a version; 1 when unknown.
    pub fn required_arity(&self, version: &str, operation: &str) -> usize {
        self.bundle(version, operation).map_or(1, |b| b.arity)
    }

    /// Commit one bundle into a version, creating the version entry on
    /// first install. Returns the number of operations now committed
    /// under the version (the count echoed in the commitment ACK).
    pub fn commit(&self, version: &str, bundle: RuleBundle) -> usize {
        let mut versions = self.versions.write();
        let ops = versions.entry(version.to_string()).or_default();
        debug!(version, operation = %bundle.operation, "committing rule bundle");
        ops.insert(bundle.operation.clone(), bundle);
        ops.len()
    }

    /// Atomically replace a whole version entry.
    pub fn commit_version(&self, version: &str, bundles: VersionBundles) -> usize {
        let count = bundles.len();
        self.versions.write().insert(version.to_string(), bundles);
        info!(version, operations = count, "rule base committed");
        count
    }

    /// Committed version tags, unordered.
    pub fn committed_versions(&self) -> Vec<String> {
        self.versions.read().keys().cloned().collect()
    }

    /// On-disk location of a bundle:
    /// `RuleFolder.<version>/<operation>/<service>-ControlNodeRules.ruleml.xml`.
    pub fn bundle_path(root: &Path, version: &str, operation: &str, service: &str) -> PathBuf {
        root.join(format!("RuleFolder.{version}"))
            .join(operation)
            .join(format!("{service}-ControlNodeRules.ruleml.xml"))
    }

    /// Write a bundle to its version-qualified location.
    pub fn persist(
        root: &Path,
        version: &str,
        operation: &str,
        service: &str,
        text: &str,
    ) -> Result<PathBuf, RuleStoreError> {
        let path = Self::bundle_path(root, version, operation, service);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RuleStoreError::Io { path: parent.to_path_buf(), source: e })?;
        }
        std::fs::write(&path, text)
            .map_err(|e| RuleStoreError::Io { path: path.clone(), source: e })?;
        Ok(path)
    }

    /// Reload every persisted version found under `root`. Used at node
    /// startup so previously committed rule bases survive restarts.
    pub fn reload(&self, root: &Path) -> Result<usize, RuleStoreError> {
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(RuleStoreError::Io { path: root.to_path_buf(), source: e }),
        };

        let mut loaded = 0;
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(version) = name.strip_prefix("RuleFolder.") else { continue };
            let mut bundles = VersionBundles::new();
            for op_dir in Self::read_dir(&entry.path())? {
                for file in Self::read_dir(&op_dir)? {
                    let text = std::fs::read_to_string(&file)
                        .map_err(|e| RuleStoreError::Io { path: file.clone(), source: e })?;
                    let bundle = RuleBundle::parse(&text)
                        .map_err(|e| RuleStoreError::Parse { path: file.clone(), source: e })?;
                    bundles.insert(bundle.operation.clone(), bundle);
                }
            }
            loaded += bundles.len();
            self.commit_version(version, bundles);
        }
        Ok(loaded)
    }

    fn read_dir(path: &Path) -> Result<Vec<PathBuf>, RuleStoreError> {
        let entries = std::fs::read_dir(path)
            .map_err(|e| RuleStoreError::Io { path: path.to_path_buf(), source: e })?;
        Ok(entries.flatten().map(|e| e.path()).collect())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
