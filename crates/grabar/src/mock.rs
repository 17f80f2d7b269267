//! In-memory [`PageDriver`] for tests.
//!
//! Holds a [`DomNode`] snapshot and answers every driver call from it, so
//! resolver, idle-wait, and forced-action behavior can be exercised without a
//! browser. Match counts normally come from interpreting the selector against
//! the tree; individual selectors can be overridden to simulate ambiguity the
//! tree itself cannot express.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::force;
use crate::model::StorageLocation;
use crate::page::{DomMutation, DomNode, NodeId, PageDriver};
use crate::result::{GrabarError, GrabarResult};
use crate::selector::SelectorSpec;

/// Scriptable page stand-in.
#[derive(Debug, Default)]
pub struct MockPage {
    document: DomNode,
    /// Match counts keyed by the selector's canonical rendering.
    count_overrides: HashMap<String, usize>,
    /// Selectors whose attach wait always times out.
    detached: HashSet<String>,
    storage: HashMap<(StorageLocation, String), String>,
    applied: Mutex<Vec<(NodeId, DomMutation)>>,
    screenshots: Mutex<Vec<String>>,
}

impl MockPage {
    /// Page backed by the given snapshot.
    #[must_use]
    pub fn new(document: DomNode) -> Self {
        Self {
            document,
            ..Self::default()
        }
    }

    /// Force a specific match count for one selector, bypassing the tree.
    #[must_use]
    pub fn with_count(mut self, spec: &SelectorSpec, count: usize) -> Self {
        self.count_overrides.insert(spec.to_string(), count);
        self
    }

    /// Mark a selector as never attaching.
    #[must_use]
    pub fn with_detached(mut self, spec: &SelectorSpec) -> Self {
        self.detached.insert(spec.to_string());
        self
    }

    /// Seed a storage entry.
    #[must_use]
    pub fn with_storage(
        mut self,
        location: StorageLocation,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.storage.insert((location, key.into()), value.into());
        self
    }

    /// Mutations applied so far, in order.
    #[must_use]
    pub fn applied(&self) -> Vec<(NodeId, DomMutation)> {
        self.applied.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// Screenshot paths requested so far.
    #[must_use]
    pub fn screenshots(&self) -> Vec<String> {
        self.screenshots.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn wait_for_attached(
        &self,
        spec: &SelectorSpec,
        timeout: Duration,
    ) -> GrabarResult<()> {
        if self.detached.contains(&spec.to_string()) {
            return Err(GrabarError::Timeout {
                ms: timeout.as_millis() as u64,
            });
        }
        Ok(())
    }

    async fn count_matches(&self, spec: &SelectorSpec) -> GrabarResult<usize> {
        if let Some(&count) = self.count_overrides.get(&spec.to_string()) {
            return Ok(count);
        }
        Ok(force::find_all(&self.document, spec).len())
    }

    async fn document(&self) -> GrabarResult<DomNode> {
        Ok(self.document.clone())
    }

    async fn apply(&self, node: NodeId, mutation: &DomMutation) -> GrabarResult<()> {
        self.applied
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((node, mutation.clone()));
        Ok(())
    }

    async fn storage_get(
        &self,
        location: StorageLocation,
        key: &str,
    ) -> GrabarResult<Option<String>> {
        Ok(self.storage.get(&(location, key.to_string())).cloned())
    }

    async fn screenshot(&self, path: &Path) -> GrabarResult<()> {
        self.screenshots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(path.display().to_string());
        Ok(())
    }
}
