use std::collections::VecDeque;

use thiserror::Error;

use crate::tree::{NodeId, TreeError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The buffer was rebuilt while an operation held offsets from an older
    /// version. Resolved internally by re-resolving.
    #[error("index version {found} superseded version {expected}")]
    IndexStale { expected: u64, found: u64 },

    /// The locator exhausted every fallback.
    #[error("chunk not found in buffer: {chunk:?}")]
    ChunkNotFound { chunk: String },

    /// A map or ledger entry references a node no longer in the tree.
    #[error("node {0} is detached from the tree")]
    NodeDetached(NodeId),

    /// A dictionary key that cannot take part in the compiled pattern.
    #[error("dictionary key {key:?} excluded: {reason}")]
    PatternCompileFailure { key: String, reason: String },

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Bounded record of recent non-fatal errors, oldest dropped first.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    errors: VecDeque<EngineError>,
    capacity: usize,
    total: u64,
}

impl Diagnostics {
    pub fn new(capacity: usize) -> Self {
        Self {
            errors: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            total: 0,
        }
    }

    pub fn record(&mut self, error: EngineError) {
        tracing::debug!(%error, "recorded diagnostic");
        self.total += 1;
        if self.capacity == 0 {
            return;
        }
        if self.errors.len() == self.capacity {
            self.errors.pop_front();
        }
        self.errors.push_back(error);
    }

    pub fn iter(&self) -> impl Iterator<Item = &EngineError> {
        self.errors.iter()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors recorded since creation, including evicted ones.
    pub fn total(&self) -> u64 {
        self.total
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_evicts_oldest() {
        let mut diag = Diagnostics::new(2);
        for chunk in ["a", "b", "c"] {
            diag.record(EngineError::ChunkNotFound { chunk: chunk.into() });
        }
        assert_eq!(diag.len(), 2);
        assert_eq!(diag.total(), 3);
        assert_eq!(
            diag.iter().next(),
            Some(&EngineError::ChunkNotFound { chunk: "b".into() })
        );
    }

    #[test]
    fn test_tree_error_converts() {
        use crate::tree::{ContentTree, Document};

        let root = Document::new().root();
        let err: EngineError = TreeError::UnknownNode(root).into();
        assert!(matches!(err, EngineError::Tree(TreeError::UnknownNode(_))));
    }
}
