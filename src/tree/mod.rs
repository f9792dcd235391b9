pub mod document;
pub mod node;
pub mod spec;

pub use document::Document;
pub use node::{MutationRecord, NodeId, NodeKind};
pub use spec::NodeSpec;

use thiserror::Error;

/// Failure of a single tree operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("node {0} does not exist (removed or never created)")]
    UnknownNode(NodeId),
    #[error("node {0} is not an element")]
    NotAnElement(NodeId),
    #[error("node {0} is not a text leaf")]
    NotText(NodeId),
    #[error("node {reference} is not a child of {parent}")]
    NotAChild { parent: NodeId, reference: NodeId },
    #[error("inserting {child} under {parent} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
}

/// Read/write access to an externally owned content tree.
///
/// Handles are opaque: a handle to a removed node must make every accessor
/// return `None` (or an error) rather than alias a different node.
pub trait ContentTree {
    /// The document root. Always attached.
    fn root(&self) -> NodeId;

    fn kind(&self, id: NodeId) -> Option<NodeKind>;

    /// Tag name of an element, lowercase.
    fn tag(&self, id: NodeId) -> Option<&str>;

    /// Raw text of a text leaf.
    fn text(&self, id: NodeId) -> Option<&str>;

    fn attribute(&self, id: NodeId, name: &str) -> Option<&str>;

    fn parent(&self, id: NodeId) -> Option<NodeId>;

    /// Children in document order. Empty for leaves and unknown handles.
    fn children(&self, id: NodeId) -> &[NodeId];

    fn set_text(&mut self, id: NodeId, text: &str) -> Result<(), TreeError>;

    fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), TreeError>;

    /// Create a detached element.
    fn create_element(&mut self, tag: &str) -> NodeId;

    /// Create a detached text leaf.
    fn create_text(&mut self, text: &str) -> NodeId;

    /// Insert `child` under `parent` before `reference`, or append when
    /// `reference` is `None`. A child that already has a parent is moved.
    fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), TreeError>;

    /// Remove a node and its subtree from the tree. Handles into the subtree
    /// become stale.
    fn remove(&mut self, id: NodeId) -> Result<(), TreeError>;

    /// Drain the mutation records queued since the last call.
    fn take_records(&mut self) -> Vec<MutationRecord>;

    /// Whether `id` exists and is reachable from the root.
    fn is_attached(&self, id: NodeId) -> bool {
        if self.kind(id).is_none() {
            return false;
        }
        let root = self.root();
        let mut current = id;
        loop {
            if current == root {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        siblings.get(pos + 1).copied()
    }

    fn is_text(&self, id: NodeId) -> bool {
        self.kind(id) == Some(NodeKind::Text)
    }

    /// Concatenated raw text of every leaf under `id`, in document order.
    fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if let Some(text) = self.text(node) {
                out.push_str(text);
                continue;
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }
}
