use super::node::{MutationRecord, NodeId, NodeKind};
use super::spec::NodeSpec;
use super::{ContentTree, TreeError};

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Debug, Clone)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    records: Vec<MutationRecord>,
}

impl Document {
    /// Empty document with a `body` root.
    pub fn new() -> Self {
        Self::with_root("body")
    }

    pub fn with_root(tag: &str) -> Self {
        let mut doc = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId::new(0, 0),
            records: Vec::new(),
        };
        doc.root = doc.alloc(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        });
        doc
    }

    /// Build a document from a declarative tree. A text spec at the top
    /// level becomes the only child of a `body` root.
    pub fn from_spec(spec: &NodeSpec) -> Result<Self, TreeError> {
        let mut doc = match spec {
            NodeSpec::Element { tag, attrs, .. } => {
                let mut doc = Self::with_root(tag);
                let root = doc.root;
                for (name, value) in attrs {
                    doc.set_attribute(root, name, value)?;
                }
                doc
            }
            NodeSpec::Text(_) => Self::new(),
        };
        let root = doc.root;
        match spec {
            NodeSpec::Element { children, .. } => {
                for child in children {
                    doc.build(root, child)?;
                }
            }
            NodeSpec::Text(_) => doc.build(root, spec)?,
        }
        // Construction is not a mutation anyone should observe.
        doc.records.clear();
        Ok(doc)
    }

    fn build(&mut self, parent: NodeId, spec: &NodeSpec) -> Result<(), TreeError> {
        match spec {
            NodeSpec::Text(text) => {
                self.append_text(parent, text)?;
            }
            NodeSpec::Element { tag, attrs, children } => {
                let el = self.append_element(parent, tag)?;
                for (name, value) in attrs {
                    self.set_attribute(el, name, value)?;
                }
                for child in children {
                    self.build(el, child)?;
                }
            }
        }
        Ok(())
    }

    /// Create an element and append it under `parent`.
    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> Result<NodeId, TreeError> {
        let id = self.create_element(tag);
        self.insert_before(parent, id, None)?;
        Ok(id)
    }

    /// Create a text leaf and append it under `parent`.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> Result<NodeId, TreeError> {
        let id = self.create_text(text);
        self.insert_before(parent, id, None)?;
        Ok(id)
    }

    /// Unlink a node from its parent, keeping the subtree alive so it can be
    /// inserted again.
    pub fn detach(&mut self, id: NodeId) -> Result<(), TreeError> {
        let parent = self.node(id)?.parent;
        if let Some(parent) = parent {
            if let Some(p) = self.node_mut_opt(parent) {
                p.children.retain(|&c| c != id);
            }
            self.node_mut(id)?.parent = None;
            self.records.push(MutationRecord::ChildList {
                target: parent,
                added: Vec::new(),
                removed: vec![id],
            });
        }
        Ok(())
    }

    /// Number of live nodes, attached or not.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of records waiting to be drained.
    pub fn pending_records(&self) -> usize {
        self.records.len()
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let node = Node {
            data,
            parent: None,
            children: Vec::new(),
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId::new(index, 0)
        }
    }

    fn free_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(slot) = self.slots.get_mut(current.index()) else {
                continue;
            };
            if slot.generation != current.generation() {
                continue;
            }
            if let Some(node) = slot.node.take() {
                stack.extend(node.children);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(current.index() as u32);
            }
        }
    }

    fn node_opt(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.index())?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.node.as_ref()
    }

    fn node_mut_opt(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.node.as_mut()
    }

    fn node(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.node_opt(id).ok_or(TreeError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        self.node_mut_opt(id).ok_or(TreeError::UnknownNode(id))
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, mut id: NodeId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.node_opt(id).and_then(|n| n.parent) {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }
}

impl ContentTree for Document {
    fn root(&self) -> NodeId {
        self.root
    }

    fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.node_opt(id).map(|n| match n.data {
            NodeData::Element { .. } => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
        })
    }

    fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.node_opt(id)?.data {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::Text(_) => None,
        }
    }

    fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node_opt(id)?.data {
            NodeData::Text(text) => Some(text),
            NodeData::Element { .. } => None,
        }
    }

    fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.node_opt(id)?.data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            NodeData::Text(_) => None,
        }
    }

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id)?.parent
    }

    fn children(&self, id: NodeId) -> &[NodeId] {
        self.node_opt(id).map_or(&[], |n| n.children.as_slice())
    }

    fn set_text(&mut self, id: NodeId, text: &str) -> Result<(), TreeError> {
        let node = self.node_mut(id)?;
        match &mut node.data {
            NodeData::Text(current) => {
                if current != text {
                    text.clone_into(current);
                    self.records.push(MutationRecord::CharacterData { target: id });
                }
                Ok(())
            }
            NodeData::Element { .. } => Err(TreeError::NotText(id)),
        }
    }

    fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), TreeError> {
        let node = self.node_mut(id)?;
        let NodeData::Element { attrs, .. } = &mut node.data else {
            return Err(TreeError::NotAnElement(id));
        };
        let name = name.to_ascii_lowercase();
        if let Some((_, current)) = attrs.iter_mut().find(|(n, _)| *n == name) {
            if *current == value {
                return Ok(());
            }
            value.clone_into(current);
        } else {
            attrs.push((name.clone(), value.to_string()));
        }
        self.records.push(MutationRecord::Attribute { target: id, name });
        Ok(())
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        })
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Text(text.to_string()))
    }

    fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), TreeError> {
        if !matches!(self.node(parent)?.data, NodeData::Element { .. }) {
            return Err(TreeError::NotAnElement(parent));
        }
        self.node(child)?;
        if self.is_ancestor_or_self(child, parent) {
            return Err(TreeError::Cycle { parent, child });
        }
        if let Some(reference) = reference {
            if reference == child || !self.node(parent)?.children.contains(&reference) {
                return Err(TreeError::NotAChild { parent, reference });
            }
        }

        self.detach(child)?;

        let p = self.node_mut(parent)?;
        let pos = reference
            .and_then(|r| p.children.iter().position(|&c| c == r))
            .unwrap_or(p.children.len());
        p.children.insert(pos, child);
        self.node_mut(child)?.parent = Some(parent);
        self.records.push(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
        Ok(())
    }

    fn remove(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.node(id)?;
        self.detach(id)?;
        self.free_subtree(id);
        Ok(())
    }

    fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
