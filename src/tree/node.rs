use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Element,     // container with tag + attributes
    Text,        // text-bearing leaf
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Element => write!(f, "Element"),
            NodeKind::Text => write!(f, "Text"),
        }
    }
}

/// Opaque node handle: arena slot plus the slot's generation at creation.
///
/// A slot reused after removal bumps its generation, so an old handle never
/// resolves to the new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub(crate) const fn index(self) -> usize {
        self.index as usize
    }

    pub(crate) const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// One change to the tree, as delivered to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    ChildList {
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    CharacterData {
        target: NodeId,
    },
    Attribute {
        target: NodeId,
        name: String,
    },
}

impl MutationRecord {
    pub fn target(&self) -> NodeId {
        match self {
            MutationRecord::ChildList { target, .. }
            | MutationRecord::CharacterData { target }
            | MutationRecord::Attribute { target, .. } => *target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId::new(3, 1).to_string(), "#3v1");
    }

    #[test]
    fn test_generation_distinguishes_handles() {
        let old = NodeId::new(7, 0);
        let reused = NodeId::new(7, 1);
        assert_ne!(old, reused);
        assert_eq!(old.index(), reused.index());
    }

    #[test]
    fn test_record_target() {
        let id = NodeId::new(1, 0);
        let rec = MutationRecord::Attribute { target: id, name: "alt".into() };
        assert_eq!(rec.target(), id);
        assert_eq!(MutationRecord::CharacterData { target: id }.target(), id);
    }
}
