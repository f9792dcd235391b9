use crate::config::EngineConfig;
use crate::tree::{ContentTree, NodeId, NodeKind};

#[derive(Debug, Clone, Copy)]
pub struct LeafFilter<'a> {
    config: &'a EngineConfig,
}

impl<'a> LeafFilter<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Opaque containers: nothing under them is text, attributes included.
    pub fn is_opaque<T: ContentTree + ?Sized>(&self, tree: &T, id: NodeId) -> bool {
        tree.tag(id).is_some_and(|tag| self.config.is_excluded_tag(tag))
    }

    /// Editable or hidden elements: their text is skipped, their own
    /// attributes still qualify.
    pub fn hides_text<T: ContentTree + ?Sized>(&self, tree: &T, id: NodeId) -> bool {
        let Some(tag) = tree.tag(id) else {
            return false;
        };
        if self.config.is_excluded_tag(tag) || self.config.is_editable_tag(tag) {
            return true;
        }
        if tree.attribute(id, "hidden").is_some() {
            return true;
        }
        tree.attribute(id, "contenteditable")
            .is_some_and(|v| !v.eq_ignore_ascii_case("false"))
    }

    /// Qualifying text leaves under `root`, in document order.
    pub fn text_leaves<T: ContentTree + ?Sized>(&self, tree: &T, root: NodeId) -> Vec<NodeId> {
        let mut leaves = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            match tree.kind(id) {
                Some(NodeKind::Text) => leaves.push(id),
                Some(NodeKind::Element) => {
                    if self.hides_text(tree, id) {
                        continue;
                    }
                    stack.extend(tree.children(id).iter().rev().copied());
                }
                None => {}
            }
        }
        leaves
    }

    /// Elements under `root` (inclusive) whose attributes qualify.
    pub fn attribute_elements<T: ContentTree + ?Sized>(
        &self,
        tree: &T,
        root: NodeId,
    ) -> Vec<NodeId> {
        let mut elements = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if tree.kind(id) != Some(NodeKind::Element) || self.is_opaque(tree, id) {
                continue;
            }
            elements.push(id);
            stack.extend(tree.children(id).iter().rev().copied());
        }
        elements
    }

    /// Whether an attached text leaf would be visited by [`text_leaves`]
    /// starting from the tree root.
    ///
    /// [`text_leaves`]: Self::text_leaves
    pub fn is_qualifying_leaf<T: ContentTree + ?Sized>(&self, tree: &T, id: NodeId) -> bool {
        if !tree.is_text(id) || !tree.is_attached(id) {
            return false;
        }
        !self.ancestors(tree, id).any(|a| self.hides_text(tree, a))
    }

    /// Whether an attached element's attributes qualify.
    pub fn is_qualifying_element<T: ContentTree + ?Sized>(&self, tree: &T, id: NodeId) -> bool {
        if tree.kind(id) != Some(NodeKind::Element) || !tree.is_attached(id) {
            return false;
        }
        !self.is_opaque(tree, id) && !self.ancestors(tree, id).any(|a| self.is_opaque(tree, a))
    }

    fn ancestors<'t, T: ContentTree + ?Sized>(
        &self,
        tree: &'t T,
        id: NodeId,
    ) -> impl Iterator<Item = NodeId> + 't {
        std::iter::successors(tree.parent(id), move |&p| tree.parent(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Document, NodeSpec};

    fn page() -> Document {
        let spec = NodeSpec::element(
            "body",
            vec![
                NodeSpec::element("p", vec![NodeSpec::text("visible")]),
                NodeSpec::element("script", vec![NodeSpec::text("var x;")]),
                NodeSpec::element("textarea", vec![NodeSpec::text("typing")])
                    .with_attr("placeholder", "Write here"),
                NodeSpec::element("div", vec![NodeSpec::text("editable")])
                    .with_attr("contenteditable", "true"),
                NodeSpec::element("div", vec![NodeSpec::text("static")])
                    .with_attr("contenteditable", "false"),
                NodeSpec::element("div", vec![NodeSpec::text("secret")]).with_attr("hidden", ""),
                NodeSpec::element("svg", vec![NodeSpec::element("title", vec![])])
                    .with_attr("title", "icon"),
            ],
        );
        Document::from_spec(&spec).unwrap()
    }

    #[test]
    fn test_text_leaves_skip_excluded_and_editable() {
        let doc = page();
        let config = EngineConfig::default();
        let filter = LeafFilter::new(&config);

        let texts: Vec<_> = filter
            .text_leaves(&doc, doc.root())
            .into_iter()
            .filter_map(|id| doc.text(id))
            .collect();
        assert_eq!(texts, vec!["visible", "static"]);
    }

    #[test]
    fn test_attribute_elements_include_editable_but_not_opaque() {
        let doc = page();
        let config = EngineConfig::default();
        let filter = LeafFilter::new(&config);

        let tags: Vec<_> = filter
            .attribute_elements(&doc, doc.root())
            .into_iter()
            .filter_map(|id| doc.tag(id))
            .collect();
        assert!(tags.contains(&"textarea"));
        assert!(!tags.contains(&"svg"));
        assert!(!tags.contains(&"title"));
    }

    #[test]
    fn test_is_qualifying_leaf() {
        let doc = page();
        let config = EngineConfig::default();
        let filter = LeafFilter::new(&config);
        let body = doc.root();
        let p = doc.children(body)[0];
        let script = doc.children(body)[1];

        assert!(filter.is_qualifying_leaf(&doc, doc.children(p)[0]));
        assert!(!filter.is_qualifying_leaf(&doc, doc.children(script)[0]));
        assert!(!filter.is_qualifying_leaf(&doc, p));
    }
}
