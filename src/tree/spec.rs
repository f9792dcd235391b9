use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declarative tree description, used to load pages from JSON.
///
/// A bare string is a text leaf; an object is an element:
///
/// ```json
/// {"tag": "p", "attrs": {"title": "x"}, "children": ["Hello ", {"tag": "b", "children": ["world"]}]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeSpec {
    Text(String),
    Element {
        tag: String,
        #[serde(default)]
        attrs: BTreeMap<String, String>,
        #[serde(default)]
        children: Vec<NodeSpec>,
    },
}

impl NodeSpec {
    pub fn text(text: impl Into<String>) -> Self {
        NodeSpec::Text(text.into())
    }

    pub fn element(tag: impl Into<String>, children: Vec<NodeSpec>) -> Self {
        NodeSpec::Element {
            tag: tag.into(),
            attrs: BTreeMap::new(),
            children,
        }
    }

    /// Builder-style attribute setter; a no-op on text specs.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let NodeSpec::Element { attrs, .. } = &mut self {
            attrs.insert(name.into(), value.into());
        }
        self
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_children() {
        let spec = NodeSpec::from_json(r#"{"tag": "p", "children": ["a", {"tag": "i"}]}"#).unwrap();
        assert_eq!(
            spec,
            NodeSpec::element("p", vec![NodeSpec::text("a"), NodeSpec::element("i", vec![])])
        );
    }

    #[test]
    fn test_with_attr() {
        let spec = NodeSpec::element("img", vec![]).with_attr("alt", "cat");
        let NodeSpec::Element { attrs, .. } = spec else {
            panic!("expected element");
        };
        assert_eq!(attrs.get("alt").map(String::as_str), Some("cat"));
        assert_eq!(NodeSpec::text("t").with_attr("alt", "x"), NodeSpec::text("t"));
    }
}
