use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Element props, keyed by name. Sorted so that two trees built by different
/// parsers compare equal regardless of prop emission order.
pub type Props = BTreeMap<String, PropValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Bool(bool),
    String(String),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::String(s) => Some(s),
            PropValue::Bool(_) => None,
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::String(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::String(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

/// Semantic markup tree: Markdown plus components, as produced by an MDC parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MarkupNode {
    Root {
        #[serde(default)]
        children: Vec<MarkupNode>,
    },
    Element {
        tag: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        props: Props,
        #[serde(default)]
        children: Vec<MarkupNode>,
    },
    Text {
        #[serde(default)]
        value: String,
    },
    Comment {
        #[serde(default)]
        value: String,
    },
}

impl MarkupNode {
    pub fn root(children: Vec<MarkupNode>) -> Self {
        MarkupNode::Root { children }
    }

    pub fn element(tag: &str, props: Props, children: Vec<MarkupNode>) -> Self {
        MarkupNode::Element {
            tag: tag.to_string(),
            props,
            children,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        MarkupNode::Text {
            value: value.into(),
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            MarkupNode::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn children(&self) -> &[MarkupNode] {
        match self {
            MarkupNode::Root { children } | MarkupNode::Element { children, .. } => children,
            _ => &[],
        }
    }

    /// Concatenated value of every descendant text node, in document order.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    pub fn is_whitespace_text(&self) -> bool {
        matches!(self, MarkupNode::Text { value } if value.trim().is_empty())
    }
}

fn collect_text(node: &MarkupNode, out: &mut String) {
    match node {
        MarkupNode::Text { value } => out.push_str(value),
        MarkupNode::Root { children } | MarkupNode::Element { children, .. } => {
            for child in children {
                collect_text(child, out);
            }
        }
        MarkupNode::Comment { .. } => {}
    }
}

/// Build a `Props` map from literal pairs.
pub fn props<const N: usize>(pairs: [(&str, PropValue); N]) -> Props {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
