//! Rich-text editor document model.
//!
//! The JSON shape mirrors what block editors exchange: every node carries a
//! `type` discriminator, node-level settings live under `attrs`, blocks hold
//! `content`, and inline leaves carry their formatting as a `marks` list
//! instead of wrapper nodes.
//!
//! Deserialization is lenient where live editors are known to drift: unknown
//! mark kinds are dropped, `null` attributes read as absent, and attributes
//! without a typed field are kept in `extra` rather than rejected.

use crate::ast::{PropValue, Props};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub type FrontmatterData = serde_json::Map<String, Value>;

/// Editor attributes with no typed field (`textAlign`, `indent`, ...).
pub type ExtraAttrs = serde_json::Map<String, Value>;

/// Slot that holds a component's children not assigned to a named slot.
pub const DEFAULT_SLOT: &str = "default";

/// Prop prefix marking a `template` element as a named slot (`v-slot:footer`).
pub const SLOT_PROP_PREFIX: &str = "v-slot:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkKind {
    Bold,
    Italic,
    Strike,
    Code,
    Link,
}

impl MarkKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "strong" => Some(MarkKind::Bold),
            "em" => Some(MarkKind::Italic),
            "del" => Some(MarkKind::Strike),
            "code" => Some(MarkKind::Code),
            "a" => Some(MarkKind::Link),
            _ => None,
        }
    }

    /// Parse the editor-side mark name (`"bold"`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bold" => Some(MarkKind::Bold),
            "italic" => Some(MarkKind::Italic),
            "strike" => Some(MarkKind::Strike),
            "code" => Some(MarkKind::Code),
            "link" => Some(MarkKind::Link),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            MarkKind::Bold => "strong",
            MarkKind::Italic => "em",
            MarkKind::Strike => "del",
            MarkKind::Code => "code",
            MarkKind::Link => "a",
        }
    }
}

/// Inline formatting annotation attached to a leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    #[serde(rename = "type")]
    pub kind: MarkKind,
    #[serde(
        default,
        deserialize_with = "lenient_props",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub attrs: Props,
}

impl Mark {
    pub fn new(kind: MarkKind) -> Self {
        Self {
            kind,
            attrs: Props::new(),
        }
    }
}

/// Attributes of blocks that have nothing typed of their own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockAttrs {
    #[serde(
        default,
        deserialize_with = "lenient_props",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub props: Props,
    #[serde(flatten)]
    pub extra: ExtraAttrs,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphAttrs {
    /// Set when the paragraph only exists because bare text sat directly
    /// inside a block container in the markup tree.
    #[serde(default, skip_serializing_if = "is_false")]
    pub was_text_wrapped: bool,
    #[serde(
        default,
        deserialize_with = "lenient_props",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub props: Props,
    #[serde(flatten)]
    pub extra: ExtraAttrs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadingAttrs {
    #[serde(default = "default_level")]
    pub level: u8,
    #[serde(
        default,
        deserialize_with = "lenient_props",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub props: Props,
    #[serde(flatten)]
    pub extra: ExtraAttrs,
}

impl Default for HeadingAttrs {
    fn default() -> Self {
        Self {
            level: default_level(),
            props: Props::new(),
            extra: ExtraAttrs::new(),
        }
    }
}

fn default_level() -> u8 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderedListAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u32>,
    #[serde(
        default,
        deserialize_with = "lenient_props",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub props: Props,
    #[serde(flatten)]
    pub extra: ExtraAttrs,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeBlockAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_props",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub props: Props,
    #[serde(flatten)]
    pub extra: ExtraAttrs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAttrs {
    /// Markup tag the image came from: `img` or an image component.
    #[serde(default = "default_image_tag")]
    pub tag: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub src: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub alt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Set on every image after the first that came out of one image-only
    /// paragraph, so they share a `p` again on the way back.
    #[serde(default, skip_serializing_if = "is_false")]
    pub shared_paragraph: bool,
    #[serde(
        default,
        deserialize_with = "lenient_props",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub props: Props,
    #[serde(flatten)]
    pub extra: ExtraAttrs,
}

impl Default for ImageAttrs {
    fn default() -> Self {
        Self {
            tag: default_image_tag(),
            src: String::new(),
            alt: String::new(),
            title: None,
            shared_paragraph: false,
            props: Props::new(),
            extra: ExtraAttrs::new(),
        }
    }
}

fn default_image_tag() -> String {
    "img".to_string()
}

/// Components and unrecognized elements, block or inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementAttrs {
    pub tag: String,
    #[serde(
        default,
        deserialize_with = "lenient_props",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub props: Props,
    #[serde(flatten)]
    pub extra: ExtraAttrs,
}

impl ElementAttrs {
    pub fn new(tag: impl Into<String>, props: Props) -> Self {
        Self {
            tag: tag.into(),
            props,
            extra: ExtraAttrs::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotAttrs {
    pub name: String,
    #[serde(
        default,
        deserialize_with = "lenient_props",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub props: Props,
    #[serde(flatten)]
    pub extra: ExtraAttrs,
}

impl SlotAttrs {
    pub fn new(name: impl Into<String>, props: Props) -> Self {
        Self {
            name: name.into(),
            props,
            extra: ExtraAttrs::new(),
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EditorNode {
    Doc {
        #[serde(default)]
        content: Vec<EditorNode>,
    },
    Frontmatter {
        #[serde(default)]
        data: FrontmatterData,
    },
    Paragraph {
        #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_default")]
        attrs: ParagraphAttrs,
        #[serde(default)]
        content: Vec<EditorNode>,
    },
    Heading {
        #[serde(default, deserialize_with = "null_as_default")]
        attrs: HeadingAttrs,
        #[serde(default)]
        content: Vec<EditorNode>,
    },
    BulletList {
        #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_default")]
        attrs: BlockAttrs,
        #[serde(default)]
        content: Vec<EditorNode>,
    },
    OrderedList {
        #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_default")]
        attrs: OrderedListAttrs,
        #[serde(default)]
        content: Vec<EditorNode>,
    },
    ListItem {
        #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_default")]
        attrs: BlockAttrs,
        #[serde(default)]
        content: Vec<EditorNode>,
    },
    Blockquote {
        #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_default")]
        attrs: BlockAttrs,
        #[serde(default)]
        content: Vec<EditorNode>,
    },
    HorizontalRule {
        #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_default")]
        attrs: BlockAttrs,
    },
    CodeBlock {
        #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_default")]
        attrs: CodeBlockAttrs,
        #[serde(default)]
        content: Vec<EditorNode>,
    },
    Image {
        #[serde(default, deserialize_with = "null_as_default")]
        attrs: ImageAttrs,
    },
    Video {
        #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_default")]
        attrs: BlockAttrs,
    },
    /// Block-level component or unrecognized element.
    Element {
        attrs: ElementAttrs,
        #[serde(default)]
        content: Vec<EditorNode>,
    },
    InlineElement {
        attrs: ElementAttrs,
        #[serde(default)]
        content: Vec<EditorNode>,
        #[serde(
            default,
            deserialize_with = "known_marks",
            skip_serializing_if = "Vec::is_empty"
        )]
        marks: Vec<Mark>,
    },
    Slot {
        attrs: SlotAttrs,
        #[serde(default)]
        content: Vec<EditorNode>,
    },
    Text {
        #[serde(default)]
        text: String,
        #[serde(
            default,
            deserialize_with = "known_marks",
            skip_serializing_if = "Vec::is_empty"
        )]
        marks: Vec<Mark>,
    },
    Emoji {
        glyph: String,
        #[serde(
            default,
            deserialize_with = "known_marks",
            skip_serializing_if = "Vec::is_empty"
        )]
        marks: Vec<Mark>,
    },
    HardBreak {
        #[serde(
            default,
            deserialize_with = "known_marks",
            skip_serializing_if = "Vec::is_empty"
        )]
        marks: Vec<Mark>,
    },
    Comment {
        #[serde(default)]
        value: String,
    },
    /// Any node kind this crate has no mapping for. Live editors may emit
    /// experimental kinds; they are carried through rather than rejected.
    #[serde(untagged)]
    Unknown(UnknownNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnknownNode {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<EditorNode>,
}

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Read a props object, keeping only values a markup prop can hold.
/// Numbers are stringified, `null` and nested values are dropped.
fn lenient_props<'de, D>(deserializer: D) -> Result<Props, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Map<String, Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| prop_value(value).map(|value| (key, value)))
        .collect())
}

pub(crate) fn prop_value(value: Value) -> Option<PropValue> {
    match value {
        Value::String(s) => Some(PropValue::String(s)),
        Value::Bool(b) => Some(PropValue::Bool(b)),
        Value::Number(n) => Some(PropValue::String(n.to_string())),
        _ => None,
    }
}

#[derive(Deserialize)]
struct RawMark {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, deserialize_with = "lenient_props")]
    attrs: Props,
}

/// Marks this crate has no markup tag for are dropped so the text they
/// annotate survives.
fn known_marks<'de, D>(deserializer: D) -> Result<Vec<Mark>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<RawMark>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|raw| match MarkKind::from_name(&raw.kind) {
            Some(kind) => Some(Mark {
                kind,
                attrs: raw.attrs,
            }),
            None => {
                tracing::warn!(mark = %raw.kind, "dropping unsupported mark");
                None
            }
        })
        .collect())
}

impl EditorNode {
    pub fn text(text: impl Into<String>) -> Self {
        EditorNode::Text {
            text: text.into(),
            marks: Vec::new(),
        }
    }

    pub fn paragraph(content: Vec<EditorNode>) -> Self {
        EditorNode::Paragraph {
            attrs: ParagraphAttrs::default(),
            content,
        }
    }

    /// Paragraph standing in for bare inline markup inside a block container.
    pub fn wrapped_paragraph(content: Vec<EditorNode>) -> Self {
        EditorNode::Paragraph {
            attrs: ParagraphAttrs {
                was_text_wrapped: true,
                ..ParagraphAttrs::default()
            },
            content,
        }
    }

    /// Marks carried by an inline leaf, innermost first. Empty for blocks.
    pub fn marks(&self) -> &[Mark] {
        match self {
            EditorNode::Text { marks, .. }
            | EditorNode::Emoji { marks, .. }
            | EditorNode::HardBreak { marks }
            | EditorNode::InlineElement { marks, .. } => marks,
            _ => &[],
        }
    }

    pub fn content(&self) -> &[EditorNode] {
        match self {
            EditorNode::Doc { content }
            | EditorNode::Paragraph { content, .. }
            | EditorNode::Heading { content, .. }
            | EditorNode::BulletList { content, .. }
            | EditorNode::OrderedList { content, .. }
            | EditorNode::ListItem { content, .. }
            | EditorNode::Blockquote { content, .. }
            | EditorNode::CodeBlock { content, .. }
            | EditorNode::Element { content, .. }
            | EditorNode::InlineElement { content, .. }
            | EditorNode::Slot { content, .. } => content,
            EditorNode::Unknown(node) => &node.content,
            _ => &[],
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            EditorNode::Text { .. }
                | EditorNode::Emoji { .. }
                | EditorNode::HardBreak { .. }
                | EditorNode::InlineElement { .. }
        )
    }

    /// Plain text of this node and its descendants (emoji included).
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(node: &EditorNode, out: &mut String) {
    match node {
        EditorNode::Text { text, .. } => out.push_str(text),
        EditorNode::Emoji { glyph, .. } => out.push_str(glyph),
        other => {
            for child in other.content() {
                collect_text(child, out);
            }
        }
    }
}
