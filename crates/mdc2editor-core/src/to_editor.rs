//! Markup tree -> editor document.

use crate::ast::{MarkupNode, PropValue, Props};
use crate::config::Config;
use crate::editor::{
    BlockAttrs, CodeBlockAttrs, EditorNode, ElementAttrs, FrontmatterData, HeadingAttrs, ImageAttrs,
    Mark, MarkKind, OrderedListAttrs, ParagraphAttrs, SlotAttrs, DEFAULT_SLOT, SLOT_PROP_PREFIX,
};
use crate::marks;
use crate::tokenizer::{self, Segment};

/// What an element becomes in the editor model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Paragraph,
    Heading(u8),
    BulletList,
    OrderedList,
    ListItem,
    Blockquote,
    HorizontalRule,
    CodeBlock,
    Image,
    Video,
    Mark(MarkKind),
    HardBreak,
    Slot,
    Generic,
}

fn classify(tag: &str, props: &Props, config: &Config) -> TagKind {
    match tag {
        "p" => TagKind::Paragraph,
        "h1" => TagKind::Heading(1),
        "h2" => TagKind::Heading(2),
        "h3" => TagKind::Heading(3),
        "h4" => TagKind::Heading(4),
        "h5" => TagKind::Heading(5),
        "h6" => TagKind::Heading(6),
        "ul" => TagKind::BulletList,
        "ol" => TagKind::OrderedList,
        "li" => TagKind::ListItem,
        "blockquote" => TagKind::Blockquote,
        "hr" => TagKind::HorizontalRule,
        "pre" => TagKind::CodeBlock,
        "img" => TagKind::Image,
        "video" => TagKind::Video,
        "br" => TagKind::HardBreak,
        "template" if slot_name(props).is_some() => TagKind::Slot,
        _ if config.is_image_component(tag) => TagKind::Image,
        _ => MarkKind::from_tag(tag).map_or(TagKind::Generic, TagKind::Mark),
    }
}

fn slot_name(props: &Props) -> Option<&str> {
    props.keys().find_map(|k| k.strip_prefix(SLOT_PROP_PREFIX))
}

/// Convert a markup tree and its frontmatter into an editor document.
///
/// The frontmatter always becomes the first child. A document without body
/// blocks gets an empty paragraph so the editor has somewhere to type.
pub fn to_editor_model(markup: &MarkupNode, data: &FrontmatterData, config: &Config) -> EditorNode {
    let forward = Forward { config };
    let body = match markup {
        MarkupNode::Root { children } => forward.blocks(children),
        other => forward.blocks(std::slice::from_ref(other)),
    };

    let mut content = Vec::with_capacity(body.len() + 1);
    content.push(EditorNode::Frontmatter { data: data.clone() });
    if body.is_empty() {
        content.push(EditorNode::paragraph(Vec::new()));
    } else {
        content.extend(body);
    }

    tracing::debug!(blocks = content.len() - 1, "converted markup to editor document");
    EditorNode::Doc { content }
}

struct Forward<'a> {
    config: &'a Config,
}

impl Forward<'_> {
    /// Convert children of a block container. Runs of inline children are
    /// wrapped in a flagged paragraph since blocks may not hold bare text.
    fn blocks(&self, children: &[MarkupNode]) -> Vec<EditorNode> {
        let mut out = Vec::new();
        let mut i = 0;

        while i < children.len() {
            let node = &children[i];
            if node.is_whitespace_text() {
                i += 1;
                continue;
            }
            if !self.starts_inline_run(node) {
                self.block(node, &mut out);
                i += 1;
                continue;
            }

            let start = i;
            i += 1;
            while i < children.len() && self.continues_inline_run(&children[i]) {
                i += 1;
            }
            out.push(EditorNode::wrapped_paragraph(
                self.inline(&children[start..i], &[]),
            ));
        }

        out
    }

    fn starts_inline_run(&self, node: &MarkupNode) -> bool {
        match node {
            MarkupNode::Text { .. } => true,
            MarkupNode::Element { tag, props, .. } => matches!(
                classify(tag, props, self.config),
                TagKind::Mark(_) | TagKind::HardBreak
            ),
            _ => false,
        }
    }

    fn continues_inline_run(&self, node: &MarkupNode) -> bool {
        match node {
            MarkupNode::Text { .. } => true,
            MarkupNode::Element { .. } => self.is_inline_markup(node),
            _ => false,
        }
    }

    /// Whether an element can sit inside a paragraph: marks, breaks, plain
    /// images and components whose descendants are all inline as well.
    fn is_inline_markup(&self, node: &MarkupNode) -> bool {
        match node {
            MarkupNode::Text { .. } | MarkupNode::Comment { .. } => true,
            MarkupNode::Root { .. } => false,
            MarkupNode::Element {
                tag,
                props,
                children,
            } => match classify(tag, props, self.config) {
                TagKind::Mark(_) | TagKind::HardBreak | TagKind::Generic => {
                    children.iter().all(|c| self.is_inline_markup(c))
                }
                TagKind::Image => tag == "img",
                _ => false,
            },
        }
    }

    fn block(&self, node: &MarkupNode, out: &mut Vec<EditorNode>) {
        let (tag, children, mut props) = match node {
            MarkupNode::Element {
                tag,
                props,
                children,
            } => (tag, children, normalize_props(props)),
            MarkupNode::Comment { value } => {
                out.push(EditorNode::Comment {
                    value: value.clone(),
                });
                return;
            }
            MarkupNode::Root { children } => {
                out.extend(self.blocks(children));
                return;
            }
            MarkupNode::Text { .. } => {
                out.extend(self.blocks(std::slice::from_ref(node)));
                return;
            }
        };

        let converted = match classify(tag, &props, self.config) {
            TagKind::Paragraph => {
                if !children.is_empty() && children.iter().all(|c| c.tag() == Some("img")) {
                    for (i, child) in children.iter().enumerate() {
                        if let MarkupNode::Element { tag, props, .. } = child {
                            out.push(image(tag, normalize_props(props), i > 0));
                        }
                    }
                    return;
                }
                EditorNode::Paragraph {
                    attrs: ParagraphAttrs {
                        props,
                        ..ParagraphAttrs::default()
                    },
                    content: self.inline(children, &[]),
                }
            }
            TagKind::Heading(level) => {
                // Ids are derived from the heading text on the way back.
                props.remove("id");
                EditorNode::Heading {
                    attrs: HeadingAttrs {
                        level,
                        props,
                        ..HeadingAttrs::default()
                    },
                    content: self.inline(children, &[]),
                }
            }
            TagKind::BulletList => EditorNode::BulletList {
                attrs: block_attrs(props),
                content: self.blocks(children),
            },
            TagKind::OrderedList => {
                let start = props
                    .get("start")
                    .and_then(PropValue::as_str)
                    .and_then(|s| s.trim().parse::<u32>().ok());
                if start.is_some() {
                    props.remove("start");
                }
                EditorNode::OrderedList {
                    attrs: OrderedListAttrs {
                        start,
                        props,
                        ..OrderedListAttrs::default()
                    },
                    content: self.blocks(children),
                }
            }
            TagKind::ListItem => EditorNode::ListItem {
                attrs: block_attrs(props),
                content: self.blocks(children),
            },
            TagKind::Blockquote => EditorNode::Blockquote {
                attrs: block_attrs(props),
                content: self.blocks(children),
            },
            TagKind::HorizontalRule => EditorNode::HorizontalRule {
                attrs: block_attrs(props),
            },
            TagKind::CodeBlock => code_block(props, children),
            TagKind::Image => image(tag, props, false),
            TagKind::Video if !children.iter().any(|c| c.tag().is_some()) => EditorNode::Video {
                attrs: block_attrs(props),
            },
            TagKind::Mark(_) | TagKind::HardBreak => {
                out.push(EditorNode::wrapped_paragraph(
                    self.inline(std::slice::from_ref(node), &[]),
                ));
                return;
            }
            TagKind::Video | TagKind::Slot | TagKind::Generic => EditorNode::Element {
                attrs: ElementAttrs::new(tag.as_str(), props),
                content: self.slots(children),
            },
        };
        out.push(converted);
    }

    /// Distribute a component's children into slots. Children outside a
    /// `template v-slot:*` land in the default slot, created up front if the
    /// markup did not declare one.
    fn slots(&self, children: &[MarkupNode]) -> Vec<EditorNode> {
        let mut slots = Vec::new();
        let mut loose = Vec::new();

        for child in children {
            if let MarkupNode::Element {
                tag,
                props,
                children: slot_children,
            } = child
            {
                if let Some(name) = slot_name(props).filter(|_| tag == "template") {
                    let mut props = normalize_props(props);
                    props.retain(|k, _| !k.starts_with(SLOT_PROP_PREFIX));
                    slots.push(EditorNode::Slot {
                        attrs: SlotAttrs::new(name, props),
                        content: self.blocks(slot_children),
                    });
                    continue;
                }
            }
            loose.push(child.clone());
        }

        let loose = self.blocks(&loose);
        let default = slots
            .iter_mut()
            .find(|s| matches!(s, EditorNode::Slot { attrs, .. } if attrs.name == DEFAULT_SLOT));
        match default {
            Some(EditorNode::Slot { content, .. }) => content.extend(loose),
            _ => slots.insert(
                0,
                EditorNode::Slot {
                    attrs: SlotAttrs::new(DEFAULT_SLOT, Props::new()),
                    content: loose,
                },
            ),
        }
        slots
    }

    /// Convert inline children. `chain` holds the enclosing marks, outermost first.
    fn inline(&self, children: &[MarkupNode], chain: &[Mark]) -> Vec<EditorNode> {
        let mut out = Vec::new();
        for child in children {
            self.inline_node(child, chain, &mut out);
        }
        out
    }

    fn inline_node(&self, node: &MarkupNode, chain: &[Mark], out: &mut Vec<EditorNode>) {
        match node {
            MarkupNode::Text { value } => push_text(value, chain, out),
            MarkupNode::Comment { value } => out.push(EditorNode::Comment {
                value: value.clone(),
            }),
            MarkupNode::Root { children } => {
                for child in children {
                    self.inline_node(child, chain, out);
                }
            }
            MarkupNode::Element {
                tag,
                props,
                children,
            } => {
                let props = normalize_props(props);
                match classify(tag, &props, self.config) {
                    TagKind::Mark(kind) => {
                        let mut chain = chain.to_vec();
                        chain.push(marks::mark_for_element(kind, &props, &self.config.links));
                        if kind == MarkKind::Code {
                            // Code content is literal: nested markup (e.g. a
                            // highlighted fragment) collapses into one leaf.
                            let text = node.text_content();
                            if !text.is_empty() {
                                out.push(EditorNode::Text {
                                    text,
                                    marks: marks::flatten(&chain),
                                });
                            }
                        } else {
                            for child in children {
                                self.inline_node(child, &chain, out);
                            }
                        }
                    }
                    TagKind::HardBreak => out.push(EditorNode::HardBreak {
                        marks: marks::flatten(chain),
                    }),
                    _ => out.push(EditorNode::InlineElement {
                        attrs: ElementAttrs::new(tag.as_str(), props),
                        content: self.inline(children, &[]),
                        marks: marks::flatten(chain),
                    }),
                }
            }
        }
    }
}

fn push_text(value: &str, chain: &[Mark], out: &mut Vec<EditorNode>) {
    if value.is_empty() {
        return;
    }
    let marks = marks::flatten(chain);
    for segment in tokenizer::tokenize(value) {
        out.push(match segment {
            Segment::Text(text) => EditorNode::Text {
                text: text.to_string(),
                marks: marks.clone(),
            },
            Segment::Emoji(glyph) => EditorNode::Emoji {
                glyph: glyph.to_string(),
                marks: marks.clone(),
            },
        });
    }
}

fn code_block(mut props: Props, children: &[MarkupNode]) -> EditorNode {
    let language = take_string(&mut props, "language");
    let filename = take_string(&mut props, "filename");
    let code = take_string(&mut props, "code")
        .unwrap_or_else(|| children.iter().map(MarkupNode::text_content).collect());

    // `highlight` is added by the highlighter on the way out.
    if let Some(class) = take_string(&mut props, "class") {
        let rest: Vec<&str> = class.split_whitespace().filter(|c| *c != "highlight").collect();
        if !rest.is_empty() {
            props.insert("class".to_string(), rest.join(" ").into());
        }
    }
    let content = if code.is_empty() {
        Vec::new()
    } else {
        vec![EditorNode::text(code)]
    };
    EditorNode::CodeBlock {
        attrs: CodeBlockAttrs {
            language,
            filename,
            props,
            ..CodeBlockAttrs::default()
        },
        content,
    }
}

fn image(tag: &str, mut props: Props, shared_paragraph: bool) -> EditorNode {
    EditorNode::Image {
        attrs: ImageAttrs {
            tag: tag.to_string(),
            src: take_string(&mut props, "src").unwrap_or_default(),
            alt: take_string(&mut props, "alt").unwrap_or_default(),
            title: take_string(&mut props, "title"),
            shared_paragraph,
            props,
            ..ImageAttrs::default()
        },
    }
}

fn block_attrs(props: Props) -> BlockAttrs {
    BlockAttrs {
        props,
        ..BlockAttrs::default()
    }
}

fn take_string(props: &mut Props, key: &str) -> Option<String> {
    match props.get(key) {
        Some(PropValue::String(_)) => match props.remove(key) {
            Some(PropValue::String(s)) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

/// Private copy of an element's props: parser-internal `__` keys dropped and
/// `class`/`className` folded into one space-separated `class`.
fn normalize_props(props: &Props) -> Props {
    let mut out = Props::new();
    let mut classes: Vec<&str> = Vec::new();

    for (key, value) in props {
        if key.starts_with("__") {
            continue;
        }
        match key.as_str() {
            "class" | "className" => {
                for class in value.as_str().unwrap_or_default().split_whitespace() {
                    if !classes.contains(&class) {
                        classes.push(class);
                    }
                }
            }
            _ => {
                out.insert(key.clone(), value.clone());
            }
        }
    }

    if !classes.is_empty() {
        out.insert("class".to_string(), classes.join(" ").into());
    }
    out
}
