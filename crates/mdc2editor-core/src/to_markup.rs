//! Editor document -> markup tree.

use serde::{Deserialize, Serialize};

use crate::ast::{MarkupNode, Props};
use crate::config::Config;
use crate::editor::{self, EditorNode, ExtraAttrs, FrontmatterData, ImageAttrs, DEFAULT_SLOT, SLOT_PROP_PREFIX};
use crate::highlight::{self, Highlighter, SyntectHighlighter};
use crate::marks::{self, Leaf};
use crate::slug::Slugger;

/// Markup body plus the frontmatter pulled out of the editor document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkupDocument {
    pub body: MarkupNode,
    #[serde(default)]
    pub data: FrontmatterData,
}

/// Convert an editor document back to markup, highlighting code blocks with
/// syntect when `config.highlight.enabled` is set.
pub fn to_markup(doc: &EditorNode, config: &Config) -> MarkupDocument {
    to_markup_with_highlighter(doc, config, &SyntectHighlighter)
}

pub fn to_markup_with_highlighter(
    doc: &EditorNode,
    config: &Config,
    highlighter: &dyn Highlighter,
) -> MarkupDocument {
    let nodes = match doc {
        EditorNode::Doc { content } => content.as_slice(),
        other => std::slice::from_ref(other),
    };

    let (data, body_nodes) = match nodes {
        [EditorNode::Frontmatter { data }, rest @ ..] => (data.clone(), rest),
        _ => (FrontmatterData::new(), nodes),
    };

    let mut backward = Backward {
        slugger: Slugger::new(),
    };
    let children = if is_placeholder(body_nodes) {
        Vec::new()
    } else {
        backward.blocks(body_nodes)
    };

    let mut body = MarkupNode::root(children);
    if config.highlight.enabled {
        highlight::highlight_body(&mut body, highlighter, &config.highlight.theme);
    }

    tracing::debug!(
        blocks = body.children().len(),
        frontmatter_keys = data.len(),
        "converted editor document to markup"
    );
    MarkupDocument { body, data }
}

/// The empty paragraph inserted for documents without a body.
fn is_placeholder(nodes: &[EditorNode]) -> bool {
    matches!(
        nodes,
        [EditorNode::Paragraph { attrs, content }]
            if !attrs.was_text_wrapped && attrs.props.is_empty() && content.is_empty()
    )
}

struct Backward {
    slugger: Slugger,
}

impl Backward {
    fn blocks(&mut self, nodes: &[EditorNode]) -> Vec<MarkupNode> {
        let mut out = Vec::new();
        let mut i = 0;

        while i < nodes.len() {
            if !nodes[i].is_inline() {
                self.block(&nodes[i], &mut out);
                i += 1;
                continue;
            }
            // Inline nodes directly in a block container are emitted bare.
            let start = i;
            while i < nodes.len() && nodes[i].is_inline() {
                i += 1;
            }
            out.extend(self.inline(&nodes[start..i]));
        }

        out
    }

    fn block(&mut self, node: &EditorNode, out: &mut Vec<MarkupNode>) {
        let converted = match node {
            EditorNode::Doc { content } => {
                out.extend(self.blocks(content));
                return;
            }
            EditorNode::Frontmatter { .. } => {
                tracing::debug!("ignoring frontmatter node outside document head");
                return;
            }
            EditorNode::Paragraph { attrs, content } => {
                let children = self.inline(content);
                if attrs.was_text_wrapped {
                    out.extend(children);
                    return;
                }
                element("p", markup_props(&attrs.props, &attrs.extra), children)
            }
            EditorNode::Heading { attrs, content } => {
                let mut props = markup_props(&attrs.props, &attrs.extra);
                props.insert("id".to_string(), self.slugger.slug(&node.text_content()).into());
                element(&format!("h{}", attrs.level.clamp(1, 6)), props, self.inline(content))
            }
            EditorNode::BulletList { attrs, content } => element(
                "ul",
                markup_props(&attrs.props, &attrs.extra),
                self.blocks(content),
            ),
            EditorNode::OrderedList { attrs, content } => {
                let mut props = markup_props(&attrs.props, &attrs.extra);
                if let Some(start) = attrs.start {
                    props.insert("start".to_string(), start.to_string().into());
                }
                element("ol", props, self.blocks(content))
            }
            EditorNode::ListItem { attrs, content } => element(
                "li",
                markup_props(&attrs.props, &attrs.extra),
                self.blocks(content),
            ),
            EditorNode::Blockquote { attrs, content } => element(
                "blockquote",
                markup_props(&attrs.props, &attrs.extra),
                self.blocks(content),
            ),
            EditorNode::HorizontalRule { attrs } => {
                element("hr", markup_props(&attrs.props, &attrs.extra), Vec::new())
            }
            EditorNode::CodeBlock { attrs, content } => code_block(
                attrs.language.as_deref(),
                attrs.filename.as_deref(),
                markup_props(&attrs.props, &attrs.extra),
                content,
            ),
            EditorNode::Image { attrs } => {
                let image = element(&attrs.tag, image_props(attrs), Vec::new());
                if attrs.tag != "img" {
                    image
                } else if let (true, Some(images)) = (attrs.shared_paragraph, image_paragraph(out)) {
                    images.push(image);
                    return;
                } else {
                    element("p", Props::new(), vec![image])
                }
            }
            EditorNode::Video { attrs } => {
                element("video", markup_props(&attrs.props, &attrs.extra), Vec::new())
            }
            EditorNode::Element { attrs, content } => element(
                &attrs.tag,
                markup_props(&attrs.props, &attrs.extra),
                self.blocks(content),
            ),
            EditorNode::Slot { attrs, content } => {
                if attrs.name == DEFAULT_SLOT {
                    out.extend(self.blocks(content));
                    return;
                }
                let mut props = markup_props(&attrs.props, &attrs.extra);
                props.insert(format!("{SLOT_PROP_PREFIX}{}", attrs.name), "".into());
                element("template", props, self.blocks(content))
            }
            EditorNode::Comment { value } => MarkupNode::Comment {
                value: value.clone(),
            },
            EditorNode::Unknown(unknown) => {
                tracing::warn!(kind = %unknown.kind, "no markup mapping for editor node");
                unknown_placeholder("p", &unknown.kind)
            }
            EditorNode::Text { .. }
            | EditorNode::Emoji { .. }
            | EditorNode::HardBreak { .. }
            | EditorNode::InlineElement { .. } => {
                out.extend(self.inline(std::slice::from_ref(node)));
                return;
            }
        };
        out.push(converted);
    }

    /// Lower inline nodes to marked leaves and regroup them into mark elements.
    fn inline(&mut self, nodes: &[EditorNode]) -> Vec<MarkupNode> {
        let mut leaves = Vec::with_capacity(nodes.len());
        for node in nodes {
            self.leaves(node, &mut leaves);
        }
        marks::regroup(leaves)
    }

    fn leaves(&mut self, node: &EditorNode, out: &mut Vec<Leaf>) {
        let leaf = match node {
            EditorNode::Text { text, marks } => {
                if text.is_empty() {
                    return;
                }
                Leaf::new(MarkupNode::text(text.as_str()), marks.clone())
            }
            EditorNode::Emoji { glyph, marks } => {
                Leaf::new(MarkupNode::text(glyph.as_str()), marks.clone())
            }
            EditorNode::HardBreak { marks } => {
                Leaf::new(element("br", Props::new(), Vec::new()), marks.clone())
            }
            EditorNode::InlineElement {
                attrs,
                content,
                marks,
            } => Leaf::new(
                element(
                    &attrs.tag,
                    markup_props(&attrs.props, &attrs.extra),
                    self.inline(content),
                ),
                marks.clone(),
            ),
            EditorNode::Comment { value } => Leaf::new(
                MarkupNode::Comment {
                    value: value.clone(),
                },
                Vec::new(),
            ),
            EditorNode::Unknown(unknown) => {
                tracing::warn!(kind = %unknown.kind, "no markup mapping for inline editor node");
                Leaf::new(unknown_placeholder("span", &unknown.kind), Vec::new())
            }
            block => {
                let mut converted = Vec::new();
                self.block(block, &mut converted);
                out.extend(converted.into_iter().map(|n| Leaf::new(n, Vec::new())));
                return;
            }
        };
        out.push(leaf);
    }
}

fn element(tag: &str, props: Props, children: Vec<MarkupNode>) -> MarkupNode {
    MarkupNode::element(tag, props, children)
}

/// A node's props plus any scalar editor attributes without a typed field.
fn markup_props(props: &Props, extra: &ExtraAttrs) -> Props {
    let mut out = props.clone();
    for (key, value) in extra {
        if let Some(value) = editor::prop_value(value.clone()) {
            out.entry(key.clone()).or_insert(value);
        }
    }
    out
}

/// Children of the last emitted node if it is a paragraph holding only images.
fn image_paragraph(out: &mut [MarkupNode]) -> Option<&mut Vec<MarkupNode>> {
    match out.last_mut() {
        Some(MarkupNode::Element { tag, children, .. })
            if tag.as_str() == "p" && children.iter().all(|c| c.tag() == Some("img")) =>
        {
            Some(children)
        }
        _ => None,
    }
}

fn image_props(attrs: &ImageAttrs) -> Props {
    let mut props = markup_props(&attrs.props, &attrs.extra);
    props.insert("src".to_string(), attrs.src.as_str().into());
    props.insert("alt".to_string(), attrs.alt.as_str().into());
    if let Some(title) = &attrs.title {
        props.insert("title".to_string(), title.as_str().into());
    }
    props
}

fn unknown_placeholder(tag: &str, kind: &str) -> MarkupNode {
    element(tag, Props::new(), vec![MarkupNode::text(format!("Unknown node: {kind}"))])
}

fn code_block(
    language: Option<&str>,
    filename: Option<&str>,
    mut props: Props,
    content: &[EditorNode],
) -> MarkupNode {
    let code: String = content.iter().map(EditorNode::text_content).collect();
    if let Some(language) = language {
        props.insert("language".to_string(), language.into());
    }
    if let Some(filename) = filename {
        props.insert("filename".to_string(), filename.into());
    }
    props.insert("code".to_string(), code.as_str().into());

    let text = if code.is_empty() {
        Vec::new()
    } else {
        vec![MarkupNode::text(code)]
    };
    element("pre", props, vec![element("code", Props::new(), text)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::props;
    use crate::editor::{
        BlockAttrs, CodeBlockAttrs, ElementAttrs, HeadingAttrs, Mark, MarkKind, OrderedListAttrs,
        SlotAttrs, UnknownNode,
    };
    use crate::highlight::HighlightError;
    use crate::config::ThemeConfig;

    fn plain() -> Config {
        let mut config = Config::default();
        config.highlight.enabled = false;
        config
    }

    fn doc(content: Vec<EditorNode>) -> EditorNode {
        let mut all = vec![EditorNode::Frontmatter {
            data: FrontmatterData::new(),
        }];
        all.extend(content);
        EditorNode::Doc { content: all }
    }

    fn body(content: Vec<EditorNode>) -> Vec<MarkupNode> {
        match to_markup(&doc(content), &plain()).body {
            MarkupNode::Root { children } => children,
            other => panic!("Expected root, got {other:?}"),
        }
    }

    fn heading(text: &str) -> EditorNode {
        EditorNode::Heading {
            attrs: HeadingAttrs {
                level: 2,
                ..HeadingAttrs::default()
            },
            content: vec![EditorNode::text(text)],
        }
    }

    #[test]
    fn test_frontmatter_extracted() {
        let mut data = FrontmatterData::new();
        data.insert("title".to_string(), serde_json::json!("Hi"));
        let doc = EditorNode::Doc {
            content: vec![
                EditorNode::Frontmatter { data: data.clone() },
                EditorNode::paragraph(vec![EditorNode::text("x")]),
            ],
        };
        let out = to_markup(&doc, &plain());
        assert_eq!(out.data, data);
        assert_eq!(
            out.body,
            MarkupNode::root(vec![MarkupNode::element(
                "p",
                Props::new(),
                vec![MarkupNode::text("x")]
            )])
        );
    }

    #[test]
    fn test_placeholder_document_has_empty_body() {
        assert!(body(vec![EditorNode::paragraph(vec![])]).is_empty());
    }

    #[test]
    fn test_heading_ids_unique_within_document() {
        let out = body(vec![heading("Setup"), heading("Setup"), heading("Usage")]);
        let ids: Vec<_> = out
            .iter()
            .map(|n| match n {
                MarkupNode::Element { props, .. } => props.get("id").cloned(),
                _ => None,
            })
            .collect();
        assert_eq!(
            ids,
            vec![
                Some("setup".into()),
                Some("setup-1".into()),
                Some("usage".into())
            ]
        );
    }

    #[test]
    fn test_slug_registry_is_per_call() {
        let first = body(vec![heading("Setup")]);
        let second = body(vec![heading("Setup")]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_wrapped_paragraph_spliced_into_parent() {
        let out = body(vec![EditorNode::ListItem {
            attrs: BlockAttrs::default(),
            content: vec![EditorNode::wrapped_paragraph(vec![EditorNode::text("item")])],
        }]);
        assert_eq!(
            out,
            vec![MarkupNode::element("li", Props::new(), vec![MarkupNode::text("item")])]
        );
    }

    #[test]
    fn test_slots_become_templates_and_default_is_spliced() {
        let out = body(vec![EditorNode::Element {
            attrs: ElementAttrs::new("card", props([("color", "blue".into())])),
            content: vec![
                EditorNode::Slot {
                    attrs: SlotAttrs::new("default", Props::new()),
                    content: vec![EditorNode::paragraph(vec![EditorNode::text("Body")])],
                },
                EditorNode::Slot {
                    attrs: SlotAttrs::new("footer", Props::new()),
                    content: vec![EditorNode::paragraph(vec![EditorNode::text("Foot")])],
                },
            ],
        }]);
        assert_eq!(
            out,
            vec![MarkupNode::element(
                "card",
                props([("color", "blue".into())]),
                vec![
                    MarkupNode::element("p", Props::new(), vec![MarkupNode::text("Body")]),
                    MarkupNode::element(
                        "template",
                        props([("v-slot:footer", "".into())]),
                        vec![MarkupNode::element("p", Props::new(), vec![MarkupNode::text("Foot")])]
                    ),
                ]
            )]
        );
    }

    #[test]
    fn test_code_block_shape() {
        let out = body(vec![EditorNode::CodeBlock {
            attrs: CodeBlockAttrs {
                language: Some("ts".to_string()),
                filename: Some("app.ts".to_string()),
                ..CodeBlockAttrs::default()
            },
            content: vec![EditorNode::text("const a = 1")],
        }]);
        assert_eq!(
            out,
            vec![MarkupNode::element(
                "pre",
                props([
                    ("code", "const a = 1".into()),
                    ("filename", "app.ts".into()),
                    ("language", "ts".into()),
                ]),
                vec![MarkupNode::element(
                    "code",
                    Props::new(),
                    vec![MarkupNode::text("const a = 1")]
                )]
            )]
        );
    }

    #[test]
    fn test_images() {
        let image = |tag: &str| EditorNode::Image {
            attrs: ImageAttrs {
                tag: tag.to_string(),
                src: "/a.png".to_string(),
                alt: "A".to_string(),
                ..ImageAttrs::default()
            },
        };
        let out = body(vec![image("img"), image("prose-img")]);
        let expected_props = props([("alt", "A".into()), ("src", "/a.png".into())]);
        assert_eq!(
            out,
            vec![
                MarkupNode::element(
                    "p",
                    Props::new(),
                    vec![MarkupNode::element("img", expected_props.clone(), vec![])]
                ),
                MarkupNode::element("prose-img", expected_props, vec![]),
            ]
        );
    }

    #[test]
    fn test_images_from_one_paragraph_share_it_again() {
        let image = |src: &str, shared_paragraph: bool| EditorNode::Image {
            attrs: ImageAttrs {
                src: src.to_string(),
                shared_paragraph,
                ..ImageAttrs::default()
            },
        };
        let img = |src: &str| {
            MarkupNode::element("img", props([("alt", "".into()), ("src", src.into())]), vec![])
        };

        let out = body(vec![image("/a.png", false), image("/b.png", true), image("/c.png", false)]);
        assert_eq!(
            out,
            vec![
                MarkupNode::element("p", Props::new(), vec![img("/a.png"), img("/b.png")]),
                MarkupNode::element("p", Props::new(), vec![img("/c.png")]),
            ]
        );
    }

    #[test]
    fn test_extra_editor_attrs_become_props() {
        let node: EditorNode = serde_json::from_value(serde_json::json!({
            "type": "paragraph",
            "attrs": {"textAlign": "center", "indent": 2, "dir": null},
            "content": [{"type": "text", "text": "x"}]
        }))
        .unwrap();
        assert_eq!(
            body(vec![node]),
            vec![MarkupNode::element(
                "p",
                props([("indent", "2".into()), ("textAlign", "center".into())]),
                vec![MarkupNode::text("x")]
            )]
        );
    }

    #[test]
    fn test_live_editor_heading_and_unsupported_mark() {
        let nodes: Vec<EditorNode> = serde_json::from_value(serde_json::json!([
            {"type": "heading", "attrs": {"level": 2}, "content": [{"type": "text", "text": "Title"}]},
            {"type": "paragraph", "content": [
                {"type": "text", "text": "keep me", "marks": [{"type": "underline"}]}
            ]}
        ]))
        .unwrap();
        assert_eq!(
            body(nodes),
            vec![
                MarkupNode::element("h2", props([("id", "title".into())]), vec![MarkupNode::text("Title")]),
                MarkupNode::element("p", Props::new(), vec![MarkupNode::text("keep me")]),
            ]
        );
    }

    #[test]
    fn test_marks_regrouped_in_paragraph() {
        let bold = Mark::new(MarkKind::Bold);
        let out = body(vec![EditorNode::paragraph(vec![
            EditorNode::Text {
                text: "hi ".to_string(),
                marks: vec![bold.clone()],
            },
            EditorNode::Emoji {
                glyph: "👋".to_string(),
                marks: vec![bold],
            },
            EditorNode::HardBreak { marks: vec![] },
            EditorNode::text("next"),
        ])]);
        assert_eq!(
            out,
            vec![MarkupNode::element(
                "p",
                Props::new(),
                vec![
                    MarkupNode::element("strong", Props::new(), vec![MarkupNode::text("hi 👋")]),
                    MarkupNode::element("br", Props::new(), vec![]),
                    MarkupNode::text("next"),
                ]
            )]
        );
    }

    #[test]
    fn test_unknown_nodes_become_placeholders() {
        let unknown = |kind: &str| {
            EditorNode::Unknown(UnknownNode {
                kind: kind.to_string(),
                attrs: None,
                content: vec![],
            })
        };
        let out = body(vec![
            unknown("mathBlock"),
            EditorNode::paragraph(vec![EditorNode::text("a "), unknown("mention")]),
        ]);
        assert_eq!(
            out,
            vec![
                MarkupNode::element(
                    "p",
                    Props::new(),
                    vec![MarkupNode::text("Unknown node: mathBlock")]
                ),
                MarkupNode::element(
                    "p",
                    Props::new(),
                    vec![
                        MarkupNode::text("a "),
                        MarkupNode::element(
                            "span",
                            Props::new(),
                            vec![MarkupNode::text("Unknown node: mention")]
                        ),
                    ]
                ),
            ]
        );
    }

    #[test]
    fn test_ordered_list_start_emitted() {
        let out = body(vec![EditorNode::OrderedList {
            attrs: OrderedListAttrs {
                start: Some(4),
                ..OrderedListAttrs::default()
            },
            content: vec![],
        }]);
        assert_eq!(
            out,
            vec![MarkupNode::element("ol", props([("start", "4".into())]), vec![])]
        );
    }

    struct Upper;

    impl Highlighter for Upper {
        fn highlight(
            &self,
            code: &str,
            _language: Option<&str>,
            _theme: &ThemeConfig,
        ) -> Result<Vec<MarkupNode>, HighlightError> {
            Ok(vec![MarkupNode::text(code.to_uppercase())])
        }
    }

    #[test]
    fn test_highlighter_runs_when_enabled() {
        let doc = doc(vec![EditorNode::CodeBlock {
            attrs: CodeBlockAttrs {
                language: Some("js".to_string()),
                ..CodeBlockAttrs::default()
            },
            content: vec![EditorNode::text("let a")],
        }]);

        let highlighted = to_markup_with_highlighter(&doc, &Config::default(), &Upper);
        assert_eq!(highlighted.body.text_content(), "LET A");

        let plain_out = to_markup_with_highlighter(&doc, &plain(), &Upper);
        assert_eq!(plain_out.body.text_content(), "let a");
    }
}
