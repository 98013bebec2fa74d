//! Plain Markdown to markup tree, for callers without an MDC parser of their own.
//!
//! Components are out of reach here: the tree only holds what CommonMark (plus
//! strikethrough) can express. YAML frontmatter is parsed into the same map the
//! converters carry.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};
use thiserror::Error;

use crate::ast::{MarkupNode, Props};
use crate::editor::FrontmatterData;
use crate::slug::Slugger;

#[derive(Debug, Error)]
pub enum MarkdownError {
    #[error("invalid frontmatter: {0}")]
    Frontmatter(#[from] serde_yaml::Error),
    #[error("frontmatter must be a mapping of keys to values")]
    FrontmatterNotMapping,
}

/// Parse Markdown into a `root` markup tree plus its frontmatter.
pub fn parse_markdown(src: &str) -> Result<(MarkupNode, FrontmatterData), MarkdownError> {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_YAML_STYLE_METADATA_BLOCKS);

    let mut builder = TreeBuilder::new();
    for event in Parser::new_ext(src, opts) {
        builder.event(event);
    }

    let data = match builder.frontmatter.take() {
        Some(yaml) => parse_frontmatter(&yaml)?,
        None => FrontmatterData::new(),
    };
    Ok((builder.finish(), data))
}

fn parse_frontmatter(yaml: &str) -> Result<FrontmatterData, MarkdownError> {
    match serde_yaml::from_str::<serde_json::Value>(yaml)? {
        serde_json::Value::Object(map) => Ok(map),
        serde_json::Value::Null => Ok(FrontmatterData::new()),
        _ => Err(MarkdownError::FrontmatterNotMapping),
    }
}

#[derive(Debug, PartialEq)]
enum FrameKind {
    Element,
    Heading,
    Image,
    CodeBlock,
    Html,
    Metadata,
}

struct Frame {
    kind: FrameKind,
    tag: &'static str,
    props: Props,
    children: Vec<MarkupNode>,
}

impl Frame {
    fn new(kind: FrameKind, tag: &'static str, props: Props) -> Self {
        Self {
            kind,
            tag,
            props,
            children: Vec::new(),
        }
    }
}

/// Builds the tree from a flat event stream. Every `Start` pushes a frame and
/// every `End` pops one, so ends never need to be matched by tag.
struct TreeBuilder {
    stack: Vec<Frame>,
    slugger: Slugger,
    frontmatter: Option<String>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            stack: vec![Frame::new(FrameKind::Element, "root", Props::new())],
            slugger: Slugger::new(),
            frontmatter: None,
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(_) => self.end(),
            Event::Text(text) => self.push(MarkupNode::text(text.into_string())),
            Event::Code(code) => self.push(MarkupNode::element(
                "code",
                Props::new(),
                vec![MarkupNode::text(code.into_string())],
            )),
            Event::Html(html) => self.push(MarkupNode::text(html.into_string())),
            Event::InlineHtml(html) => match comment_body(&html) {
                Some(value) => self.push(MarkupNode::Comment { value }),
                None => tracing::debug!(html = %html, "skipping inline html"),
            },
            Event::SoftBreak => self.push(MarkupNode::text("\n")),
            Event::HardBreak => self.push(MarkupNode::element("br", Props::new(), Vec::new())),
            Event::Rule => self.push(MarkupNode::element("hr", Props::new(), Vec::new())),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        let frame = match tag {
            Tag::Paragraph => Frame::new(FrameKind::Element, "p", Props::new()),
            Tag::Heading { level, .. } => Frame::new(FrameKind::Heading, heading_tag(level), Props::new()),
            Tag::BlockQuote(_) => Frame::new(FrameKind::Element, "blockquote", Props::new()),
            Tag::CodeBlock(kind) => {
                let mut props = Props::new();
                if let CodeBlockKind::Fenced(info) = kind {
                    if let Some(language) = info.split_whitespace().next() {
                        props.insert("language".to_string(), language.into());
                    }
                }
                Frame::new(FrameKind::CodeBlock, "pre", props)
            }
            Tag::HtmlBlock => Frame::new(FrameKind::Html, "html", Props::new()),
            Tag::List(Some(start)) => {
                let mut props = Props::new();
                if start != 1 {
                    props.insert("start".to_string(), start.to_string().into());
                }
                Frame::new(FrameKind::Element, "ol", props)
            }
            Tag::List(None) => Frame::new(FrameKind::Element, "ul", Props::new()),
            Tag::Item => Frame::new(FrameKind::Element, "li", Props::new()),
            Tag::Emphasis => Frame::new(FrameKind::Element, "em", Props::new()),
            Tag::Strong => Frame::new(FrameKind::Element, "strong", Props::new()),
            Tag::Strikethrough => Frame::new(FrameKind::Element, "del", Props::new()),
            Tag::Link {
                dest_url, title, ..
            } => Frame::new(FrameKind::Element, "a", link_props("href", &dest_url, &title)),
            Tag::Image {
                dest_url, title, ..
            } => Frame::new(FrameKind::Image, "img", link_props("src", &dest_url, &title)),
            Tag::MetadataBlock(_) => Frame::new(FrameKind::Metadata, "frontmatter", Props::new()),
            other => {
                tracing::debug!(tag = ?other, "flattening unsupported markdown container");
                Frame::new(FrameKind::Element, "div", Props::new())
            }
        };
        self.stack.push(frame);
    }

    fn end(&mut self) {
        if self.stack.len() < 2 {
            return;
        }
        let Some(mut frame) = self.stack.pop() else {
            return;
        };

        match frame.kind {
            FrameKind::Element => {
                self.push(MarkupNode::element(frame.tag, frame.props, frame.children));
            }
            FrameKind::Heading => {
                let text: String = frame.children.iter().map(MarkupNode::text_content).collect();
                frame
                    .props
                    .insert("id".to_string(), self.slugger.slug(&text).into());
                self.push(MarkupNode::element(frame.tag, frame.props, frame.children));
            }
            FrameKind::Image => {
                let alt: String = frame.children.iter().map(MarkupNode::text_content).collect();
                frame.props.insert("alt".to_string(), alt.into());
                self.push(MarkupNode::element("img", frame.props, Vec::new()));
            }
            FrameKind::CodeBlock => {
                let mut code: String = frame.children.iter().map(MarkupNode::text_content).collect();
                if code.ends_with('\n') {
                    code.pop();
                }
                frame.props.insert("code".to_string(), code.as_str().into());
                let text = if code.is_empty() {
                    Vec::new()
                } else {
                    vec![MarkupNode::text(code)]
                };
                self.push(MarkupNode::element(
                    "pre",
                    frame.props,
                    vec![MarkupNode::element("code", Props::new(), text)],
                ));
            }
            FrameKind::Html => {
                let html: String = frame.children.iter().map(MarkupNode::text_content).collect();
                match comment_body(&html) {
                    Some(value) => self.push(MarkupNode::Comment { value }),
                    None => tracing::debug!(html = %html.trim(), "skipping html block"),
                }
            }
            FrameKind::Metadata => {
                self.frontmatter = Some(frame.children.iter().map(MarkupNode::text_content).collect());
            }
        }
    }

    /// Append to the open frame, merging adjacent text.
    fn push(&mut self, node: MarkupNode) {
        let Some(frame) = self.stack.last_mut() else {
            return;
        };
        if let (Some(MarkupNode::Text { value: last }), MarkupNode::Text { value }) =
            (frame.children.last_mut(), &node)
        {
            last.push_str(value);
            return;
        }
        frame.children.push(node);
    }

    fn finish(mut self) -> MarkupNode {
        while self.stack.len() > 1 {
            self.end();
        }
        let children = self.stack.pop().map(|f| f.children).unwrap_or_default();
        MarkupNode::root(children)
    }
}

fn heading_tag(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "h1",
        HeadingLevel::H2 => "h2",
        HeadingLevel::H3 => "h3",
        HeadingLevel::H4 => "h4",
        HeadingLevel::H5 => "h5",
        HeadingLevel::H6 => "h6",
    }
}

fn link_props(key: &str, url: &str, title: &str) -> Props {
    let mut props = Props::new();
    props.insert(key.to_string(), url.into());
    if !title.is_empty() {
        props.insert("title".to_string(), title.into());
    }
    props
}

fn comment_body(html: &str) -> Option<String> {
    html.trim()
        .strip_prefix("<!--")
        .and_then(|s| s.strip_suffix("-->"))
        .map(|s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::props;

    fn el(tag: &str, children: Vec<MarkupNode>) -> MarkupNode {
        MarkupNode::element(tag, Props::new(), children)
    }

    fn text(value: &str) -> MarkupNode {
        MarkupNode::text(value)
    }

    fn body(src: &str) -> Vec<MarkupNode> {
        let (root, _) = parse_markdown(src).unwrap();
        root.children().to_vec()
    }

    #[test]
    fn test_heading_and_paragraph() {
        assert_eq!(
            body("# Hello World\n\nSome *text* here."),
            vec![
                MarkupNode::element("h1", props([("id", "hello-world".into())]), vec![text("Hello World")]),
                el("p", vec![text("Some "), el("em", vec![text("text")]), text(" here.")]),
            ]
        );
    }

    #[test]
    fn test_duplicate_headings_get_unique_ids() {
        let out = body("## Setup\n\n## Setup\n");
        assert_eq!(out[1], MarkupNode::element("h2", props([("id", "setup-1".into())]), vec![text("Setup")]));
    }

    #[test]
    fn test_marks_and_breaks() {
        assert_eq!(
            body("**a** ~~b~~ `c`  \nnext\nline"),
            vec![el(
                "p",
                vec![
                    el("strong", vec![text("a")]),
                    text(" "),
                    el("del", vec![text("b")]),
                    text(" "),
                    el("code", vec![text("c")]),
                    el("br", vec![]),
                    text("next\nline"),
                ]
            )]
        );
    }

    #[test]
    fn test_tight_list_items_hold_text() {
        assert_eq!(
            body("3. one\n4. two\n"),
            vec![MarkupNode::element(
                "ol",
                props([("start", "3".into())]),
                vec![el("li", vec![text("one")]), el("li", vec![text("two")])]
            )]
        );
        assert_eq!(body("1. one\n")[0].tag(), Some("ol"));
        assert!(matches!(&body("1. one\n")[0], MarkupNode::Element { props, .. } if props.is_empty()));
    }

    #[test]
    fn test_links_and_images() {
        assert_eq!(
            body("[docs](/docs \"Docs\") ![a *cat*](/cat.png)"),
            vec![el(
                "p",
                vec![
                    MarkupNode::element(
                        "a",
                        props([("href", "/docs".into()), ("title", "Docs".into())]),
                        vec![text("docs")]
                    ),
                    text(" "),
                    MarkupNode::element("img", props([("alt", "a cat".into()), ("src", "/cat.png".into())]), vec![]),
                ]
            )]
        );
    }

    #[test]
    fn test_fenced_code_block() {
        assert_eq!(
            body("```rust title\nfn main() {}\n```\n"),
            vec![MarkupNode::element(
                "pre",
                props([("code", "fn main() {}".into()), ("language", "rust".into())]),
                vec![el("code", vec![text("fn main() {}")])]
            )]
        );
    }

    #[test]
    fn test_comments_and_rules() {
        assert_eq!(
            body("<!-- note -->\n\n***\n\n> quoted"),
            vec![
                MarkupNode::Comment {
                    value: "note".to_string()
                },
                el("hr", vec![]),
                el("blockquote", vec![el("p", vec![text("quoted")])]),
            ]
        );
    }

    #[test]
    fn test_frontmatter_parsed() {
        let (root, data) = parse_markdown("---\ntitle: Hello\ntags: [a, b]\n---\n\nBody\n").unwrap();
        assert_eq!(data.get("title"), Some(&serde_json::json!("Hello")));
        assert_eq!(data.get("tags"), Some(&serde_json::json!(["a", "b"])));
        assert_eq!(root.children(), &[el("p", vec![text("Body")])]);
    }

    #[test]
    fn test_frontmatter_must_be_mapping() {
        let err = parse_markdown("---\n- a\n- b\n---\n\nBody\n").unwrap_err();
        assert!(matches!(err, MarkdownError::FrontmatterNotMapping));
    }

    #[test]
    fn test_invalid_frontmatter_yaml() {
        let err = parse_markdown("---\ntitle: [unclosed\n---\n").unwrap_err();
        assert!(matches!(err, MarkdownError::Frontmatter(_)));
    }
}
