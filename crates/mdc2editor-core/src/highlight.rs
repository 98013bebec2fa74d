//! Syntax highlighting for code blocks in a markup tree.
//!
//! Uses syntect with its bundled Sublime Text syntaxes and themes. Code is
//! tokenized once; each configured theme contributes a color for every token,
//! the default theme as `color` and the dark/light themes as CSS custom
//! properties so a stylesheet can switch palettes without re-highlighting.

use std::sync::OnceLock;

use syntect::highlighting::{Color, Highlighter as ThemeHighlighter, Theme, ThemeSet};
use syntect::parsing::{ParseState, ScopeStack, SyntaxSet};
use syntect::util::LinesWithEndings;
use thiserror::Error;

use crate::ast::{MarkupNode, PropValue, Props};
use crate::config::ThemeConfig;

#[derive(Debug, Error, PartialEq)]
pub enum HighlightError {
    #[error("no syntax definition for language `{0}`")]
    UnknownLanguage(String),
    #[error("unknown highlight theme `{0}`")]
    UnknownTheme(String),
    #[error("failed to tokenize code: {0}")]
    Parse(String),
}

/// Turns source code into highlighted markup.
///
/// The returned nodes replace the text content of a code block's inner `code`
/// element. Implementations may be swapped for tests or other engines.
pub trait Highlighter {
    fn highlight(
        &self,
        code: &str,
        language: Option<&str>,
        theme: &ThemeConfig,
    ) -> Result<Vec<MarkupNode>, HighlightError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SyntectHighlighter;

impl Highlighter for SyntectHighlighter {
    fn highlight(
        &self,
        code: &str,
        language: Option<&str>,
        theme: &ThemeConfig,
    ) -> Result<Vec<MarkupNode>, HighlightError> {
        let syntax_set = syntax_set();
        let language = language.unwrap_or("txt");
        let syntax = syntax_set
            .find_syntax_by_token(language)
            .or_else(|| syntax_set.find_syntax_by_name(language))
            .ok_or_else(|| HighlightError::UnknownLanguage(language.to_string()))?;

        let palette = Palette::new(theme)?;
        let mut parse_state = ParseState::new(syntax);
        let mut stack = ScopeStack::new();
        let mut out = Vec::new();

        for (i, line) in LinesWithEndings::from(code).enumerate() {
            if i > 0 {
                out.push(MarkupNode::text("\n"));
            }
            let ops = parse_state
                .parse_line(line, syntax_set)
                .map_err(|e| HighlightError::Parse(e.to_string()))?;

            let content_len = line.trim_end_matches(['\n', '\r']).len();
            let mut tokens: Vec<(String, String)> = Vec::new();
            let mut pos = 0;

            for (offset, op) in ops {
                let end = offset.min(content_len);
                if end > pos {
                    push_token(&mut tokens, palette.style(&stack), &line[pos..end]);
                    pos = end;
                }
                stack
                    .apply(&op)
                    .map_err(|e| HighlightError::Parse(format!("{e:?}")))?;
            }
            if content_len > pos {
                push_token(&mut tokens, palette.style(&stack), &line[pos..content_len]);
            }

            let children = tokens
                .into_iter()
                .map(|(style, text)| {
                    MarkupNode::element(
                        "span",
                        Props::from([("style".to_string(), style.into())]),
                        vec![MarkupNode::text(text)],
                    )
                })
                .collect();
            out.push(MarkupNode::element(
                "span",
                Props::from([("class".to_string(), "line".into())]),
                children,
            ));
        }

        Ok(out)
    }
}

/// Adjacent tokens with the same style share one span.
fn push_token(tokens: &mut Vec<(String, String)>, style: String, text: &str) {
    match tokens.last_mut() {
        Some((last_style, last_text)) if *last_style == style => last_text.push_str(text),
        _ => tokens.push((style, text.to_string())),
    }
}

struct Palette {
    default: ThemeHighlighter<'static>,
    dark: Option<ThemeHighlighter<'static>>,
    light: Option<ThemeHighlighter<'static>>,
}

impl Palette {
    fn new(config: &ThemeConfig) -> Result<Self, HighlightError> {
        let optional = |name: &Option<String>| {
            name.as_deref()
                .map(|n| theme(n).map(ThemeHighlighter::new))
                .transpose()
        };
        Ok(Palette {
            default: ThemeHighlighter::new(theme(&config.default)?),
            dark: optional(&config.dark)?,
            light: optional(&config.light)?,
        })
    }

    fn style(&self, stack: &ScopeStack) -> String {
        let scopes = stack.as_slice();
        let mut style = format!("color:{}", hex(self.default.style_for_stack(scopes).foreground));
        if let Some(dark) = &self.dark {
            style.push_str(&format!(";--hl-dark:{}", hex(dark.style_for_stack(scopes).foreground)));
        }
        if let Some(light) = &self.light {
            style.push_str(&format!(";--hl-light:{}", hex(light.style_for_stack(scopes).foreground)));
        }
        style
    }
}

fn hex(color: Color) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r, color.g, color.b)
}

fn syntax_set() -> &'static SyntaxSet {
    static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn theme(name: &str) -> Result<&'static Theme, HighlightError> {
    static THEME_SET: OnceLock<ThemeSet> = OnceLock::new();
    THEME_SET
        .get_or_init(ThemeSet::load_defaults)
        .themes
        .get(name)
        .ok_or_else(|| HighlightError::UnknownTheme(name.to_string()))
}

/// Highlight every `pre` block with a `language` in the tree.
///
/// A block that fails to highlight keeps its plain text; the failure is
/// logged and does not affect the other blocks.
pub fn highlight_body(node: &mut MarkupNode, highlighter: &dyn Highlighter, theme: &ThemeConfig) {
    match node {
        MarkupNode::Element {
            tag,
            props,
            children,
        } if tag == "pre" => highlight_block(props, children, highlighter, theme),
        MarkupNode::Root { children } | MarkupNode::Element { children, .. } => {
            for child in children {
                highlight_body(child, highlighter, theme);
            }
        }
        MarkupNode::Text { .. } | MarkupNode::Comment { .. } => {}
    }
}

fn highlight_block(
    props: &mut Props,
    children: &mut Vec<MarkupNode>,
    highlighter: &dyn Highlighter,
    theme: &ThemeConfig,
) {
    let Some(language) = props.get("language").and_then(PropValue::as_str).map(str::to_string) else {
        return;
    };
    let code = match props.get("code").and_then(PropValue::as_str) {
        Some(code) => code.to_string(),
        None => children.iter().map(MarkupNode::text_content).collect(),
    };

    let lines = match highlighter.highlight(&code, Some(&language), theme) {
        Ok(lines) => lines,
        Err(e) => {
            tracing::warn!(language = %language, error = %e, "code block left unhighlighted");
            return;
        }
    };

    *children = vec![MarkupNode::element("code", Props::new(), lines)];

    let mut classes: Vec<String> = props
        .get("class")
        .and_then(PropValue::as_str)
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if !classes.iter().any(|c| c == "highlight") {
        classes.push("highlight".to_string());
    }
    props.insert("class".to_string(), classes.join(" ").into());
    props.insert("code".to_string(), code.into());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::props;

    struct Failing;

    impl Highlighter for Failing {
        fn highlight(
            &self,
            _code: &str,
            language: Option<&str>,
            _theme: &ThemeConfig,
        ) -> Result<Vec<MarkupNode>, HighlightError> {
            Err(HighlightError::UnknownLanguage(language.unwrap_or_default().to_string()))
        }
    }

    /// Wraps the code in a single marker span, failing for `fail`.
    struct Marker;

    impl Highlighter for Marker {
        fn highlight(
            &self,
            code: &str,
            language: Option<&str>,
            _theme: &ThemeConfig,
        ) -> Result<Vec<MarkupNode>, HighlightError> {
            if language == Some("fail") {
                return Err(HighlightError::Parse("boom".to_string()));
            }
            Ok(vec![MarkupNode::element(
                "span",
                props([("class", "marker".into())]),
                vec![MarkupNode::text(code)],
            )])
        }
    }

    fn code_block(language: Option<&str>, code: &str) -> MarkupNode {
        let mut p = Props::new();
        if let Some(language) = language {
            p.insert("language".to_string(), language.into());
        }
        p.insert("code".to_string(), code.into());
        MarkupNode::element(
            "pre",
            p,
            vec![MarkupNode::element("code", Props::new(), vec![MarkupNode::text(code)])],
        )
    }

    fn line_spans(nodes: &[MarkupNode]) -> Vec<&MarkupNode> {
        nodes.iter().filter(|n| n.tag() == Some("span")).collect()
    }

    #[test]
    fn test_rust_code_produces_colored_lines() {
        let code = "fn main() {\n    let x = 1;\n}\n";
        let nodes = SyntectHighlighter
            .highlight(code, Some("rust"), &ThemeConfig::default())
            .unwrap();

        let lines = line_spans(&nodes);
        assert_eq!(lines.len(), 3);
        let text: String = nodes.iter().map(MarkupNode::text_content).collect();
        assert_eq!(text, "fn main() {\n    let x = 1;\n}");

        let MarkupNode::Element { children, .. } = lines[0] else {
            panic!("Expected line span");
        };
        let styles: Vec<&str> = children
            .iter()
            .filter_map(|c| match c {
                MarkupNode::Element { props, .. } => props.get("style").and_then(PropValue::as_str),
                _ => None,
            })
            .collect();
        assert!(styles.len() > 1, "Expected several tokens for `fn main() {{`");
        assert!(styles.iter().all(|s| s.starts_with("color:#") && s.contains(";--hl-dark:#")));
    }

    #[test]
    fn test_light_theme_adds_property() {
        let theme = ThemeConfig {
            light: Some("base16-ocean.light".to_string()),
            ..ThemeConfig::default()
        };
        let nodes = SyntectHighlighter.highlight("let x = 1;", Some("rs"), &theme).unwrap();
        let MarkupNode::Element { children, .. } = &nodes[0] else {
            panic!("Expected line span");
        };
        let MarkupNode::Element { props, .. } = &children[0] else {
            panic!("Expected token span");
        };
        assert!(props.get("style").and_then(PropValue::as_str).unwrap().contains("--hl-light:#"));
    }

    #[test]
    fn test_unknown_language_is_an_error() {
        let err = SyntectHighlighter
            .highlight("x", Some("definitely-not-a-language"), &ThemeConfig::default())
            .unwrap_err();
        assert_eq!(err, HighlightError::UnknownLanguage("definitely-not-a-language".to_string()));
    }

    #[test]
    fn test_unknown_theme_is_an_error() {
        let theme = ThemeConfig {
            default: "Nope".to_string(),
            ..ThemeConfig::default()
        };
        let err = SyntectHighlighter.highlight("x", Some("rust"), &theme).unwrap_err();
        assert_eq!(err, HighlightError::UnknownTheme("Nope".to_string()));
    }

    #[test]
    fn test_body_blocks_get_highlight_class() {
        let mut root = MarkupNode::root(vec![code_block(Some("js"), "let a")]);
        highlight_body(&mut root, &Marker, &ThemeConfig::default());

        let pre = &root.children()[0];
        let MarkupNode::Element { props, children, .. } = pre else {
            panic!("Expected pre");
        };
        assert_eq!(props.get("class"), Some(&"highlight".into()));
        assert_eq!(props.get("code"), Some(&"let a".into()));
        assert_eq!(children[0].tag(), Some("code"));
        assert_eq!(children[0].children()[0].tag(), Some("span"));
    }

    #[test]
    fn test_highlight_class_not_duplicated() {
        let mut block = code_block(Some("js"), "let a");
        if let MarkupNode::Element { props, .. } = &mut block {
            props.insert("class".to_string(), "highlight wide".into());
        }
        let mut root = MarkupNode::root(vec![block]);
        highlight_body(&mut root, &Marker, &ThemeConfig::default());
        let MarkupNode::Element { props, .. } = &root.children()[0] else {
            panic!("Expected pre");
        };
        assert_eq!(props.get("class"), Some(&"highlight wide".into()));
    }

    #[test]
    fn test_failure_keeps_plain_text_and_other_blocks() {
        let mut root = MarkupNode::root(vec![
            code_block(Some("fail"), "broken"),
            code_block(Some("js"), "fine"),
        ]);
        highlight_body(&mut root, &Marker, &ThemeConfig::default());

        assert_eq!(root.children()[0], code_block(Some("fail"), "broken"));
        let MarkupNode::Element { props, .. } = &root.children()[1] else {
            panic!("Expected pre");
        };
        assert!(props.contains_key("class"));
    }

    #[test]
    fn test_blocks_without_language_are_skipped() {
        let mut root = MarkupNode::root(vec![code_block(None, "plain")]);
        highlight_body(&mut root, &Failing, &ThemeConfig::default());
        assert_eq!(root.children()[0], code_block(None, "plain"));
    }
}
