pub mod ast;
pub mod config;
pub mod editor;
pub mod highlight;
pub mod markdown;
pub mod marks;
pub mod slug;
pub mod tokenizer;
mod to_editor;
mod to_markup;

pub use ast::{MarkupNode, PropValue, Props};
pub use editor::{EditorNode, FrontmatterData, Mark, MarkKind};
pub use to_editor::to_editor_model;
pub use to_markup::{to_markup, to_markup_with_highlighter, MarkupDocument};

use config::Config;
use markdown::MarkdownError;

/// Markdown source straight to an editor document (front door + forward converter).
pub fn markdown_to_editor(src: &str, config: &Config) -> Result<EditorNode, MarkdownError> {
    let (body, data) = markdown::parse_markdown(src)?;
    Ok(to_editor_model(&body, &data, config))
}
