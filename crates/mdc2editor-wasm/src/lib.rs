use js_sys::{Array, Reflect};
use mdc2editor_core::config::Config;
use mdc2editor_core::{markdown, EditorNode, FrontmatterData, MarkupNode};
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// Markup tree (+ frontmatter object) to an editor document.
#[wasm_bindgen(js_name = toEditorModel)]
pub fn to_editor_model(markup: JsValue, data: JsValue, options: JsValue) -> Result<JsValue, JsError> {
    let config = parse_options(&options);
    let markup: MarkupNode = serde_wasm_bindgen::from_value(markup)?;
    let data: FrontmatterData = if data.is_undefined() || data.is_null() {
        FrontmatterData::new()
    } else {
        serde_wasm_bindgen::from_value(data)?
    };
    to_js(&mdc2editor_core::to_editor_model(&markup, &data, &config))
}

/// Editor document to `{ body, data }`.
#[wasm_bindgen(js_name = toMarkup)]
pub fn to_markup(doc: JsValue, options: JsValue) -> Result<JsValue, JsError> {
    let config = parse_options(&options);
    let doc: EditorNode = serde_wasm_bindgen::from_value(doc)?;
    to_js(&mdc2editor_core::to_markup(&doc, &config))
}

/// Markdown source to `{ body, data }`, ready for `toEditorModel`.
#[wasm_bindgen(js_name = markdownToMarkup)]
pub fn markdown_to_markup(source: &str) -> Result<JsValue, JsError> {
    let (body, data) = markdown::parse_markdown(source).map_err(|e| JsError::new(&e.to_string()))?;
    to_js(&mdc2editor_core::MarkupDocument { body, data })
}

/// Plain objects rather than `Map`s so the result is JSON-compatible.
fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsError> {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    Ok(value.serialize(&serializer)?)
}

/// Read the JS options object into a `Config`. Unset fields keep their defaults.
///
/// ```js
/// { highlight: false | { theme: { default, dark, light } },
///   links: { target, rel }, imageComponents: ["prose-img"] }
/// ```
fn parse_options(options: &JsValue) -> Config {
    let mut config = Config::default();
    if options.is_undefined() || options.is_null() {
        return config;
    }

    if let Some(enabled) = get_bool(options, "highlight") {
        config.highlight.enabled = enabled;
    }
    if let Some(highlight) = get_object(options, "highlight") {
        if let Some(enabled) = get_bool(&highlight, "enabled") {
            config.highlight.enabled = enabled;
        }
        if let Some(theme) = get_object(&highlight, "theme") {
            if let Some(name) = get_string(&theme, "default") {
                config.highlight.theme.default = name;
            }
            if let Some(name) = get_string(&theme, "dark") {
                config.highlight.theme.dark = Some(name);
            }
            if let Some(name) = get_string(&theme, "light") {
                config.highlight.theme.light = Some(name);
            }
        }
    }

    if let Some(links) = get_object(options, "links") {
        if let Some(target) = get_string(&links, "target") {
            config.links.target = target;
        }
        if let Some(rel) = get_string(&links, "rel") {
            config.links.rel = rel;
        }
    }

    if let Some(tags) = get_object(options, "imageComponents") {
        if Array::is_array(&tags) {
            config.components.image = Array::from(&tags)
                .iter()
                .filter_map(|v| v.as_string())
                .collect();
        }
    }

    config
}

fn get_object(obj: &JsValue, key: &str) -> Option<JsValue> {
    Reflect::get(obj, &JsValue::from_str(key))
        .ok()
        .filter(|v| v.is_object())
}

fn get_string(obj: &JsValue, key: &str) -> Option<String> {
    Reflect::get(obj, &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_string())
}

fn get_bool(obj: &JsValue, key: &str) -> Option<bool> {
    Reflect::get(obj, &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_bool())
}
