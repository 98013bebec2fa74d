//! Heading identifiers.

use std::collections::HashMap;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Issues unique heading slugs for one document.
///
/// A registry must not outlive the conversion that created it: ids are only
/// unique relative to the headings it has already seen.
#[derive(Debug, Default)]
pub struct Slugger {
    occurrences: HashMap<String, usize>,
}

impl Slugger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slug for `text`, suffixed with `-1`, `-2`, ... when already issued.
    pub fn slug(&mut self, text: &str) -> String {
        let base = slugify(text);
        let mut slug = base.clone();

        if let Some(&count) = self.occurrences.get(&base) {
            let mut n = count;
            loop {
                n += 1;
                slug = format!("{base}-{n}");
                if !self.occurrences.contains_key(&slug) {
                    break;
                }
            }
            self.occurrences.insert(base, n);
        }

        self.occurrences.insert(slug.clone(), 0);
        slug
    }

    pub fn reset(&mut self) {
        self.occurrences.clear();
    }
}

/// Stateless slug: lowercase, no diacritics, alphanumeric runs joined by `-`,
/// and a `_` prefix when the result would start with a digit.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.nfd().filter(|c| !is_combining_mark(*c)) {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        return "heading".to_string();
    }
    if slug.starts_with(|c: char| c.is_ascii_digit()) {
        slug.insert(0, '_');
    }
    slug
}
