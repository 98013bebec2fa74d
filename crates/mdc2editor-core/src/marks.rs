//! Mark reconciliation between nested inline markup and flat marked leaves.
//!
//! Forward, a chain of mark elements (`strong > em > text`) becomes one leaf
//! carrying `[italic, bold]`: innermost first, so reversing the list gives the
//! order the wrappers were applied in. Backward, a sequence of marked leaves is
//! regrouped into the fewest wrapper elements that reproduce the same marks.

use crate::ast::{MarkupNode, PropValue, Props};
use crate::config::LinkOptions;
use crate::editor::{Mark, MarkKind};

/// Build the mark contributed by a mark element with the given (normalized) props.
pub fn mark_for_element(kind: MarkKind, props: &Props, links: &LinkOptions) -> Mark {
    let mut attrs = props.clone();
    if kind == MarkKind::Link {
        let absolute = attrs
            .get("href")
            .and_then(PropValue::as_str)
            .is_some_and(is_absolute_url);
        if absolute {
            attrs
                .entry("target".to_string())
                .or_insert_with(|| links.target.as_str().into());
            attrs
                .entry("rel".to_string())
                .or_insert_with(|| links.rel.as_str().into());
        }
    }
    Mark { kind, attrs }
}

/// Leaf marks for an accumulated chain (outermost first).
pub fn flatten(chain: &[Mark]) -> Vec<Mark> {
    chain.iter().rev().cloned().collect()
}

pub fn is_absolute_url(href: &str) -> bool {
    let Some((scheme, _)) = href.split_once("://") else {
        return false;
    };
    scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// One inline leaf lowered to markup, with the marks it still needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub node: MarkupNode,
    /// Innermost first.
    pub marks: Vec<Mark>,
}

impl Leaf {
    pub fn new(node: MarkupNode, marks: Vec<Mark>) -> Self {
        Self { node, marks }
    }

    fn without(&self, mark: &Mark) -> Leaf {
        let mut marks = self.marks.clone();
        if let Some(pos) = marks.iter().position(|m| same_run(m, mark)) {
            marks.remove(pos);
        }
        Leaf {
            node: self.node.clone(),
            marks,
        }
    }
}

/// Two marks continue the same run when they have the same type. Links also
/// need identical attributes, otherwise two adjacent links would fuse.
fn same_run(a: &Mark, b: &Mark) -> bool {
    a.kind == b.kind && (a.kind != MarkKind::Link || a.attrs == b.attrs)
}

/// Rebuild nested mark elements from a flat leaf sequence.
pub fn regroup(leaves: Vec<Leaf>) -> Vec<MarkupNode> {
    let leaves = coalesce(leaves);
    let mut out = Vec::with_capacity(leaves.len());
    let mut i = 0;

    while i < leaves.len() {
        let leaf = &leaves[i];
        // Widest run wins; `max_by_key` keeps the last maximum, which is the
        // outermost mark because leaf marks are stored innermost first.
        let widest = leaf
            .marks
            .iter()
            .map(|m| (m, run_length(&leaves[i..], m)))
            .max_by_key(|&(_, len)| len);

        match widest {
            None => {
                out.push(leaf.node.clone());
                i += 1;
            }
            Some((mark, len)) => {
                let inner: Vec<Leaf> = leaves[i..i + len].iter().map(|l| l.without(mark)).collect();
                out.push(MarkupNode::Element {
                    tag: mark.kind.tag().to_string(),
                    props: mark.attrs.clone(),
                    children: regroup(inner),
                });
                i += len;
            }
        }
    }

    sibling_merge(out)
}

fn run_length(leaves: &[Leaf], mark: &Mark) -> usize {
    leaves
        .iter()
        .take_while(|l| l.marks.iter().any(|m| same_run(m, mark)))
        .count()
}

/// Concatenate adjacent text leaves that carry identical marks.
fn coalesce(leaves: Vec<Leaf>) -> Vec<Leaf> {
    let mut out: Vec<Leaf> = Vec::with_capacity(leaves.len());
    for leaf in leaves {
        if let Some(prev) = out.last_mut() {
            if let (MarkupNode::Text { value: prev_value }, MarkupNode::Text { value }) =
                (&mut prev.node, &leaf.node)
            {
                if prev.marks == leaf.marks {
                    prev_value.push_str(value);
                    continue;
                }
            }
        }
        out.push(leaf);
    }
    out
}

/// Merge `<t>a</t>" "<t>b</t>` into `<t>a b</t>` for mark tags with equal props.
///
/// Markdown tokenizes `**a** **b**` into two adjacent strong elements; without
/// this the editor round trip would keep them apart.
pub fn sibling_merge(nodes: Vec<MarkupNode>) -> Vec<MarkupNode> {
    let mut out: Vec<MarkupNode> = Vec::with_capacity(nodes.len());

    for node in nodes {
        out.push(node);
        let n = out.len();
        if n < 3 {
            continue;
        }
        let mergeable = match (&out[n - 3], &out[n - 2], &out[n - 1]) {
            (
                MarkupNode::Element {
                    tag: left_tag,
                    props: left_props,
                    ..
                },
                MarkupNode::Text { value },
                MarkupNode::Element {
                    tag: right_tag,
                    props: right_props,
                    ..
                },
            ) => {
                value == " "
                    && left_tag == right_tag
                    && left_props == right_props
                    && MarkKind::from_tag(left_tag).is_some()
            }
            _ => false,
        };
        if !mergeable {
            continue;
        }

        let right = out.pop();
        out.pop();
        if let (Some(MarkupNode::Element { children: right_children, .. }), Some(MarkupNode::Element { children, .. })) =
            (right, out.last_mut())
        {
            let mut merged = std::mem::take(children);
            merged.push(MarkupNode::text(" "));
            merged.extend(right_children);
            *children = sibling_merge(merged);
        }
    }

    out
}
