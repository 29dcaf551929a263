//! Inline-style parsing and the visibility predicate.
//!
//! The model resolves computed style from the `style` attribute alone:
//! `display` cuts the subtree when any ancestor sets `none`, `visibility`
//! takes the nearest declared value.

use super::{Document, NodeId};

/// Parsed inline declarations of a single `style` attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineStyle {
    decls: Vec<(String, String)>,
}

impl InlineStyle {
    /// Value of a declared property, last declaration wins.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.decls
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse a `style` attribute into property/value declarations.
#[must_use]
pub fn parse_inline_style(style_attr: &str) -> InlineStyle {
    let mut decls: Vec<(String, String)> = Vec::new();
    let bytes = style_attr.as_bytes();
    let mut start = 0usize;
    let mut i = 0usize;
    let mut paren_depth = 0isize;
    let mut quote: Option<u8> = None;

    while i < bytes.len() {
        let ch = bytes[i];
        match (quote, ch) {
            (Some(_), b'\\') => {
                i = (i + 2).min(bytes.len());
                continue;
            }
            (Some(q), _) if ch == q => quote = None,
            (Some(_), _) => {}
            (None, b'\'' | b'"') => quote = Some(ch),
            (None, b'(') => paren_depth += 1,
            (None, b')') => paren_depth = paren_depth.saturating_sub(1),
            (None, b';') if paren_depth == 0 => {
                push_declaration(&style_attr[start..i], &mut decls);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    push_declaration(&style_attr[start..], &mut decls);

    InlineStyle { decls }
}

fn push_declaration(raw: &str, out: &mut Vec<(String, String)>) {
    let decl = raw.trim();
    let Some((name, value)) = decl.split_once(':') else {
        return;
    };
    let name = name.trim().to_ascii_lowercase();
    let value = value.trim().to_string();
    if name.is_empty() || value.is_empty() {
        return;
    }
    if let Some(pos) = out.iter().position(|(existing, _)| existing == &name) {
        out[pos].1 = value;
    } else {
        out.push((name, value));
    }
}

fn inline_style(doc: &Document, node: NodeId) -> InlineStyle {
    doc.attribute(node, "style")
        .map(parse_inline_style)
        .unwrap_or_default()
}

/// Whether `node` or any ancestor element declares `display: none`.
#[must_use]
pub fn display_none(doc: &Document, node: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(el) = current {
        if inline_style(doc, el).get("display") == Some("none") {
            return true;
        }
        current = doc.parent_element_or_shadow_host(el);
    }
    false
}

/// Effective `visibility`: nearest declared value wins, default `visible`.
#[must_use]
pub fn effective_visibility(doc: &Document, node: NodeId) -> String {
    let mut current = Some(node);
    while let Some(el) = current {
        if let Some(value) = inline_style(doc, el).get("visibility") {
            return value.to_string();
        }
        current = doc.parent_element_or_shadow_host(el);
    }
    "visible".to_string()
}

/// The visibility predicate: connected, non-empty border box, no
/// `display: none` in the ancestor chain, effective visibility `visible`.
#[must_use]
pub fn is_visible(doc: &Document, node: NodeId) -> bool {
    if !doc.is_element(node) || !doc.is_connected(node) {
        return false;
    }
    if doc.rect(node).is_empty() {
        return false;
    }
    if display_none(doc, node) {
        return false;
    }
    effective_visibility(doc, node) == "visible"
}
