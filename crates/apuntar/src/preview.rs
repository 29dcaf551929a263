//! One-line element previews and suggested-selector labels for
//! diagnostics (strict-mode violations, hit-target descriptions).

use crate::dom::{Document, NodeId};

const ATTR_CHAR_LIMIT: usize = 50;
const TEXT_CHAR_LIMIT: usize = 50;

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Produce a one-line HTML-ish preview of a node.
///
/// Attributes are sorted by rendered length (`style` excluded), boolean
/// attributes use shorthand, and both the attribute run and the text are
/// truncated to 50 characters.
#[must_use]
pub fn preview_node(doc: &Document, node: NodeId) -> String {
    if doc.is_text(node) {
        return format!("#text={}", truncate(&one_line(&doc.text_content(node)), TEXT_CHAR_LIMIT));
    }
    if !doc.is_element(node) {
        return "#document".to_string();
    }

    let tag = doc.tag(node).to_string();
    let mut rendered: Vec<String> = doc
        .attributes(node)
        .into_iter()
        .filter(|(name, _)| name != "style")
        .map(|(name, value)| {
            if value.is_empty() {
                name
            } else {
                format!("{name}=\"{value}\"")
            }
        })
        .collect();
    rendered.sort_by_key(String::len);

    let mut attrs = String::new();
    for piece in rendered {
        if attrs.len() + piece.len() > ATTR_CHAR_LIMIT {
            attrs.push_str(" \u{2026}");
            break;
        }
        attrs.push(' ');
        attrs.push_str(&piece);
    }

    if VOID_TAGS.contains(&tag.as_str()) {
        return format!("<{tag}{attrs}/>");
    }

    let text = truncate(&one_line(&doc.text_content(node)), TEXT_CHAR_LIMIT);
    format!("<{tag}{attrs}>{text}</{tag}>")
}

fn one_line(text: &str) -> String {
    let pieces: Vec<&str> = text.split_whitespace().collect();
    pieces.join(" ")
}

fn truncate(text: &str, limit: usize) -> String {
    let mut out = String::new();
    for (count, ch) in text.chars().enumerate() {
        if count >= limit {
            out.push('\u{2026}');
            return out;
        }
        out.push(ch);
    }
    out
}

/// Reverse-engineer a short selector label for an element: id or test-id
/// when present, otherwise a short `tag:nth-child` path.
#[must_use]
pub fn suggested_selector(doc: &Document, el: NodeId) -> String {
    if let Some(id) = doc.attribute(el, "id") {
        if !id.is_empty() {
            return format!("#{id}");
        }
    }
    if let Some(test_id) = doc.attribute(el, "data-testid") {
        return format!("[data-testid=\"{test_id}\"]");
    }

    let mut segments = Vec::new();
    let mut current = Some(el);
    for _ in 0..3 {
        let Some(e) = current else { break };
        if !doc.is_element(e) {
            break;
        }
        if let Some(id) = doc.attribute(e, "id") {
            if !id.is_empty() && e != el {
                segments.push(format!("#{id}"));
                break;
            }
        }
        segments.push(path_segment(doc, e));
        current = doc.parent_element(e);
    }
    segments.reverse();
    segments.join(" > ")
}

fn path_segment(doc: &Document, el: NodeId) -> String {
    let tag = doc.tag(el);
    let Some(parent) = doc.parent(el) else {
        return tag.to_string();
    };
    let siblings = doc.child_elements(parent);
    let same_tag = siblings.iter().filter(|&&s| doc.tag(s) == tag).count();
    if same_tag <= 1 {
        return tag.to_string();
    }
    let position = siblings.iter().position(|&s| s == el).map_or(0, |i| i + 1);
    format!("{tag}:nth-child({position})")
}

/// Render the strict-mode violation diagnostic: up to ten previews, each
/// with a suggested selector label.
#[must_use]
pub fn strict_violation_message(doc: &Document, source: &str, elements: &[NodeId]) -> String {
    let mut message = format!(
        "strict mode violation: \"{source}\" resolved to {} elements:",
        elements.len()
    );
    for (index, &el) in elements.iter().take(10).enumerate() {
        message.push_str(&format!(
            "\n    {}) {} aka {}",
            index + 1,
            preview_node(doc, el),
            suggested_selector(doc, el)
        ));
    }
    if elements.len() > 10 {
        message.push_str("\n    ...");
    }
    message
}
