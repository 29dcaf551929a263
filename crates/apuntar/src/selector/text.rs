//! Text selector engine.
//!
//! Body grammar: `/pattern/flags` compiles to a regex, `"literal"` or
//! `'literal'` matches with whitespace-normalized equality, anything else
//! is a lax case-insensitive substring match. The walk classifies every
//! element as `none`, `self` or `self-and-children`; lax walks prune the
//! subtree of a `none` element so spurious deeper matches never surface.

use regex::Regex;

use crate::dom::{Document, NodeId};
use crate::selector::parser::unquote_body;

/// How the body asked to be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TextMatchKind {
    /// Case-insensitive, whitespace-normalized substring
    Lax,
    /// Whitespace-normalized equality
    Strict,
    /// Regular expression over the raw text
    Regex,
}

/// A compiled text matcher.
#[derive(Debug, Clone)]
pub(crate) struct TextMatcher {
    kind: TextMatchKind,
    needle: String,
    regex: Option<Regex>,
}

impl TextMatcher {
    pub(crate) const fn kind(&self) -> TextMatchKind {
        self.kind
    }

    pub(crate) fn matches(&self, text: &str) -> bool {
        match self.kind {
            TextMatchKind::Regex => self
                .regex
                .as_ref()
                .is_some_and(|re| re.is_match(text)),
            TextMatchKind::Strict => normalize_ws(text) == self.needle,
            TextMatchKind::Lax => normalize_ws(text).to_lowercase().contains(&self.needle),
        }
    }
}

/// Collapse whitespace runs to single spaces and trim.
pub(crate) fn normalize_ws(text: &str) -> String {
    let pieces: Vec<&str> = text.split_whitespace().collect();
    pieces.join(" ")
}

/// Parse a text-engine body. The error payload is the offending body.
pub(crate) fn parse_text_body(body: &str) -> Result<TextMatcher, String> {
    let body = body.trim();
    if let Some(stripped) = body.strip_prefix('/') {
        if let Some(slash) = stripped.rfind('/') {
            let source = &stripped[..slash];
            let flags = &stripped[slash + 1..];
            if flags.chars().all(|c| matches!(c, 'i' | 's' | 'm' | 'u' | 'g')) {
                let pattern = regex_with_flags(source, flags);
                let regex = Regex::new(&pattern).map_err(|_| body.to_string())?;
                return Ok(TextMatcher {
                    kind: TextMatchKind::Regex,
                    needle: String::new(),
                    regex: Some(regex),
                });
            }
        }
    }
    if let Some(literal) = unquote_body(body) {
        return Ok(TextMatcher {
            kind: TextMatchKind::Strict,
            needle: normalize_ws(&literal),
            regex: None,
        });
    }
    Ok(TextMatcher {
        kind: TextMatchKind::Lax,
        needle: normalize_ws(body).to_lowercase(),
        regex: None,
    })
}

fn regex_with_flags(source: &str, flags: &str) -> String {
    // `g` and `u` have no inline equivalent and no effect on `is_match`.
    let inline: String = flags.chars().filter(|c| matches!(c, 'i' | 's' | 'm')).collect();
    if inline.is_empty() {
        source.to_string()
    } else {
        format!("(?{inline}){source}")
    }
}

/// Per-element classification of a text match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TextMatch {
    /// Element text does not match
    None,
    /// Element text matches and no child's does
    SelfOnly,
    /// Element text matches but so does a deeper element's
    SelfAndChildren,
}

fn skip_for_text_matching(doc: &Document, el: NodeId) -> bool {
    matches!(doc.tag(el), "script" | "style" | "head" | "noscript")
}

/// Full subtree text of an element, crossing shadow boundaries.
pub(crate) fn element_text(doc: &Document, el: NodeId) -> String {
    let mut out = String::new();
    collect_element_text(doc, el, &mut out);
    out
}

fn collect_element_text(doc: &Document, node: NodeId, out: &mut String) {
    if doc.is_text(node) {
        out.push_str(&doc.text_content(node));
        return;
    }
    if doc.is_element(node) && skip_for_text_matching(doc, node) {
        return;
    }
    if let Some(shadow) = doc.shadow_root(node) {
        for &child in doc.children(shadow) {
            collect_element_text(doc, child, out);
        }
    }
    for &child in doc.children(node) {
        collect_element_text(doc, child, out);
    }
}

/// Classify how `el` relates to the matcher.
pub(crate) fn element_matches_text(doc: &Document, el: NodeId, matcher: &TextMatcher) -> TextMatch {
    if skip_for_text_matching(doc, el) {
        return TextMatch::None;
    }
    if !matcher.matches(&element_text(doc, el)) {
        return TextMatch::None;
    }
    let mut children = doc.child_elements(el);
    if let Some(shadow) = doc.shadow_root(el) {
        children.extend(doc.child_elements(shadow));
    }
    for child in children {
        if matcher.matches(&element_text(doc, child)) {
            return TextMatch::SelfAndChildren;
        }
    }
    TextMatch::SelfOnly
}

/// All descendants of `root` selected by the matcher, in traversal order.
pub(crate) fn query_all(
    doc: &Document,
    root: NodeId,
    matcher: &TextMatcher,
    pierce: bool,
) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut roots = Vec::new();
    if pierce {
        if let Some(shadow) = doc.shadow_root(root) {
            roots.extend(doc.child_elements(shadow));
        }
    }
    roots.extend(doc.child_elements(root));
    for el in roots {
        walk(doc, el, matcher, pierce, &mut out);
    }
    out
}

fn walk(doc: &Document, el: NodeId, matcher: &TextMatcher, pierce: bool, out: &mut Vec<NodeId>) {
    match element_matches_text(doc, el, matcher) {
        TextMatch::None => {
            // A lax matcher that failed here cannot match deeper: the
            // subtree's text is a subset of this element's text.
            if matcher.kind() == TextMatchKind::Lax {
                return;
            }
        }
        TextMatch::SelfOnly => {
            out.push(el);
            return;
        }
        TextMatch::SelfAndChildren => {
            if matcher.kind() == TextMatchKind::Strict {
                out.push(el);
            }
        }
    }
    if pierce {
        if let Some(shadow) = doc.shadow_root(el) {
            for child in doc.child_elements(shadow) {
                walk(doc, child, matcher, pierce, out);
            }
        }
    }
    for child in doc.child_elements(el) {
        walk(doc, child, matcher, pierce, out);
    }
}
