//! CSS selector engine: parser, matcher and piercing query.
//!
//! Supports the grammar the locator engine needs: type/universal/id/class
//! simple selectors, attribute conditions, a pragmatic pseudo-class set,
//! the four combinators and comma groups. Combinator matching never
//! crosses a shadow boundary; piercing happens only in the traversal that
//! feeds candidates.

use crate::dom::{Document, NodeId};

/// A parsed CSS selector list (comma groups).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CssSelectorList {
    groups: Vec<ComplexSelector>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ComplexSelector {
    /// Compounds left to right; each carries the combinator linking it to
    /// the compound on its left (`None` for the first).
    compounds: Vec<(Option<Combinator>, Compound)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    NextSibling,
    SubsequentSibling,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    universal: bool,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrCondition>,
    pseudos: Vec<Pseudo>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && !self.universal
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && self.pseudos.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Eq,
    Prefix,
    Suffix,
    Substring,
    Includes,
    Dash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrCondition {
    name: String,
    op: AttrOp,
    value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pseudo {
    FirstChild,
    LastChild,
    NthChild(usize),
    Checked,
    Disabled,
    Enabled,
    Empty,
    Focus,
    Not(CssSelectorList),
    Has(CssSelectorList),
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse a CSS selector list. The error payload is the offending input.
pub(crate) fn parse_css(input: &str) -> Result<CssSelectorList, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(input.to_string());
    }
    let mut groups = Vec::new();
    for group in split_top_level(input, ',')? {
        groups.push(parse_complex(group.trim())?);
    }
    Ok(CssSelectorList { groups })
}

/// Split on a separator at bracket/paren/quote depth zero.
fn split_top_level(input: &str, sep: char) -> Result<Vec<&str>, String> {
    let mut out = Vec::new();
    let mut depth_bracket = 0usize;
    let mut depth_paren = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0usize;

    for (idx, ch) in input.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            '[' => depth_bracket += 1,
            ']' => depth_bracket = depth_bracket.checked_sub(1).ok_or_else(|| input.to_string())?,
            '(' => depth_paren += 1,
            ')' => depth_paren = depth_paren.checked_sub(1).ok_or_else(|| input.to_string())?,
            c if c == sep && depth_bracket == 0 && depth_paren == 0 => {
                let piece = &input[start..idx];
                if piece.trim().is_empty() {
                    return Err(input.to_string());
                }
                out.push(piece);
                start = idx + ch.len_utf8();
            }
            _ => {}
        }
    }
    if depth_bracket != 0 || depth_paren != 0 || quote.is_some() {
        return Err(input.to_string());
    }
    let tail = &input[start..];
    if tail.trim().is_empty() {
        return Err(input.to_string());
    }
    out.push(tail);
    Ok(out)
}

fn parse_complex(input: &str) -> Result<ComplexSelector, String> {
    let mut compounds = Vec::new();
    let mut pending: Option<Combinator> = None;
    for token in tokenize_complex(input)? {
        match token {
            ComplexToken::Combinator(c) => {
                if pending.is_some() || compounds.is_empty() {
                    return Err(input.to_string());
                }
                pending = Some(c);
            }
            ComplexToken::Compound(text) => {
                let compound = parse_compound(text)?;
                let combinator = if compounds.is_empty() {
                    None
                } else {
                    Some(pending.take().unwrap_or(Combinator::Descendant))
                };
                compounds.push((combinator, compound));
            }
        }
    }
    if compounds.is_empty() || pending.is_some() {
        return Err(input.to_string());
    }
    Ok(ComplexSelector { compounds })
}

enum ComplexToken<'a> {
    Combinator(Combinator),
    Compound(&'a str),
}

fn flush_compound<'a>(
    input: &'a str,
    tokens: &mut Vec<ComplexToken<'a>>,
    start: &mut Option<usize>,
    end: usize,
) {
    if let Some(s) = start.take() {
        tokens.push(ComplexToken::Compound(&input[s..end]));
    }
}

fn tokenize_complex(input: &str) -> Result<Vec<ComplexToken<'_>>, String> {
    let mut tokens = Vec::new();
    let mut depth_bracket = 0usize;
    let mut depth_paren = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start: Option<usize> = None;

    for (idx, ch) in input.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            '[' => depth_bracket += 1,
            ']' => depth_bracket = depth_bracket.checked_sub(1).ok_or_else(|| input.to_string())?,
            '(' => depth_paren += 1,
            ')' => depth_paren = depth_paren.checked_sub(1).ok_or_else(|| input.to_string())?,
            '>' | '+' | '~' if depth_bracket == 0 && depth_paren == 0 => {
                flush_compound(input, &mut tokens, &mut start, idx);
                // An explicit combinator overrides the descendant combinator
                // implied by surrounding whitespace.
                if matches!(
                    tokens.last(),
                    Some(ComplexToken::Combinator(Combinator::Descendant))
                ) {
                    tokens.pop();
                }
                tokens.push(ComplexToken::Combinator(match ch {
                    '>' => Combinator::Child,
                    '+' => Combinator::NextSibling,
                    _ => Combinator::SubsequentSibling,
                }));
                continue;
            }
            c if c.is_ascii_whitespace() && depth_bracket == 0 && depth_paren == 0 => {
                flush_compound(input, &mut tokens, &mut start, idx);
                if matches!(tokens.last(), Some(ComplexToken::Compound(_))) {
                    tokens.push(ComplexToken::Combinator(Combinator::Descendant));
                }
                continue;
            }
            _ => {}
        }
        if start.is_none() {
            start = Some(idx);
        }
    }
    flush_compound(input, &mut tokens, &mut start, input.len());

    // Drop a trailing descendant combinator left by trailing whitespace.
    if matches!(
        tokens.last(),
        Some(ComplexToken::Combinator(Combinator::Descendant))
    ) {
        tokens.pop();
    }
    Ok(tokens)
}

fn parse_compound(input: &str) -> Result<Compound, String> {
    let bytes = input.as_bytes();
    let mut compound = Compound::default();
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'*' => {
                if compound.universal || compound.tag.is_some() {
                    return Err(input.to_string());
                }
                compound.universal = true;
                i += 1;
            }
            b'#' => {
                let (ident, next) = parse_ident(input, i + 1).ok_or_else(|| input.to_string())?;
                if compound.id.replace(ident).is_some() {
                    return Err(input.to_string());
                }
                i = next;
            }
            b'.' => {
                let (ident, next) = parse_ident(input, i + 1).ok_or_else(|| input.to_string())?;
                compound.classes.push(ident);
                i = next;
            }
            b'[' => {
                let (cond, next) = parse_attr_condition(input, i)?;
                compound.attrs.push(cond);
                i = next;
            }
            b':' => {
                let (pseudo, next) = parse_pseudo(input, i + 1)?;
                compound.pseudos.push(pseudo);
                i = next;
            }
            _ => {
                if compound.tag.is_some()
                    || compound.universal
                    || compound.id.is_some()
                    || !compound.classes.is_empty()
                {
                    return Err(input.to_string());
                }
                let (ident, next) = parse_ident(input, i).ok_or_else(|| input.to_string())?;
                compound.tag = Some(ident.to_ascii_lowercase());
                i = next;
            }
        }
    }

    if compound.is_empty() {
        return Err(input.to_string());
    }
    Ok(compound)
}

fn parse_ident(input: &str, start: usize) -> Option<(String, usize)> {
    let bytes = input.as_bytes();
    let mut end = start;
    while end < bytes.len() && is_ident_byte(bytes[end]) {
        end += 1;
    }
    (end > start).then(|| (input[start..end].to_string(), end))
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn parse_attr_condition(input: &str, open: usize) -> Result<(AttrCondition, usize), String> {
    let bytes = input.as_bytes();
    let mut i = open + 1;
    skip_ws(bytes, &mut i);

    let name_start = i;
    while i < bytes.len() && (is_ident_byte(bytes[i]) || bytes[i] == b':') {
        i += 1;
    }
    if i == name_start {
        return Err(input.to_string());
    }
    let name = input[name_start..i].to_ascii_lowercase();
    skip_ws(bytes, &mut i);

    if bytes.get(i) == Some(&b']') {
        return Ok((
            AttrCondition {
                name,
                op: AttrOp::Exists,
                value: String::new(),
            },
            i + 1,
        ));
    }

    let op = match (bytes.get(i), bytes.get(i + 1)) {
        (Some(b'='), _) => {
            i += 1;
            AttrOp::Eq
        }
        (Some(b'^'), Some(b'=')) => {
            i += 2;
            AttrOp::Prefix
        }
        (Some(b'$'), Some(b'=')) => {
            i += 2;
            AttrOp::Suffix
        }
        (Some(b'*'), Some(b'=')) => {
            i += 2;
            AttrOp::Substring
        }
        (Some(b'~'), Some(b'=')) => {
            i += 2;
            AttrOp::Includes
        }
        (Some(b'|'), Some(b'=')) => {
            i += 2;
            AttrOp::Dash
        }
        _ => return Err(input.to_string()),
    };
    skip_ws(bytes, &mut i);

    let (value, mut next) = parse_attr_value(input, i)?;
    skip_ws(bytes, &mut next);
    if bytes.get(next) != Some(&b']') {
        return Err(input.to_string());
    }
    Ok((AttrCondition { name, op, value }, next + 1))
}

fn parse_attr_value(input: &str, start: usize) -> Result<(String, usize), String> {
    let bytes = input.as_bytes();
    match bytes.get(start) {
        Some(&q @ (b'\'' | b'"')) => {
            let mut out = String::new();
            let mut i = start + 1;
            while i < bytes.len() {
                match bytes[i] {
                    b'\\' if i + 1 < bytes.len() => {
                        out.push(bytes[i + 1] as char);
                        i += 2;
                    }
                    b if b == q => return Ok((out, i + 1)),
                    b => {
                        out.push(b as char);
                        i += 1;
                    }
                }
            }
            Err(input.to_string())
        }
        Some(_) => {
            let mut i = start;
            while i < bytes.len() && bytes[i] != b']' && !bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            Ok((input[start..i].to_string(), i))
        }
        None => Err(input.to_string()),
    }
}

fn skip_ws(bytes: &[u8], i: &mut usize) {
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
}

fn parse_pseudo(input: &str, start: usize) -> Result<(Pseudo, usize), String> {
    let tail = &input[start..];
    for (name, pseudo) in [
        ("first-child", Pseudo::FirstChild),
        ("last-child", Pseudo::LastChild),
        ("checked", Pseudo::Checked),
        ("disabled", Pseudo::Disabled),
        ("enabled", Pseudo::Enabled),
        ("empty", Pseudo::Empty),
        ("focus", Pseudo::Focus),
    ] {
        if let Some(rest) = tail.strip_prefix(name) {
            if rest.is_empty() || is_simple_boundary(rest.as_bytes()[0]) {
                return Ok((pseudo, start + name.len()));
            }
        }
    }

    if let Some(rest) = tail.strip_prefix("nth-child(") {
        let close = find_close_paren(rest).ok_or_else(|| input.to_string())?;
        let k: usize = rest[..close]
            .trim()
            .parse()
            .map_err(|_| input.to_string())?;
        if k == 0 {
            return Err(input.to_string());
        }
        return Ok((Pseudo::NthChild(k), start + "nth-child(".len() + close + 1));
    }
    for (prefix, wrap) in [
        ("not(", Pseudo::Not as fn(CssSelectorList) -> Pseudo),
        ("has(", Pseudo::Has as fn(CssSelectorList) -> Pseudo),
    ] {
        if let Some(rest) = tail.strip_prefix(prefix) {
            let close = find_close_paren(rest).ok_or_else(|| input.to_string())?;
            let inner = parse_css(&rest[..close])?;
            return Ok((wrap(inner), start + prefix.len() + close + 1));
        }
    }
    Err(input.to_string())
}

fn is_simple_boundary(b: u8) -> bool {
    matches!(b, b'.' | b'#' | b'[' | b':')
}

fn find_close_paren(body: &str) -> Option<usize> {
    let mut depth = 1usize;
    let mut quote: Option<u8> = None;
    let mut escaped = false;
    for (idx, b) in body.bytes().enumerate() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'\'' | b'"' => quote = Some(b),
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

// =============================================================================
// Matching
// =============================================================================

/// Whether `el` matches any group of the selector list.
pub(crate) fn matches_element(doc: &Document, el: NodeId, list: &CssSelectorList) -> bool {
    list.groups
        .iter()
        .any(|complex| matches_complex(doc, el, complex))
}

fn matches_complex(doc: &Document, el: NodeId, complex: &ComplexSelector) -> bool {
    matches_at(doc, el, complex, complex.compounds.len() - 1)
}

fn matches_at(doc: &Document, el: NodeId, complex: &ComplexSelector, index: usize) -> bool {
    let (combinator, compound) = &complex.compounds[index];
    if !matches_compound(doc, el, compound) {
        return false;
    }
    let Some(combinator) = combinator else {
        return true;
    };
    match combinator {
        Combinator::Child => doc
            .parent_element(el)
            .is_some_and(|p| matches_at(doc, p, complex, index - 1)),
        Combinator::Descendant => {
            let mut current = doc.parent_element(el);
            while let Some(p) = current {
                if matches_at(doc, p, complex, index - 1) {
                    return true;
                }
                current = doc.parent_element(p);
            }
            false
        }
        Combinator::NextSibling => preceding_element_siblings(doc, el)
            .first()
            .is_some_and(|&p| matches_at(doc, p, complex, index - 1)),
        Combinator::SubsequentSibling => preceding_element_siblings(doc, el)
            .iter()
            .any(|&p| matches_at(doc, p, complex, index - 1)),
    }
}

/// Preceding element siblings, nearest first.
fn preceding_element_siblings(doc: &Document, el: NodeId) -> Vec<NodeId> {
    let Some(parent) = doc.parent(el) else {
        return Vec::new();
    };
    let mut out: Vec<NodeId> = doc
        .children(parent)
        .iter()
        .copied()
        .take_while(|&c| c != el)
        .filter(|&c| doc.is_element(c))
        .collect();
    out.reverse();
    out
}

fn matches_compound(doc: &Document, el: NodeId, compound: &Compound) -> bool {
    if !doc.is_element(el) {
        return false;
    }
    if let Some(tag) = &compound.tag {
        if !doc.tag_is(el, tag) {
            return false;
        }
    }
    if let Some(id) = &compound.id {
        if doc.attribute(el, "id") != Some(id.as_str()) {
            return false;
        }
    }
    for class in &compound.classes {
        if !doc.has_class(el, class) {
            return false;
        }
    }
    for cond in &compound.attrs {
        if !matches_attr(doc, el, cond) {
            return false;
        }
    }
    compound.pseudos.iter().all(|p| matches_pseudo(doc, el, p))
}

fn matches_attr(doc: &Document, el: NodeId, cond: &AttrCondition) -> bool {
    let Some(actual) = doc.attribute(el, &cond.name) else {
        return false;
    };
    let expected = cond.value.as_str();
    match cond.op {
        AttrOp::Exists => true,
        AttrOp::Eq => actual == expected,
        AttrOp::Prefix => !expected.is_empty() && actual.starts_with(expected),
        AttrOp::Suffix => !expected.is_empty() && actual.ends_with(expected),
        AttrOp::Substring => !expected.is_empty() && actual.contains(expected),
        AttrOp::Includes => actual.split_whitespace().any(|token| token == expected),
        AttrOp::Dash => {
            actual == expected
                || (actual.len() > expected.len()
                    && actual.starts_with(expected)
                    && actual.as_bytes()[expected.len()] == b'-')
        }
    }
}

fn matches_pseudo(doc: &Document, el: NodeId, pseudo: &Pseudo) -> bool {
    match pseudo {
        Pseudo::FirstChild => sibling_position(doc, el) == Some(1),
        Pseudo::LastChild => doc
            .parent(el)
            .map(|p| doc.child_elements(p))
            .is_some_and(|siblings| siblings.last() == Some(&el)),
        Pseudo::NthChild(k) => sibling_position(doc, el) == Some(*k),
        Pseudo::Checked => doc.checked(el),
        Pseudo::Disabled => is_disableable(doc, el) && doc.has_attribute(el, "disabled"),
        Pseudo::Enabled => is_disableable(doc, el) && !doc.has_attribute(el, "disabled"),
        Pseudo::Empty => doc.children(el).is_empty(),
        Pseudo::Focus => doc.active_element() == Some(el),
        Pseudo::Not(list) => !matches_element(doc, el, list),
        Pseudo::Has(list) => doc
            .descendant_elements(el, false)
            .into_iter()
            .any(|d| matches_element(doc, d, list)),
    }
}

fn is_disableable(doc: &Document, el: NodeId) -> bool {
    matches!(
        doc.tag(el),
        "button" | "input" | "select" | "textarea" | "option" | "optgroup" | "fieldset"
    )
}

fn sibling_position(doc: &Document, el: NodeId) -> Option<usize> {
    let parent = doc.parent(el)?;
    doc.child_elements(parent)
        .iter()
        .position(|&c| c == el)
        .map(|i| i + 1)
}

// =============================================================================
// Queries
// =============================================================================

/// All descendants of `root` matching the list, in traversal order.
pub(crate) fn query_all(
    doc: &Document,
    root: NodeId,
    list: &CssSelectorList,
    pierce: bool,
) -> Vec<NodeId> {
    doc.descendant_elements(root, pierce)
        .into_iter()
        .filter(|&el| matches_element(doc, el, list))
        .collect()
}

/// Nearest inclusive ancestor of `el` matching the list, staying inside
/// one shadow tree.
pub(crate) fn closest(doc: &Document, el: NodeId, list: &CssSelectorList) -> Option<NodeId> {
    let mut current = Some(el);
    while let Some(e) = current {
        if matches_element(doc, e, list) {
            return Some(e);
        }
        current = doc.parent_element(e);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_doc() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let section = doc.append_element(root, "section", &[("id", "main")]);
        let first = doc.append_element(
            section,
            "p",
            &[("class", "note lead"), ("data-kind", "intro")],
        );
        let second = doc.append_element(section, "p", &[("class", "note")]);
        doc.append_text(second, "tail");
        (doc, section, first, second)
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn test_parse_rejects_garbage() {
            assert!(parse_css("").is_err());
            assert!(parse_css("div >").is_err());
            assert!(parse_css("[unclosed").is_err());
            assert!(parse_css("p:nth-child(0)").is_err());
            assert!(parse_css(":unknown-pseudo").is_err());
        }

        #[test]
        fn test_parse_groups_and_combinators() {
            assert!(parse_css("div.a > span, #x ~ i, p + em b").is_ok());
        }
    }

    mod match_tests {
        use super::*;

        #[test]
        fn test_tag_class_id() {
            let (doc, section, first, _) = sample_doc();
            let list = parse_css("p.note.lead").unwrap();
            assert!(matches_element(&doc, first, &list));
            assert!(!matches_element(&doc, section, &list));

            let list = parse_css("#main").unwrap();
            assert!(matches_element(&doc, section, &list));
        }

        #[test]
        fn test_attr_operators() {
            let (doc, _, first, _) = sample_doc();
            for selector in [
                "[data-kind]",
                "[data-kind=intro]",
                "[data-kind^=in]",
                "[data-kind$=tro]",
                "[data-kind*=ntr]",
                "[class~=lead]",
                "[data-kind|=intro]",
            ] {
                let list = parse_css(selector).unwrap();
                assert!(matches_element(&doc, first, &list), "selector {selector}");
            }
            let list = parse_css("[data-kind=outro]").unwrap();
            assert!(!matches_element(&doc, first, &list));
        }

        #[test]
        fn test_quoted_attr_value() {
            let mut doc = Document::new();
            let root = doc.root();
            let el = doc.append_element(root, "div", &[("data-name", "a b")]);
            let list = parse_css("[data-name=\"a b\"]").unwrap();
            assert!(matches_element(&doc, el, &list));
        }

        #[test]
        fn test_child_and_descendant_combinators() {
            let (doc, _, first, _) = sample_doc();
            assert!(matches_element(&doc, first, &parse_css("section > p").unwrap()));
            assert!(matches_element(&doc, first, &parse_css("section p").unwrap()));
            assert!(!matches_element(&doc, first, &parse_css("div > p").unwrap()));
        }

        #[test]
        fn test_sibling_combinators() {
            let (doc, _, _, second) = sample_doc();
            assert!(matches_element(&doc, second, &parse_css("p + p").unwrap()));
            assert!(matches_element(&doc, second, &parse_css("p.lead ~ p").unwrap()));
        }

        #[test]
        fn test_structural_pseudos() {
            let (doc, _, first, second) = sample_doc();
            assert!(matches_element(&doc, first, &parse_css("p:first-child").unwrap()));
            assert!(matches_element(&doc, second, &parse_css("p:last-child").unwrap()));
            assert!(matches_element(&doc, second, &parse_css("p:nth-child(2)").unwrap()));
            assert!(matches_element(&doc, first, &parse_css("p:empty").unwrap()));
            assert!(!matches_element(&doc, second, &parse_css("p:empty").unwrap()));
        }

        #[test]
        fn test_not_and_has() {
            let (doc, section, first, second) = sample_doc();
            assert!(matches_element(&doc, first, &parse_css("p:not(.x)").unwrap()));
            assert!(!matches_element(
                &doc,
                first,
                &parse_css("p:not(.lead)").unwrap()
            ));
            assert!(matches_element(
                &doc,
                section,
                &parse_css("section:has(p.lead)").unwrap()
            ));
            let _ = second;
        }
    }

    mod query_tests {
        use super::*;

        #[test]
        fn test_query_excludes_root() {
            let (doc, section, first, second) = sample_doc();
            let list = parse_css("p").unwrap();
            assert_eq!(query_all(&doc, section, &list, false), vec![first, second]);
            let list = parse_css("section").unwrap();
            assert!(query_all(&doc, section, &list, false).is_empty());
        }

        #[test]
        fn test_query_pierces_shadow_when_asked() {
            let mut doc = Document::new();
            let root = doc.root();
            let host = doc.append_element(root, "div", &[]);
            let shadow = doc.attach_shadow(host);
            let inner = doc.append_element(shadow, "button", &[]);

            let list = parse_css("button").unwrap();
            assert_eq!(query_all(&doc, root, &list, true), vec![inner]);
            assert!(query_all(&doc, root, &list, false).is_empty());
        }

        #[test]
        fn test_closest() {
            let (doc, section, first, _) = sample_doc();
            let list = parse_css("section").unwrap();
            assert_eq!(closest(&doc, first, &list), Some(section));
            let list = parse_css("article").unwrap();
            assert_eq!(closest(&doc, first, &list), None);
        }
    }
}
