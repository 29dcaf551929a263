//! XPath 1.0 subset evaluated over the arena document.
//!
//! Covered: absolute (`/`, `//`) and relative location paths, name tests,
//! `*`, `.` and `..` steps, and the predicates `[@attr]`, `[@attr='v']`,
//! `[k]`, `[last()]`, `[position()=k]`, `[text()='v']`,
//! `[contains(@attr,'v')]` and `[contains(text(),'v')]`. Neither variant
//! of the engine pierces shadow roots.

use crate::dom::{Document, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeTest {
    Name(String),
    Any,
    SelfNode,
    ParentNode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    HasAttr(String),
    AttrEquals(String, String),
    AttrContains(String, String),
    TextEquals(String),
    TextContains(String),
    Position(usize),
    Last,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

/// Evaluate an XPath expression. Absolute paths start at the document
/// node regardless of `root`. The error payload is the offending input.
pub(crate) fn query(doc: &Document, root: NodeId, expr: &str) -> Result<Vec<NodeId>, String> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(expr.to_string());
    }

    let (rest, mut context) = if let Some(tail) = expr.strip_prefix("//") {
        (format!("//{tail}"), vec![doc.root()])
    } else if let Some(tail) = expr.strip_prefix('/') {
        (format!("/{tail}"), vec![doc.root()])
    } else {
        // Relative paths walk the child axis from the query root.
        (format!("/{expr}"), vec![root])
    };

    let steps = parse_steps(&rest).map_err(|()| expr.to_string())?;
    for step in &steps {
        context = apply_step(doc, &context, step);
        if context.is_empty() {
            break;
        }
    }

    let mut seen = std::collections::HashSet::new();
    Ok(context
        .into_iter()
        .filter(|&el| doc.is_element(el) && seen.insert(el))
        .collect())
}

fn parse_steps(input: &str) -> Result<Vec<Step>, ()> {
    let mut steps = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        if bytes[i] != b'/' {
            return Err(());
        }
        i += 1;
        let axis = if bytes.get(i) == Some(&b'/') {
            i += 1;
            Axis::Descendant
        } else {
            Axis::Child
        };

        let start = i;
        let mut depth = 0usize;
        let mut quote: Option<u8> = None;
        while i < bytes.len() {
            let b = bytes[i];
            if let Some(q) = quote {
                if b == q {
                    quote = None;
                }
            } else {
                match b {
                    b'\'' | b'"' => quote = Some(b),
                    b'[' => depth += 1,
                    b']' => depth = depth.checked_sub(1).ok_or(())?,
                    b'/' if depth == 0 => break,
                    _ => {}
                }
            }
            i += 1;
        }
        if depth != 0 || quote.is_some() {
            return Err(());
        }
        steps.push(parse_step(axis, &input[start..i])?);
    }

    if steps.is_empty() {
        return Err(());
    }
    Ok(steps)
}

fn parse_step(axis: Axis, token: &str) -> Result<Step, ()> {
    let token = token.trim();
    if token.is_empty() {
        return Err(());
    }
    let (test_str, preds_str) = match token.find('[') {
        Some(pos) => (&token[..pos], &token[pos..]),
        None => (token, ""),
    };

    let test = match test_str.trim() {
        "." => NodeTest::SelfNode,
        ".." => NodeTest::ParentNode,
        "*" => NodeTest::Any,
        name if !name.is_empty() && is_name(name) => NodeTest::Name(name.to_ascii_lowercase()),
        _ => return Err(()),
    };

    let mut predicates = Vec::new();
    let mut rest = preds_str.trim();
    while !rest.is_empty() {
        if !rest.starts_with('[') {
            return Err(());
        }
        let close = find_close_bracket(&rest[1..]).ok_or(())?;
        predicates.push(parse_predicate(rest[1..=close].trim())?);
        rest = rest[close + 2..].trim();
    }

    Ok(Step {
        axis,
        test,
        predicates,
    })
}

fn is_name(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
}

fn find_close_bracket(body: &str) -> Option<usize> {
    let mut depth = 1usize;
    let mut quote: Option<u8> = None;
    for (idx, b) in body.bytes().enumerate() {
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'\'' | b'"' => quote = Some(b),
            b'[' => depth += 1,
            b']' => {
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

fn parse_predicate(body: &str) -> Result<Predicate, ()> {
    if let Ok(position) = body.parse::<usize>() {
        return (position > 0).then_some(Predicate::Position(position)).ok_or(());
    }
    if body == "last()" {
        return Ok(Predicate::Last);
    }
    if let Some(rest) = body.strip_prefix("position()") {
        let rest = rest.trim_start().strip_prefix('=').ok_or(())?;
        let position = rest.trim().parse::<usize>().map_err(|_| ())?;
        return (position > 0).then_some(Predicate::Position(position)).ok_or(());
    }
    if let Some(rest) = body.strip_prefix("contains(") {
        let inner = rest.strip_suffix(')').ok_or(())?;
        let (subject, needle) = inner.split_once(',').ok_or(())?;
        let needle = parse_literal(needle.trim())?;
        let subject = subject.trim();
        if subject == "text()" {
            return Ok(Predicate::TextContains(needle));
        }
        let attr = subject.strip_prefix('@').ok_or(())?;
        return Ok(Predicate::AttrContains(attr.to_ascii_lowercase(), needle));
    }
    if let Some(rest) = body.strip_prefix("text()") {
        let rest = rest.trim_start().strip_prefix('=').ok_or(())?;
        return Ok(Predicate::TextEquals(parse_literal(rest.trim())?));
    }
    if let Some(rest) = body.strip_prefix('@') {
        if let Some((name, value)) = rest.split_once('=') {
            return Ok(Predicate::AttrEquals(
                name.trim().to_ascii_lowercase(),
                parse_literal(value.trim())?,
            ));
        }
        if is_name(rest.trim()) {
            return Ok(Predicate::HasAttr(rest.trim().to_ascii_lowercase()));
        }
    }
    Err(())
}

fn parse_literal(raw: &str) -> Result<String, ()> {
    let bytes = raw.as_bytes();
    if bytes.len() >= 2 {
        let q = bytes[0];
        if (q == b'\'' || q == b'"') && bytes[bytes.len() - 1] == q {
            return Ok(raw[1..raw.len() - 1].to_string());
        }
    }
    Err(())
}

fn apply_step(doc: &Document, context: &[NodeId], step: &Step) -> Vec<NodeId> {
    let mut out = Vec::new();
    for &node in context {
        let candidates: Vec<NodeId> = match (&step.test, step.axis) {
            (NodeTest::SelfNode, _) => vec![node],
            (NodeTest::ParentNode, _) => doc.parent_element(node).into_iter().collect(),
            (_, Axis::Child) => doc.child_elements(node),
            (_, Axis::Descendant) => doc.descendant_elements(node, false),
        };
        let mut matched: Vec<NodeId> = candidates
            .into_iter()
            .filter(|&el| match &step.test {
                NodeTest::Name(name) => doc.tag_is(el, name),
                NodeTest::Any => doc.is_element(el),
                NodeTest::SelfNode | NodeTest::ParentNode => true,
            })
            .collect();
        // Predicates apply per context node; position is within this
        // node's matched set, re-evaluated after each filter.
        for predicate in &step.predicates {
            let total = matched.len();
            matched = matched
                .into_iter()
                .enumerate()
                .filter(|&(pos, el)| eval_predicate(doc, el, pos + 1, total, predicate))
                .map(|(_, el)| el)
                .collect();
        }
        out.extend(matched);
    }
    out
}

fn eval_predicate(
    doc: &Document,
    el: NodeId,
    position: usize,
    total: usize,
    predicate: &Predicate,
) -> bool {
    match predicate {
        Predicate::HasAttr(name) => doc.has_attribute(el, name),
        Predicate::AttrEquals(name, value) => doc.attribute(el, name) == Some(value.as_str()),
        Predicate::AttrContains(name, value) => doc
            .attribute(el, name)
            .is_some_and(|attr| attr.contains(value.as_str())),
        Predicate::TextEquals(value) => doc.text_content(el).trim() == value,
        Predicate::TextContains(value) => doc.text_content(el).contains(value.as_str()),
        Predicate::Position(k) => position == *k,
        Predicate::Last => position == total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId, Vec<NodeId>) {
        let mut doc = Document::new();
        let root = doc.root();
        let list = doc.append_element(root, "ul", &[("id", "menu")]);
        let mut items = Vec::new();
        for (i, label) in ["Home", "Docs", "About"].iter().enumerate() {
            let index = i.to_string();
            let li = doc.append_element(
                list,
                "li",
                &[("data-index", index.as_str()), ("class", "item")],
            );
            doc.append_text(li, label);
            items.push(li);
        }
        (doc, list, items)
    }

    #[test]
    fn test_descendant_from_document() {
        let (doc, _, items) = sample();
        let found = query(&doc, doc.root(), "//li").unwrap();
        assert_eq!(found, items);
    }

    #[test]
    fn test_absolute_child_path() {
        let (doc, list, _) = sample();
        let found = query(&doc, list, "/ul").unwrap();
        assert_eq!(found, vec![list]);
    }

    #[test]
    fn test_relative_path_uses_root() {
        let (doc, list, items) = sample();
        let found = query(&doc, list, "li").unwrap();
        assert_eq!(found, items);
    }

    #[test]
    fn test_attribute_predicates() {
        let (doc, _, items) = sample();
        assert_eq!(
            query(&doc, doc.root(), "//li[@data-index='1']").unwrap(),
            vec![items[1]]
        );
        assert_eq!(query(&doc, doc.root(), "//li[@class]").unwrap(), items);
        assert_eq!(
            query(&doc, doc.root(), "//ul[contains(@id,'en')]/li").unwrap(),
            items
        );
    }

    #[test]
    fn test_position_and_last() {
        let (doc, _, items) = sample();
        assert_eq!(query(&doc, doc.root(), "//li[2]").unwrap(), vec![items[1]]);
        assert_eq!(
            query(&doc, doc.root(), "//li[last()]").unwrap(),
            vec![items[2]]
        );
        assert_eq!(
            query(&doc, doc.root(), "//li[position()=1]").unwrap(),
            vec![items[0]]
        );
    }

    #[test]
    fn test_text_predicates() {
        let (doc, _, items) = sample();
        assert_eq!(
            query(&doc, doc.root(), "//li[text()='Docs']").unwrap(),
            vec![items[1]]
        );
        assert_eq!(
            query(&doc, doc.root(), "//li[contains(text(),'bou')]").unwrap(),
            vec![items[2]]
        );
    }

    #[test]
    fn test_parent_step() {
        let (doc, list, items) = sample();
        let found = query(&doc, doc.root(), "//li[1]/..").unwrap();
        assert_eq!(found, vec![list]);
        let _ = items;
    }

    #[test]
    fn test_malformed_expressions() {
        let (doc, _, _) = sample();
        assert!(query(&doc, doc.root(), "").is_err());
        assert!(query(&doc, doc.root(), "//li[").is_err());
        assert!(query(&doc, doc.root(), "//li[@a=b]").is_err());
        assert!(query(&doc, doc.root(), "//li[0]").is_err());
    }

    #[test]
    fn test_does_not_pierce_shadow() {
        let mut doc = Document::new();
        let root = doc.root();
        let host = doc.append_element(root, "div", &[]);
        let shadow = doc.attach_shadow(host);
        doc.append_element(shadow, "li", &[]);
        assert!(query(&doc, doc.root(), "//li").unwrap().is_empty());
    }
}
