//! Chained-selector evaluation.
//!
//! The evaluator drives a working set of element matches through the
//! selector's parts in order, short-circuiting the `nth` and `visible`
//! pseudo-parts as filters, caching engine results per `(root, part)`
//! within a single call, and propagating the capture element forward.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::dom::{style, Document, NodeId};
use crate::preview::strict_violation_message;
use crate::result::{EngineError, EngineResult};
use crate::selector::engines::EngineRegistry;
use crate::selector::parser::ParsedSelector;

/// An intermediate traversal entry: the matched element plus the capture
/// element carried from the marked part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ElementMatch {
    element: NodeId,
    capture: Option<NodeId>,
}

/// Per-call scratch state: engine result lists keyed by
/// `(root element, part index)` and a visibility memo. Dropped when the
/// top-level call returns, on every exit path.
#[derive(Debug, Default)]
struct QueryScope {
    lists: HashMap<(NodeId, usize), Vec<NodeId>>,
    visibility: HashMap<NodeId, bool>,
}

impl QueryScope {
    fn is_visible(&mut self, doc: &Document, el: NodeId) -> bool {
        *self
            .visibility
            .entry(el)
            .or_insert_with(|| style::is_visible(doc, el))
    }
}

/// Resolve a selector to all matching elements, deduplicated by captured
/// element in first-encounter order.
///
/// # Errors
///
/// Propagates engine body errors and the capture-before-`nth` conflict.
pub fn query_selector_all(
    doc: &Document,
    registry: &EngineRegistry,
    selector: &ParsedSelector,
    root: NodeId,
) -> EngineResult<Vec<NodeId>> {
    let mut scope = QueryScope::default();
    let matches = run_parts(doc, registry, selector, root, &mut scope)?;

    let mut seen = HashSet::new();
    let result: Vec<NodeId> = matches
        .into_iter()
        .map(|m| m.capture.unwrap_or(m.element))
        .filter(|&el| seen.insert(el))
        .collect();
    debug!(selector = %selector.source, matches = result.len(), "querySelectorAll");
    Ok(result)
}

/// Resolve a selector to at most one element.
///
/// # Errors
///
/// With `strict`, fails when more than one distinct element survives; the
/// diagnostic previews up to ten matches.
pub fn query_selector(
    doc: &Document,
    registry: &EngineRegistry,
    selector: &ParsedSelector,
    root: NodeId,
    strict: bool,
) -> EngineResult<Option<NodeId>> {
    let all = query_selector_all(doc, registry, selector, root)?;
    if strict && all.len() > 1 {
        return Err(EngineError::StrictModeViolation {
            message: strict_violation_message(doc, &selector.source, &all),
        });
    }
    Ok(all.first().copied())
}

fn run_parts(
    doc: &Document,
    registry: &EngineRegistry,
    selector: &ParsedSelector,
    root: NodeId,
    scope: &mut QueryScope,
) -> EngineResult<Vec<ElementMatch>> {
    let mut matches = vec![ElementMatch {
        element: root,
        capture: None,
    }];

    for (index, part) in selector.parts.iter().enumerate() {
        match part.name.as_str() {
            "nth" => {
                if selector.capture.is_some_and(|c| c < index) {
                    return Err(EngineError::CaptureWithNth);
                }
                matches = filter_nth(matches, &part.body)?;
            }
            "visible" => {
                let wanted = parse_visible_body(&part.body).ok_or_else(|| {
                    EngineError::MalformedBody {
                        engine: "visible".to_string(),
                        body: part.body.clone(),
                    }
                })?;
                matches.retain(|m| scope.is_visible(doc, m.element) == wanted);
            }
            name => {
                let Some((engine, pierce)) = registry.resolve(name) else {
                    return Err(EngineError::UnknownEngine {
                        name: name.to_string(),
                        selector: selector.source.clone(),
                    });
                };
                let mut next = Vec::new();
                for m in &matches {
                    let key = (m.element, index);
                    if !scope.lists.contains_key(&key) {
                        let list = engine.query_all(doc, m.element, &part.body, pierce)?;
                        trace!(part = %name, root = key.0.index(), results = list.len(), "engine query");
                        scope.lists.insert(key, list);
                    }
                    // The match produced by the captured part carries its
                    // element forward from the following part on.
                    let capture = m.capture.or_else(|| {
                        (index > 0 && selector.capture == Some(index - 1)).then_some(m.element)
                    });
                    for &element in &scope.lists[&key] {
                        next.push(ElementMatch { element, capture });
                    }
                }
                matches = next;
            }
        }
        if matches.is_empty() {
            break;
        }
    }
    Ok(matches)
}

/// `nth` ranks over distinct elements in first-encounter order; duplicate
/// matches collapse before indexing.
fn filter_nth(matches: Vec<ElementMatch>, body: &str) -> EngineResult<Vec<ElementMatch>> {
    let mut seen = HashSet::new();
    let distinct: Vec<ElementMatch> = matches
        .into_iter()
        .filter(|m| seen.insert(m.element))
        .collect();

    let index = match body.trim() {
        "-1" => distinct.len().checked_sub(1),
        raw => Some(raw.parse::<usize>().map_err(|_| EngineError::MalformedBody {
            engine: "nth".to_string(),
            body: body.to_string(),
        })?),
    };

    Ok(index
        .and_then(|i| distinct.get(i).copied())
        .into_iter()
        .collect())
}

fn parse_visible_body(body: &str) -> Option<bool> {
    match body.trim() {
        "" | "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
