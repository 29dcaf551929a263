//! Hit-target verification: is the action point actually hitting the
//! element the action targets, or is something overlaying it?

use crate::dom::{Document, NodeId};
use crate::geometry::Point;
use crate::preview::preview_node;
use crate::result::EngineResult;
use crate::selector::parse_css;

/// Result of a hit-target check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitCheck {
    /// The point hits the target (or one of its descendants)
    Hit,
    /// Something else receives the point; the description names it
    Blocked {
        /// Preview of the intercepting element, possibly with the
        /// overlaying subtree root appended
        hit_target_description: String,
    },
}

/// Outcome including the vanished-element case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitTargetResult {
    /// The check ran
    Checked(HitCheck),
    /// The element vanished between lookup and the check
    NotConnected,
}

/// Walk `element_from_point` through shadow roots: the top-level query
/// returns the shadow host, so descend until the hit repeats or there is
/// no shadow root to enter.
#[must_use]
pub fn deep_element_from_point(doc: &Document, point: Point) -> Option<NodeId> {
    let mut scope = doc.root();
    let mut element: Option<NodeId> = None;
    loop {
        let Some(inner) = doc.element_from_point(scope, point) else {
            break;
        };
        if element == Some(inner) {
            break;
        }
        element = Some(inner);
        match doc.shadow_root(inner) {
            Some(shadow) => scope = shadow,
            None => break,
        }
    }
    element
}

/// Check whether `point` lands on `node` (retargeted through the
/// enclosing button, if any).
///
/// # Errors
///
/// Propagates CSS-engine errors from the internal `closest` lookup
/// (never expected for the built-in selector).
pub fn check_hit_target_at(
    doc: &Document,
    node: NodeId,
    point: Point,
) -> EngineResult<HitTargetResult> {
    let base = if doc.is_element(node) {
        Some(node)
    } else {
        doc.parent_element(node)
    };
    let Some(base) = base else {
        return Ok(HitTargetResult::NotConnected);
    };
    if !doc.is_connected(base) {
        return Ok(HitTargetResult::NotConnected);
    }

    let button_list = parse_css("button, [role=button]").map_err(|body| {
        crate::result::EngineError::MalformedBody {
            engine: "css".to_string(),
            body,
        }
    })?;
    let target = crate::selector::closest(doc, base, &button_list).unwrap_or(base);

    // Chain from the hit element up through parents and shadow hosts,
    // stopping early if the target itself appears.
    let mut hit_parents = Vec::new();
    let mut cursor = deep_element_from_point(doc, point);
    while let Some(el) = cursor {
        if el == target {
            return Ok(HitTargetResult::Checked(HitCheck::Hit));
        }
        hit_parents.push(el);
        cursor = doc.parent_element_or_shadow_host(el);
    }

    let hit_target_description = hit_parents
        .first()
        .map_or_else(|| "#document".to_string(), |&el| preview_node(doc, el));

    // Climb the target's ancestors until one shows up in the hit chain;
    // a divergence deeper than position 1 names the overlaying subtree.
    let mut root_description = None;
    let mut climb = Some(target);
    while let Some(el) = climb {
        if let Some(index) = hit_parents.iter().position(|&p| p == el) {
            if index > 1 {
                root_description = Some(preview_node(doc, hit_parents[index - 1]));
            }
            break;
        }
        climb = doc.parent_element_or_shadow_host(el);
    }

    let description = match root_description {
        Some(root) => format!("{hit_target_description} from {root} subtree"),
        None => hit_target_description,
    };
    Ok(HitTargetResult::Checked(HitCheck::Blocked {
        hit_target_description: description,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    #[test]
    fn test_direct_hit() {
        let mut doc = Document::new();
        let root = doc.root();
        let button = doc.append_element(root, "button", &[("id", "b")]);
        doc.set_rect(button, Rect::new(0.0, 0.0, 100.0, 40.0));

        let result = check_hit_target_at(&doc, button, Point::new(10.0, 10.0)).unwrap();
        assert_eq!(result, HitTargetResult::Checked(HitCheck::Hit));
    }

    #[test]
    fn test_hit_on_descendant_counts() {
        let mut doc = Document::new();
        let root = doc.root();
        let button = doc.append_element(root, "button", &[]);
        doc.set_rect(button, Rect::new(0.0, 0.0, 100.0, 40.0));
        let icon = doc.append_element(button, "span", &[]);
        doc.set_rect(icon, Rect::new(4.0, 4.0, 16.0, 16.0));

        // The icon paints above the button, but chaining up from it
        // reaches the button target.
        let result = check_hit_target_at(&doc, button, Point::new(10.0, 10.0)).unwrap();
        assert_eq!(result, HitTargetResult::Checked(HitCheck::Hit));
    }

    #[test]
    fn test_overlay_is_reported_with_subtree() {
        let mut doc = Document::new();
        let root = doc.root();
        let body = doc.append_element(root, "body", &[]);
        doc.set_rect(body, Rect::new(0.0, 0.0, 800.0, 600.0));
        let button = doc.append_element(body, "button", &[("id", "b")]);
        doc.set_rect(button, Rect::new(0.0, 0.0, 100.0, 40.0));
        let dialog = doc.append_element(body, "div", &[("class", "dialog")]);
        doc.set_rect(dialog, Rect::new(0.0, 0.0, 300.0, 300.0));
        let message = doc.append_element(dialog, "p", &[]);
        doc.set_rect(message, Rect::new(0.0, 0.0, 300.0, 40.0));

        let result = check_hit_target_at(&doc, button, Point::new(10.0, 10.0)).unwrap();
        let HitTargetResult::Checked(HitCheck::Blocked {
            hit_target_description,
        }) = result
        else {
            panic!("expected a blocked hit");
        };
        assert!(hit_target_description.contains("<p>"));
        assert!(hit_target_description.contains("from <div class=\"dialog\"></div> subtree"));
    }

    #[test]
    fn test_shallow_overlay_has_plain_description() {
        let mut doc = Document::new();
        let root = doc.root();
        let body = doc.append_element(root, "body", &[]);
        doc.set_rect(body, Rect::new(0.0, 0.0, 800.0, 600.0));
        let button = doc.append_element(body, "button", &[]);
        doc.set_rect(button, Rect::new(0.0, 0.0, 100.0, 40.0));
        let veil = doc.append_element(body, "div", &[("class", "veil")]);
        doc.set_rect(veil, Rect::new(0.0, 0.0, 300.0, 300.0));

        // Divergence at position 1 in the hit chain: no subtree suffix.
        let result = check_hit_target_at(&doc, button, Point::new(10.0, 10.0)).unwrap();
        assert_eq!(
            result,
            HitTargetResult::Checked(HitCheck::Blocked {
                hit_target_description: "<div class=\"veil\"></div>".to_string(),
            })
        );
    }

    #[test]
    fn test_hit_through_shadow_root() {
        let mut doc = Document::new();
        let root = doc.root();
        let host = doc.append_element(root, "div", &[]);
        doc.set_rect(host, Rect::new(0.0, 0.0, 100.0, 100.0));
        let shadow = doc.attach_shadow(host);
        let button = doc.append_element(shadow, "button", &[]);
        doc.set_rect(button, Rect::new(0.0, 0.0, 100.0, 100.0));

        assert_eq!(
            deep_element_from_point(&doc, Point::new(50.0, 50.0)),
            Some(button)
        );
        let result = check_hit_target_at(&doc, button, Point::new(50.0, 50.0)).unwrap();
        assert_eq!(result, HitTargetResult::Checked(HitCheck::Hit));
    }

    #[test]
    fn test_detached_target() {
        let mut doc = Document::new();
        let node = doc.create_element("button");
        let result = check_hit_target_at(&doc, node, Point::new(0.0, 0.0)).unwrap();
        assert_eq!(result, HitTargetResult::NotConnected);
    }
}
