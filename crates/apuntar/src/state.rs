//! Element-state predicates, retargeting and the stability tracker.

use std::fmt;
use std::time::Duration;

use crate::dom::{style, Document, NodeId};
use crate::geometry::Rect;
use crate::result::{EngineError, EngineResult};

/// Interaction states an element can be waited on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementState {
    /// Visible per the visibility predicate
    Visible,
    /// Not visible
    Hidden,
    /// Not disabled
    Enabled,
    /// Disabled form control
    Disabled,
    /// Enabled and not readonly
    Editable,
    /// Checked checkbox/radio (native or ARIA)
    Checked,
    /// Bounding rect unchanged across consecutive frames
    Stable,
}

impl fmt::Display for ElementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Visible => "visible",
            Self::Hidden => "hidden",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Editable => "editable",
            Self::Checked => "checked",
            Self::Stable => "stable",
        };
        write!(f, "{name}")
    }
}

/// Whether label-following applies during retargeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetargetBehavior {
    /// Redirect through enclosing labels to their control
    FollowLabel,
    /// Stay on the resolved element
    NoFollowLabel,
}

/// Outcome of a synchronous state probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateProbe {
    /// The state holds (or not)
    Holds(bool),
    /// The element vanished between lookup and the probe
    NotConnected,
}

fn is_form_control(doc: &Document, el: NodeId) -> bool {
    matches!(doc.tag(el), "input" | "textarea" | "select")
}

fn has_interactive_role(doc: &Document, el: NodeId) -> bool {
    matches!(
        doc.attribute(el, "role"),
        Some("button" | "checkbox" | "radio")
    )
}

fn is_content_editable(doc: &Document, el: NodeId) -> bool {
    matches!(doc.attribute(el, "contenteditable"), Some("" | "true"))
}

fn closest_interactive_ancestor(doc: &Document, el: NodeId) -> Option<NodeId> {
    let mut current = Some(el);
    while let Some(e) = current {
        if doc.tag_is(e, "button") || has_interactive_role(doc, e) {
            return Some(e);
        }
        current = doc.parent_element(e);
    }
    None
}

fn closest_label(doc: &Document, el: NodeId) -> Option<NodeId> {
    let mut current = Some(el);
    while let Some(e) = current {
        if doc.tag_is(e, "label") {
            return Some(e);
        }
        current = doc.parent_element(e);
    }
    None
}

/// The control a label is associated with: its `for` target, or the first
/// labelable descendant.
#[must_use]
pub fn label_control(doc: &Document, label: NodeId) -> Option<NodeId> {
    if let Some(target) = doc.attribute(label, "for") {
        return doc.element_by_id(target);
    }
    doc.descendant_elements(label, false)
        .into_iter()
        .find(|&el| matches!(doc.tag(el), "input" | "textarea" | "select" | "button"))
}

/// Normalize a node to the element an action should actually affect.
#[must_use]
pub fn retarget(doc: &Document, node: NodeId, behavior: RetargetBehavior) -> Option<NodeId> {
    let mut element = if doc.is_element(node) {
        node
    } else {
        doc.parent_element(node)?
    };

    if !is_form_control(doc, element) {
        if let Some(interactive) = closest_interactive_ancestor(doc, element) {
            element = interactive;
        }
    }

    if behavior == RetargetBehavior::FollowLabel {
        let keeps_target = is_form_control(doc, element)
            || doc.tag_is(element, "button")
            || has_interactive_role(doc, element)
            || is_content_editable(doc, element);
        if !keeps_target {
            if let Some(label) = closest_label(doc, element) {
                element = label;
            }
        }
        if doc.tag_is(element, "label") {
            if let Some(control) = label_control(doc, element) {
                element = control;
            }
        }
    }

    Some(element)
}

/// Whether the element is a disabled form control.
#[must_use]
pub fn is_disabled(doc: &Document, el: NodeId) -> bool {
    matches!(doc.tag(el), "button" | "input" | "select" | "textarea")
        && doc.has_attribute(el, "disabled")
}

fn is_readonly(doc: &Document, el: NodeId) -> bool {
    matches!(doc.tag(el), "input" | "textarea" | "select") && doc.has_attribute(el, "readonly")
}

fn checked_state(doc: &Document, el: NodeId) -> EngineResult<bool> {
    if matches!(doc.attribute(el, "role"), Some("checkbox" | "radio")) {
        return Ok(doc.attribute(el, "aria-checked") == Some("true"));
    }
    if doc.tag_is(el, "input")
        && matches!(doc.attribute(el, "type"), Some("checkbox" | "radio"))
    {
        return Ok(doc.checked(el));
    }
    Err(EngineError::NotACheckbox)
}

/// Probe a synchronous element state.
///
/// Retargets with `no-follow-label` for the visibility family and with
/// `follow-label` otherwise. A disconnected element is `hidden`; every
/// other probe on one reports [`StateProbe::NotConnected`].
///
/// # Errors
///
/// [`EngineError::NotAnElement`] when the node resolves to no element,
/// [`EngineError::NotACheckbox`] for a checked-probe on the wrong kind.
/// The `stable` state is not synchronous and is rejected.
pub fn element_state(doc: &Document, node: NodeId, state: ElementState) -> EngineResult<StateProbe> {
    let behavior = match state {
        ElementState::Stable | ElementState::Visible | ElementState::Hidden => {
            RetargetBehavior::NoFollowLabel
        }
        _ => RetargetBehavior::FollowLabel,
    };
    let element = retarget(doc, node, behavior).ok_or(EngineError::NotAnElement)?;

    if !doc.is_connected(element) {
        return Ok(if state == ElementState::Hidden {
            StateProbe::Holds(true)
        } else {
            StateProbe::NotConnected
        });
    }

    let holds = match state {
        ElementState::Visible => style::is_visible(doc, element),
        ElementState::Hidden => !style::is_visible(doc, element),
        ElementState::Disabled => is_disabled(doc, element),
        ElementState::Enabled => !is_disabled(doc, element),
        ElementState::Editable => !is_disabled(doc, element) && !is_readonly(doc, element),
        ElementState::Checked => checked_state(doc, element)?,
        ElementState::Stable => {
            return Err(EngineError::MalformedBody {
                engine: "state".to_string(),
                body: "stable".to_string(),
            })
        }
    };
    Ok(StateProbe::Holds(holds))
}

/// Minimum tick length honored by the stability check when more than one
/// stable frame is required.
const MIN_FRAME: Duration = Duration::from_millis(15);

/// Multi-frame position comparison backing the `stable` state.
///
/// The first observation is skipped (the first animation frame runs in
/// the same frame as evaluation); ticks shorter than 15 ms are dropped
/// when more than one stable frame is required.
#[derive(Debug)]
pub struct StabilityTracker {
    stable_frames: usize,
    primed: bool,
    last_time: Duration,
    last_rect: Option<Rect>,
    same_position_count: usize,
}

impl StabilityTracker {
    /// Tracker requiring `stable_frames` consecutive same-rect frames.
    #[must_use]
    pub fn new(stable_frames: usize) -> Self {
        Self {
            stable_frames: stable_frames.max(1),
            primed: false,
            last_time: Duration::ZERO,
            last_rect: None,
            same_position_count: 0,
        }
    }

    /// Feed one frame; returns whether the element now counts as stable.
    pub fn observe(&mut self, now: Duration, rect: Rect) -> bool {
        if !self.primed {
            self.primed = true;
            self.last_time = now;
            return false;
        }
        if self.stable_frames > 1 && now.saturating_sub(self.last_time) < MIN_FRAME {
            return false;
        }
        self.last_time = now;

        // A rect is the same only when all four components match.
        let same = self.last_rect.is_some_and(|last| last == rect);
        if same {
            self.same_position_count += 1;
        } else {
            self.same_position_count = 0;
        }
        self.last_rect = Some(rect);
        self.same_position_count >= self.stable_frames
    }
}
