//! Interaction primitives: value filling, option selection, text
//! selection, focusing, file installation and event dispatch.
//!
//! Recoverable conditions (`not connected`) are values, not errors, so
//! the controller's retry loop can react without unwinding.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::dom::{
    Document, EventFamily, FilePayload, FiredEvent, InstalledFile, NodeId, RangeSelection,
};
use crate::result::{EngineError, EngineResult};
use crate::state::{retarget, RetargetBehavior};

/// Outcome of an interaction primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ready<T> {
    /// The primitive ran
    Value(T),
    /// The element vanished between lookup and the action
    NotConnected,
}

impl<T> Ready<T> {
    /// The carried value, if the primitive ran.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Value(value) => Some(value),
            Self::NotConnected => None,
        }
    }
}

/// What `fill` decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillResult {
    /// The value was committed and events fired
    Done,
    /// The text was selected; the controller performs key-by-key entry
    NeedsInput,
}

/// One requested option for `select_options`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionSpec {
    /// Match a specific option node by identity
    Node(NodeId),
    /// Match by attribute conjunction
    Filter(OptionFilter),
}

/// Attribute conjunction for option matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionFilter {
    /// Expected option value
    #[serde(default)]
    pub value: Option<String>,
    /// Expected option label
    #[serde(default)]
    pub label: Option<String>,
    /// Expected option index (DOM order)
    #[serde(default)]
    pub index: Option<usize>,
}

const TEXT_INPUT_TYPES: &[&str] = &[
    "", "email", "number", "password", "search", "tel", "text", "url",
];
const DATE_INPUT_TYPES: &[&str] = &["date", "time", "datetime-local", "month", "week"];

fn fire(doc: &mut Document, target: NodeId, event_type: &str) {
    doc.record_event(FiredEvent {
        target,
        event_type: event_type.to_string(),
        family: event_family(event_type),
        bubbles: true,
        cancelable: true,
        composed: true,
        init: None,
    });
}

// =============================================================================
// fill
// =============================================================================

/// One attempt of the fill protocol against an already-gated element.
///
/// # Errors
///
/// Rejects unfillable input types, non-numeric text for number inputs,
/// and malformed date-like values.
pub fn try_fill(doc: &mut Document, el: NodeId, value: &str) -> EngineResult<Ready<FillResult>> {
    if !doc.is_connected(el) {
        return Ok(Ready::NotConnected);
    }

    if doc.tag_is(el, "input") {
        let input_type = doc
            .attribute(el, "type")
            .unwrap_or("")
            .to_ascii_lowercase();
        if DATE_INPUT_TYPES.contains(&input_type.as_str()) {
            let trimmed = value.trim();
            focus(doc, el);
            if !date_value_is_valid(&input_type, trimmed) {
                doc.set_value(el, "");
                return Err(EngineError::MalformedValue);
            }
            doc.set_value(el, trimmed);
            fire(doc, el, "input");
            fire(doc, el, "change");
            return Ok(Ready::Value(FillResult::Done));
        }
        if !TEXT_INPUT_TYPES.contains(&input_type.as_str()) {
            return Err(EngineError::CannotFillType { input_type });
        }
        if input_type == "number" && value.trim().parse::<f64>().is_err() {
            return Err(EngineError::NumberExpected);
        }
        select_all_in_control(doc, el);
        focus(doc, el);
        return Ok(Ready::Value(FillResult::NeedsInput));
    }

    if doc.tag_is(el, "textarea") {
        select_all_in_control(doc, el);
        focus(doc, el);
        return Ok(Ready::Value(FillResult::NeedsInput));
    }

    if matches!(doc.attribute(el, "contenteditable"), Some("" | "true")) {
        doc.set_range_selection(Some(RangeSelection { anchor: el }));
        focus(doc, el);
        return Ok(Ready::Value(FillResult::NeedsInput));
    }

    Err(EngineError::NotAnInput)
}

fn date_value_is_valid(input_type: &str, value: &str) -> bool {
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    fn split_n(s: &str, sep: char, n: usize) -> Option<Vec<&str>> {
        let parts: Vec<&str> = s.split(sep).collect();
        (parts.len() == n).then_some(parts)
    }
    match input_type {
        "date" => split_n(value, '-', 3)
            .is_some_and(|p| p.iter().all(|s| all_digits(s)) && p[0].len() == 4),
        "month" => split_n(value, '-', 2)
            .is_some_and(|p| p.iter().all(|s| all_digits(s)) && p[0].len() == 4),
        "week" => split_n(value, '-', 2).is_some_and(|p| {
            all_digits(p[0]) && p[0].len() == 4 && p[1].len() == 3 && p[1].starts_with('W')
        }),
        "time" => {
            let parts: Vec<&str> = value.split(':').collect();
            (2..=3).contains(&parts.len()) && parts.iter().all(|s| all_digits(s))
        }
        "datetime-local" => split_n(value, 'T', 2).is_some_and(|p| {
            date_value_is_valid("date", p[0]) && date_value_is_valid("time", p[1])
        }),
        _ => false,
    }
}

fn select_all_in_control(doc: &mut Document, el: NodeId) {
    let len = doc.value(el).chars().count();
    doc.set_selection(el, 0, len);
}

// =============================================================================
// select_options
// =============================================================================

/// One attempt of the option-selection protocol.
///
/// Returns `None` while requested options are still missing, so the
/// caller's poll can re-check on the next tick.
///
/// # Errors
///
/// The element must be a `<select>`.
pub fn try_select_options(
    doc: &mut Document,
    select: NodeId,
    specs: &[OptionSpec],
) -> EngineResult<Option<Vec<String>>> {
    if !doc.tag_is(select, "select") {
        return Err(EngineError::NotASelect);
    }
    let multiple = doc.has_attribute(select, "multiple");
    let options: Vec<NodeId> = doc
        .descendant_elements(select, false)
        .into_iter()
        .filter(|&el| doc.tag_is(el, "option"))
        .collect();

    let mut pending: Vec<&OptionSpec> = specs.iter().collect();
    let mut matched = Vec::new();
    for (position, &option) in options.iter().enumerate() {
        let Some(found) = pending
            .iter()
            .position(|spec| option_matches(doc, option, position, spec))
        else {
            continue;
        };
        pending.remove(found);
        matched.push(option);
        if !multiple {
            break;
        }
    }

    if !pending.is_empty() {
        return Ok(None);
    }

    doc.set_value(select, "");
    for &option in &options {
        doc.set_checked(option, false);
    }
    let mut values = Vec::new();
    for &option in &matched {
        doc.set_checked(option, true);
        values.push(option_value(doc, option));
    }
    if let Some(first) = matched.first() {
        let value = option_value(doc, *first);
        doc.set_value(select, value);
    }
    fire(doc, select, "input");
    fire(doc, select, "change");
    Ok(Some(values))
}

fn option_value(doc: &Document, option: NodeId) -> String {
    doc.attribute(option, "value")
        .map_or_else(|| doc.text_content(option).trim().to_string(), String::from)
}

fn option_label(doc: &Document, option: NodeId) -> String {
    doc.attribute(option, "label")
        .map_or_else(|| doc.text_content(option).trim().to_string(), String::from)
}

fn option_matches(doc: &Document, option: NodeId, position: usize, spec: &OptionSpec) -> bool {
    match spec {
        OptionSpec::Node(node) => *node == option,
        OptionSpec::Filter(filter) => {
            filter
                .value
                .as_ref()
                .is_none_or(|v| option_value(doc, option) == *v)
                && filter
                    .label
                    .as_ref()
                    .is_none_or(|l| option_label(doc, option) == *l)
                && filter.index.is_none_or(|i| i == position)
        }
    }
}

// =============================================================================
// select_text / focus
// =============================================================================

/// Select an element's text: controls get a full-range selection, other
/// elements a document range selection.
pub fn select_text(doc: &mut Document, node: NodeId) -> EngineResult<Ready<()>> {
    let el =
        retarget(doc, node, RetargetBehavior::FollowLabel).ok_or(EngineError::NotAnElement)?;
    if !doc.is_connected(el) {
        return Ok(Ready::NotConnected);
    }
    if doc.tag_is(el, "input") || doc.tag_is(el, "textarea") {
        select_all_in_control(doc, el);
        focus(doc, el);
        return Ok(Ready::Value(()));
    }
    doc.set_range_selection(Some(RangeSelection { anchor: el }));
    Ok(Ready::Value(()))
}

/// Focus a node's element.
///
/// With `reset_selection_if_not_focused`, an input that was not already
/// focused gets its selection collapsed to the start; failures on input
/// types without selection support are ignored by construction.
pub fn focus_node(
    doc: &mut Document,
    node: NodeId,
    reset_selection_if_not_focused: bool,
) -> EngineResult<Ready<()>> {
    if !doc.is_element(node) {
        return Err(EngineError::NotAnElement);
    }
    if !doc.is_connected(node) {
        return Ok(Ready::NotConnected);
    }
    let was_focused = doc.active_element() == Some(node);
    focus(doc, node);
    if reset_selection_if_not_focused && !was_focused && doc.tag_is(node, "input") {
        doc.set_selection(node, 0, 0);
    }
    Ok(Ready::Value(()))
}

fn focus(doc: &mut Document, el: NodeId) {
    let previous = doc.active_element();
    if previous == Some(el) {
        return;
    }
    if let Some(prev) = previous {
        doc.record_event(FiredEvent {
            target: prev,
            event_type: "blur".to_string(),
            family: EventFamily::Focus,
            bubbles: false,
            cancelable: false,
            composed: true,
            init: None,
        });
    }
    doc.set_active_element(Some(el));
    doc.record_event(FiredEvent {
        target: el,
        event_type: "focus".to_string(),
        family: EventFamily::Focus,
        bubbles: false,
        cancelable: false,
        composed: true,
        init: None,
    });
}

// =============================================================================
// set_input_files
// =============================================================================

/// Decode payloads and install them on a file input, then fire `input`
/// and `change`.
///
/// # Errors
///
/// The element must be an `<input type=file>`; payload buffers must be
/// valid base64.
pub fn set_input_files(
    doc: &mut Document,
    node: NodeId,
    payloads: &[FilePayload],
) -> EngineResult<Ready<()>> {
    if !doc.tag_is(node, "input") || doc.attribute(node, "type") != Some("file") {
        return Err(EngineError::NotAnInput);
    }
    if !doc.is_connected(node) {
        return Ok(Ready::NotConnected);
    }
    let mut files = Vec::with_capacity(payloads.len());
    for payload in payloads {
        let bytes =
            BASE64
                .decode(payload.buffer.as_bytes())
                .map_err(|_| EngineError::MalformedFilePayload {
                    name: payload.name.clone(),
                })?;
        files.push(InstalledFile {
            name: payload.name.clone(),
            mime_type: payload.mime_type.clone(),
            bytes,
        });
    }
    doc.set_files(node, files);
    fire(doc, node, "input");
    fire(doc, node, "change");
    Ok(Ready::Value(()))
}

// =============================================================================
// dispatch_event
// =============================================================================

/// Constructor family for an event type name.
#[must_use]
pub fn event_family(event_type: &str) -> EventFamily {
    match event_type {
        "auxclick" | "click" | "dblclick" | "mousedown" | "mouseenter" | "mouseleave"
        | "mousemove" | "mouseout" | "mouseover" | "mouseup" => EventFamily::Mouse,
        "keydown" | "keyup" | "keypress" | "textInput" => EventFamily::Keyboard,
        "touchstart" | "touchend" | "touchmove" | "touchcancel" => EventFamily::Touch,
        "pointerover" | "pointerout" | "pointerenter" | "pointerleave" | "pointerdown"
        | "pointerup" | "pointermove" | "pointercancel" | "gotpointercapture"
        | "lostpointercapture" => EventFamily::Pointer,
        "focus" | "focusin" | "focusout" | "blur" => EventFamily::Focus,
        "drag" | "dragstart" | "dragend" | "dragenter" | "dragover" | "dragleave" | "drop" => {
            EventFamily::Drag
        }
        _ => EventFamily::Generic,
    }
}

/// Dispatch an event of the right constructor family with
/// `{bubbles, cancelable, composed}` defaulting to `true` before the
/// caller's init is merged in.
pub fn dispatch_event(
    doc: &mut Document,
    node: NodeId,
    event_type: &str,
    init: Option<serde_json::Value>,
) -> EngineResult<()> {
    let read_flag = |name: &str, default: bool| {
        init.as_ref()
            .and_then(|v| v.get(name))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(default)
    };
    let event = FiredEvent {
        target: node,
        event_type: event_type.to_string(),
        family: event_family(event_type),
        bubbles: read_flag("bubbles", true),
        cancelable: read_flag("cancelable", true),
        composed: read_flag("composed", true),
        init,
    };
    doc.record_event(event);
    Ok(())
}
