//! Arena-backed document model the engine operates on.
//!
//! Nodes are indices into a flat arena. The model carries exactly what the
//! locator and action-readiness machinery observes: tree structure, shadow
//! roots, attributes, inline style, layout rects, form-control state, focus,
//! and a recorded event log standing in for real event dispatch.

pub mod style;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};

/// Handle to a node in a [`Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Arena index of this node
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Framework that annotated an element with a component tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framework {
    /// React component tree annotation
    React,
    /// Vue component tree annotation
    Vue,
}

/// Component annotation consumed by the framework selector engines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentTag {
    /// Which framework produced the annotation
    pub framework: Framework,
    /// Component name as the framework reports it
    pub name: String,
    /// Flattened component props, stringified
    pub props: BTreeMap<String, String>,
}

/// File payload as the controller ships it over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePayload {
    /// File name
    pub name: String,
    /// MIME type
    pub mime_type: String,
    /// Base64-encoded contents
    pub buffer: String,
}

/// A decoded file installed on a file input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledFile {
    /// File name
    pub name: String,
    /// MIME type
    pub mime_type: String,
    /// Decoded contents
    pub bytes: Vec<u8>,
}

/// Event constructor family used for a dispatched event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFamily {
    /// MouseEvent
    Mouse,
    /// KeyboardEvent
    Keyboard,
    /// TouchEvent
    Touch,
    /// PointerEvent
    Pointer,
    /// FocusEvent
    Focus,
    /// DragEvent
    Drag,
    /// Plain Event
    Generic,
}

/// Record of an event the engine dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct FiredEvent {
    /// Dispatch target
    pub target: NodeId,
    /// Event type string (`input`, `change`, `click`, ...)
    pub event_type: String,
    /// Constructor family
    pub family: EventFamily,
    /// Whether the event bubbles
    pub bubbles: bool,
    /// Whether the event is cancelable
    pub cancelable: bool,
    /// Whether the event crosses shadow boundaries
    pub composed: bool,
    /// Caller-supplied init payload, if any
    pub init: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub(crate) struct ElementData {
    pub(crate) tag: String,
    pub(crate) attrs: BTreeMap<String, String>,
    pub(crate) value: String,
    pub(crate) checked: bool,
    pub(crate) files: Vec<InstalledFile>,
    pub(crate) selection: Option<(usize, usize)>,
    pub(crate) rect: Rect,
    pub(crate) shadow_root: Option<NodeId>,
    pub(crate) component: Option<ComponentTag>,
}

impl ElementData {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            value: String::new(),
            checked: false,
            files: Vec::new(),
            selection: None,
            rect: Rect::ZERO,
            shadow_root: None,
            component: None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
    ShadowRoot,
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) kind: NodeKind,
}

/// Text range selected outside of form controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSelection {
    /// Element whose contents are selected
    pub anchor: NodeId,
}

/// A single document instance hosting the engine's node arena.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    active_element: Option<NodeId>,
    range_selection: Option<RangeSelection>,
    events: Vec<FiredEvent>,
    title: String,
    url: String,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        let root_node = Node {
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Document,
        };
        Self {
            nodes: vec![root_node],
            root: NodeId(0),
            active_element: None,
            range_selection: None,
            events: Vec::new(),
            title: String::new(),
            url: String::from("about:blank"),
        }
    }

    /// The document node.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Document title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Set the document title.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Document URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Set the document URL.
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    // =========================================================================
    // Construction
    // =========================================================================

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            kind,
        });
        id
    }

    /// Create a detached element. Tag names are normalized to lowercase.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeKind::Element(ElementData::new(tag)))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push_node(NodeKind::Text(text.into()))
    }

    /// Append `child` as the last child of `parent`, detaching it first if
    /// it already has a parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Detach `node` from its parent, leaving its subtree intact.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != node);
        }
    }

    /// Attach a shadow root to `host` and return it.
    ///
    /// # Panics
    ///
    /// Panics if `host` is not an element or already hosts a shadow root.
    pub fn attach_shadow(&mut self, host: NodeId) -> NodeId {
        let shadow = self.push_node(NodeKind::ShadowRoot);
        self.nodes[shadow.0].parent = Some(host);
        let NodeKind::Element(data) = &mut self.nodes[host.0].kind else {
            panic!("shadow host must be an element");
        };
        assert!(data.shadow_root.is_none(), "host already has a shadow root");
        data.shadow_root = Some(shadow);
        shadow
    }

    /// Convenience: create an element, set attributes, and append it.
    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let el = self.create_element(tag);
        for (name, value) in attrs {
            self.set_attribute(el, name, value);
        }
        self.append_child(parent, el);
        el
    }

    /// Convenience: append a text node.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let t = self.create_text(text);
        self.append_child(parent, t);
        t
    }

    // =========================================================================
    // Node classification and traversal
    // =========================================================================

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    /// Whether `node` is an element.
    #[must_use]
    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(self.nodes[node.0].kind, NodeKind::Element(_))
    }

    /// Whether `node` is a text node.
    #[must_use]
    pub fn is_text(&self, node: NodeId) -> bool {
        matches!(self.nodes[node.0].kind, NodeKind::Text(_))
    }

    /// Whether `node` is a shadow root.
    #[must_use]
    pub fn is_shadow_root(&self, node: NodeId) -> bool {
        matches!(self.nodes[node.0].kind, NodeKind::ShadowRoot)
    }

    /// Lowercase tag name of an element, empty for non-elements.
    #[must_use]
    pub fn tag(&self, node: NodeId) -> &str {
        self.element(node).map_or("", |data| data.tag.as_str())
    }

    /// Whether `node` is an element with the given (lowercase) tag.
    #[must_use]
    pub fn tag_is(&self, node: NodeId, tag: &str) -> bool {
        self.element(node)
            .is_some_and(|data| data.tag.eq_ignore_ascii_case(tag))
    }

    /// Raw parent: element, shadow root or document.
    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    /// Parent element, stopping at shadow-root and document boundaries.
    #[must_use]
    pub fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes[node.0].parent?;
        self.is_element(parent).then_some(parent)
    }

    /// Parent element, crossing a shadow boundary to the host element.
    #[must_use]
    pub fn parent_element_or_shadow_host(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes[node.0].parent?;
        match &self.nodes[parent.0].kind {
            NodeKind::Element(_) => Some(parent),
            NodeKind::ShadowRoot => self.nodes[parent.0].parent,
            _ => None,
        }
    }

    /// Children of `node` in tree order.
    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Element children of `node` in tree order.
    #[must_use]
    pub fn child_elements(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes[node.0]
            .children
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
            .collect()
    }

    /// Shadow root attached to `host`, if any.
    #[must_use]
    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.element(host).and_then(|data| data.shadow_root)
    }

    /// Whether `node` is reachable from the document node.
    #[must_use]
    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if current == self.root {
                return true;
            }
            match self.nodes[current.0].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Descendant elements of `root` in pre-order, excluding `root` itself.
    /// With `pierce`, shadow subtrees are visited right after their host.
    #[must_use]
    pub fn descendant_elements(&self, root: NodeId, pierce: bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_descendants(root, pierce, &mut out);
        out
    }

    fn collect_descendants(&self, node: NodeId, pierce: bool, out: &mut Vec<NodeId>) {
        if pierce {
            if let Some(shadow) = self.shadow_root(node) {
                self.collect_descendants(shadow, pierce, out);
            }
        }
        for &child in &self.nodes[node.0].children {
            if self.is_element(child) {
                out.push(child);
                self.collect_descendants(child, pierce, out);
            }
        }
    }

    /// Whether `ancestor` contains `node` (inclusive), staying inside one
    /// shadow tree.
    #[must_use]
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes[id.0].parent;
        }
        false
    }

    // =========================================================================
    // Attributes and element state
    // =========================================================================

    /// Attribute value, if present.
    #[must_use]
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)
            .and_then(|data| data.attrs.get(name).map(String::as_str))
    }

    /// Whether the attribute is present.
    #[must_use]
    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.element(node).is_some_and(|data| data.attrs.contains_key(name))
    }

    /// Set an attribute. Setting `value` also refreshes the control value
    /// the way attribute parsing does on first load.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(data) = self.element_mut(node) {
            data.attrs.insert(name.to_string(), value.to_string());
            match name {
                "value" => data.value = value.to_string(),
                "checked" => data.checked = true,
                _ => {}
            }
        }
    }

    /// Remove an attribute.
    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let Some(data) = self.element_mut(node) {
            data.attrs.remove(name);
        }
    }

    /// Attribute names and values in map order.
    #[must_use]
    pub fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        self.element(node)
            .map(|data| {
                data.attrs
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether the element's class list contains `class_name`.
    #[must_use]
    pub fn has_class(&self, node: NodeId, class_name: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class_name))
    }

    /// Current control value.
    #[must_use]
    pub fn value(&self, node: NodeId) -> &str {
        self.element(node).map_or("", |data| data.value.as_str())
    }

    /// Set the control value.
    pub fn set_value(&mut self, node: NodeId, value: impl Into<String>) {
        if let Some(data) = self.element_mut(node) {
            data.value = value.into();
        }
    }

    /// Current checkedness.
    #[must_use]
    pub fn checked(&self, node: NodeId) -> bool {
        self.element(node).is_some_and(|data| data.checked)
    }

    /// Set checkedness.
    pub fn set_checked(&mut self, node: NodeId, checked: bool) {
        if let Some(data) = self.element_mut(node) {
            data.checked = checked;
        }
    }

    /// Files installed on a file input.
    #[must_use]
    pub fn files(&self, node: NodeId) -> &[InstalledFile] {
        self.element(node).map_or(&[], |data| data.files.as_slice())
    }

    pub(crate) fn set_files(&mut self, node: NodeId, files: Vec<InstalledFile>) {
        if let Some(data) = self.element_mut(node) {
            data.files = files;
        }
    }

    /// Text selection range of a control.
    #[must_use]
    pub fn selection(&self, node: NodeId) -> Option<(usize, usize)> {
        self.element(node).and_then(|data| data.selection)
    }

    /// Set the text selection range of a control.
    pub fn set_selection(&mut self, node: NodeId, start: usize, end: usize) {
        if let Some(data) = self.element_mut(node) {
            data.selection = Some((start, end));
        }
    }

    /// Document-level range selection (non-control `select_text`).
    #[must_use]
    pub const fn range_selection(&self) -> Option<RangeSelection> {
        self.range_selection
    }

    pub(crate) fn set_range_selection(&mut self, selection: Option<RangeSelection>) {
        self.range_selection = selection;
    }

    /// Layout rect of an element.
    #[must_use]
    pub fn rect(&self, node: NodeId) -> Rect {
        self.element(node).map_or(Rect::ZERO, |data| data.rect)
    }

    /// Set the layout rect of an element.
    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        if let Some(data) = self.element_mut(node) {
            data.rect = rect;
        }
    }

    /// Component annotation of an element.
    #[must_use]
    pub fn component(&self, node: NodeId) -> Option<&ComponentTag> {
        self.element(node).and_then(|data| data.component.as_ref())
    }

    /// Annotate an element with a framework component tag.
    pub fn set_component(
        &mut self,
        node: NodeId,
        framework: Framework,
        name: &str,
        props: &[(&str, &str)],
    ) {
        if let Some(data) = self.element_mut(node) {
            data.component = Some(ComponentTag {
                framework,
                name: name.to_string(),
                props: props
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            });
        }
    }

    // =========================================================================
    // Focus and events
    // =========================================================================

    /// The currently focused element.
    #[must_use]
    pub const fn active_element(&self) -> Option<NodeId> {
        self.active_element
    }

    pub(crate) fn set_active_element(&mut self, node: Option<NodeId>) {
        self.active_element = node;
    }

    /// Record a dispatched event.
    pub(crate) fn record_event(&mut self, event: FiredEvent) {
        self.events.push(event);
    }

    /// Events dispatched so far, oldest first.
    #[must_use]
    pub fn events(&self) -> &[FiredEvent] {
        &self.events
    }

    /// Drop the recorded event log.
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    // =========================================================================
    // Text extraction
    // =========================================================================

    /// Concatenated text of all text nodes under `node` (light tree only).
    #[must_use]
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].kind {
            NodeKind::Text(text) => out.push_str(text),
            _ => {
                for &child in &self.nodes[node.0].children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Rendered-text approximation: skips invisible subtrees and collapses
    /// whitespace runs.
    #[must_use]
    pub fn inner_text(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_inner_text(node, &mut out);
        let collapsed: Vec<&str> = out.split_whitespace().collect();
        collapsed.join(" ")
    }

    fn collect_inner_text(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element(_) => {
                if style::display_none(self, node) {
                    return;
                }
                for &child in &self.nodes[node.0].children {
                    self.collect_inner_text(child, out);
                }
            }
            _ => {
                for &child in &self.nodes[node.0].children {
                    self.collect_inner_text(child, out);
                }
            }
        }
    }

    // =========================================================================
    // Lookup helpers
    // =========================================================================

    /// First connected element with the given id attribute.
    #[must_use]
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendant_elements(self.root, true)
            .into_iter()
            .find(|&el| self.attribute(el, "id") == Some(id))
    }

    /// Top-most visible element at `point` within one tree scope (the
    /// document or a single shadow root). Shadow hosts win over their
    /// shadow content here; callers descend explicitly.
    #[must_use]
    pub fn element_from_point(&self, scope: NodeId, point: Point) -> Option<NodeId> {
        let candidates = self.descendant_elements_light(scope);
        candidates
            .into_iter()
            .rev()
            .find(|&el| style::is_visible(self, el) && self.rect(el).contains(point))
    }

    fn descendant_elements_light(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_descendants(scope, false, &mut out);
        out
    }
}
