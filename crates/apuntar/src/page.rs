//! The controller-facing facade.
//!
//! A [`Page`] owns one document, the selector-engine registry and the
//! engine settings, and exposes the operations the controller invokes:
//! selector resolution, state probes, gated actions wrapped in polls,
//! event dispatch and assertions.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use tracing::debug;

use crate::actions::{
    dispatch_event, select_text, set_input_files, try_fill, try_select_options, FillResult,
    OptionSpec, Ready,
};
use crate::dom::{Document, FilePayload, NodeId};
use crate::expect::{expect_check, ExpectCheck, ExpectParams};
use crate::geometry::Point;
use crate::hit::{check_hit_target_at, HitTargetResult};
use crate::poll::{Cadence, Poll, Progress, Step, TickSource, WallClockTicks};
use crate::result::{EngineError, EngineResult};
use crate::selector::{
    parse_selector, query_selector, query_selector_all, EngineRegistry, ParsedSelector,
    SelectorEngine, Settings,
};
use crate::state::{element_state, retarget, ElementState, RetargetBehavior, StabilityTracker,
    StateProbe};

/// Result of a multi-state readiness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatesReport {
    /// Every requested state holds
    Ready,
    /// The first state that does not hold
    Unmet(ElementState),
    /// The element vanished between lookup and the probe
    NotConnected,
    /// A checked-probe hit something that is not a checkbox or radio
    NotCheckbox,
}

/// A document plus the machinery to locate elements in it and gate
/// actions against it.
pub struct Page {
    doc: Rc<RefCell<Document>>,
    registry: Rc<RefCell<EngineRegistry>>,
    settings: Settings,
    ticks: Rc<RefCell<dyn TickSource>>,
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Page {
    /// Page with an empty document and a wall-clock tick source.
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            doc: Rc::new(RefCell::new(Document::new())),
            registry: Rc::new(RefCell::new(EngineRegistry::with_builtins())),
            settings,
            ticks: Rc::new(RefCell::new(WallClockTicks)),
        }
    }

    /// Replace the tick source (scripted frames under test).
    #[must_use]
    pub fn with_tick_source(mut self, ticks: Rc<RefCell<dyn TickSource>>) -> Self {
        self.ticks = ticks;
        self
    }

    /// Engine settings.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Immutable view of the document.
    #[must_use]
    pub fn document(&self) -> Ref<'_, Document> {
        self.doc.borrow()
    }

    /// Mutable view of the document (test/page construction).
    #[must_use]
    pub fn document_mut(&self) -> RefMut<'_, Document> {
        self.doc.borrow_mut()
    }

    /// Shared handle to the document for tick hooks.
    #[must_use]
    pub fn document_handle(&self) -> Rc<RefCell<Document>> {
        Rc::clone(&self.doc)
    }

    // =========================================================================
    // Selectors
    // =========================================================================

    /// Parse a chained selector against the registered engines.
    ///
    /// # Errors
    ///
    /// See [`parse_selector`].
    pub fn parse_selector(&self, input: &str) -> EngineResult<ParsedSelector> {
        parse_selector(&self.registry.borrow(), input)
    }

    /// Register a caller-authored selector engine under a new name.
    ///
    /// # Errors
    ///
    /// Fails when the name is already taken.
    pub fn extend(&self, name: &str, engine: Rc<dyn SelectorEngine>) -> EngineResult<()> {
        self.registry.borrow_mut().register(name, engine)
    }

    /// Resolve a selector to at most one element, from the document root.
    ///
    /// # Errors
    ///
    /// Strict mode fails when more than one distinct element matches.
    pub fn query_selector(&self, selector: &str, strict: bool) -> EngineResult<Option<NodeId>> {
        let parsed = self.parse_selector(selector)?;
        let doc = self.doc.borrow();
        query_selector(&doc, &self.registry.borrow(), &parsed, doc.root(), strict)
    }

    /// Resolve a selector to all matching elements.
    ///
    /// # Errors
    ///
    /// Propagates selector parse and engine-body errors.
    pub fn query_selector_all(&self, selector: &str) -> EngineResult<Vec<NodeId>> {
        let parsed = self.parse_selector(selector)?;
        let doc = self.doc.borrow();
        query_selector_all(&doc, &self.registry.borrow(), &parsed, doc.root())
    }

    // =========================================================================
    // States
    // =========================================================================

    /// Probe an element state. The `stable` state runs a stability poll
    /// to completion; all others answer synchronously.
    ///
    /// # Errors
    ///
    /// See [`element_state`]; a failing stability poll surfaces as
    /// [`EngineError::PollFailed`].
    pub fn element_state(&self, node: NodeId, state: ElementState) -> EngineResult<StateProbe> {
        if state == ElementState::Stable {
            let mut poll = self.wait_for_element_states_and_perform_action(
                node,
                vec![ElementState::Stable],
                false,
                |_, _| Ok(Step::Done(Ready::Value(()))),
            );
            return match poll.run() {
                crate::poll::PollOutcome::Done(Ready::Value(())) => Ok(StateProbe::Holds(true)),
                crate::poll::PollOutcome::Done(Ready::NotConnected)
                | crate::poll::PollOutcome::Cancelled => Ok(StateProbe::NotConnected),
                crate::poll::PollOutcome::Failed(message) => {
                    Err(EngineError::PollFailed { message })
                }
            };
        }
        element_state(&self.doc.borrow(), node, state)
    }

    /// Probe several states at once, reporting the first unmet one.
    ///
    /// # Errors
    ///
    /// Propagates [`EngineError::NotAnElement`]; a checked-probe on the
    /// wrong element kind is reported as [`StatesReport::NotCheckbox`],
    /// not an error.
    pub fn check_element_states(
        &self,
        node: NodeId,
        states: &[ElementState],
    ) -> EngineResult<StatesReport> {
        let doc = self.doc.borrow();
        for &state in states {
            if state == ElementState::Stable {
                continue;
            }
            match element_state(&doc, node, state) {
                Ok(StateProbe::Holds(true)) => {}
                Ok(StateProbe::Holds(false)) => return Ok(StatesReport::Unmet(state)),
                Ok(StateProbe::NotConnected) => return Ok(StatesReport::NotConnected),
                Err(EngineError::NotACheckbox) => return Ok(StatesReport::NotCheckbox),
                Err(other) => return Err(other),
            }
        }
        Ok(StatesReport::Ready)
    }

    // =========================================================================
    // Gated actions
    // =========================================================================

    fn cadence(&self, cadence: Cadence) -> Cadence {
        cadence.resolve(&self.settings)
    }

    /// Wrap an action in the readiness loop: each tick re-checks the
    /// requested states (all skipped under `force`), then invokes the
    /// callback, which may itself request another tick or report that
    /// the element vanished mid-flight.
    pub fn wait_for_element_states_and_perform_action<T, F>(
        &self,
        node: NodeId,
        states: Vec<ElementState>,
        force: bool,
        mut callback: F,
    ) -> Poll<Ready<T>>
    where
        T: Clone + 'static,
        F: FnMut(&mut Document, &mut Progress) -> EngineResult<Step<Ready<T>>> + 'static,
    {
        let doc = Rc::clone(&self.doc);
        let mut tracker = StabilityTracker::new(self.settings.stable_frames);
        let mut announced = false;
        debug!(?states, force, "waitForElementStatesAndPerformAction");

        let predicate = move |progress: &mut Progress| -> EngineResult<Step<Ready<T>>> {
            {
                let doc = doc.borrow();
                if !announced && !states.is_empty() {
                    let joined: Vec<String> = states.iter().map(ToString::to_string).collect();
                    progress.log(format!("waiting for element to be {}", joined.join(" and ")));
                    announced = true;
                }
                if !force {
                    for &state in &states {
                        if state == ElementState::Stable {
                            let element = retarget(&doc, node, RetargetBehavior::NoFollowLabel)
                                .ok_or(EngineError::NotAnElement)?;
                            if !doc.is_connected(element) {
                                return Ok(Step::Done(Ready::NotConnected));
                            }
                            let stable = tracker.observe(progress.now(), doc.rect(element));
                            if !stable {
                                progress.log_repeating("  element is not stable - waiting...");
                                return Ok(Step::Continue);
                            }
                        } else {
                            match element_state(&doc, node, state)? {
                                StateProbe::NotConnected => {
                                    return Ok(Step::Done(Ready::NotConnected))
                                }
                                StateProbe::Holds(false) => {
                                    progress.log_repeating(format!(
                                        "  element is not {state} - waiting..."
                                    ));
                                    return Ok(Step::Continue);
                                }
                                StateProbe::Holds(true) => {}
                            }
                        }
                    }
                }
            }
            let mut doc = doc.borrow_mut();
            callback(&mut doc, progress)
        };

        Poll::new(self.cadence(Cadence::Frame), Rc::clone(&self.ticks), predicate)
    }

    /// The fill protocol behind a visible/enabled/editable gate.
    #[must_use]
    pub fn fill(&self, node: NodeId, value: &str) -> Poll<Ready<FillResult>> {
        let value = value.to_string();
        let target = retarget(&self.doc.borrow(), node, RetargetBehavior::FollowLabel);
        self.wait_for_element_states_and_perform_action(
            node,
            vec![
                ElementState::Visible,
                ElementState::Enabled,
                ElementState::Editable,
            ],
            false,
            move |doc, _progress| {
                let el = target.ok_or(EngineError::NotAnElement)?;
                try_fill(doc, el, &value).map(Step::Done)
            },
        )
    }

    /// Option selection behind a visible/enabled gate; re-polls while
    /// requested options are missing.
    #[must_use]
    pub fn select_options(&self, node: NodeId, specs: Vec<OptionSpec>) -> Poll<Ready<Vec<String>>> {
        let target = retarget(&self.doc.borrow(), node, RetargetBehavior::FollowLabel);
        self.wait_for_element_states_and_perform_action(
            node,
            vec![ElementState::Visible, ElementState::Enabled],
            false,
            move |doc, progress| {
                let el = target.ok_or(EngineError::NotAnElement)?;
                if !doc.is_connected(el) {
                    return Ok(Step::Done(Ready::NotConnected));
                }
                match try_select_options(doc, el, &specs)? {
                    Some(values) => Ok(Step::Done(Ready::Value(values))),
                    None => {
                        progress.log_repeating("  did not find some options - waiting...");
                        Ok(Step::Continue)
                    }
                }
            },
        )
    }

    /// Select an element's text.
    ///
    /// # Errors
    ///
    /// See [`select_text`].
    pub fn select_text(&self, node: NodeId) -> EngineResult<Ready<()>> {
        select_text(&mut self.doc.borrow_mut(), node)
    }

    /// Focus an element, optionally collapsing an input's selection.
    ///
    /// # Errors
    ///
    /// See [`crate::actions::focus_node`].
    pub fn focus_node(
        &self,
        node: NodeId,
        reset_selection_if_not_focused: bool,
    ) -> EngineResult<Ready<()>> {
        crate::actions::focus_node(
            &mut self.doc.borrow_mut(),
            node,
            reset_selection_if_not_focused,
        )
    }

    /// Install decoded file payloads on a file input.
    ///
    /// # Errors
    ///
    /// See [`set_input_files`].
    pub fn set_input_files(
        &self,
        node: NodeId,
        payloads: &[FilePayload],
    ) -> EngineResult<Ready<()>> {
        set_input_files(&mut self.doc.borrow_mut(), node, payloads)
    }

    /// Verify that a point actually hits the target element.
    ///
    /// # Errors
    ///
    /// See [`check_hit_target_at`].
    pub fn check_hit_target_at(&self, node: NodeId, point: Point) -> EngineResult<HitTargetResult> {
        check_hit_target_at(&self.doc.borrow(), node, point)
    }

    /// Dispatch an event on a node.
    ///
    /// # Errors
    ///
    /// See [`dispatch_event`].
    pub fn dispatch_event(
        &self,
        node: NodeId,
        event_type: &str,
        init: Option<serde_json::Value>,
    ) -> EngineResult<()> {
        dispatch_event(&mut self.doc.borrow_mut(), node, event_type, init)
    }

    // =========================================================================
    // Assertions
    // =========================================================================

    fn resolve_for_expect(
        &self,
        parsed: &ParsedSelector,
        params: &ExpectParams,
    ) -> EngineResult<Vec<NodeId>> {
        let doc = self.doc.borrow();
        let registry = self.registry.borrow();
        if params.expression == "to.have.count" || params.expression.ends_with(".array") {
            query_selector_all(&doc, &registry, parsed, doc.root())
        } else {
            Ok(query_selector(&doc, &registry, parsed, doc.root(), true)?
                .into_iter()
                .collect())
        }
    }

    /// Evaluate an assertion once.
    ///
    /// # Errors
    ///
    /// Unknown expressions, selector errors and strict violations.
    pub fn expect_now(&self, selector: &str, params: &ExpectParams) -> EngineResult<ExpectCheck> {
        let parsed = self.parse_selector(selector)?;
        let elements = self.resolve_for_expect(&parsed, params)?;
        expect_check(&self.doc.borrow(), &elements, params)
    }

    /// Poll an assertion until it is satisfied, publishing the received
    /// value through the progress object while it is not.
    ///
    /// # Errors
    ///
    /// Selector parse errors surface immediately; evaluation errors fail
    /// the poll.
    pub fn expect(&self, selector: &str, params: ExpectParams) -> EngineResult<Poll<ExpectCheck>> {
        let parsed = self.parse_selector(selector)?;
        let doc = Rc::clone(&self.doc);
        let registry = Rc::clone(&self.registry);

        let predicate = move |progress: &mut Progress| -> EngineResult<Step<ExpectCheck>> {
            let doc = doc.borrow();
            let registry = registry.borrow();
            let elements = if params.expression == "to.have.count"
                || params.expression.ends_with(".array")
            {
                query_selector_all(&doc, &registry, &parsed, doc.root())?
            } else {
                query_selector(&doc, &registry, &parsed, doc.root(), true)?
                    .into_iter()
                    .collect()
            };
            let check = expect_check(&doc, &elements, &params)?;
            if check.pass {
                return Ok(Step::Done(check));
            }
            if let Some(received) = &check.received {
                progress.set_intermediate_result(received.clone());
                let rendered = match received {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                progress.log_repeating(format!("  unexpected value \"{rendered}\""));
            }
            Ok(Step::Continue)
        };

        Ok(Poll::new(
            self.cadence(Cadence::Frame),
            Rc::clone(&self.ticks),
            predicate,
        ))
    }
}
