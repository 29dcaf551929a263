//! Apuntar: element locator and action-readiness engine for
//! deterministic UI automation.
//!
//! Apuntar (Spanish: "to aim / point at") is the document-side core of a
//! remote automation stack: it resolves compound selectors to concrete
//! elements, waits until an element reaches a requested interaction
//! state, executes actions atomically with that readiness check, and
//! evaluates assertion expressions.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      APUNTAR Architecture                    │
//! ├──────────────────────────────────────────────────────────────┤
//! │  selector string ──► parser ──► engine registry ──► elements │
//! │        options   ──► readiness poll ──► gated action         │
//! │     assertions   ──► expect table ──► pass / received        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The [`Page`] facade owns one document and exposes the controller
//! entry points; everything underneath is deterministic and drivable by
//! a scripted tick source in tests.

#![warn(missing_docs)]

mod actions;
mod expect;
mod hit;
mod page;
mod preview;
mod state;

/// Arena document model the engine operates on.
pub mod dom;
/// Geometry primitives.
pub mod geometry;
/// Cooperative poll runtime.
pub mod poll;
/// Result and error types.
pub mod result;
/// Selector parsing, engines and evaluation.
pub mod selector;

pub use actions::{event_family, FillResult, OptionFilter, OptionSpec, Ready};
pub use dom::{
    Document, EventFamily, FilePayload, FiredEvent, Framework, InstalledFile, NodeId,
};
pub use expect::{
    deep_equals, element_property, expect_check, ExpectCheck, ExpectParams, ExpectedText,
    ExpectedTextMatcher, PropValue,
};
pub use geometry::{Point, Rect};
pub use hit::{check_hit_target_at, deep_element_from_point, HitCheck, HitTargetResult};
pub use page::{Page, StatesReport};
pub use poll::{
    Cadence, CancelHandle, Poll, PollOutcome, Progress, ScriptedTicks, Step, TickSource,
    WallClockTicks,
};
pub use preview::{preview_node, strict_violation_message, suggested_selector};
pub use result::{EngineError, EngineResult};
pub use selector::{
    parse_selector, query_selector, query_selector_all, EngineRegistry, ParsedSelector,
    SelectorEngine, SelectorPart, Settings,
};
pub use state::{
    element_state, label_control, retarget, ElementState, RetargetBehavior, StabilityTracker,
    StateProbe,
};
