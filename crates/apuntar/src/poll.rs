//! Cancellable cooperative poll runtime.
//!
//! A [`Poll`] repeatedly invokes a predicate until it yields a value,
//! fails, or the poll is cancelled. Between ticks, control returns to a
//! [`TickSource`] that models the host's animation-frame or timer
//! cadence; a scripted source makes every timing-sensitive behavior
//! deterministic under test. Predicates communicate through the typed
//! [`Step`] sum instead of an in-band sentinel, so no user value can
//! collide with "keep polling".

use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::result::EngineResult;
use crate::selector::engines::Settings;

/// What a predicate decided on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<T> {
    /// Schedule another tick
    Continue,
    /// Fulfil the poll with this value
    Done(T),
}

/// Terminal state of a poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    /// The predicate produced a value
    Done(T),
    /// The predicate failed; the message was appended to the logs
    Failed(String),
    /// The poll was cancelled; it neither fulfilled nor failed
    Cancelled,
}

impl<T> PollOutcome<T> {
    /// The fulfilled value, if any.
    pub fn into_done(self) -> Option<T> {
        match self {
            Self::Done(value) => Some(value),
            _ => None,
        }
    }

    /// Whether the poll was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Tick cadence requested for a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Animation-frame cadence
    Frame,
    /// Fixed-rate timer
    Interval(Duration),
    /// 100 ms, 250 ms, 500 ms, then 1000 ms
    LogScale,
}

impl Cadence {
    const LOG_SCALE_MS: [u64; 3] = [100, 250, 500];

    /// Delay before the given tick index.
    #[must_use]
    pub fn delay(&self, tick: usize) -> Duration {
        match self {
            Self::Frame => Settings::FRAME_INTERVAL,
            Self::Interval(interval) => *interval,
            Self::LogScale => Self::LOG_SCALE_MS
                .get(tick)
                .map_or(Duration::from_millis(1000), |&ms| Duration::from_millis(ms)),
        }
    }

    /// Apply the frame-replacement setting: animation frames become a
    /// 16 ms timer when the flag is set.
    #[must_use]
    pub fn resolve(self, settings: &Settings) -> Self {
        match self {
            Self::Frame if settings.replace_frames_with_timer => {
                Self::Interval(Settings::FRAME_INTERVAL)
            }
            other => other,
        }
    }
}

/// Supplies the time elapsed across each scheduled gap between ticks.
pub trait TickSource {
    /// Advance past one scheduled gap; returns the elapsed duration.
    fn advance(&mut self, requested: Duration, tick: usize) -> Duration;
}

/// Real-time source: sleeps for the requested delay.
#[derive(Debug, Default)]
pub struct WallClockTicks;

impl TickSource for WallClockTicks {
    fn advance(&mut self, requested: Duration, _tick: usize) -> Duration {
        let start = Instant::now();
        std::thread::sleep(requested);
        start.elapsed()
    }
}

/// Deterministic source for tests: scripted per-frame durations and an
/// optional per-frame hook for mid-flight document mutation or
/// cancellation. Frames past the script report 16 ms.
pub struct ScriptedTicks {
    frames: Vec<Duration>,
    cursor: usize,
    taken: usize,
    hook: Option<Box<dyn FnMut(usize)>>,
}

impl std::fmt::Debug for ScriptedTicks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedTicks")
            .field("frames", &self.frames)
            .field("cursor", &self.cursor)
            .field("taken", &self.taken)
            .finish_non_exhaustive()
    }
}

impl ScriptedTicks {
    /// Source with explicit per-frame durations.
    #[must_use]
    pub fn new(frames: Vec<Duration>) -> Self {
        Self {
            frames,
            cursor: 0,
            taken: 0,
            hook: None,
        }
    }

    /// Source where every frame takes 16 ms.
    #[must_use]
    pub fn frames() -> Self {
        Self::new(Vec::new())
    }

    /// Install a per-frame hook, called with the frame index after time
    /// advances.
    #[must_use]
    pub fn with_hook(mut self, hook: impl FnMut(usize) + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Replace the per-frame hook on an already-shared source.
    pub fn set_hook(&mut self, hook: impl FnMut(usize) + 'static) {
        self.hook = Some(Box::new(hook));
    }

    /// How many gaps have been scheduled so far.
    #[must_use]
    pub const fn ticks_taken(&self) -> usize {
        self.taken
    }
}

impl TickSource for ScriptedTicks {
    fn advance(&mut self, _requested: Duration, tick: usize) -> Duration {
        let elapsed = self
            .frames
            .get(self.cursor)
            .copied()
            .unwrap_or(Settings::FRAME_INTERVAL);
        self.cursor += 1;
        self.taken += 1;
        if let Some(hook) = &mut self.hook {
            hook(tick);
        }
        elapsed
    }
}

/// Cancels a running poll from outside the predicate.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    aborted: Rc<Cell<bool>>,
}

impl CancelHandle {
    /// Request cancellation; the next scheduled tick stops silently.
    pub fn cancel(&self) {
        self.aborted.set(true);
    }
}

/// Per-task progress state: abort flag, monotonic task time, and the log
/// buffer the controller drains.
#[derive(Debug)]
pub struct Progress {
    aborted: Rc<Cell<bool>>,
    now: Duration,
    logs: Vec<String>,
    cursor: usize,
    last_log: Option<String>,
    intermediate: Option<serde_json::Value>,
}

impl Progress {
    fn new(aborted: Rc<Cell<bool>>) -> Self {
        Self {
            aborted,
            now: Duration::ZERO,
            logs: Vec::new(),
            cursor: 0,
            last_log: None,
            intermediate: None,
        }
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn aborted(&self) -> bool {
        self.aborted.get()
    }

    /// Monotonic task time, advanced by the tick source.
    #[must_use]
    pub const fn now(&self) -> Duration {
        self.now
    }

    /// Append a log entry.
    pub fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.last_log = Some(message.clone());
        self.logs.push(message);
    }

    /// Append a log entry unless it repeats the previous one.
    pub fn log_repeating(&mut self, message: impl Into<String>) {
        let message = message.into();
        if self.last_log.as_deref() != Some(message.as_str()) {
            self.log(message);
        }
    }

    /// Publish the current received value of a pending assertion,
    /// suppressing unchanged values.
    pub fn set_intermediate_result(&mut self, value: serde_json::Value) {
        if self.intermediate.as_ref() != Some(&value) {
            self.intermediate = Some(value);
        }
    }

    /// Last published intermediate value.
    #[must_use]
    pub const fn intermediate_result(&self) -> Option<&serde_json::Value> {
        self.intermediate.as_ref()
    }

    fn pending_logs(&self) -> bool {
        self.cursor < self.logs.len()
    }

    fn drain(&mut self) -> Vec<String> {
        let drained = self.logs[self.cursor..].to_vec();
        self.cursor = self.logs.len();
        drained
    }
}

/// A cancellable cooperative task.
///
/// `run` pumps ticks to completion. `take_next_logs` pumps until a new
/// entry arrives or the task finishes, then drains; `take_last_logs`
/// drains without pumping. After completion both return immediately.
pub struct Poll<T> {
    predicate: Box<dyn FnMut(&mut Progress) -> EngineResult<Step<T>>>,
    progress: Progress,
    cadence: Cadence,
    ticks: Rc<RefCell<dyn TickSource>>,
    tick_index: usize,
    outcome: Option<PollOutcome<T>>,
}

impl<T> std::fmt::Debug for Poll<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poll")
            .field("cadence", &self.cadence)
            .field("tick_index", &self.tick_index)
            .field("finished", &self.outcome.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: Clone> Poll<T> {
    /// Build a poll over the given cadence and tick source.
    pub fn new(
        cadence: Cadence,
        ticks: Rc<RefCell<dyn TickSource>>,
        predicate: impl FnMut(&mut Progress) -> EngineResult<Step<T>> + 'static,
    ) -> Self {
        let aborted = Rc::new(Cell::new(false));
        Self {
            predicate: Box::new(predicate),
            progress: Progress::new(aborted),
            cadence,
            ticks,
            tick_index: 0,
            outcome: None,
        }
    }

    /// Handle for cancelling this poll from tick hooks or the controller.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            aborted: Rc::clone(&self.progress.aborted),
        }
    }

    /// Request cancellation directly.
    pub fn cancel(&mut self) {
        self.progress.aborted.set(true);
    }

    /// Whether the poll reached a terminal state.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Progress state, including the published intermediate value.
    #[must_use]
    pub const fn progress(&self) -> &Progress {
        &self.progress
    }

    fn step(&mut self) {
        if self.outcome.is_some() {
            return;
        }
        if self.progress.aborted() {
            trace!("poll cancelled");
            self.outcome = Some(PollOutcome::Cancelled);
            return;
        }
        match (self.predicate)(&mut self.progress) {
            Ok(Step::Done(value)) => {
                trace!(ticks = self.tick_index, "poll fulfilled");
                self.outcome = Some(PollOutcome::Done(value));
            }
            Ok(Step::Continue) => {
                let requested = self.cadence.delay(self.tick_index);
                let elapsed = self
                    .ticks
                    .borrow_mut()
                    .advance(requested, self.tick_index);
                self.progress.now += elapsed;
                self.tick_index += 1;
            }
            Err(error) => {
                self.progress.log(format!("  {error}"));
                self.outcome = Some(PollOutcome::Failed(error.to_string()));
            }
        }
    }

    /// Pump ticks until the poll reaches a terminal state.
    pub fn run(&mut self) -> PollOutcome<T> {
        while self.outcome.is_none() {
            self.step();
        }
        self.outcome.clone().unwrap_or(PollOutcome::Cancelled)
    }

    /// Drain new log entries, pumping until one arrives or the task
    /// finishes. After completion, returns the remaining buffer
    /// immediately (possibly empty).
    pub fn take_next_logs(&mut self) -> Vec<String> {
        loop {
            if self.progress.pending_logs() || self.outcome.is_some() {
                return self.progress.drain();
            }
            self.step();
        }
    }

    /// Drain whatever is buffered without pumping.
    pub fn take_last_logs(&mut self) -> Vec<String> {
        self.progress.drain()
    }
}
