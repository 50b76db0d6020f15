use std::collections::BTreeMap;

use super::TimeWindow;

/// Per-window trigger state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPhase {
    /// Accumulating; not yet evaluated.
    Pending,
    /// Evaluated at least once.
    Fired,
    /// Cleared. Terminal; the window is no longer tracked.
    Expired,
}

/// Outcome of routing an element to a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementDecision {
    Accept,
    /// Accepted after the window's firing point already passed; fire again now.
    AcceptAndFire,
    DropLate,
}

/// Work emitted by a watermark advance, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAction {
    Fire(TimeWindow),
    Expire(TimeWindow),
}

/// Event-time state machine for the windows of one key.
///
/// A window fires at the first watermark `>= end` and expires at the first
/// watermark `>= cleanup_time` where
/// `cleanup_time = max(end, max_timestamp + allowed_lateness)`.
/// Never mutates state; callers turn the returned actions into
/// `process`/`clear` invocations.
#[derive(Debug, Clone)]
pub struct WindowLifecycle {
    allowed_lateness: i64,
    watermark: i64,
    windows: BTreeMap<TimeWindow, WindowPhase>,
}

impl WindowLifecycle {
    pub fn new(allowed_lateness: i64) -> Self {
        Self {
            allowed_lateness: allowed_lateness.max(0),
            watermark: i64::MIN,
            windows: BTreeMap::new(),
        }
    }

    pub fn watermark(&self) -> i64 {
        self.watermark
    }

    pub fn cleanup_time(&self, window: &TimeWindow) -> i64 {
        window
            .max_timestamp()
            .saturating_add(self.allowed_lateness)
            .max(window.end)
    }

    pub fn is_late(&self, window: &TimeWindow) -> bool {
        self.watermark >= self.cleanup_time(window)
    }

    /// Current phase of `window`; `None` if it was never seen.
    pub fn phase(&self, window: &TimeWindow) -> Option<WindowPhase> {
        match self.windows.get(window) {
            Some(phase) => Some(*phase),
            None if self.is_late(window) => Some(WindowPhase::Expired),
            None => None,
        }
    }

    /// Register an element for `window`.
    pub fn on_element(&mut self, window: TimeWindow) -> ElementDecision {
        if self.is_late(&window) {
            return ElementDecision::DropLate;
        }
        let phase = self.windows.entry(window).or_insert(WindowPhase::Pending);
        if self.watermark >= window.end {
            *phase = WindowPhase::Fired;
            ElementDecision::AcceptAndFire
        } else {
            ElementDecision::Accept
        }
    }

    /// Advance the watermark and collect due firings and expiries.
    ///
    /// A watermark that does not move forward yields nothing, so duplicates
    /// never expire a window twice.
    pub fn advance_watermark(&mut self, watermark: i64) -> Vec<WindowAction> {
        if watermark <= self.watermark {
            return Vec::new();
        }
        self.watermark = watermark;

        let mut actions = Vec::new();
        let mut expired = Vec::new();
        for (window, phase) in self.windows.iter_mut() {
            if window.end > watermark {
                // Ordered by end: nothing further is due.
                break;
            }
            if *phase == WindowPhase::Pending {
                *phase = WindowPhase::Fired;
                actions.push(WindowAction::Fire(*window));
            }
            let cleanup = window
                .max_timestamp()
                .saturating_add(self.allowed_lateness)
                .max(window.end);
            if watermark >= cleanup {
                actions.push(WindowAction::Expire(*window));
                expired.push(*window);
            }
        }
        for window in expired {
            self.windows.remove(&window);
        }
        actions
    }

    /// Windows currently tracked (pending or fired).
    pub fn tracked(&self) -> impl Iterator<Item = (&TimeWindow, &WindowPhase)> {
        self.windows.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
