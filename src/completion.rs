//! Settle detection for the search → auto-expand → render cascade.
//!
//! The host reports real stage transitions (search finished, ancestor loads
//! drained) and every render that changed the tree. The operation counts as
//! settled once no stage is active and a full quiet window has passed with
//! no observed change.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::config::{DEFAULT_BURST_THRESHOLD, DEFAULT_QUIET_WINDOW_MS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Searching,
    Expanding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyReason {
    /// A tracked stage is still active.
    Stage(Stage),
    /// Something changed inside the quiet window.
    RecentChange,
    /// More changes than the burst threshold inside the quiet window.
    Burst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Settled,
    Busy(BusyReason),
}

impl Activity {
    pub fn is_settled(&self) -> bool {
        matches!(self, Activity::Settled)
    }
}

#[derive(Debug)]
pub struct CompletionDetector {
    quiet_window: Duration,
    burst_threshold: usize,
    tracking: bool,
    searching: bool,
    expanding: bool,
    last_change: Option<Instant>,
    changes: VecDeque<Instant>,
}

impl Default for CompletionDetector {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_QUIET_WINDOW_MS),
            DEFAULT_BURST_THRESHOLD,
        )
    }
}

impl CompletionDetector {
    pub fn new(quiet_window: Duration, burst_threshold: usize) -> Self {
        Self {
            quiet_window,
            burst_threshold,
            tracking: false,
            searching: false,
            expanding: false,
            last_change: None,
            changes: VecDeque::new(),
        }
    }

    /// Start tracking a new operation, discarding everything observed so far.
    pub fn begin_operation(&mut self, now: Instant) {
        self.tracking = true;
        self.searching = false;
        self.expanding = false;
        self.changes.clear();
        self.last_change = Some(now);
    }

    /// Stop tracking without waiting for the cascade to settle.
    pub fn abandon(&mut self) {
        self.tracking = false;
        self.searching = false;
        self.expanding = false;
        self.changes.clear();
        self.last_change = None;
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn stage_started(&mut self, stage: Stage) {
        if !self.tracking {
            return;
        }
        *self.flag(stage) = true;
    }

    /// A stage ending counts as a change: the quiet window restarts from it.
    pub fn stage_finished(&mut self, stage: Stage, now: Instant) {
        if !self.tracking {
            return;
        }
        let flag = self.flag(stage);
        if *flag {
            *flag = false;
            self.touch(now);
        }
    }

    pub fn is_stage_active(&self, stage: Stage) -> bool {
        match stage {
            Stage::Searching => self.searching,
            Stage::Expanding => self.expanding,
        }
    }

    /// Record one observed change. Ignored when nothing is being tracked.
    pub fn record_change(&mut self, now: Instant) {
        if !self.tracking {
            return;
        }
        self.changes.push_back(now);
        self.touch(now);
        self.prune(now);
    }

    /// Current verdict. Reaching `Settled` ends tracking.
    pub fn status(&mut self, now: Instant) -> Activity {
        if !self.tracking {
            return Activity::Settled;
        }
        if self.searching {
            return Activity::Busy(BusyReason::Stage(Stage::Searching));
        }
        if self.expanding {
            return Activity::Busy(BusyReason::Stage(Stage::Expanding));
        }

        self.prune(now);
        if self.changes.len() > self.burst_threshold {
            return Activity::Busy(BusyReason::Burst);
        }
        if let Some(last) = self.last_change {
            if now.saturating_duration_since(last) < self.quiet_window {
                return Activity::Busy(BusyReason::RecentChange);
            }
        }

        self.abandon();
        Activity::Settled
    }

    fn flag(&mut self, stage: Stage) -> &mut bool {
        match stage {
            Stage::Searching => &mut self.searching,
            Stage::Expanding => &mut self.expanding,
        }
    }

    fn touch(&mut self, now: Instant) {
        self.last_change = Some(self.last_change.map_or(now, |last| last.max(now)));
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.changes.front() {
            if now.saturating_duration_since(oldest) >= self.quiet_window {
                self.changes.pop_front();
            } else {
                break;
            }
        }
    }
}
