//! Debounced pass scheduling.
//!
//! The host reports DOM mutations in batches; the scheduler coalesces
//! bursts into a single pass with a trailing-edge debounce and defers
//! notifications that arrive mid-pass instead of dropping them. Time is
//! passed in explicitly, so tests drive the clock without sleeping.

use std::time::{Duration, Instant};

/// One reported batch of host-side tree changes.
#[derive(Debug, Default, Clone)]
pub struct MutationBatch {
    pub added_nodes: usize,
    pub text_changes: usize,
    pub attribute_changes: usize,
}

impl MutationBatch {
    /// Only node additions can introduce unprocessed content. Text and
    /// attribute changes are ignored wholesale; the engine's own edits
    /// fall in those categories, and reacting to them would make every
    /// pass schedule the next one forever.
    pub fn has_additions(&self) -> bool {
        self.added_nodes > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Scheduled,
    Running,
}

pub struct Scheduler {
    state: SchedulerState,
    deadline: Option<Instant>,
    debounce: Duration,
    /// A qualifying batch arrived while a pass was running.
    rearm: bool,
}

impl Scheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            state: SchedulerState::Idle,
            deadline: None,
            debounce,
            rearm: false,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Request a pass at an absolute time, e.g. the initial settle delay
    /// after startup. An earlier pending deadline is kept.
    pub fn schedule_at(&mut self, when: Instant) {
        match self.state {
            SchedulerState::Running => self.rearm = true,
            _ => {
                self.state = SchedulerState::Scheduled;
                self.deadline = Some(match self.deadline {
                    Some(existing) if existing < when => existing,
                    _ => when,
                });
            }
        }
    }

    /// Report a mutation batch. Each qualifying batch pushes the deadline
    /// out to `now + debounce`, so a burst settles into one pass.
    pub fn notify(&mut self, batch: &MutationBatch, now: Instant) {
        if !batch.has_additions() {
            return;
        }
        match self.state {
            SchedulerState::Idle | SchedulerState::Scheduled => {
                self.state = SchedulerState::Scheduled;
                self.deadline = Some(now + self.debounce);
            }
            SchedulerState::Running => self.rearm = true,
        }
    }

    /// Whether a pass is due. On `true` the scheduler moves to `Running`
    /// and the caller must invoke [`Scheduler::complete`] afterwards.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.state != SchedulerState::Scheduled {
            return false;
        }
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.state = SchedulerState::Running;
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Mark the running pass finished. Notifications deferred during the
    /// pass schedule a follow-up after a fresh debounce interval.
    pub fn complete(&mut self, now: Instant) {
        if self.rearm {
            self.rearm = false;
            self.state = SchedulerState::Scheduled;
            self.deadline = Some(now + self.debounce);
        } else {
            self.state = SchedulerState::Idle;
            self.deadline = None;
        }
    }

    pub fn reset(&mut self) {
        self.state = SchedulerState::Idle;
        self.deadline = None;
        self.rearm = false;
    }
}
