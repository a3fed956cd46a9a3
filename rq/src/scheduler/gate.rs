//! Concurrency gate and completion counters

use tracing::debug;

/// Tracks in-flight tasks against `max_concurrent` and counts finished ones.
#[derive(Debug)]
pub(crate) struct ConcurrencyGate {
    in_flight: usize,
    processed: u64,
    max_concurrent: Option<usize>,
    peak: usize,
}

impl ConcurrencyGate {
    pub(crate) fn new(max_concurrent: Option<usize>) -> Self {
        Self {
            in_flight: 0,
            processed: 0,
            max_concurrent,
            peak: 0,
        }
    }

    /// Take a slot if one is free. Never mutates on failure.
    pub(crate) fn try_acquire(&mut self) -> bool {
        if let Some(max) = self.max_concurrent {
            if self.in_flight >= max {
                return false;
            }
        }
        self.in_flight += 1;
        self.peak = self.peak.max(self.in_flight);
        true
    }

    /// Give back a slot and count the task as processed.
    ///
    /// Must be called exactly once for each successful `try_acquire`.
    pub(crate) fn release(&mut self) {
        debug_assert!(self.in_flight > 0, "release without matching acquire");
        self.in_flight = self.in_flight.saturating_sub(1);
        self.processed += 1;
    }

    /// New limit applies to the next acquire; running tasks are not preempted
    pub(crate) fn set_max_concurrent(&mut self, max_concurrent: Option<usize>) {
        debug!(?max_concurrent, in_flight = self.in_flight, "ConcurrencyGate::set_max_concurrent: called");
        self.max_concurrent = max_concurrent;
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub(crate) fn processed(&self) -> u64 {
        self.processed
    }

    pub(crate) fn max_concurrent(&self) -> Option<usize> {
        self.max_concurrent
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak
    }
}
