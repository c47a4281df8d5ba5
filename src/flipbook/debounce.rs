//! Resize debouncing

use std::time::{Duration, Instant};

/// Coalesces a burst of resize events into one.
///
/// Each [`queue`](Self::queue) replaces the pending width and restarts the
/// quiet period; [`take_ready`](Self::take_ready) yields the last width once
/// no new event arrived for `quiet`.
#[derive(Debug)]
pub struct ResizeDebouncer {
    quiet: Duration,
    pending: Option<(u32, Instant)>,
}

impl ResizeDebouncer {
    #[must_use]
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
        }
    }

    pub fn queue(&mut self, container_width: u32, now: Instant) {
        self.pending = Some((container_width, now));
    }

    pub fn take_ready(&mut self, now: Instant) -> Option<u32> {
        let (width, queued_at) = self.pending?;
        if now.saturating_duration_since(queued_at) >= self.quiet {
            self.pending = None;
            Some(width)
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Time left before the pending event fires
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let (_, queued_at) = self.pending?;
        Some(self.quiet.saturating_sub(now.saturating_duration_since(queued_at)))
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}
