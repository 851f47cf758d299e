//! Announcement queue for unlock notifications.
//!
//! Unlocks that land together (a cascade, or an egg plus its egg-hunter
//! progress) are spread out so the renderer shows one toast at a time. The
//! scheduler holds due instants only; whoever drives the UI calls
//! [`NotificationScheduler::poll`] on its own clock.

use crate::achievements::Achievement;
use std::time::{Duration, Instant};
use tracing::debug;

/// One achievement waiting to be shown
#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    pub achievement: Achievement,
    pub due: Instant,
    seq: u64,
}

#[derive(Debug)]
pub struct NotificationScheduler {
    queue: Vec<Announcement>,
    /// Minimum gap between two announcements
    spacing: Duration,
    last_due: Option<Instant>,
    next_seq: u64,
}

impl Default for NotificationScheduler {
    fn default() -> Self {
        Self::new(Duration::from_millis(4000))
    }
}

impl NotificationScheduler {
    pub fn new(spacing: Duration) -> Self {
        Self {
            queue: Vec::new(),
            spacing,
            last_due: None,
            next_seq: 0,
        }
    }

    /// Queue an announcement `delay` after `now`, pushed back as needed to
    /// keep `spacing` from the previous one. Returns the due instant.
    pub fn schedule(&mut self, achievement: Achievement, now: Instant, delay: Duration) -> Instant {
        let mut due = now + delay;
        if let Some(last) = self.last_due {
            due = due.max(last + self.spacing);
        }

        debug!("Scheduling announcement for '{}'", achievement.id);
        self.last_due = Some(due);
        let seq = self.next_seq;
        self.next_seq += 1;

        let pos = self
            .queue
            .iter()
            .position(|a| (a.due, a.seq) > (due, seq))
            .unwrap_or(self.queue.len());
        self.queue.insert(pos, Announcement { achievement, due, seq });
        due
    }

    /// Take the earliest announcement that is due, at most one per call
    pub fn poll(&mut self, now: Instant) -> Option<Announcement> {
        match self.queue.first() {
            Some(first) if first.due <= now => Some(self.queue.remove(0)),
            _ => None,
        }
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.queue.first().map(|a| a.due)
    }

    pub fn pending(&self) -> &[Announcement] {
        &self.queue
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop every queued announcement. Returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.queue.len();
        self.queue.clear();
        self.last_due = None;
        if cancelled > 0 {
            debug!("Cancelled {} pending announcements", cancelled);
        }
        cancelled
    }
}
