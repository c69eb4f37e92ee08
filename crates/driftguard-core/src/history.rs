//! Activity history log and batched intake.
//!
//! The pattern matcher reads up to 30 days of history; the dismissal
//! tracker reads the trailing hour. Intake from the capture collaborator is
//! buffered into a bounded batch queue (batch size 10) guarded by an
//! in-progress flag; a failed persistence write re-queues the event at the
//! front so arrival order is preserved for everything after it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::context::{BrowsingContext, NavigationPattern, SiteCategory};
use crate::error::StorageError;

/// Number of events drained per batch.
pub const BATCH_SIZE: usize = 10;

/// Retention window for the activity log.
pub const RETENTION_DAYS: i64 = 30;

/// Hard cap on in-memory history entries.
const MAX_ENTRIES: usize = 10_000;

/// One observed activity event, as the pattern matcher consumes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub url: String,
    pub domain: String,
    pub category: SiteCategory,
    pub navigation: NavigationPattern,
    pub hour: u8,
    pub weekday: u8,
    pub was_distraction: bool,
    pub at: DateTime<Utc>,
}

/// Rolling 30-day activity log.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ActivityLog {
    entries: VecDeque<ActivityRecord>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ActivityRecord) {
        self.entries.push_back(record);
        if self.entries.len() > MAX_ENTRIES {
            self.entries.pop_front();
        }
        self.prune(Utc::now());
    }

    /// Drop entries older than the retention window.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::days(RETENTION_DAYS);
        while let Some(front) = self.entries.front() {
            if front.at < cutoff {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Remove and return the newest entry. Used to roll back an append
    /// whose persistence write failed.
    pub fn pop_last(&mut self) -> Option<ActivityRecord> {
        self.entries.pop_back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All retained entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &ActivityRecord> {
        self.entries.iter()
    }

    /// Entries at or after the cutoff, oldest first.
    pub fn entries_since(&self, cutoff: DateTime<Utc>) -> impl Iterator<Item = &ActivityRecord> {
        self.entries.iter().filter(move |r| r.at >= cutoff)
    }
}

/// Outcome of a drain pass.
#[derive(Debug, PartialEq, Eq)]
pub enum DrainOutcome {
    /// A drain was already in progress; nothing was taken.
    Busy,
    /// Batch processed; `failed` is true when a write failed and the
    /// offending event was re-queued at the front.
    Drained { processed: usize, failed: bool },
}

/// Bounded batch queue for incoming activity events.
///
/// A new batch cannot begin draining while one is active, and a failed
/// persist puts the event back at the front for retry on the next drain.
#[derive(Debug, Default)]
pub struct IntakeQueue {
    queue: VecDeque<BrowsingContext>,
    draining: bool,
}

impl IntakeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, ctx: BrowsingContext) {
        self.queue.push_back(ctx);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drain up to [`BATCH_SIZE`] events through `persist`.
    ///
    /// Stops at the first persistence failure, re-queueing the failed event
    /// at the front so everything behind it keeps its arrival order.
    pub fn drain_batch<F>(&mut self, mut persist: F) -> DrainOutcome
    where
        F: FnMut(&BrowsingContext) -> Result<(), StorageError>,
    {
        if self.draining {
            return DrainOutcome::Busy;
        }
        self.draining = true;

        let mut processed = 0;
        let mut failed = false;
        while processed < BATCH_SIZE {
            let Some(ctx) = self.queue.pop_front() else {
                break;
            };
            match persist(&ctx) {
                Ok(()) => processed += 1,
                Err(e) => {
                    log::warn!("activity persist failed, re-queueing for retry: {e}");
                    self.queue.push_front(ctx);
                    failed = true;
                    break;
                }
            }
        }

        self.draining = false;
        DrainOutcome::Drained { processed, failed }
    }
}
