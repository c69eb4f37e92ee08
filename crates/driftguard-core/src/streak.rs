//! Focus streak state machine.
//!
//! Wall-clock driven, no internal thread: callers feed it productive and
//! distraction signals and the engine invokes the inactivity check. Every
//! transition mutates the record and returns the events it emitted, so an
//! illegal transition (increment while inactive) is simply unrepresentable
//! as a no-op with no events.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::events::Event;

/// Minimum minutes between increments.
const INCREMENT_GATE_MINUTES: i64 = 5;

/// Minutes of silence after which an active streak is forcibly broken.
const INACTIVITY_TIMEOUT_MINUTES: i64 = 30;

/// Streak values that emit a milestone event when crossed.
pub const MILESTONES: [u32; 8] = [5, 10, 25, 50, 100, 250, 500, 1000];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreakPhase {
    Inactive,
    Active,
    Broken,
}

/// Persistent streak state. Invariant: `current <= longest` after every
/// transition, and a break always resets the multiplier to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreakRecord {
    pub phase: StreakPhase,
    pub current: u32,
    pub longest: u32,
    pub multiplier: f64,
    pub last_update: DateTime<Utc>,
}

impl Default for StreakRecord {
    fn default() -> Self {
        Self {
            phase: StreakPhase::Inactive,
            current: 0,
            longest: 0,
            multiplier: 1.0,
            last_update: Utc::now(),
        }
    }
}

/// Multiplier band for a streak value.
fn multiplier_for(current: u32) -> f64 {
    match current {
        0..=4 => 1.0,
        5..=9 => 1.2,
        10..=19 => 1.5,
        20..=49 => 2.0,
        _ => 2.5,
    }
}

/// The streak state machine.
#[derive(Debug, Default)]
pub struct StreakTracker {
    record: StreakRecord,
}

impl StreakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self) -> &StreakRecord {
        &self.record
    }

    pub fn multiplier(&self) -> f64 {
        self.record.multiplier
    }

    /// A productive signal: starts a streak, or increments one that has
    /// been active for at least the gate interval. A signal inside the
    /// gate window is a no-op.
    pub fn record_productive_activity(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let mut events = self.check_inactivity(now);
        match self.record.phase {
            StreakPhase::Inactive | StreakPhase::Broken => {
                events.extend(self.start(now));
            }
            StreakPhase::Active => {
                if now - self.record.last_update >= Duration::minutes(INCREMENT_GATE_MINUTES) {
                    events.extend(self.increment(now));
                }
            }
        }
        events
    }

    /// A distraction signal breaks an active streak; otherwise a no-op.
    pub fn record_distraction(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        match self.record.phase {
            StreakPhase::Active => self.break_streak(now),
            _ => Vec::new(),
        }
    }

    /// Inactivity watchdog: an active streak with no activity for 30
    /// minutes is forcibly broken.
    pub fn check_inactivity(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        if self.record.phase == StreakPhase::Active
            && now - self.record.last_update >= Duration::minutes(INACTIVITY_TIMEOUT_MINUTES)
        {
            self.break_streak(now)
        } else {
            Vec::new()
        }
    }

    fn start(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        self.record.phase = StreakPhase::Active;
        self.record.current = 1;
        self.record.longest = self.record.longest.max(1);
        self.record.multiplier = 1.0;
        self.record.last_update = now;
        vec![Event::StreakStarted { current: 1, at: now }]
    }

    fn increment(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let previous = self.record.current;
        self.record.current += 1;
        // Banded by the streak value entering the increment, so crossing a
        // band boundary pays out starting with the next increment.
        self.record.multiplier = multiplier_for(previous);
        self.record.last_update = now;

        let personal_best = self.record.current > self.record.longest;
        if personal_best {
            self.record.longest = self.record.current;
        }

        let mut events = vec![Event::StreakIncremented {
            current: self.record.current,
            multiplier: self.record.multiplier,
            personal_best,
            at: now,
        }];
        // Range check, not equality: a future batched increment can never
        // skip a milestone.
        for milestone in MILESTONES {
            if previous < milestone && self.record.current >= milestone {
                events.push(Event::StreakMilestone { value: milestone, at: now });
            }
        }
        events
    }

    fn break_streak(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let final_value = self.record.current;
        self.record.phase = StreakPhase::Broken;
        self.record.current = 0;
        self.record.multiplier = 1.0;
        self.record.last_update = now;
        vec![Event::StreakBroken { final_value, at: now }]
    }

    pub fn export_state(&self) -> StreakRecord {
        self.record.clone()
    }

    pub fn import_state(record: StreakRecord) -> Self {
        Self { record }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn advance(tracker: &mut StreakTracker, steps: u32, from: DateTime<Utc>) -> DateTime<Utc> {
        let mut now = from;
        for _ in 0..steps {
            now += Duration::minutes(6);
            tracker.record_productive_activity(now);
        }
        now
    }

    #[test]
    fn first_productive_signal_starts_the_streak() {
        let mut tracker = StreakTracker::new();
        let now = Utc::now();
        let events = tracker.record_productive_activity(now);
        assert!(matches!(events[0], Event::StreakStarted { current: 1, .. }));
        assert_eq!(tracker.record().phase, StreakPhase::Active);
        assert_eq!(tracker.record().current, 1);
    }

    #[test]
    fn increment_within_gate_window_is_a_no_op() {
        let mut tracker = StreakTracker::new();
        let now = Utc::now();
        tracker.record_productive_activity(now);
        let events = tracker.record_productive_activity(now + Duration::minutes(2));
        assert!(events.is_empty());
        assert_eq!(tracker.record().current, 1);
    }

    #[test]
    fn fifth_increment_emits_milestone_and_keeps_band_multiplier() {
        let mut tracker = StreakTracker::new();
        let start = Utc::now();
        tracker.record_productive_activity(start);
        let now = advance(&mut tracker, 3, start);
        assert_eq!(tracker.record().current, 4);

        let events = tracker.record_productive_activity(now + Duration::minutes(6));
        assert_eq!(tracker.record().current, 5);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::StreakMilestone { value: 5, .. })));
        // The multiplier is banded by the value entering the increment, so
        // it stays 1.0 until the streak moves past 5.
        assert_eq!(tracker.record().multiplier, 1.0);

        let events = tracker.record_productive_activity(now + Duration::minutes(12));
        assert_eq!(tracker.record().current, 6);
        assert!(events.iter().any(|e| matches!(
            e,
            Event::StreakIncremented { multiplier, .. } if *multiplier == 1.2
        )));
    }

    #[test]
    fn personal_best_is_flagged_and_longest_tracks_it() {
        let mut tracker = StreakTracker::new();
        let start = Utc::now();
        tracker.record_productive_activity(start);
        let now = advance(&mut tracker, 2, start);
        assert_eq!(tracker.record().longest, 3);

        let events = tracker.record_productive_activity(now + Duration::minutes(6));
        assert!(events.iter().any(|e| matches!(
            e,
            Event::StreakIncremented { personal_best: true, .. }
        )));
        assert_eq!(tracker.record().longest, 4);
    }

    #[test]
    fn distraction_breaks_with_pre_reset_value() {
        let mut tracker = StreakTracker::new();
        let start = Utc::now();
        tracker.record_productive_activity(start);
        let now = advance(&mut tracker, 4, start);

        let events = tracker.record_distraction(now);
        assert!(matches!(events[0], Event::StreakBroken { final_value: 5, .. }));
        assert_eq!(tracker.record().current, 0);
        assert_eq!(tracker.record().multiplier, 1.0);
        assert_eq!(tracker.record().phase, StreakPhase::Broken);
        // Longest survives the break.
        assert_eq!(tracker.record().longest, 5);
    }

    #[test]
    fn distraction_while_inactive_is_a_no_op() {
        let mut tracker = StreakTracker::new();
        assert!(tracker.record_distraction(Utc::now()).is_empty());
    }

    #[test]
    fn inactivity_watchdog_forces_a_break() {
        let mut tracker = StreakTracker::new();
        let now = Utc::now();
        tracker.record_productive_activity(now);

        let events = tracker.check_inactivity(now + Duration::minutes(31));
        assert!(matches!(events[0], Event::StreakBroken { .. }));
        assert_eq!(tracker.record().phase, StreakPhase::Broken);
    }

    #[test]
    fn productive_signal_after_long_silence_breaks_then_restarts() {
        let mut tracker = StreakTracker::new();
        let start = Utc::now();
        tracker.record_productive_activity(start);
        let now = advance(&mut tracker, 4, start);

        let events = tracker.record_productive_activity(now + Duration::minutes(45));
        assert!(matches!(events[0], Event::StreakBroken { final_value: 5, .. }));
        assert!(matches!(events[1], Event::StreakStarted { current: 1, .. }));
    }

    #[test]
    fn restart_after_break_is_allowed() {
        let mut tracker = StreakTracker::new();
        let now = Utc::now();
        tracker.record_productive_activity(now);
        tracker.record_distraction(now + Duration::minutes(1));
        let events = tracker.record_productive_activity(now + Duration::minutes(2));
        assert!(matches!(events[0], Event::StreakStarted { .. }));
    }

    #[test]
    fn multiplier_bands() {
        assert_eq!(multiplier_for(4), 1.0);
        assert_eq!(multiplier_for(5), 1.2);
        assert_eq!(multiplier_for(10), 1.5);
        assert_eq!(multiplier_for(20), 2.0);
        assert_eq!(multiplier_for(50), 2.5);
    }

    proptest! {
        #[test]
        fn current_never_exceeds_longest(signals in proptest::collection::vec(any::<bool>(), 1..200)) {
            let mut tracker = StreakTracker::new();
            let mut now = Utc::now();
            for productive in signals {
                now += Duration::minutes(6);
                if productive {
                    tracker.record_productive_activity(now);
                } else {
                    tracker.record_distraction(now);
                }
                prop_assert!(tracker.record().current <= tracker.record().longest);
                prop_assert!(tracker.record().multiplier >= 1.0);
            }
        }
    }
}
