//! Engine events and the subscriber channel.
//!
//! Every user-visible state change produces an [`Event`]. External
//! collaborators (badge rendering, notifications) subscribe through
//! [`EventBus`]; a panicking subscriber is isolated and logged so it can
//! never block the others.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// What earned the points in a [`Event::PointsAwarded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointSource {
    InterventionCompleted,
    ProductiveSession,
    StreakMilestone,
    PersonalBest,
    DailyGoal,
}

/// Every streak or reward state change produces an Event.
/// Badge/notification collaborators subscribe to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    StreakStarted {
        current: u32,
        at: DateTime<Utc>,
    },
    StreakIncremented {
        current: u32,
        multiplier: f64,
        personal_best: bool,
        at: DateTime<Utc>,
    },
    /// Emitted alongside `StreakIncremented` when a milestone is crossed.
    StreakMilestone {
        value: u32,
        at: DateTime<Utc>,
    },
    /// Carries the streak value as it was before the reset.
    StreakBroken {
        final_value: u32,
        at: DateTime<Utc>,
    },
    PointsAwarded {
        points: u64,
        total_points: u64,
        source: PointSource,
        at: DateTime<Utc>,
    },
    LevelUp {
        level: u8,
        at: DateTime<Utc>,
    },
    AchievementUnlocked {
        id: String,
        title: String,
        at: DateTime<Utc>,
    },
    /// Full engine snapshot, for collaborators that poll instead of
    /// subscribing.
    StateSnapshot {
        streak_current: u32,
        streak_longest: u32,
        multiplier: f64,
        level: u8,
        total_points: u64,
        points_to_next_level: u64,
        cooldown_until: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },
}

/// A subscriber on the event channel.
pub trait EventSink {
    fn on_event(&self, event: &Event);
}

/// Ordered subscriber list. Publish order is subscription order; a sink
/// that panics is skipped and logged, the rest still run.
#[derive(Default)]
pub struct EventBus {
    sinks: Vec<Box<dyn EventSink>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sinks.len()
    }

    pub fn publish(&self, event: &Event) {
        for (i, sink) in self.sinks.iter().enumerate() {
            let result = catch_unwind(AssertUnwindSafe(|| sink.on_event(event)));
            if result.is_err() {
                log::warn!("event subscriber {i} panicked; continuing with remaining sinks");
            }
        }
    }

    pub fn publish_all(&self, events: &[Event]) {
        for event in events {
            self.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Collect(Rc<RefCell<Vec<Event>>>);

    impl EventSink for Collect {
        fn on_event(&self, event: &Event) {
            self.0.borrow_mut().push(event.clone());
        }
    }

    struct Panics;

    impl EventSink for Panics {
        fn on_event(&self, _event: &Event) {
            panic!("subscriber bug");
        }
    }

    #[test]
    fn publish_reaches_all_sinks_in_order() {
        let seen_a = Rc::new(RefCell::new(Vec::new()));
        let seen_b = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.subscribe(Box::new(Collect(seen_a.clone())));
        bus.subscribe(Box::new(Collect(seen_b.clone())));

        bus.publish(&Event::StreakStarted { current: 1, at: Utc::now() });
        assert_eq!(seen_a.borrow().len(), 1);
        assert_eq!(seen_b.borrow().len(), 1);
    }

    #[test]
    fn panicking_sink_does_not_block_others() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.subscribe(Box::new(Panics));
        bus.subscribe(Box::new(Collect(seen.clone())));

        bus.publish(&Event::StreakMilestone { value: 5, at: Utc::now() });
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_string(&Event::LevelUp { level: 2, at: Utc::now() }).unwrap();
        assert!(json.contains("\"type\":\"LevelUp\""));
    }
}
