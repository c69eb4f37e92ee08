//! Reward engine: points, levels, achievements.
//!
//! Fixed point table, cumulative level thresholds, and a fixed catalog of
//! one-time achievements. Unlocks are idempotent and irreversible; unlock
//! timestamps never move once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::events::{Event, PointSource};

/// Cumulative points required for levels 1-10.
pub const LEVEL_THRESHOLDS: [u64; 10] =
    [0, 100, 250, 500, 1000, 2000, 4000, 8000, 15000, 30000];

const MAX_LEVEL: u8 = 10;

const POINTS_INTERVENTION: u64 = 10;
const POINTS_STREAK_MILESTONE: u64 = 50;
const POINTS_PERSONAL_BEST: u64 = 100;
const POINTS_DAILY_GOAL: u64 = 25;

/// What crossing unlocks an achievement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    InterventionCount(u64),
    StreakValue(u32),
    Level(u8),
    ProductiveMinutes(u64),
}

struct AchievementDef {
    id: &'static str,
    title: &'static str,
    trigger: Trigger,
}

/// The fixed achievement catalog.
const CATALOG: [AchievementDef; 13] = [
    AchievementDef { id: "first-step", title: "First Step", trigger: Trigger::InterventionCount(1) },
    AchievementDef { id: "responsive-ten", title: "Responsive Ten", trigger: Trigger::InterventionCount(10) },
    AchievementDef { id: "half-century-helper", title: "Half-Century Helper", trigger: Trigger::InterventionCount(50) },
    AchievementDef { id: "century-of-intent", title: "Century of Intent", trigger: Trigger::InterventionCount(100) },
    AchievementDef { id: "focused-five", title: "Focused Five", trigger: Trigger::StreakValue(5) },
    AchievementDef { id: "tenacious-ten", title: "Tenacious Ten", trigger: Trigger::StreakValue(10) },
    AchievementDef { id: "quarter-master", title: "Quarter Master", trigger: Trigger::StreakValue(25) },
    AchievementDef { id: "fifty-strong", title: "Fifty Strong", trigger: Trigger::StreakValue(50) },
    AchievementDef { id: "century-of-focus", title: "Century of Focus", trigger: Trigger::StreakValue(100) },
    AchievementDef { id: "halfway-up", title: "Halfway Up", trigger: Trigger::Level(5) },
    AchievementDef { id: "summit", title: "Summit", trigger: Trigger::Level(10) },
    AchievementDef { id: "deep-hour", title: "Deep Hour", trigger: Trigger::ProductiveMinutes(100) },
    AchievementDef { id: "thousand-minute-mind", title: "Thousand-Minute Mind", trigger: Trigger::ProductiveMinutes(1000) },
];

/// Level for a cumulative point total: the highest threshold at or below
/// the total.
pub fn level_for(total_points: u64) -> u8 {
    let mut level = 1;
    for (i, threshold) in LEVEL_THRESHOLDS.iter().enumerate() {
        if total_points >= *threshold {
            level = (i + 1) as u8;
        }
    }
    level
}

/// Points remaining to the next level; 0 at or above the max threshold.
pub fn points_to_next_level(total_points: u64) -> u64 {
    let level = level_for(total_points);
    if level >= MAX_LEVEL {
        0
    } else {
        LEVEL_THRESHOLDS[level as usize] - total_points
    }
}

/// User-visible progress plus the counters achievements key on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProgress {
    pub level: u8,
    pub total_points: u64,
    pub points_to_next_level: u64,
    /// Unlocked achievement ids with their unlock timestamps.
    pub achievements: HashMap<String, DateTime<Utc>>,
    #[serde(default)]
    pub intervention_completions: u64,
    #[serde(default)]
    pub productive_minutes: u64,
}

impl Default for UserProgress {
    fn default() -> Self {
        Self {
            level: 1,
            total_points: 0,
            points_to_next_level: LEVEL_THRESHOLDS[1],
            achievements: HashMap::new(),
            intervention_completions: 0,
            productive_minutes: 0,
        }
    }
}

/// Points awarded by one entry point, with the events it produced.
#[derive(Debug, Clone)]
pub struct AwardOutcome {
    pub points: u64,
    pub total_points: u64,
    pub level: u8,
    pub events: Vec<Event>,
}

/// The reward engine. All mutation goes through the `award_*` entry
/// points; each returns the points awarded and the events to publish.
#[derive(Debug, Default)]
pub struct RewardEngine {
    progress: UserProgress,
}

impl RewardEngine {
    pub fn new() -> Self {
        Self {
            progress: UserProgress::default(),
        }
    }

    pub fn progress(&self) -> &UserProgress {
        &self.progress
    }

    /// Completing an intervention challenge: 10 points.
    pub fn award_intervention(&mut self, now: DateTime<Utc>) -> AwardOutcome {
        self.progress.intervention_completions += 1;
        self.award(POINTS_INTERVENTION, PointSource::InterventionCompleted, now)
    }

    /// A productive session, tiered by duration and scaled by the streak
    /// multiplier (floored to an integer).
    pub fn award_session(
        &mut self,
        duration_minutes: u32,
        streak_multiplier: f64,
        now: DateTime<Utc>,
    ) -> AwardOutcome {
        let base = match duration_minutes {
            m if m >= 60 => 60,
            m if m >= 30 => 30,
            m if m >= 15 => 15,
            m if m >= 5 => 5,
            _ => 0,
        };
        self.progress.productive_minutes += duration_minutes as u64;
        let points = (base as f64 * streak_multiplier).floor() as u64;
        self.award(points, PointSource::ProductiveSession, now)
    }

    /// A streak milestone: 50 points, and the streak achievements key on
    /// the milestone value.
    pub fn award_milestone(&mut self, streak_value: u32, now: DateTime<Utc>) -> AwardOutcome {
        let mut outcome = self.award(POINTS_STREAK_MILESTONE, PointSource::StreakMilestone, now);
        let unlocks = self.unlock_matching(
            |t| matches!(t, Trigger::StreakValue(v) if streak_value >= *v),
            now,
        );
        outcome.events.extend(unlocks);
        outcome
    }

    /// A new personal-best streak: 100 points.
    pub fn award_personal_best(&mut self, now: DateTime<Utc>) -> AwardOutcome {
        self.award(POINTS_PERSONAL_BEST, PointSource::PersonalBest, now)
    }

    /// Meeting the daily streak goal: 25 points.
    pub fn award_daily_goal(&mut self, now: DateTime<Utc>) -> AwardOutcome {
        self.award(POINTS_DAILY_GOAL, PointSource::DailyGoal, now)
    }

    fn award(&mut self, points: u64, source: PointSource, now: DateTime<Utc>) -> AwardOutcome {
        let level_before = self.progress.level;
        self.progress.total_points += points;
        self.progress.level = level_for(self.progress.total_points);
        self.progress.points_to_next_level = points_to_next_level(self.progress.total_points);

        let mut events = vec![Event::PointsAwarded {
            points,
            total_points: self.progress.total_points,
            source,
            at: now,
        }];
        if self.progress.level > level_before {
            events.push(Event::LevelUp {
                level: self.progress.level,
                at: now,
            });
        }

        // Counter- and level-keyed achievements can unlock on any award.
        let level = self.progress.level;
        let interventions = self.progress.intervention_completions;
        let minutes = self.progress.productive_minutes;
        events.extend(self.unlock_matching(
            |t| match t {
                Trigger::InterventionCount(n) => interventions >= *n,
                Trigger::Level(l) => level >= *l,
                Trigger::ProductiveMinutes(m) => minutes >= *m,
                Trigger::StreakValue(_) => false,
            },
            now,
        ));

        AwardOutcome {
            points,
            total_points: self.progress.total_points,
            level: self.progress.level,
            events,
        }
    }

    /// Unlock every catalog entry whose trigger matches and is not yet
    /// unlocked. Checked before inserting, so a second unlock of the same
    /// id changes nothing.
    fn unlock_matching<F>(&mut self, matches: F, now: DateTime<Utc>) -> Vec<Event>
    where
        F: Fn(&Trigger) -> bool,
    {
        let mut events = Vec::new();
        for def in &CATALOG {
            if matches(&def.trigger) && !self.progress.achievements.contains_key(def.id) {
                self.progress.achievements.insert(def.id.to_string(), now);
                events.push(Event::AchievementUnlocked {
                    id: def.id.to_string(),
                    title: def.title.to_string(),
                    at: now,
                });
            }
        }
        events
    }

    pub fn export_state(&self) -> UserProgress {
        self.progress.clone()
    }

    pub fn import_state(progress: UserProgress) -> Self {
        Self { progress }
    }
}
