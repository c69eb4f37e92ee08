//! Dismissal tracking and adaptation.
//!
//! One live record per site, incremented on dismissal and deleted on that
//! site's next completion. Repeated dismissals escalate the cooldown and
//! loosen the effective intervention frequency -- the engine backing off
//! from a user who keeps waving it away.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::settings::InterventionFrequency;

/// Dismissals across all sites in the trailing hour above which the rate
/// counts as high.
const HIGH_RATE_THRESHOLD: usize = 3;

/// Sites need at least this many consecutive dismissals to be suggested
/// for the whitelist.
const SUGGESTION_MIN_COUNT: u32 = 5;

/// Maximum whitelist suggestions returned.
const SUGGESTION_LIMIT: usize = 5;

/// Per-site dismissal record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DismissalRecord {
    pub site: String,
    pub last_at: DateTime<Utc>,
    pub consecutive: u32,
}

/// How strongly to back off for a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdaptationLevel {
    None,
    Minor,
    Moderate,
    Major,
}

/// Backoff plan derived from a site's consecutive dismissal count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationStrategy {
    pub level: AdaptationLevel,
    pub cooldown_multiplier: f64,
    /// Global challenge-difficulty adjustment. Tracked and exposed, but
    /// challenge generation recomputes difficulty per call and does not
    /// read it back.
    pub difficulty_delta: i8,
    /// Loosen the effective frequency to at least this; never tightens.
    pub loosen_frequency_to: Option<InterventionFrequency>,
}

impl AdaptationStrategy {
    pub fn for_count(consecutive: u32) -> Self {
        if consecutive >= 10 {
            Self {
                level: AdaptationLevel::Major,
                cooldown_multiplier: 3.0,
                difficulty_delta: -2,
                loosen_frequency_to: Some(InterventionFrequency::Minimal),
            }
        } else if consecutive >= 5 {
            Self {
                level: AdaptationLevel::Moderate,
                cooldown_multiplier: 2.0,
                difficulty_delta: -1,
                loosen_frequency_to: Some(InterventionFrequency::Moderate),
            }
        } else if consecutive >= 3 {
            Self {
                level: AdaptationLevel::Minor,
                cooldown_multiplier: 1.5,
                difficulty_delta: 0,
                loosen_frequency_to: None,
            }
        } else {
            Self {
                level: AdaptationLevel::None,
                cooldown_multiplier: 1.0,
                difficulty_delta: 0,
                loosen_frequency_to: None,
            }
        }
    }

    /// Effective frequency after loosening. `Minimal` stays `Minimal`;
    /// loosening can only move the setting toward fewer interventions.
    pub fn effective_frequency(&self, user: InterventionFrequency) -> InterventionFrequency {
        match self.loosen_frequency_to {
            Some(floor) => user.max(floor),
            None => user,
        }
    }
}

/// Serializable tracker state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DismissalState {
    pub records: HashMap<String, DismissalRecord>,
    #[serde(default)]
    pub recent: VecDeque<DateTime<Utc>>,
    #[serde(default)]
    pub global_difficulty_delta: i8,
}

/// Tracks dismissals per site plus the cross-site trailing-hour rate.
#[derive(Debug, Default)]
pub struct DismissalTracker {
    records: HashMap<String, DismissalRecord>,
    /// Timestamps of every dismissal (any site) in the trailing hour.
    recent: VecDeque<DateTime<Utc>>,
    global_difficulty_delta: i8,
}

impl DismissalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a dismissal and return the site's new consecutive count.
    pub fn record_dismissal(&mut self, site: &str, now: DateTime<Utc>) -> u32 {
        let record = self
            .records
            .entry(site.to_string())
            .or_insert_with(|| DismissalRecord {
                site: site.to_string(),
                last_at: now,
                consecutive: 0,
            });
        record.consecutive += 1;
        record.last_at = now;
        let count = record.consecutive;

        self.recent.push_back(now);
        self.prune_recent(now);

        let delta = AdaptationStrategy::for_count(count).difficulty_delta;
        self.global_difficulty_delta = self.global_difficulty_delta.min(delta);

        count
    }

    /// A completion clears the site's record entirely.
    pub fn record_completion(&mut self, site: &str) {
        self.records.remove(site);
    }

    pub fn consecutive(&self, site: &str) -> u32 {
        self.records.get(site).map(|r| r.consecutive).unwrap_or(0)
    }

    pub fn strategy_for(&self, site: &str) -> AdaptationStrategy {
        AdaptationStrategy::for_count(self.consecutive(site))
    }

    /// Tracked global difficulty adjustment (see
    /// [`AdaptationStrategy::difficulty_delta`]).
    pub fn global_difficulty_delta(&self) -> i8 {
        self.global_difficulty_delta
    }

    /// More than 3 dismissals across all sites within the trailing hour.
    pub fn high_dismissal_rate(&mut self, now: DateTime<Utc>) -> bool {
        self.prune_recent(now);
        self.recent.len() > HIGH_RATE_THRESHOLD
    }

    /// Up to 5 not-yet-whitelisted sites with at least 5 consecutive
    /// dismissals, most-dismissed first.
    pub fn whitelist_suggestions(&self, whitelist: &[String]) -> Vec<String> {
        let mut candidates: Vec<&DismissalRecord> = self
            .records
            .values()
            .filter(|r| r.consecutive >= SUGGESTION_MIN_COUNT)
            .filter(|r| {
                !whitelist
                    .iter()
                    .any(|entry| r.site.contains(entry.as_str()) || entry.contains(&r.site))
            })
            .collect();
        candidates.sort_by(|a, b| b.consecutive.cmp(&a.consecutive));
        candidates
            .iter()
            .take(SUGGESTION_LIMIT)
            .map(|r| r.site.clone())
            .collect()
    }

    fn prune_recent(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::hours(1);
        while let Some(front) = self.recent.front() {
            if *front < cutoff {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn export_state(&self) -> DismissalState {
        DismissalState {
            records: self.records.clone(),
            recent: self.recent.clone(),
            global_difficulty_delta: self.global_difficulty_delta,
        }
    }

    pub fn import_state(state: DismissalState) -> Self {
        Self {
            records: state.records,
            recent: state.recent,
            global_difficulty_delta: state.global_difficulty_delta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_tiers_by_count() {
        assert_eq!(AdaptationStrategy::for_count(2).level, AdaptationLevel::None);
        let minor = AdaptationStrategy::for_count(3);
        assert_eq!(minor.level, AdaptationLevel::Minor);
        assert_eq!(minor.cooldown_multiplier, 1.5);
        assert_eq!(minor.difficulty_delta, 0);

        let moderate = AdaptationStrategy::for_count(5);
        assert_eq!(moderate.cooldown_multiplier, 2.0);
        assert_eq!(moderate.difficulty_delta, -1);
        assert_eq!(
            moderate.loosen_frequency_to,
            Some(InterventionFrequency::Moderate)
        );

        let major = AdaptationStrategy::for_count(10);
        assert_eq!(major.cooldown_multiplier, 3.0);
        assert_eq!(major.difficulty_delta, -2);
        assert_eq!(major.loosen_frequency_to, Some(InterventionFrequency::Minimal));
    }

    #[test]
    fn loosening_never_tightens() {
        let major = AdaptationStrategy::for_count(10);
        assert_eq!(
            major.effective_frequency(InterventionFrequency::Aggressive),
            InterventionFrequency::Minimal
        );

        let moderate = AdaptationStrategy::for_count(5);
        assert_eq!(
            moderate.effective_frequency(InterventionFrequency::Minimal),
            InterventionFrequency::Minimal
        );
    }

    #[test]
    fn completion_clears_the_record() {
        let mut tracker = DismissalTracker::new();
        let now = Utc::now();
        tracker.record_dismissal("reddit.com", now);
        tracker.record_dismissal("reddit.com", now);
        assert_eq!(tracker.consecutive("reddit.com"), 2);

        tracker.record_completion("reddit.com");
        assert_eq!(tracker.consecutive("reddit.com"), 0);
    }

    #[test]
    fn high_rate_needs_more_than_three_in_an_hour() {
        let mut tracker = DismissalTracker::new();
        let now = Utc::now();
        for site in ["a.com", "b.com", "c.com"] {
            tracker.record_dismissal(site, now);
        }
        assert!(!tracker.high_dismissal_rate(now));

        tracker.record_dismissal("d.com", now);
        assert!(tracker.high_dismissal_rate(now));

        // The window slides: two hours later the burst no longer counts.
        assert!(!tracker.high_dismissal_rate(now + Duration::hours(2)));
    }

    #[test]
    fn suggestions_exclude_whitelisted_and_sort_by_count() {
        let mut tracker = DismissalTracker::new();
        let now = Utc::now();
        for _ in 0..5 {
            tracker.record_dismissal("reddit.com", now);
        }
        for _ in 0..8 {
            tracker.record_dismissal("youtube.com", now);
        }
        for _ in 0..6 {
            tracker.record_dismissal("news.ycombinator.com", now);
        }
        // Below the suggestion floor.
        tracker.record_dismissal("example.org", now);

        let suggestions =
            tracker.whitelist_suggestions(&["news.ycombinator.com".to_string()]);
        assert_eq!(suggestions, vec!["youtube.com", "reddit.com"]);
    }

    #[test]
    fn global_difficulty_delta_tracks_deepest_tier() {
        let mut tracker = DismissalTracker::new();
        let now = Utc::now();
        for _ in 0..5 {
            tracker.record_dismissal("reddit.com", now);
        }
        assert_eq!(tracker.global_difficulty_delta(), -1);

        // Completion clears the record but the tracked adjustment remains.
        tracker.record_completion("reddit.com");
        assert_eq!(tracker.global_difficulty_delta(), -1);
    }

    #[test]
    fn state_roundtrip() {
        let mut tracker = DismissalTracker::new();
        let now = Utc::now();
        tracker.record_dismissal("reddit.com", now);
        let restored = DismissalTracker::import_state(tracker.export_state());
        assert_eq!(restored.consecutive("reddit.com"), 1);
    }
}
