//! Historical pattern matching.
//!
//! Buckets the last 30 days of activity by (hour, weekday, category) and
//! scores how similar the current context is to the buckets that were
//! distractions. The table refreshes lazily, at most once per hour; a
//! stale table is recomputed on next access and never blocks callers.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::context::{FeatureTuple, NavigationPattern, SiteCategory};
use crate::history::{ActivityLog, RETENTION_DAYS};

/// Minimum minutes between rebuilds.
const REBUILD_INTERVAL_MINUTES: i64 = 60;

/// Buckets seen fewer times than this are noise and dropped.
const MIN_BUCKET_FREQUENCY: u32 = 2;

/// Overall similarity above this declares a match.
const MATCH_THRESHOLD: f64 = 0.6;

/// One (hour, weekday, category) bucket aggregated from history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternBucket {
    pub hour: u8,
    pub weekday: u8,
    pub category: SiteCategory,
    pub navigation: NavigationPattern,
    pub was_distraction: bool,
    pub frequency: u32,
}

/// Similarity of the current context to known distraction patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSimilarity {
    pub overall: f64,
    pub temporal: f64,
    pub categorical: f64,
    pub navigational: f64,
    pub matched: bool,
}

impl PatternSimilarity {
    fn none() -> Self {
        Self {
            overall: 0.0,
            temporal: 0.0,
            categorical: 0.0,
            navigational: 0.0,
            matched: false,
        }
    }
}

/// Hourly-refreshed table of historical activity buckets.
#[derive(Debug, Default)]
pub struct PatternMatcher {
    buckets: Vec<PatternBucket>,
    last_rebuild: Option<DateTime<Utc>>,
}

impl PatternMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the bucket table if more than an hour has elapsed since the
    /// last rebuild. Returns whether a rebuild ran.
    pub fn rebuild_if_stale(&mut self, log: &ActivityLog, now: DateTime<Utc>) -> bool {
        let stale = match self.last_rebuild {
            None => true,
            Some(last) => now - last > Duration::minutes(REBUILD_INTERVAL_MINUTES),
        };
        if stale {
            self.rebuild(log, now);
        }
        stale
    }

    /// Re-bucket the last 30 days of history.
    fn rebuild(&mut self, log: &ActivityLog, now: DateTime<Utc>) {
        #[derive(Default)]
        struct Agg {
            frequency: u32,
            distraction_count: u32,
            navigation_counts: HashMap<NavigationPattern, u32>,
        }

        let cutoff = now - Duration::days(RETENTION_DAYS);
        let mut groups: HashMap<(u8, u8, SiteCategory), Agg> = HashMap::new();
        for record in log.entries_since(cutoff) {
            let agg = groups
                .entry((record.hour, record.weekday, record.category))
                .or_default();
            agg.frequency += 1;
            if record.was_distraction {
                agg.distraction_count += 1;
            }
            *agg.navigation_counts.entry(record.navigation).or_insert(0) += 1;
        }

        self.buckets = groups
            .into_iter()
            .filter(|(_, agg)| agg.frequency >= MIN_BUCKET_FREQUENCY)
            .map(|((hour, weekday, category), agg)| PatternBucket {
                hour,
                weekday,
                category,
                navigation: agg
                    .navigation_counts
                    .iter()
                    .max_by_key(|(_, count)| **count)
                    .map(|(nav, _)| *nav)
                    .unwrap_or(NavigationPattern::SinglePage),
                // Strict majority, so one stray entry cannot relabel a bucket.
                was_distraction: agg.distraction_count * 2 > agg.frequency,
                frequency: agg.frequency,
            })
            .collect();
        self.last_rebuild = Some(now);
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Similarity of the current context against distraction buckets only.
    pub fn similarity(&self, tuple: &FeatureTuple) -> PatternSimilarity {
        let distraction: Vec<&PatternBucket> = self
            .buckets
            .iter()
            .filter(|b| b.was_distraction)
            .collect();
        if distraction.is_empty() {
            return PatternSimilarity::none();
        }

        let mut temporal = 0.0;
        let mut categorical = 0.0;
        let mut navigational = 0.0;
        for bucket in &distraction {
            let weight = (bucket.frequency as f64 / 10.0).min(1.0);
            temporal += weight * temporal_similarity(bucket, tuple);
            categorical += weight * if bucket.category == tuple.category { 1.0 } else { 0.0 };
            navigational += weight * if bucket.navigation == tuple.navigation { 1.0 } else { 0.0 };
        }

        let count = distraction.len() as f64;
        let temporal = temporal / count;
        let categorical = categorical / count;
        let navigational = navigational / count;
        let overall = 0.4 * temporal + 0.4 * categorical + 0.2 * navigational;

        PatternSimilarity {
            overall,
            temporal,
            categorical,
            navigational,
            matched: overall > MATCH_THRESHOLD,
        }
    }

    /// Up to 3 human-readable explanations: distraction buckets close to
    /// the current context in both time and category, most frequent first.
    pub fn explain(&self, tuple: &FeatureTuple) -> Vec<String> {
        let mut close: Vec<&PatternBucket> = self
            .buckets
            .iter()
            .filter(|b| b.was_distraction)
            .filter(|b| {
                temporal_similarity(b, tuple) > 0.7
                    && (b.category == tuple.category)
            })
            .collect();
        close.sort_by(|a, b| b.frequency.cmp(&a.frequency));
        close
            .iter()
            .take(3)
            .map(|b| {
                format!(
                    "you tend to drift to {} around {}:00 on {}s (seen {} times)",
                    b.category.name(),
                    b.hour,
                    weekday_name(b.weekday),
                    b.frequency
                )
            })
            .collect()
    }
}

/// 0.4 weekday-similarity + 0.6 hour-similarity, both wraparound-aware.
fn temporal_similarity(bucket: &PatternBucket, tuple: &FeatureTuple) -> f64 {
    let day_delta = wrap_distance(bucket.weekday, tuple.weekday, 7);
    let day = match day_delta {
        0 => 1.0,
        1 => 0.5,
        _ => 0.0,
    };
    let hour_delta = wrap_distance(bucket.hour, tuple.hour, 24);
    let hour = match hour_delta {
        0 => 1.0,
        1 => 0.7,
        2 => 0.4,
        _ => 0.0,
    };
    0.4 * day + 0.6 * hour
}

fn wrap_distance(a: u8, b: u8, modulus: u8) -> u8 {
    let diff = a.abs_diff(b);
    diff.min(modulus - diff)
}

fn weekday_name(weekday: u8) -> &'static str {
    match weekday {
        0 => "Sunday",
        1 => "Monday",
        2 => "Tuesday",
        3 => "Wednesday",
        4 => "Thursday",
        5 => "Friday",
        _ => "Saturday",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::ActivityRecord;

    fn push_records(
        log: &mut ActivityLog,
        count: usize,
        hour: u8,
        weekday: u8,
        category: SiteCategory,
        was_distraction: bool,
    ) {
        for _ in 0..count {
            log.push(ActivityRecord {
                url: "https://example.com".into(),
                domain: "example.com".into(),
                category,
                navigation: NavigationPattern::DomainHopping,
                hour,
                weekday,
                was_distraction,
                at: Utc::now() - Duration::hours(2),
            });
        }
    }

    fn tuple(hour: u8, weekday: u8, category: SiteCategory) -> FeatureTuple {
        FeatureTuple {
            hour,
            weekday,
            category,
            navigation: NavigationPattern::DomainHopping,
            session_minutes: 10,
            idle_productive_minutes: 0,
            rabbit_hole: false,
        }
    }

    #[test]
    fn singleton_buckets_are_discarded() {
        let mut log = ActivityLog::new();
        push_records(&mut log, 1, 14, 2, SiteCategory::SocialMedia, true);
        push_records(&mut log, 3, 20, 5, SiteCategory::VideoStreaming, true);

        let mut matcher = PatternMatcher::new();
        matcher.rebuild_if_stale(&log, Utc::now());
        assert_eq!(matcher.bucket_count(), 1);
    }

    #[test]
    fn rebuild_is_rate_limited_to_an_hour() {
        let mut log = ActivityLog::new();
        push_records(&mut log, 3, 14, 2, SiteCategory::SocialMedia, true);

        let mut matcher = PatternMatcher::new();
        let now = Utc::now();
        assert!(matcher.rebuild_if_stale(&log, now));
        assert!(!matcher.rebuild_if_stale(&log, now + Duration::minutes(30)));
        assert!(matcher.rebuild_if_stale(&log, now + Duration::minutes(61)));
    }

    #[test]
    fn exact_match_scores_high_and_matches() {
        let mut log = ActivityLog::new();
        push_records(&mut log, 10, 22, 3, SiteCategory::VideoStreaming, true);

        let mut matcher = PatternMatcher::new();
        matcher.rebuild_if_stale(&log, Utc::now());

        let sim = matcher.similarity(&tuple(22, 3, SiteCategory::VideoStreaming));
        assert!(sim.temporal > 0.9);
        assert!((sim.categorical - 1.0).abs() < 1e-9);
        assert!(sim.matched, "overall was {}", sim.overall);
    }

    #[test]
    fn unrelated_context_does_not_match() {
        let mut log = ActivityLog::new();
        push_records(&mut log, 10, 22, 3, SiteCategory::VideoStreaming, true);

        let mut matcher = PatternMatcher::new();
        matcher.rebuild_if_stale(&log, Utc::now());

        let sim = matcher.similarity(&tuple(9, 0, SiteCategory::Productivity));
        assert!(!sim.matched);
    }

    #[test]
    fn productive_buckets_are_ignored_for_similarity() {
        let mut log = ActivityLog::new();
        push_records(&mut log, 10, 10, 2, SiteCategory::Productivity, false);

        let mut matcher = PatternMatcher::new();
        matcher.rebuild_if_stale(&log, Utc::now());

        let sim = matcher.similarity(&tuple(10, 2, SiteCategory::Productivity));
        assert_eq!(sim.overall, 0.0);
        assert!(!sim.matched);
    }

    #[test]
    fn majority_rules_the_bucket_label() {
        let mut log = ActivityLog::new();
        push_records(&mut log, 3, 14, 2, SiteCategory::News, true);
        push_records(&mut log, 2, 14, 2, SiteCategory::News, false);

        let mut matcher = PatternMatcher::new();
        matcher.rebuild_if_stale(&log, Utc::now());

        let sim = matcher.similarity(&tuple(14, 2, SiteCategory::News));
        assert!(sim.categorical > 0.0);
    }

    #[test]
    fn explanations_name_the_close_buckets() {
        let mut log = ActivityLog::new();
        push_records(&mut log, 12, 22, 3, SiteCategory::VideoStreaming, true);

        let mut matcher = PatternMatcher::new();
        matcher.rebuild_if_stale(&log, Utc::now());

        let explanations = matcher.explain(&tuple(22, 3, SiteCategory::VideoStreaming));
        assert_eq!(explanations.len(), 1);
        assert!(explanations[0].contains("video-streaming"));
        assert!(explanations[0].contains("Wednesday"));
    }
}
