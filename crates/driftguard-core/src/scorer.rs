//! Online confidence scorer.
//!
//! A flat weight table keyed by feature name, summed over the keys a
//! feature tuple activates and squashed through a sigmoid. Not statistical
//! ML: weights move by a fixed step on discrete feedback events, nothing
//! more. The table grows as new category/time keys are seen and is
//! persisted through the storage port after every update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::context::FeatureTuple;

/// Step applied to each matched key on a feedback event.
const FEEDBACK_DELTA: f64 = 0.1;

/// Weights are clamped to this magnitude; the sigmoid saturates well
/// inside it, so the clamp only stops runaway feedback growth.
const WEIGHT_CLAMP: f64 = 5.0;

/// Feedback samples retained for export/replay.
const FEEDBACK_CAPACITY: usize = 100;

/// One retained feedback observation. Not consulted when scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSample {
    pub tuple: FeatureTuple,
    pub was_distraction: bool,
    pub at: DateTime<Utc>,
}

/// Serializable scorer state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScorerState {
    pub weights: HashMap<String, f64>,
    #[serde(default)]
    pub feedback: VecDeque<FeedbackSample>,
}

/// A signed weight, for explainability output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightSummary {
    pub key: String,
    pub weight: f64,
}

/// Online scorer over a persisted weight table.
#[derive(Debug, Default)]
pub struct OnlineScorer {
    weights: HashMap<String, f64>,
    feedback: VecDeque<FeedbackSample>,
}

impl OnlineScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Weight-table keys activated by a tuple. Missing keys score 0.
    fn active_keys(tuple: &FeatureTuple) -> Vec<String> {
        let mut keys = Vec::with_capacity(7);
        if tuple.is_late_night() {
            keys.push("time:late-night".to_string());
        }
        if tuple.is_work_hours() {
            keys.push("time:work-hours".to_string());
        }
        keys.push(format!("category:{}", tuple.category.name()));
        if tuple.navigation == crate::context::NavigationPattern::DomainHopping {
            keys.push("nav:domain-hopping".to_string());
        }
        if tuple.rabbit_hole {
            keys.push("flag:rabbit-hole".to_string());
        }
        if tuple.is_long_unproductive_session() {
            keys.push("flag:long-session".to_string());
        }
        if tuple.idle_productive_minutes > 15 {
            keys.push("flag:recent-distraction".to_string());
        }
        keys
    }

    /// Raw weight sum over the activated keys.
    pub fn score(&self, tuple: &FeatureTuple) -> f64 {
        Self::active_keys(tuple)
            .iter()
            .map(|k| self.weights.get(k).copied().unwrap_or(0.0))
            .sum()
    }

    /// Sigmoid-squashed confidence that the tuple is a distraction.
    pub fn confidence(&self, tuple: &FeatureTuple) -> f64 {
        sigmoid(self.score(tuple))
    }

    /// Binary label; callers mostly use the continuous confidence instead.
    pub fn is_distraction(&self, tuple: &FeatureTuple) -> bool {
        self.confidence(tuple) > 0.5
    }

    /// Adjust every matched key by ±0.1 and retain the sample.
    pub fn record_feedback(&mut self, tuple: &FeatureTuple, was_distraction: bool) {
        let delta = if was_distraction {
            FEEDBACK_DELTA
        } else {
            -FEEDBACK_DELTA
        };
        for key in Self::active_keys(tuple) {
            let w = self.weights.entry(key).or_insert(0.0);
            *w = (*w + delta).clamp(-WEIGHT_CLAMP, WEIGHT_CLAMP);
        }
        if self.feedback.len() == FEEDBACK_CAPACITY {
            self.feedback.pop_front();
        }
        self.feedback.push_back(FeedbackSample {
            tuple: tuple.clone(),
            was_distraction,
            at: Utc::now(),
        });
    }

    /// Retained feedback samples, oldest first.
    pub fn feedback_history(&self) -> impl Iterator<Item = &FeedbackSample> {
        self.feedback.iter()
    }

    /// Weights sorted by magnitude, strongest signals first.
    pub fn weight_summary(&self) -> Vec<WeightSummary> {
        let mut summary: Vec<WeightSummary> = self
            .weights
            .iter()
            .map(|(key, weight)| WeightSummary {
                key: key.clone(),
                weight: *weight,
            })
            .collect();
        summary.sort_by(|a, b| {
            b.weight
                .abs()
                .partial_cmp(&a.weight.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        summary
    }

    /// Export scorer state for persistence.
    pub fn export_state(&self) -> ScorerState {
        ScorerState {
            weights: self.weights.clone(),
            feedback: self.feedback.clone(),
        }
    }

    /// Import scorer state.
    pub fn import_state(state: ScorerState) -> Self {
        Self {
            weights: state.weights,
            feedback: state.feedback,
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
