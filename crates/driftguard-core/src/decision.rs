//! Decision core.
//!
//! Fuses the resolved classification, the online scorer, and contextual
//! heuristics into one score, after a chain of cheap pre-checks that
//! short-circuit without doing any classification work. Failing open is
//! the rule everywhere: when in doubt, the answer is "no intervention".

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::challenge::MicroChallenge;
use crate::classify::{ClassifiedCategory, SiteClassification};
use crate::context::{BrowsingContext, FeatureTuple};
use crate::patterns::PatternSimilarity;
use crate::settings::{InterventionFrequency, UserSettings};

/// Cooldown after an intervention, until dismissals escalate it.
const BASE_COOLDOWN_MINUTES: i64 = 5;

/// Cooldown once a site reaches 3 consecutive dismissals.
const ESCALATED_COOLDOWN_MINUTES: i64 = 15;

/// Scorer confidence above this is itself a named reason to intervene.
const HIGH_AI_CONFIDENCE: f64 = 0.7;

/// URL fragments that indicate a call or presentation in progress.
const VIDEO_CALL_PATTERNS: &[&str] = &[
    "meet.google.com",
    "zoom.us",
    "teams.microsoft.com",
    "webex.com",
];

/// The engine's verdict for one activity event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistractionAssessment {
    pub is_distraction: bool,
    pub confidence: f64,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_challenge: Option<MicroChallenge>,
}

impl DistractionAssessment {
    /// A pass decision from a pre-check, with no scoring work behind it.
    pub fn pass(reason: &str) -> Self {
        Self {
            is_distraction: false,
            confidence: 0.0,
            reason: reason.to_string(),
            suggested_challenge: None,
        }
    }
}

/// Everything `evaluate` consumes. The engine assembles this so the
/// predictor itself stays free of component wiring.
pub struct EvaluationInputs<'a> {
    pub ctx: &'a BrowsingContext,
    pub tuple: &'a FeatureTuple,
    pub settings: &'a UserSettings,
    /// User frequency after dismissal-adaptation loosening.
    pub effective_frequency: InterventionFrequency,
    pub classification: &'a SiteClassification,
    /// Sigmoid confidence from the online scorer.
    pub scorer_confidence: f64,
    pub pattern: &'a PatternSimilarity,
    pub now: DateTime<Utc>,
}

/// Serializable predictor state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorState {
    pub last_intervention: Option<DateTime<Utc>>,
    pub cooldown_minutes: i64,
    pub pause_until: Option<DateTime<Utc>>,
}

impl Default for PredictorState {
    fn default() -> Self {
        Self {
            last_intervention: None,
            cooldown_minutes: BASE_COOLDOWN_MINUTES,
            pause_until: None,
        }
    }
}

/// The distraction predictor: pre-checks, score fusion, cooldown state.
#[derive(Debug, Default)]
pub struct DistractionPredictor {
    state: PredictorState,
}

impl DistractionPredictor {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Cooldown / pause state ───────────────────────────────────────

    /// Pause all interventions until the given time.
    pub fn set_manual_pause(&mut self, until: DateTime<Utc>) {
        self.state.pause_until = Some(until);
    }

    pub fn clear_manual_pause(&mut self) {
        self.state.pause_until = None;
    }

    /// An intervention was shown; the cooldown window restarts.
    pub fn record_intervention(&mut self, now: DateTime<Utc>) {
        self.state.last_intervention = Some(now);
    }

    /// A site crossed the consecutive-dismissal threshold.
    pub fn escalate_cooldown(&mut self) {
        self.state.cooldown_minutes = ESCALATED_COOLDOWN_MINUTES;
    }

    /// A completion resets the escalation.
    pub fn reset_cooldown(&mut self) {
        self.state.cooldown_minutes = BASE_COOLDOWN_MINUTES;
    }

    pub fn cooldown_minutes(&self) -> i64 {
        self.state.cooldown_minutes
    }

    /// When the current cooldown window ends, if one is running.
    pub fn cooldown_until(&self) -> Option<DateTime<Utc>> {
        self.state
            .last_intervention
            .map(|t| t + Duration::minutes(self.state.cooldown_minutes))
    }

    // ── Evaluation ───────────────────────────────────────────────────

    /// Pre-checks alone, in order. Run before any scoring work so a
    /// paused or cooled-down state stays cheap; `Some` short-circuits.
    pub fn precheck(
        &self,
        ctx: &BrowsingContext,
        settings: &UserSettings,
        now: DateTime<Utc>,
    ) -> Option<DistractionAssessment> {
        if self.is_paused(ctx, now) {
            return Some(DistractionAssessment::pass("paused"));
        }
        if settings.in_quiet_hours(ctx.hour) {
            return Some(DistractionAssessment::pass("quiet hours"));
        }
        if settings.is_whitelisted(&ctx.url) {
            return Some(DistractionAssessment::pass("whitelisted"));
        }
        if settings.learning_mode {
            return Some(DistractionAssessment::pass("observing"));
        }
        if let Some(until) = self.cooldown_until() {
            if now < until {
                return Some(DistractionAssessment::pass("cooldown"));
            }
        }
        None
    }

    /// Run the pre-checks, then the fused score against the threshold.
    ///
    /// The returned assessment never carries a challenge; the engine
    /// attaches one when the decision is flagged.
    pub fn evaluate(&self, inputs: &EvaluationInputs<'_>) -> DistractionAssessment {
        if let Some(pass) = self.precheck(inputs.ctx, inputs.settings, inputs.now) {
            return pass;
        }

        let fused = self.fused_score(inputs);
        let threshold = inputs.effective_frequency.threshold();

        if fused >= threshold {
            DistractionAssessment {
                is_distraction: true,
                confidence: fused,
                reason: self.flag_reason(inputs, fused),
                suggested_challenge: None,
            }
        } else {
            DistractionAssessment {
                is_distraction: false,
                confidence: fused,
                reason: format!("below {} threshold", frequency_name(inputs.effective_frequency)),
                suggested_challenge: None,
            }
        }
    }

    /// 0.4 scorer + 0.3 classification + 0.3 context heuristics.
    fn fused_score(&self, inputs: &EvaluationInputs<'_>) -> f64 {
        let classification_term = match inputs.classification.category {
            ClassifiedCategory::Distraction => inputs.classification.confidence,
            ClassifiedCategory::Productive => 1.0 - inputs.classification.confidence,
            _ => 0.5,
        };

        let mut context_term = 0.0;
        if inputs.tuple.rabbit_hole {
            context_term += 0.4;
        }
        if inputs.tuple.is_late_night() {
            context_term += 0.3;
        }
        if inputs.tuple.is_long_unproductive_session() {
            context_term += 0.3;
        }

        0.4 * inputs.scorer_confidence + 0.3 * classification_term + 0.3 * context_term
    }

    fn flag_reason(&self, inputs: &EvaluationInputs<'_>, fused: f64) -> String {
        let mut reasons: Vec<String> = Vec::new();
        if inputs.classification.category == ClassifiedCategory::Distraction {
            reasons.push("site classified as a distraction".to_string());
        }
        if inputs.tuple.rabbit_hole {
            reasons.push("rabbit-hole navigation".to_string());
        }
        if inputs.tuple.is_late_night() {
            reasons.push("late-night browsing".to_string());
        }
        if inputs.tuple.is_long_unproductive_session() {
            reasons.push("long session without productive activity".to_string());
        }
        if inputs.scorer_confidence > HIGH_AI_CONFIDENCE {
            reasons.push("high learned confidence".to_string());
        }
        if inputs.pattern.matched {
            reasons.push("matches your historical distraction pattern".to_string());
        }

        if reasons.is_empty() {
            format!("fused score {fused:.2}")
        } else {
            reasons.join("; ")
        }
    }

    fn is_paused(&self, ctx: &BrowsingContext, now: DateTime<Utc>) -> bool {
        if let Some(until) = self.state.pause_until {
            if now < until {
                return true;
            }
        }
        VIDEO_CALL_PATTERNS.iter().any(|p| ctx.url.contains(p))
    }

    pub fn export_state(&self) -> PredictorState {
        self.state.clone()
    }

    pub fn import_state(state: PredictorState) -> Self {
        Self { state }
    }
}

fn frequency_name(frequency: InterventionFrequency) -> &'static str {
    match frequency {
        InterventionFrequency::Aggressive => "aggressive",
        InterventionFrequency::Moderate => "moderate",
        InterventionFrequency::Minimal => "minimal",
    }
}
