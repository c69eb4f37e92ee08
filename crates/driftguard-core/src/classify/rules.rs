//! Deterministic rule cascade, used as the classification fallback.
//!
//! Ordered rules, first match wins. The cascade is intentionally coarse:
//! it exists so the engine still has a defensible answer when the online
//! scorer has not seen enough feedback to be trusted.

use crate::classify::{ClassificationSource, ClassifiedCategory, SiteClassification};
use crate::context::{
    categorize, domain_of, is_late_night, is_work_hours, BrowsingContext, SiteCategory,
    PRODUCTIVITY_DOMAINS,
};

/// Stateless rule-based classifier.
#[derive(Debug, Default)]
pub struct RuleClassifier;

impl RuleClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Run the cascade for the current context.
    pub fn classify(&self, ctx: &BrowsingContext) -> SiteClassification {
        let host = ctx.domain();
        let work_hours = is_work_hours(ctx.hour, ctx.weekday);

        // 1. Known productivity domain.
        if PRODUCTIVITY_DOMAINS.iter().any(|d| host.contains(d)) {
            return self.result(ctx, ClassifiedCategory::Productive, 0.9);
        }

        match categorize(&ctx.url) {
            // 2. Social media, harsher during work hours.
            SiteCategory::SocialMedia => {
                let confidence = if work_hours { 0.85 } else { 0.7 };
                return self.result(ctx, ClassifiedCategory::Distraction, confidence);
            }
            // 3. Video streaming.
            SiteCategory::VideoStreaming => {
                return self.result(ctx, ClassifiedCategory::Distraction, 0.8);
            }
            // 4. News reads as distraction only on work time.
            SiteCategory::News => {
                return if work_hours {
                    self.result(ctx, ClassifiedCategory::Distraction, 0.6)
                } else {
                    self.result(ctx, ClassifiedCategory::Neutral, 0.5)
                };
            }
            SiteCategory::Productivity | SiteCategory::Other => {}
        }

        // 5. Late night browsing of anything else.
        if is_late_night(ctx.hour) {
            return self.result(ctx, ClassifiedCategory::Distraction, 0.65);
        }

        // 6. Sustained work-hours focus on one domain.
        if work_hours && ctx.session_minutes > 30 && self.dominant_domain(ctx, &host) {
            return self.result(ctx, ClassifiedCategory::Productive, 0.7);
        }

        // 7. Default.
        self.result(ctx, ClassifiedCategory::Neutral, 0.5)
    }

    /// Distraction score in [0, 1]: the cascade's confidence when it calls
    /// distraction, its complement when it calls productive, 0.5 otherwise.
    pub fn distraction_score(&self, ctx: &BrowsingContext) -> f64 {
        let classification = self.classify(ctx);
        match classification.category {
            ClassifiedCategory::Distraction => classification.confidence,
            ClassifiedCategory::Productive => 1.0 - classification.confidence,
            _ => 0.5,
        }
    }

    /// At least 3 of the last 5 history entries share the current domain.
    fn dominant_domain(&self, ctx: &BrowsingContext, host: &str) -> bool {
        let shared = ctx
            .recent_history
            .iter()
            .rev()
            .take(5)
            .filter(|u| domain_of(u) == host)
            .count();
        shared >= 3
    }

    fn result(
        &self,
        ctx: &BrowsingContext,
        category: ClassifiedCategory,
        confidence: f64,
    ) -> SiteClassification {
        SiteClassification::new(
            ctx.url.clone(),
            category,
            confidence,
            ClassificationSource::Default,
        )
    }
}
