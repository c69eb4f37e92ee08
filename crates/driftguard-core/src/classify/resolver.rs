//! Classification resolver.
//!
//! Merges user-assigned, online-scorer, and rule-based classifications by
//! priority into one answer per site. The resolver holds the user's manual
//! classifications but writes nothing else itself; callers persist the
//! chosen classification through the storage port.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::classify::{ClassificationSource, ClassifiedCategory, SiteClassification};
use crate::context::domain_of;
use crate::error::ValidationError;

/// Scorer confidence below this is not trusted on its own.
const AI_CONFIDENCE_FLOOR: f64 = 0.6;

/// Serializable resolver state: the user's manual classifications, keyed
/// by exact URL or bare domain as given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverState {
    pub user_classifications: HashMap<String, SiteClassification>,
}

/// Priority merge of classification sources.
#[derive(Debug, Default)]
pub struct ClassificationResolver {
    user_classifications: HashMap<String, SiteClassification>,
}

impl ClassificationResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a manual classification. The site key may be an exact URL or
    /// a bare domain; user classifications always carry confidence 1.0.
    pub fn set_user_classification(
        &mut self,
        site: &str,
        category: ClassifiedCategory,
        custom_label: Option<String>,
    ) -> Result<(), ValidationError> {
        let mut classification = SiteClassification::new(
            site.to_string(),
            category,
            1.0,
            ClassificationSource::User,
        );
        classification.custom_label = custom_label;
        classification.validate()?;
        self.user_classifications
            .insert(site.to_string(), classification);
        Ok(())
    }

    pub fn remove_user_classification(&mut self, site: &str) {
        self.user_classifications.remove(site);
    }

    /// Resolve one URL. Order: exact-URL user entry, domain-level user
    /// entry (site key rewritten to the queried URL), trusted scorer
    /// classification, else whichever of scorer/rules is more confident.
    pub fn resolve(
        &self,
        url: &str,
        ai: &SiteClassification,
        rules: &SiteClassification,
    ) -> SiteClassification {
        if let Some(exact) = self.user_classifications.get(url) {
            return exact.clone();
        }

        let domain = domain_of(url);
        if let Some(by_domain) = self.user_classifications.get(&domain) {
            let mut rewritten = by_domain.clone();
            rewritten.site = url.to_string();
            return rewritten;
        }

        if ai.confidence >= AI_CONFIDENCE_FLOOR {
            return ai.clone();
        }

        if ai.confidence > rules.confidence {
            ai.clone()
        } else {
            rules.clone()
        }
    }

    pub fn export_state(&self) -> ResolverState {
        ResolverState {
            user_classifications: self.user_classifications.clone(),
        }
    }

    pub fn import_state(state: ResolverState) -> Self {
        Self {
            user_classifications: state.user_classifications,
        }
    }
}

/// Build the scorer-derived classification for a URL from its sigmoid
/// confidence: distraction above 0.5, otherwise productive with the
/// complement.
pub fn ai_classification(url: &str, sigmoid_confidence: f64) -> SiteClassification {
    if sigmoid_confidence > 0.5 {
        SiteClassification::new(
            url.to_string(),
            ClassifiedCategory::Distraction,
            sigmoid_confidence,
            ClassificationSource::Ai,
        )
    } else {
        SiteClassification::new(
            url.to_string(),
            ClassifiedCategory::Productive,
            1.0 - sigmoid_confidence,
            ClassificationSource::Ai,
        )
    }
}
