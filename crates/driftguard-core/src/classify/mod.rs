//! Site classification: rule cascade, resolver, shared types.

pub mod resolver;
pub mod rules;

pub use resolver::ClassificationResolver;
pub use rules::RuleClassifier;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// What a site means for the user's focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifiedCategory {
    Productive,
    Distraction,
    Neutral,
    Custom,
}

/// Who produced a classification. User beats Ai beats Default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationSource {
    User,
    Ai,
    Default,
}

/// One site's resolved classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteClassification {
    /// Exact URL or bare domain this entry applies to.
    pub site: String,
    pub category: ClassifiedCategory,
    pub confidence: f64,
    pub source: ClassificationSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_label: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl SiteClassification {
    pub fn new(
        site: impl Into<String>,
        category: ClassifiedCategory,
        confidence: f64,
        source: ClassificationSource,
    ) -> Self {
        Self {
            site: site.into(),
            category,
            confidence: confidence.clamp(0.0, 1.0),
            source,
            custom_label: None,
            last_updated: Utc::now(),
        }
    }

    /// `Custom` requires a label; everything else forbids one.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.category == ClassifiedCategory::Custom && self.custom_label.is_none() {
            return Err(ValidationError::InvalidValue {
                field: "custom_label".into(),
                message: "custom classification requires a label".into(),
            });
        }
        Ok(())
    }
}
