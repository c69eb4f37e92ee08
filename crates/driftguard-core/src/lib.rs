//! # Driftguard Core Library
//!
//! This library provides the core business logic for Driftguard: an
//! attention decision and gamification engine. It watches a stream of
//! browsing-activity events, decides moment to moment whether the user is
//! being unproductive, proposes short corrective micro-challenges, and
//! converts sustained focus into points, levels and achievements. All
//! operations are available via a standalone CLI binary; any GUI surface
//! is a thin layer over the same core library.
//!
//! ## Architecture
//!
//! - **Decision core**: cheap pre-checks (pause, quiet hours, whitelist,
//!   learning mode, cooldown) followed by a fused score over the online
//!   scorer, the resolved classification, and contextual heuristics
//! - **Online scorer**: a persisted weight table with sigmoid confidence,
//!   adjusted by discrete feedback events
//! - **Pattern matcher**: hourly-refreshed buckets over 30 days of history
//! - **Streak machine**: wall-clock state machine whose transitions return
//!   the events they emit
//! - **Rewards**: fixed point table, cumulative level thresholds, and a
//!   one-time achievement catalog
//! - **Storage**: injected key/value port; SQLite in production, memory in
//!   tests; every mutation is snapshotted through it
//!
//! ## Key Components
//!
//! - [`AttentionEngine`]: the facade owning every component
//! - [`DistractionPredictor`]: pre-checks and score fusion
//! - [`OnlineScorer`]: feedback-adjusted confidence
//! - [`StreakTracker`] / [`RewardEngine`]: gamification state machines
//! - [`KeyValueStore`]: the persistence port

pub mod challenge;
pub mod classify;
pub mod context;
pub mod decision;
pub mod dismissals;
pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod patterns;
pub mod rewards;
pub mod scorer;
pub mod settings;
pub mod storage;
pub mod streak;

pub use challenge::{ChallengeSelector, ChallengeType, MicroChallenge};
pub use classify::{
    ClassificationResolver, ClassificationSource, ClassifiedCategory, RuleClassifier,
    SiteClassification,
};
pub use context::{BrowsingContext, FeatureTuple, NavigationPattern, SiteCategory};
pub use decision::{DistractionAssessment, DistractionPredictor};
pub use dismissals::{AdaptationStrategy, DismissalTracker};
pub use engine::AttentionEngine;
pub use error::{ConfigError, CoreError, StorageError, ValidationError};
pub use events::{Event, EventBus, EventSink};
pub use history::{ActivityLog, ActivityRecord, IntakeQueue};
pub use patterns::{PatternMatcher, PatternSimilarity};
pub use rewards::{RewardEngine, UserProgress};
pub use scorer::OnlineScorer;
pub use settings::{InterventionFrequency, QuietHours, UserSettings};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore};
pub use streak::{StreakRecord, StreakTracker};
