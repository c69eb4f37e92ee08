//! The attention engine facade.
//!
//! Owns one instance of every component plus the storage port and the
//! event bus. All mutating entry points take `&mut self`, which is the
//! single-writer guarantee: one logical engine processes one activity or
//! feedback event at a time.
//!
//! Persistence policy: component state is snapshotted to JSON and written
//! through the storage port after every mutation. A failed write logs a
//! warning and the engine continues on the in-memory value; the next
//! mutation retries (at-least-once persistence). Total loss of the store
//! degrades the engine to default-valued, in-memory-only operation.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::challenge::ChallengeSelector;
use crate::classify::resolver::ai_classification;
use crate::classify::{ClassificationResolver, ClassifiedCategory, RuleClassifier, SiteClassification};
use crate::context::{BrowsingContext, FeatureTuple};
use crate::decision::{DistractionAssessment, DistractionPredictor, EvaluationInputs};
use crate::dismissals::DismissalTracker;
use crate::error::{CoreError, Result};
use crate::events::{Event, EventBus, EventSink};
use crate::history::{ActivityLog, ActivityRecord, DrainOutcome, IntakeQueue};
use crate::patterns::PatternMatcher;
use crate::rewards::{AwardOutcome, RewardEngine, UserProgress};
use crate::scorer::OnlineScorer;
use crate::settings::UserSettings;
use crate::storage::KeyValueStore;
use crate::streak::{StreakRecord, StreakTracker};

/// Consecutive dismissals at which the cooldown escalates.
const COOLDOWN_ESCALATION_COUNT: u32 = 3;

const KEY_SCORER: &str = "state/scorer";
const KEY_RESOLVER: &str = "state/resolver";
const KEY_PREDICTOR: &str = "state/predictor";
const KEY_DISMISSALS: &str = "state/dismissals";
const KEY_STREAK: &str = "state/streak";
const KEY_PROGRESS: &str = "state/progress";
const KEY_HISTORY: &str = "state/history";

/// The decision and gamification engine.
pub struct AttentionEngine {
    settings: UserSettings,
    store: Box<dyn KeyValueStore>,
    bus: EventBus,
    scorer: OnlineScorer,
    rules: RuleClassifier,
    resolver: ClassificationResolver,
    patterns: PatternMatcher,
    predictor: DistractionPredictor,
    selector: ChallengeSelector,
    dismissals: DismissalTracker,
    streak: StreakTracker,
    rewards: RewardEngine,
    history: ActivityLog,
    intake: IntakeQueue,
}

impl AttentionEngine {
    /// Build an engine over the given store, restoring any persisted
    /// component state. A missing or corrupt snapshot falls back to
    /// defaults -- the engine never refuses to start over bad state.
    pub fn new(store: Box<dyn KeyValueStore>, settings: UserSettings) -> Self {
        let scorer = OnlineScorer::import_state(load_state(store.as_ref(), KEY_SCORER));
        let resolver = ClassificationResolver::import_state(load_state(store.as_ref(), KEY_RESOLVER));
        let predictor = DistractionPredictor::import_state(load_state(store.as_ref(), KEY_PREDICTOR));
        let dismissals = DismissalTracker::import_state(load_state(store.as_ref(), KEY_DISMISSALS));
        let streak = StreakTracker::import_state(load_state(store.as_ref(), KEY_STREAK));
        let rewards = RewardEngine::import_state(load_state(store.as_ref(), KEY_PROGRESS));
        let history: ActivityLog = load_state(store.as_ref(), KEY_HISTORY);

        Self {
            settings,
            store,
            bus: EventBus::new(),
            scorer,
            rules: RuleClassifier::new(),
            resolver,
            patterns: PatternMatcher::new(),
            predictor,
            selector: ChallengeSelector::new(),
            dismissals,
            streak,
            rewards,
            history,
            intake: IntakeQueue::new(),
        }
    }

    /// Replace the active settings (the settings store collaborator pushes
    /// updates through here).
    pub fn update_settings(&mut self, settings: UserSettings) {
        self.settings = settings;
    }

    pub fn settings(&self) -> &UserSettings {
        &self.settings
    }

    /// Subscribe a badge/notification collaborator to streak and reward
    /// events.
    pub fn subscribe(&mut self, sink: Box<dyn EventSink>) {
        self.bus.subscribe(sink);
    }

    // ── Evaluation ───────────────────────────────────────────────────

    /// Decide whether the current context warrants an intervention.
    ///
    /// Malformed input is rejected before any state mutates; past that
    /// point the call cannot fail -- scoring problems degrade to a pass
    /// decision, because failing open is always safer than a spurious
    /// intervention.
    pub fn evaluate(&mut self, ctx: &BrowsingContext) -> Result<DistractionAssessment> {
        ctx.validate().map_err(CoreError::from)?;
        let now = Utc::now();

        // Pause, quiet hours, whitelist, learning mode and cooldown are
        // checked before any classification work.
        if let Some(pass) = self.predictor.precheck(ctx, &self.settings, now) {
            return Ok(pass);
        }

        let tuple = FeatureTuple::extract(ctx);
        self.patterns.rebuild_if_stale(&self.history, now);

        let scorer_confidence = self.scorer.confidence(&tuple);
        let rule_classification = self.rules.classify(ctx);
        let ai = ai_classification(&ctx.url, scorer_confidence);
        let classification = self.resolver.resolve(&ctx.url, &ai, &rule_classification);

        let strategy = self.dismissals.strategy_for(&ctx.domain());
        let effective_frequency =
            strategy.effective_frequency(self.settings.intervention_frequency);
        let pattern = self.patterns.similarity(&tuple);

        let mut assessment = self.predictor.evaluate(&EvaluationInputs {
            ctx,
            tuple: &tuple,
            settings: &self.settings,
            effective_frequency,
            classification: &classification,
            scorer_confidence,
            pattern: &pattern,
            now,
        });

        if assessment.is_distraction {
            assessment.suggested_challenge = Some(self.selector.select(
                &tuple,
                &self.settings.preferred_challenge_types,
                None,
            ));
        }
        log::debug!(
            "evaluated {}: distraction={} confidence={:.2} ({})",
            ctx.domain(),
            assessment.is_distraction,
            assessment.confidence,
            assessment.reason
        );
        Ok(assessment)
    }

    /// Historical-pattern explanations for the current context.
    pub fn explain_patterns(&mut self, ctx: &BrowsingContext) -> Vec<String> {
        let now = Utc::now();
        self.patterns.rebuild_if_stale(&self.history, now);
        self.patterns.explain(&FeatureTuple::extract(ctx))
    }

    // ── Intervention outcomes ────────────────────────────────────────

    /// An intervention was shown for a site; the cooldown window restarts.
    pub fn record_intervention(&mut self, _site: &str) {
        self.predictor.record_intervention(Utc::now());
        self.persist(KEY_PREDICTOR, &self.predictor.export_state());
    }

    /// The user dismissed the intervention. Counts toward the site's
    /// backoff, escalates the cooldown at the threshold, and feeds the
    /// scorer a "not a distraction" sample.
    pub fn record_dismissal(&mut self, site: &str, ctx: &BrowsingContext) {
        let now = Utc::now();
        let count = self.dismissals.record_dismissal(site, now);
        if count >= COOLDOWN_ESCALATION_COUNT {
            self.predictor.escalate_cooldown();
        }
        self.scorer.record_feedback(&FeatureTuple::extract(ctx), false);

        self.persist(KEY_DISMISSALS, &self.dismissals.export_state());
        self.persist(KEY_PREDICTOR, &self.predictor.export_state());
        self.persist(KEY_SCORER, &self.scorer.export_state());
    }

    /// The user completed the challenge. Clears the site's dismissal
    /// record, resets the cooldown, and awards intervention points.
    pub fn record_completion(&mut self, site: &str) -> AwardOutcome {
        self.dismissals.record_completion(site);
        self.predictor.reset_cooldown();
        let outcome = self.rewards.award_intervention(Utc::now());

        self.persist(KEY_DISMISSALS, &self.dismissals.export_state());
        self.persist(KEY_PREDICTOR, &self.predictor.export_state());
        self.persist(KEY_PROGRESS, &self.rewards.export_state());
        self.bus.publish_all(&outcome.events);
        outcome
    }

    /// Learned feedback outside the dismissal path (e.g. the user marks a
    /// flagged site as genuinely distracting).
    pub fn record_feedback(&mut self, ctx: &BrowsingContext, was_distraction: bool) {
        self.scorer
            .record_feedback(&FeatureTuple::extract(ctx), was_distraction);
        self.persist(KEY_SCORER, &self.scorer.export_state());
    }

    // ── Streak signals ───────────────────────────────────────────────

    /// A productive signal. Streak transitions cascade into rewards:
    /// milestones and personal bests award points as they are crossed.
    pub fn record_productive_activity(&mut self) -> Vec<Event> {
        let now = Utc::now();
        let mut events = self.streak.record_productive_activity(now);

        let mut reward_events = Vec::new();
        for event in &events {
            match event {
                Event::StreakMilestone { value, at } => {
                    reward_events.extend(self.rewards.award_milestone(*value, *at).events);
                }
                Event::StreakIncremented { personal_best: true, at, .. } => {
                    reward_events.extend(self.rewards.award_personal_best(*at).events);
                }
                _ => {}
            }
        }
        events.extend(reward_events);

        self.persist(KEY_STREAK, &self.streak.export_state());
        self.persist(KEY_PROGRESS, &self.rewards.export_state());
        self.bus.publish_all(&events);
        events
    }

    /// A distraction signal; breaks an active streak.
    pub fn record_distraction(&mut self) -> Vec<Event> {
        let events = self.streak.record_distraction(Utc::now());
        if !events.is_empty() {
            self.persist(KEY_STREAK, &self.streak.export_state());
            self.bus.publish_all(&events);
        }
        events
    }

    /// Inactivity watchdog tick; the host calls this periodically.
    pub fn check_inactivity(&mut self) -> Vec<Event> {
        let events = self.streak.check_inactivity(Utc::now());
        if !events.is_empty() {
            self.persist(KEY_STREAK, &self.streak.export_state());
            self.bus.publish_all(&events);
        }
        events
    }

    // ── Reward entry points ──────────────────────────────────────────

    /// Award a productive session, scaled by the current streak
    /// multiplier.
    pub fn award_session(&mut self, duration_minutes: u32) -> AwardOutcome {
        let multiplier = self.streak.multiplier();
        let outcome = self
            .rewards
            .award_session(duration_minutes, multiplier, Utc::now());
        self.persist(KEY_PROGRESS, &self.rewards.export_state());
        self.bus.publish_all(&outcome.events);
        outcome
    }

    /// Award the daily streak goal.
    pub fn award_daily_goal(&mut self) -> AwardOutcome {
        let outcome = self.rewards.award_daily_goal(Utc::now());
        self.persist(KEY_PROGRESS, &self.rewards.export_state());
        self.bus.publish_all(&outcome.events);
        outcome
    }

    // ── Classification ───────────────────────────────────────────────

    /// Manually classify a site (exact URL or bare domain).
    pub fn set_user_classification(
        &mut self,
        site: &str,
        category: ClassifiedCategory,
        custom_label: Option<String>,
    ) -> Result<()> {
        self.resolver
            .set_user_classification(site, category, custom_label)
            .map_err(CoreError::from)?;
        self.persist(KEY_RESOLVER, &self.resolver.export_state());
        Ok(())
    }

    /// Resolve a URL's classification without deciding anything.
    pub fn classify(&self, ctx: &BrowsingContext) -> SiteClassification {
        let tuple = FeatureTuple::extract(ctx);
        let ai = ai_classification(&ctx.url, self.scorer.confidence(&tuple));
        let rules = self.rules.classify(ctx);
        self.resolver.resolve(&ctx.url, &ai, &rules)
    }

    // ── Activity intake ──────────────────────────────────────────────

    /// Buffer an activity event for the next drain.
    pub fn enqueue_activity(&mut self, ctx: BrowsingContext) -> Result<()> {
        ctx.validate().map_err(CoreError::from)?;
        self.intake.enqueue(ctx);
        Ok(())
    }

    /// Drain up to one batch of buffered activity into the history log,
    /// persisting after each record. A failed write re-queues the event
    /// at the front and aborts the drain.
    pub fn drain_activity(&mut self) -> DrainOutcome {
        let mut intake = std::mem::take(&mut self.intake);
        let outcome = intake.drain_batch(|ctx| {
            let tuple = FeatureTuple::extract(ctx);
            let ai = ai_classification(&ctx.url, self.scorer.confidence(&tuple));
            let rules = self.rules.classify(ctx);
            let classification = self.resolver.resolve(&ctx.url, &ai, &rules);
            self.history.push(ActivityRecord {
                url: ctx.url.clone(),
                domain: ctx.domain(),
                category: tuple.category,
                navigation: tuple.navigation,
                hour: ctx.hour,
                weekday: ctx.weekday,
                was_distraction: classification.category == ClassifiedCategory::Distraction,
                at: ctx.timestamp,
            });
            match serialize_and_set(self.store.as_ref(), KEY_HISTORY, &self.history) {
                Ok(()) => Ok(()),
                Err(e) => {
                    self.history.pop_last();
                    Err(e)
                }
            }
        });
        self.intake = intake;
        outcome
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn get_progress(&self) -> &UserProgress {
        self.rewards.progress()
    }

    pub fn get_streak(&self) -> &StreakRecord {
        self.streak.record()
    }

    /// Sites worth suggesting for the whitelist, given the dismissal
    /// history. Empty unless the trailing-hour dismissal rate is high.
    pub fn whitelist_suggestions(&mut self) -> Vec<String> {
        if !self.dismissals.high_dismissal_rate(Utc::now()) {
            return Vec::new();
        }
        self.dismissals.whitelist_suggestions(&self.settings.whitelist)
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        let streak = self.streak.record();
        let progress = self.rewards.progress();
        Event::StateSnapshot {
            streak_current: streak.current,
            streak_longest: streak.longest,
            multiplier: streak.multiplier,
            level: progress.level,
            total_points: progress.total_points,
            points_to_next_level: progress.points_to_next_level,
            cooldown_until: self.predictor.cooldown_until(),
            at: Utc::now(),
        }
    }

    /// Pause interventions until the given time.
    pub fn pause_until(&mut self, until: DateTime<Utc>) {
        self.predictor.set_manual_pause(until);
        self.persist(KEY_PREDICTOR, &self.predictor.export_state());
    }

    pub fn resume(&mut self) {
        self.predictor.clear_manual_pause();
        self.persist(KEY_PREDICTOR, &self.predictor.export_state());
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn persist<T: Serialize>(&self, key: &str, state: &T) {
        if let Err(e) = serialize_and_set(self.store.as_ref(), key, state) {
            log::warn!("persist of {key} failed, continuing in-memory: {e}");
        }
    }
}

fn serialize_and_set<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    state: &T,
) -> std::result::Result<(), crate::error::StorageError> {
    let json = serde_json::to_string(state).map_err(|e| {
        crate::error::StorageError::CorruptValue {
            key: key.to_string(),
            message: e.to_string(),
        }
    })?;
    store.set(key, &json)
}

/// Load one component snapshot, falling back to defaults on any failure.
fn load_state<T: DeserializeOwned + Default>(store: &dyn KeyValueStore, key: &str) -> T {
    match store.get(key) {
        Ok(Some(json)) => match serde_json::from_str(&json) {
            Ok(state) => state,
            Err(e) => {
                log::warn!("corrupt snapshot for {key}, starting from defaults: {e}");
                T::default()
            }
        },
        Ok(None) => T::default(),
        Err(e) => {
            log::warn!("could not read {key}, starting from defaults: {e}");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::ChallengeType;
    use crate::storage::{FailingStore, MemoryStore};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn engine() -> AttentionEngine {
        AttentionEngine::new(Box::new(MemoryStore::new()), UserSettings::default())
    }

    fn ctx(url: &str, hour: u8, weekday: u8) -> BrowsingContext {
        BrowsingContext {
            url: url.to_string(),
            title: String::new(),
            timestamp: Utc::now(),
            hour,
            weekday,
            recent_history: Vec::new(),
            session_minutes: 10,
            idle_productive_minutes: 0,
        }
    }

    struct Collect(Rc<RefCell<Vec<Event>>>);

    impl EventSink for Collect {
        fn on_event(&self, event: &Event) {
            self.0.borrow_mut().push(event.clone());
        }
    }

    #[test]
    fn malformed_context_is_rejected_without_mutation() {
        let mut engine = engine();
        let bad = ctx("", 10, 2);
        assert!(engine.evaluate(&bad).is_err());
        assert!(engine.enqueue_activity(bad).is_err());
    }

    #[test]
    fn whitelisted_site_never_flags() {
        let mut engine = engine();
        let mut settings = UserSettings::default();
        settings.whitelist.push("reddit.com".into());
        engine.update_settings(settings);

        let assessment = engine.evaluate(&ctx("https://reddit.com/r/all", 10, 2)).unwrap();
        assert!(!assessment.is_distraction);
        assert_eq!(assessment.reason, "whitelisted");
    }

    #[test]
    fn flagged_decision_carries_a_challenge() {
        let mut engine = engine();
        let mut settings = UserSettings::default();
        settings.intervention_frequency = crate::settings::InterventionFrequency::Aggressive;
        engine.update_settings(settings);

        // Social media during work hours: rules say distraction at 0.85.
        let assessment = engine.evaluate(&ctx("https://reddit.com/r/all", 10, 2)).unwrap();
        assert!(assessment.is_distraction);
        let challenge = assessment.suggested_challenge.expect("challenge attached");
        assert!(ChallengeType::ALL.contains(&challenge.challenge_type));
        assert!(challenge.timeout_seconds > 0);
    }

    #[test]
    fn weak_signals_stay_below_the_default_threshold() {
        // Rule confidence 0.6 (news on work time), neutral scorer, no
        // context flags: fused = 0.4*0.5 + 0.3*0.6 = 0.38.
        let mut engine = engine();
        let news = ctx("https://bbc.com/news", 10, 2);
        let assessment = engine.evaluate(&news).unwrap();
        assert!(!assessment.is_distraction);
        assert!(assessment.confidence < 0.4);
    }

    #[test]
    fn third_dismissal_escalates_cooldown_and_completion_resets() {
        let mut engine = engine();
        let site = "reddit.com";
        let reddit = ctx("https://reddit.com/r/all", 20, 2);

        engine.record_dismissal(site, &reddit);
        engine.record_dismissal(site, &reddit);
        assert_eq!(engine.predictor.cooldown_minutes(), 5);

        engine.record_dismissal(site, &reddit);
        assert_eq!(engine.predictor.cooldown_minutes(), 15);

        let outcome = engine.record_completion(site);
        assert_eq!(outcome.points, 10);
        assert_eq!(engine.predictor.cooldown_minutes(), 5);
        assert_eq!(engine.dismissals.consecutive(site), 0);
    }

    #[test]
    fn user_classification_overrides_the_scorer() {
        let mut engine = engine();
        // Teach the scorer that this context is distracting.
        let docs = ctx("https://docs.example.com/page", 10, 2);
        for _ in 0..20 {
            engine.record_feedback(&docs, true);
        }

        engine
            .set_user_classification(
                "docs.example.com",
                ClassifiedCategory::Productive,
                None,
            )
            .unwrap();

        let resolved = engine.classify(&docs);
        assert_eq!(resolved.category, ClassifiedCategory::Productive);
        assert_eq!(resolved.confidence, 1.0);
        assert_eq!(resolved.source, crate::classify::ClassificationSource::User);
    }

    #[test]
    fn streak_milestone_awards_points_and_achievement() {
        let mut engine = engine();
        let seen = Rc::new(RefCell::new(Vec::new()));
        engine.subscribe(Box::new(Collect(seen.clone())));

        // Fake a streak sitting at 4 by importing state directly.
        let mut record = StreakRecord::default();
        record.phase = crate::streak::StreakPhase::Active;
        record.current = 4;
        record.longest = 9;
        record.last_update = Utc::now() - chrono::Duration::minutes(6);
        engine.streak = StreakTracker::import_state(record);

        let events = engine.record_productive_activity();
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::StreakMilestone { value: 5, .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::PointsAwarded { points: 50, .. })));
        assert!(engine
            .get_progress()
            .achievements
            .contains_key("focused-five"));
        // Multiplier is still in the 1.0 band, and the published stream
        // saw it all.
        assert_eq!(engine.get_streak().multiplier, 1.0);
        assert!(!seen.borrow().is_empty());
    }

    #[test]
    fn session_points_scale_with_streak_multiplier() {
        let mut engine = engine();
        let mut record = StreakRecord::default();
        record.phase = crate::streak::StreakPhase::Active;
        record.current = 12;
        record.longest = 12;
        record.multiplier = 1.5;
        engine.streak = StreakTracker::import_state(record);

        let outcome = engine.award_session(30);
        assert_eq!(outcome.points, 45);
    }

    #[test]
    fn state_survives_engine_restart() {
        // Restart is exercised through a shared MemoryStore; the SQLite
        // path is covered by the storage tests.
        let shared = Rc::new(MemoryStore::new());

        struct Shared(Rc<MemoryStore>);
        impl KeyValueStore for Shared {
            fn get(&self, key: &str) -> std::result::Result<Option<String>, crate::error::StorageError> {
                self.0.get(key)
            }
            fn set(&self, key: &str, value: &str) -> std::result::Result<(), crate::error::StorageError> {
                self.0.set(key, value)
            }
        }

        {
            let mut engine = AttentionEngine::new(
                Box::new(Shared(shared.clone())),
                UserSettings::default(),
            );
            engine.record_productive_activity();
            engine.award_session(30);
        }

        let engine = AttentionEngine::new(Box::new(Shared(shared)), UserSettings::default());
        assert_eq!(engine.get_streak().current, 1);
        assert_eq!(engine.get_progress().total_points, 30);
    }

    #[test]
    fn failing_store_degrades_to_in_memory_operation() {
        let mut engine =
            AttentionEngine::new(Box::new(FailingStore), UserSettings::default());
        let events = engine.record_productive_activity();
        assert!(!events.is_empty());
        assert_eq!(engine.get_streak().current, 1);

        let outcome = engine.record_completion("reddit.com");
        assert_eq!(outcome.points, 10);
    }

    #[test]
    fn drained_activity_feeds_pattern_history() {
        let mut engine = engine();
        for i in 0..12 {
            engine
                .enqueue_activity(ctx(&format!("https://youtube.com/v{i}"), 22, 3))
                .unwrap();
        }
        let outcome = engine.drain_activity();
        assert_eq!(outcome, DrainOutcome::Drained { processed: 10, failed: false });
        assert_eq!(engine.history.len(), 10);

        engine.drain_activity();
        assert_eq!(engine.history.len(), 12);
    }

    #[test]
    fn failed_drain_requeues_and_loses_nothing() {
        let mut engine =
            AttentionEngine::new(Box::new(FailingStore), UserSettings::default());
        engine
            .enqueue_activity(ctx("https://youtube.com/v", 22, 3))
            .unwrap();
        let outcome = engine.drain_activity();
        assert_eq!(outcome, DrainOutcome::Drained { processed: 0, failed: true });
        // Event is back in the queue, history rolled back.
        assert_eq!(engine.intake.len(), 1);
        assert_eq!(engine.history.len(), 0);
    }

    #[test]
    fn snapshot_reflects_current_state() {
        let mut engine = engine();
        engine.record_productive_activity();
        match engine.snapshot() {
            Event::StateSnapshot { streak_current, level, total_points, .. } => {
                assert_eq!(streak_current, 1);
                assert_eq!(level, 1);
                assert_eq!(total_points, 0);
            }
            _ => panic!("expected StateSnapshot"),
        }
    }
}
