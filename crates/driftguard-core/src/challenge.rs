//! Micro-challenge selection.
//!
//! Given a flagged decision, picks a challenge type, prompt, difficulty
//! and timeout. Prompt selection avoids the last 3 prompts used per type
//! so back-to-back interventions do not repeat themselves.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::context::{FeatureTuple, SiteCategory};

/// Prompts excluded from re-selection per type.
const RECENT_PROMPT_WINDOW: usize = 3;

/// Difficulty never exceeds this.
const MAX_DIFFICULTY: u8 = 5;

/// The four interaction styles a challenge can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChallengeType {
    Reflection,
    Intention,
    QuickTask,
    Breathing,
}

impl ChallengeType {
    pub const ALL: [ChallengeType; 4] = [
        ChallengeType::Reflection,
        ChallengeType::Intention,
        ChallengeType::QuickTask,
        ChallengeType::Breathing,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ChallengeType::Reflection => "reflection",
            ChallengeType::Intention => "intention",
            ChallengeType::QuickTask => "quick-task",
            ChallengeType::Breathing => "breathing",
        }
    }

    /// Reflection and breathing ask less of the user than intention and
    /// quick-task.
    fn base_difficulty(&self) -> u8 {
        match self {
            ChallengeType::Reflection | ChallengeType::Breathing => 1,
            ChallengeType::Intention | ChallengeType::QuickTask => 2,
        }
    }

    fn base_timeout_secs(&self) -> u32 {
        match self {
            ChallengeType::Reflection => 60,
            ChallengeType::Intention => 45,
            ChallengeType::QuickTask => 120,
            ChallengeType::Breathing => 90,
        }
    }

    fn prompts(&self) -> &'static [&'static str] {
        match self {
            ChallengeType::Reflection => &[
                "What were you working on before this tab?",
                "Is this helping with what you set out to do today?",
                "How will you feel about this detour in an hour?",
                "What brought you to this page just now?",
                "If today had one win, what would it be?",
            ],
            ChallengeType::Intention => &[
                "What do you intend to do on this site?",
                "Set a one-sentence goal before continuing.",
                "How many minutes do you want to spend here?",
                "Name the thing you'll return to after this.",
                "What would make this visit worth it?",
            ],
            ChallengeType::QuickTask => &[
                "Clear one item from your inbox, then come back.",
                "Write down the next step of your current task.",
                "Close three tabs you no longer need.",
                "Add today's loose ends to your todo list.",
                "Spend two minutes on the task you're avoiding.",
            ],
            ChallengeType::Breathing => &[
                "Take five slow breaths before deciding to stay.",
                "Breathe in for four counts, out for six. Repeat three times.",
                "Close your eyes for thirty seconds and relax your shoulders.",
                "Unclench your jaw, drop your shoulders, take one deep breath.",
                "Sit back from the screen and breathe until the timer ends.",
            ],
        }
    }
}

/// A short corrective interaction proposed to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicroChallenge {
    pub id: String,
    pub challenge_type: ChallengeType,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub timeout_seconds: u32,
    /// 1 (lightest) to 5.
    pub difficulty: u8,
}

/// Challenge selection policy.
///
/// Holds a per-type ring of recently used prompts. The RNG is seedable so
/// tests are deterministic.
pub struct ChallengeSelector {
    rng: Pcg64,
    recent_prompts: HashMap<ChallengeType, VecDeque<usize>>,
}

impl ChallengeSelector {
    pub fn new() -> Self {
        Self {
            rng: Pcg64::from_entropy(),
            recent_prompts: HashMap::new(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(seed),
            recent_prompts: HashMap::new(),
        }
    }

    /// Pick a challenge for the current context.
    ///
    /// Type priority: explicit request, then a random pick from the user's
    /// preferred types when they express a real preference (a strict
    /// subset of the four), then the context heuristic.
    pub fn select(
        &mut self,
        tuple: &FeatureTuple,
        preferred: &[ChallengeType],
        explicit: Option<ChallengeType>,
    ) -> MicroChallenge {
        let challenge_type = if let Some(requested) = explicit {
            requested
        } else if !preferred.is_empty() && preferred.len() < ChallengeType::ALL.len() {
            *preferred.choose(&mut self.rng).expect("non-empty preferred")
        } else {
            self.contextual_type(tuple)
        };

        let prompt_index = self.pick_prompt(challenge_type);
        let difficulty = self.difficulty(challenge_type, tuple);
        let base = challenge_type.base_timeout_secs() as f64;
        let timeout_seconds = (base * (1.0 + (difficulty - 1) as f64 * 0.2)).round() as u32;

        MicroChallenge {
            id: uuid::Uuid::new_v4().to_string(),
            challenge_type,
            prompt: challenge_type.prompts()[prompt_index].to_string(),
            options: Self::options_for(challenge_type),
            timeout_seconds,
            difficulty,
        }
    }

    fn contextual_type(&mut self, tuple: &FeatureTuple) -> ChallengeType {
        let coin = self.rng.gen_bool(0.5);
        if tuple.is_late_night() {
            if coin {
                ChallengeType::Breathing
            } else {
                ChallengeType::Reflection
            }
        } else if tuple.is_work_hours() {
            if coin {
                ChallengeType::Intention
            } else {
                ChallengeType::QuickTask
            }
        } else if matches!(
            tuple.category,
            SiteCategory::SocialMedia | SiteCategory::VideoStreaming
        ) {
            if coin {
                ChallengeType::Reflection
            } else {
                ChallengeType::Intention
            }
        } else {
            ChallengeType::ALL[self.rng.gen_range(0..ChallengeType::ALL.len())]
        }
    }

    /// Uniform pick excluding the last 3 used prompts for the type; the
    /// exclusion ring resets once it would rule out every prompt.
    fn pick_prompt(&mut self, challenge_type: ChallengeType) -> usize {
        let total = challenge_type.prompts().len();
        let recent = self.recent_prompts.entry(challenge_type).or_default();

        let mut available: Vec<usize> =
            (0..total).filter(|i| !recent.contains(i)).collect();
        if available.is_empty() {
            recent.clear();
            available = (0..total).collect();
        }

        let index = available[self.rng.gen_range(0..available.len())];
        recent.push_back(index);
        while recent.len() > RECENT_PROMPT_WINDOW {
            recent.pop_front();
        }
        index
    }

    fn difficulty(&self, challenge_type: ChallengeType, tuple: &FeatureTuple) -> u8 {
        let mut difficulty = challenge_type.base_difficulty();
        if tuple.session_minutes > 60 {
            difficulty += 1;
        }
        if tuple.idle_productive_minutes > 30 {
            difficulty += 1;
        }
        difficulty.min(MAX_DIFFICULTY)
    }

    fn options_for(challenge_type: ChallengeType) -> Option<Vec<String>> {
        match challenge_type {
            ChallengeType::Intention => Some(vec![
                "Stay and finish one specific thing".to_string(),
                "Take a real 5-minute break instead".to_string(),
                "Close this tab".to_string(),
            ]),
            _ => None,
        }
    }
}

impl Default for ChallengeSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NavigationPattern;

    fn tuple(hour: u8, weekday: u8, session: u32, idle: u32) -> FeatureTuple {
        FeatureTuple {
            hour,
            weekday,
            category: SiteCategory::SocialMedia,
            navigation: NavigationPattern::SinglePage,
            session_minutes: session,
            idle_productive_minutes: idle,
            rabbit_hole: false,
        }
    }

    #[test]
    fn explicit_request_wins() {
        let mut selector = ChallengeSelector::with_seed(7);
        let c = selector.select(
            &tuple(14, 2, 10, 0),
            &[ChallengeType::Breathing],
            Some(ChallengeType::QuickTask),
        );
        assert_eq!(c.challenge_type, ChallengeType::QuickTask);
    }

    #[test]
    fn strict_preference_subset_is_honored() {
        let mut selector = ChallengeSelector::with_seed(7);
        for _ in 0..20 {
            let c = selector.select(&tuple(14, 2, 10, 0), &[ChallengeType::Breathing], None);
            assert_eq!(c.challenge_type, ChallengeType::Breathing);
        }
    }

    #[test]
    fn late_night_yields_breathing_or_reflection() {
        let mut selector = ChallengeSelector::with_seed(7);
        for _ in 0..20 {
            let c = selector.select(&tuple(1, 2, 10, 0), &ChallengeType::ALL, None);
            assert!(matches!(
                c.challenge_type,
                ChallengeType::Breathing | ChallengeType::Reflection
            ));
        }
    }

    #[test]
    fn work_hours_yield_intention_or_quick_task() {
        let mut selector = ChallengeSelector::with_seed(7);
        for _ in 0..20 {
            let c = selector.select(&tuple(10, 3, 10, 0), &ChallengeType::ALL, None);
            assert!(matches!(
                c.challenge_type,
                ChallengeType::Intention | ChallengeType::QuickTask
            ));
        }
    }

    #[test]
    fn difficulty_scales_with_session_and_idle_time() {
        let mut selector = ChallengeSelector::with_seed(7);
        let light = selector.select(&tuple(14, 2, 10, 0), &[], Some(ChallengeType::Reflection));
        assert_eq!(light.difficulty, 1);
        assert_eq!(light.timeout_seconds, 60);

        let heavy = selector.select(&tuple(14, 2, 70, 40), &[], Some(ChallengeType::Reflection));
        assert_eq!(heavy.difficulty, 3);
        // 60 * (1 + 2 * 0.2) = 84
        assert_eq!(heavy.timeout_seconds, 84);
    }

    #[test]
    fn difficulty_caps_at_five() {
        let mut selector = ChallengeSelector::with_seed(7);
        let c = selector.select(&tuple(14, 2, 70, 40), &[], Some(ChallengeType::QuickTask));
        assert_eq!(c.difficulty, 4);
        assert!(c.difficulty <= 5);
    }

    #[test]
    fn recent_prompts_are_not_repeated() {
        let mut selector = ChallengeSelector::with_seed(7);
        let t = tuple(14, 2, 10, 0);
        let mut last_three: VecDeque<String> = VecDeque::new();
        for _ in 0..30 {
            let c = selector.select(&t, &[], Some(ChallengeType::Reflection));
            assert!(
                !last_three.contains(&c.prompt),
                "prompt repeated within window: {}",
                c.prompt
            );
            last_three.push_back(c.prompt);
            if last_three.len() > RECENT_PROMPT_WINDOW {
                last_three.pop_front();
            }
        }
    }

    #[test]
    fn intention_carries_options() {
        let mut selector = ChallengeSelector::with_seed(7);
        let c = selector.select(&tuple(14, 2, 10, 0), &[], Some(ChallengeType::Intention));
        assert!(c.options.is_some());
        let c = selector.select(&tuple(14, 2, 10, 0), &[], Some(ChallengeType::Breathing));
        assert!(c.options.is_none());
    }
}
