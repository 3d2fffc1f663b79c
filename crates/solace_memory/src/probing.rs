//! Probing Question Scheduler.
//!
//! Decides whether a self-reflection question may be appended to a reply, and
//! which one. Depth only ever moves forward: surface → personal → deep →
//! reflective. Selection is pure; randomness comes from the caller's RNG.

use std::collections::HashSet;

use rand::Rng;
use serde::Serialize;

use solace_core::config::ProbingConfig;
use solace_core::{Engagement, MessageSignals, ProbingDepth, ProbingState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbingQuestion {
    pub id: &'static str,
    pub depth: ProbingDepth,
    pub category: &'static str,
    pub text: &'static str,
    pub keywords: &'static [&'static str],
}

macro_rules! question {
    ($id:literal, $depth:ident, $category:literal, $text:literal, [$($kw:literal),* $(,)?]) => {
        ProbingQuestion {
            id: $id,
            depth: ProbingDepth::$depth,
            category: $category,
            text: $text,
            keywords: &[$($kw),*],
        }
    };
}

pub const QUESTION_BANK: &[ProbingQuestion] = &[
    question!("surface_good_thing", Surface, "daily_life",
        "What's one small thing that went well for you today?",
        ["today", "day", "week", "morning", "weekend"]),
    question!("surface_recharge", Surface, "wellbeing",
        "What usually helps you recharge when you're running low?",
        ["tired", "energy", "exhausted", "rest", "sleep", "drained"]),
    question!("surface_easy_talk", Surface, "relationships",
        "Who in your life do you find easiest to talk to?",
        ["friend", "family", "wife", "husband", "partner", "talk", "mom", "dad"]),
    question!("surface_looking_forward", Surface, "goals",
        "Is there something you're looking forward to at the moment?",
        ["goal", "plan", "want", "hope", "future", "excited"]),
    question!("surface_work", Surface, "work",
        "How are things feeling at work lately?",
        ["work", "job", "boss", "office", "deadline"]),
    question!("personal_hard_choice", Personal, "values",
        "What matters most to you when you have to make a hard decision?",
        ["decision", "choice", "matters", "important", "decide"]),
    question!("personal_stress_body", Personal, "emotions",
        "When stress builds up, where do you tend to notice it first?",
        ["stress", "stressed", "anxious", "worried", "tense"]),
    question!("personal_turn_to", Personal, "relationships",
        "When things get hard, who do you turn to, if anyone?",
        ["alone", "lonely", "support", "help", "nobody"]),
    question!("personal_success", Personal, "goals",
        "What would make the next few months feel like a success to you?",
        ["goal", "success", "achieve", "plan", "months"]),
    question!("personal_self_talk", Personal, "identity",
        "How do you usually talk to yourself after a mistake?",
        ["mistake", "failure", "fault", "stupid", "messed"]),
    question!("deep_patterns", Deep, "emotions",
        "Have you noticed any patterns in what tends to set off difficult feelings for you?",
        ["always", "again", "pattern", "every", "never"]),
    question!("deep_past", Deep, "past",
        "Is there an experience from earlier in your life that still shapes how you react today?",
        ["childhood", "parents", "past", "grew", "remember"]),
    question!("deep_fear_seen", Deep, "identity",
        "What are you most afraid would happen if you let people see how you really feel?",
        ["afraid", "scared", "hide", "fear", "pretend"]),
    question!("deep_closeness", Deep, "relationships",
        "In your closest relationships, what do you find yourself needing most?",
        ["relationship", "partner", "close", "need", "love"]),
    question!("reflective_change", Reflective, "growth",
        "Looking back over our conversations, what do you notice has changed in you?",
        ["changed", "better", "growth", "different", "progress"]),
    question!("reflective_alignment", Reflective, "values",
        "How well does the way you're living right now match what you care about most?",
        ["values", "care", "living", "meaning", "purpose"]),
    question!("reflective_future_self", Reflective, "goals",
        "If the version of you a year from now could send you a message, what would it say?",
        ["future", "year", "someday", "hope", "become"]),
    question!("reflective_acceptance", Reflective, "identity",
        "What's something about yourself you've come to accept?",
        ["accept", "myself", "learned", "proud", "okay"]),
];

pub fn question(id: &str) -> Option<&'static ProbingQuestion> {
    QUESTION_BANK.iter().find(|q| q.id == id)
}

/// Engagement with a probing question, judged from the answer.
pub fn score_engagement(answer: &str, signals: &MessageSignals) -> Engagement {
    let words = answer.split_whitespace().count();
    let mut score = match words {
        0..=14 => 0,
        15..=39 => 1,
        _ => 2,
    };
    if signals.primary_emotion.is_some() || signals.features.feeling_count > 0 {
        score += 1;
    }
    if answer.contains('?') {
        score += 1;
    }
    match score {
        0 | 1 => Engagement::Low,
        2 => Engagement::Medium,
        _ => Engagement::High,
    }
}

#[derive(Debug, Clone)]
pub struct ProbingScheduler {
    config: ProbingConfig,
}

impl ProbingScheduler {
    pub fn new(config: ProbingConfig) -> Self {
        Self { config }
    }

    /// Enough conversations, and the cooldown since the last question has run out.
    pub fn is_eligible(&self, state: &ProbingState, conversation_count: u64, now: i64) -> bool {
        if !self.config.enabled || conversation_count < u64::from(self.config.min_conversations) {
            return false;
        }
        match state.last_asked_at {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.cooldown_secs(),
        }
    }

    fn cooldown_secs(&self) -> i64 {
        self.config.cooldown_hours.saturating_mul(3600)
    }

    /// Unasked questions at the current depth or one below; once those run
    /// out, anything at or below the current depth.
    pub fn candidates(&self, state: &ProbingState) -> Vec<&'static ProbingQuestion> {
        let target = state.current_depth;
        let asked: HashSet<&str> = state.questions_asked.iter().map(String::as_str).collect();
        let fresh: Vec<_> = QUESTION_BANK
            .iter()
            .filter(|q| q.depth == target || (target > ProbingDepth::Surface && q.depth == target.previous()))
            .filter(|q| !asked.contains(q.id))
            .collect();
        if !fresh.is_empty() {
            return fresh;
        }
        QUESTION_BANK.iter().filter(|q| q.depth <= target).collect()
    }

    /// Rank candidates by keyword overlap with the message, then by unexplored
    /// category, then randomly. Among otherwise equal candidates a topic the
    /// user has context for goes first.
    pub fn select<R: Rng + ?Sized>(
        &self,
        state: &ProbingState,
        message: &str,
        known_topics: &[String],
        rng: &mut R,
    ) -> Option<&'static ProbingQuestion> {
        let words: HashSet<String> = message
            .to_lowercase()
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();

        self.candidates(state)
            .into_iter()
            .map(|q| {
                let overlap = q.keywords.iter().filter(|k| words.contains(**k)).count();
                let known = known_topics.iter().any(|t| topic_matches(t, q.category));
                let novel = !state.topics_explored.iter().any(|t| t == q.category);
                let tiebreak: u32 = rng.random();
                ((overlap, novel, known, tiebreak), q)
            })
            .max_by_key(|(rank, _)| *rank)
            .map(|(_, q)| q)
    }

    /// Record that `question` was appended to a reply.
    pub fn record_asked(&self, state: &mut ProbingState, question: &ProbingQuestion, now: i64) {
        state.questions_asked.push(question.id.to_string());
        if !state.topics_explored.iter().any(|t| t == question.category) {
            state.topics_explored.push(question.category.to_string());
        }
        state.pending_question = Some(question.id.to_string());
        state.last_asked_at = Some(now);
    }

    /// Record the user's answer to the pending question. Returns true when
    /// the depth advanced.
    pub fn record_answer(&self, state: &mut ProbingState, engagement: Engagement) -> bool {
        if state.pending_question.take().is_none() {
            return false;
        }
        state.last_engagement = engagement;
        state.answers_at_depth += 1;
        if state.answers_at_depth >= engagement.advance_threshold()
            && state.current_depth < ProbingDepth::Reflective
        {
            state.current_depth = state.current_depth.next();
            state.answers_at_depth = 0;
            return true;
        }
        false
    }
}

/// Context-fact categories map onto question categories.
fn topic_matches(fact_category: &str, question_category: &str) -> bool {
    match fact_category {
        "goal" => question_category == "goals",
        "relationship" => question_category == "relationships",
        "value" => question_category == "values",
        "life_event" => question_category == "past",
        other => other == question_category,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const HOUR: i64 = 3600;

    fn scheduler() -> ProbingScheduler {
        ProbingScheduler::new(ProbingConfig::default())
    }

    #[test]
    fn test_question_ids_unique() {
        let ids: HashSet<_> = QUESTION_BANK.iter().map(|q| q.id).collect();
        assert_eq!(ids.len(), QUESTION_BANK.len());
        for depth in 0..4 {
            assert!(QUESTION_BANK.iter().any(|q| q.depth.level() == depth));
        }
    }

    #[test]
    fn test_eligibility() {
        let s = scheduler();
        let mut state = ProbingState::new("u1");
        assert!(!s.is_eligible(&state, 2, 0));
        assert!(s.is_eligible(&state, 3, 0));
        state.last_asked_at = Some(1_000);
        assert!(!s.is_eligible(&state, 12, 1_000 + 47 * HOUR));
        assert!(s.is_eligible(&state, 12, 1_000 + 48 * HOUR));
    }

    #[test]
    fn test_disabled_never_eligible() {
        let s = ProbingScheduler::new(ProbingConfig {
            enabled: false,
            ..Default::default()
        });
        assert!(!s.is_eligible(&ProbingState::new("u1"), 100, 0));
    }

    #[test]
    fn test_surface_candidates_only_at_start() {
        let c = scheduler().candidates(&ProbingState::new("u1"));
        assert!(!c.is_empty());
        assert!(c.iter().all(|q| q.depth == ProbingDepth::Surface));
    }

    #[test]
    fn test_candidates_include_one_level_below() {
        let mut state = ProbingState::new("u1");
        state.current_depth = ProbingDepth::Deep;
        let c = scheduler().candidates(&state);
        assert!(c.iter().any(|q| q.depth == ProbingDepth::Personal));
        assert!(c.iter().all(|q| q.depth >= ProbingDepth::Personal && q.depth <= ProbingDepth::Deep));
    }

    #[test]
    fn test_exhausted_pool_falls_back() {
        let mut state = ProbingState::new("u1");
        state.questions_asked = QUESTION_BANK
            .iter()
            .filter(|q| q.depth == ProbingDepth::Surface)
            .map(|q| q.id.to_string())
            .collect();
        let c = scheduler().candidates(&state);
        assert_eq!(c.len(), state.questions_asked.len());
    }

    #[test]
    fn test_keyword_overlap_wins() {
        let mut rng = StdRng::seed_from_u64(7);
        let q = scheduler()
            .select(&ProbingState::new("u1"), "My boss piled on another deadline at work", &[], &mut rng)
            .unwrap();
        assert_eq!(q.id, "surface_work");
    }

    #[test]
    fn test_known_topic_breaks_overlap_tie() {
        let mut rng = StdRng::seed_from_u64(7);
        let q = scheduler()
            .select(&ProbingState::new("u1"), "nothing much", &["goal".to_string()], &mut rng)
            .unwrap();
        assert_eq!(q.category, "goals");
    }

    #[test]
    fn test_unexplored_category_beats_known_topic() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = ProbingState::new("u1");
        state.topics_explored = vec!["goals".to_string()];
        let q = scheduler()
            .select(&state, "nothing much", &["goal".to_string()], &mut rng)
            .unwrap();
        assert_ne!(q.category, "goals");
    }

    #[test]
    fn test_record_asked_and_answer() {
        let s = scheduler();
        let mut state = ProbingState::new("u1");
        let q = question("surface_work").unwrap();
        s.record_asked(&mut state, q, 500);
        assert_eq!(state.questions_asked, vec!["surface_work".to_string()]);
        assert_eq!(state.last_asked_at, Some(500));
        assert_eq!(state.topics_explored, vec!["work".to_string()]);

        assert!(!s.record_answer(&mut state, Engagement::High));
        assert_eq!(state.answers_at_depth, 1);
        assert!(state.pending_question.is_none());
        // nothing pending: not an answer
        assert!(!s.record_answer(&mut state, Engagement::High));
        assert_eq!(state.answers_at_depth, 1);

        s.record_asked(&mut state, question("surface_recharge").unwrap(), 900);
        assert!(s.record_answer(&mut state, Engagement::High));
        assert_eq!(state.current_depth, ProbingDepth::Personal);
        assert_eq!(state.answers_at_depth, 0);
    }

    #[test]
    fn test_engagement_scoring() {
        let quiet = MessageSignals::default();
        assert_eq!(score_engagement("fine", &quiet), Engagement::Low);
        let long = "word ".repeat(45);
        assert_eq!(score_engagement(&long, &quiet), Engagement::Medium);
        assert_eq!(score_engagement(&format!("{long} why?"), &quiet), Engagement::High);
    }
}
