//! Signal Extractor: turns one raw message into `MessageSignals`.
//!
//! Pure and synchronous. Never fails: anything it cannot read simply does not
//! show up in the output.

use std::sync::Arc;

use solace_core::sentiment::sentiment_score;
use solace_core::{
    Emotion, EnergyLevel, GoalCategory, GoalProgressSignal, GoalSignal, GoalStatus,
    LifeEventSignal, MessageFeatures, MessageSignals, MotivationTrigger, RelationshipMention,
    RiskFlag,
};

use crate::patterns::life_event_impact;
use crate::rules::{fired_tags, RuleError, RuleSet};

/// Emotions reported besides the primary one.
const MAX_SECONDARY_EMOTIONS: usize = 2;
/// Intensity of a non-blank message with no intensity markers.
const BASE_INTENSITY: usize = 5;

/// Progress verbs that close a goal as completed; everything else abandons it.
const COMPLETION_VERBS: &[&str] = &["finished", "completed", "achieved", "accomplished", "reached"];

#[derive(Debug, Clone)]
pub struct SignalExtractor {
    rules: Arc<RuleSet>,
}

impl SignalExtractor {
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self { rules }
    }

    /// Extractor over the built-in English rules.
    pub fn english() -> Result<Self, RuleError> {
        Ok(Self::new(Arc::new(RuleSet::english()?)))
    }

    pub fn rules(&self) -> &Arc<RuleSet> {
        &self.rules
    }

    /// Extract every signal category from `text`.
    ///
    /// `prior_sentiment` overrides the keyword sentiment when the caller
    /// already has a better score for the message.
    pub fn extract(&self, text: &str, prior_sentiment: Option<f32>) -> MessageSignals {
        if text.trim().is_empty() {
            return MessageSignals::default();
        }
        let lower = text.to_lowercase();
        let rules = &*self.rules;

        let ranked = self.rank_emotions(&lower);
        let primary_emotion = ranked.first().copied();
        let secondary_emotions = ranked
            .iter()
            .skip(1)
            .take(MAX_SECONDARY_EMOTIONS)
            .copied()
            .collect();

        let intensity = (BASE_INTENSITY + rules.intensity_markers.distinct(&lower).len()).min(10) as u8;

        let risk_flags = fired_tags(&rules.risks, &lower);
        let motivators = fired_tags(&rules.motivators, &lower);

        let sentiment = match prior_sentiment {
            Some(s) if s.is_finite() => s.clamp(-1.0, 1.0),
            _ => sentiment_score(text),
        };

        MessageSignals {
            primary_emotion,
            secondary_emotions,
            intensity,
            needs: fired_tags(&rules.needs, &lower),
            defenses: fired_tags(&rules.defenses, &lower),
            distortions: fired_tags(&rules.distortions, &lower),
            values: fired_tags(&rules.values, &lower),
            relationships: self.relationships(text),
            goals: self.goals(text, &risk_flags, &motivators),
            goal_progress: self.goal_progress(text),
            concerns: fired_tags(&rules.concerns, &lower),
            wellness: fired_tags(&rules.wellness, &lower),
            life_events: self.life_events(&lower),
            risk_flags,
            motivators,
            sentiment,
            energy: self.energy(&lower),
            features: self.features(text, &lower),
        }
    }

    /// Emotions by descending hit count; ties keep rule order.
    fn rank_emotions(&self, lower: &str) -> Vec<Emotion> {
        let mut hits: Vec<(Emotion, usize)> = self
            .rules
            .emotions
            .iter()
            .map(|r| (r.tag, r.hits(lower)))
            .filter(|(_, n)| *n > 0)
            .collect();
        // sort_by is stable
        hits.sort_by(|a, b| b.1.cmp(&a.1));
        hits.into_iter().map(|(e, _)| e).collect()
    }

    fn relationships(&self, text: &str) -> Vec<RelationshipMention> {
        let rules = &*self.rules;
        let mut out: Vec<RelationshipMention> = Vec::new();
        // Relation words already accounted for by a named mention
        let mut named_words: Vec<String> = Vec::new();

        for (word, candidate) in rules.relation_matcher.named(text) {
            let Some(relation) = rules.relation_for(&word) else {
                continue;
            };
            if !looks_like_name(&candidate) || rules.is_stopword(&candidate) {
                continue;
            }
            named_words.push(word);
            push_unique(
                &mut out,
                RelationshipMention {
                    name: Some(candidate),
                    relation,
                },
            );
        }

        for word in rules.relation_matcher.mentions(text) {
            if let Some(pos) = named_words.iter().position(|w| *w == word) {
                named_words.swap_remove(pos);
                continue;
            }
            if let Some(relation) = rules.relation_for(&word) {
                push_unique(&mut out, RelationshipMention { name: None, relation });
            }
        }
        out
    }

    fn goals(
        &self,
        text: &str,
        risk_flags: &[RiskFlag],
        motivators: &[MotivationTrigger],
    ) -> Vec<GoalSignal> {
        let rules = &*self.rules;
        if risk_flags
            .iter()
            .any(|f| matches!(f, RiskFlag::SuicidalIdeation | RiskFlag::SelfHarm))
        {
            return Vec::new();
        }
        let motivators: Vec<String> = motivators.iter().map(|m| m.to_string()).collect();

        let mut goals: Vec<GoalSignal> = Vec::new();
        for clause in rules.goal_matcher.intents(text) {
            let (title, obstacle) = split_obstacle(clause);
            let title = title.trim().trim_end_matches([',', ';', ':']).trim();
            if title.is_empty() {
                continue;
            }
            let lower_title = title.to_lowercase();
            if rules.risks.iter().any(|r| r.fires(&lower_title)) {
                continue;
            }
            if goals.iter().any(|g| g.title.to_lowercase() == lower_title) {
                continue;
            }
            goals.push(GoalSignal {
                title: title.to_string(),
                category: self.goal_category(&lower_title).unwrap_or(GoalCategory::PersonalGrowth),
                motivators: motivators.clone(),
                obstacles: obstacle.into_iter().collect(),
            });
        }
        goals
    }

    fn goal_progress(&self, text: &str) -> Vec<GoalProgressSignal> {
        self.rules
            .goal_matcher
            .progress(text)
            .into_iter()
            .map(|(verb, object)| GoalProgressSignal {
                status: if COMPLETION_VERBS.contains(&verb.as_str()) {
                    GoalStatus::Completed
                } else {
                    GoalStatus::Abandoned
                },
                category: self.goal_category(&object.to_lowercase()),
                note: object.to_string(),
            })
            .collect()
    }

    fn goal_category(&self, lower: &str) -> Option<GoalCategory> {
        self.rules
            .goal_categories
            .iter()
            .find(|r| r.fires(lower))
            .map(|r| r.tag)
    }

    fn life_events(&self, lower: &str) -> Vec<LifeEventSignal> {
        let ongoing = self.rules.ongoing_markers.is_match(lower);
        self.rules
            .life_events
            .iter()
            .filter_map(|rule| {
                let hits = rule.hits(lower);
                (hits > 0).then(|| LifeEventSignal {
                    event_type: rule.tag,
                    impact: life_event_impact(rule.tag),
                    ongoing,
                    confidence: (0.6 + 0.15 * (hits - 1) as f32).min(0.95),
                })
            })
            .collect()
    }

    fn energy(&self, lower: &str) -> EnergyLevel {
        if self.rules.low_energy.is_match(lower) {
            EnergyLevel::Low
        } else if self.rules.high_energy.is_match(lower) {
            EnergyLevel::High
        } else {
            EnergyLevel::Medium
        }
    }

    fn features(&self, text: &str, lower: &str) -> MessageFeatures {
        let rules = &*self.rules;
        MessageFeatures {
            word_count: text.split_whitespace().count() as u32,
            question_count: text.matches('?').count() as u32,
            exclamation_count: text.matches('!').count() as u32,
            hedge_count: rules.hedges.count(lower) as u32,
            analytic_count: rules.analytic_markers.count(lower) as u32,
            feeling_count: rules.feeling_markers.count(lower) as u32,
        }
    }
}

/// Names start with a capital letter and contain only letters, `'` or `-`.
fn looks_like_name(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    matches!(chars.next(), Some(c) if c.is_uppercase())
        && chars.all(|c| c.is_alphabetic() || c == '\'' || c == '-')
}

/// Split "run a marathon but my knee hurts" into title and obstacle.
fn split_obstacle(clause: &str) -> (&str, Option<String>) {
    let lower = clause.to_lowercase();
    match lower.find(" but ") {
        // ASCII lowercasing keeps byte offsets aligned
        Some(idx) if lower.len() == clause.len() => {
            let obstacle = clause[idx + " but ".len()..].trim();
            let obstacle = (!obstacle.is_empty()).then(|| obstacle.to_string());
            (&clause[..idx], obstacle)
        }
        _ => (clause, None),
    }
}

fn push_unique(out: &mut Vec<RelationshipMention>, mention: RelationshipMention) {
    if !out.contains(&mention) {
        out.push(mention);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solace_core::{
        CognitiveDistortion, Concern, DefenseMechanism, LifeEventType, Need, RelationType,
    };

    fn extractor() -> SignalExtractor {
        SignalExtractor::english().unwrap()
    }

    #[test]
    fn test_blank_input_yields_empty_signals() {
        let ex = extractor();
        assert_eq!(ex.extract("", None), MessageSignals::default());
        assert_eq!(ex.extract("   \n\t", Some(0.4)), MessageSignals::default());
    }

    #[test]
    fn test_spouse_name_and_joy() {
        let s = extractor().extract("My wife Sarah and I had a great day", None);
        assert_eq!(s.primary_emotion, Some(Emotion::Joy));
        assert_eq!(
            s.relationships,
            vec![RelationshipMention {
                name: Some("Sarah".to_string()),
                relation: RelationType::Spouse,
            }]
        );
        assert!(s.risk_flags.is_empty());
        assert!(s.sentiment > 0.0);
    }

    #[test]
    fn test_stopword_is_never_a_name() {
        let s = extractor().extract("my friend is tired", None);
        assert_eq!(
            s.relationships,
            vec![RelationshipMention {
                name: None,
                relation: RelationType::Friend,
            }]
        );
        assert_eq!(s.energy, EnergyLevel::Low);
    }

    #[test]
    fn test_emotion_ranking_by_hit_count() {
        let s = extractor().extract("I'm sad, so sad, and a bit anxious and angry", None);
        assert_eq!(s.primary_emotion, Some(Emotion::Sadness));
        // anger before anxiety: same count, rule order
        assert_eq!(s.secondary_emotions, vec![Emotion::Anger, Emotion::Anxiety]);
    }

    #[test]
    fn test_intensity_counts_distinct_markers() {
        let ex = extractor();
        assert_eq!(ex.extract("I am tired", None).intensity, 5);
        assert_eq!(ex.extract("I am very very tired", None).intensity, 6);
        assert_eq!(
            ex.extract("very really so extremely incredibly totally completely tired", None).intensity,
            10
        );
    }

    #[test]
    fn test_rule_families_fire_once_each() {
        let s = extractor().extract(
            "My boss always blames me, it's my fault, whatever. I need a break from work.",
            None,
        );
        assert!(s.distortions.contains(&CognitiveDistortion::Overgeneralization));
        assert!(s.distortions.contains(&CognitiveDistortion::Personalization));
        assert!(s.defenses.contains(&DefenseMechanism::Minimization));
        assert!(s.needs.contains(&Need::Rest));
        assert_eq!(s.concerns.iter().filter(|c| **c == Concern::Work).count(), 1);
    }

    #[test]
    fn test_goal_with_obstacle() {
        let s = extractor().extract("I want to run a marathon but my knee hurts.", None);
        assert_eq!(s.goals.len(), 1);
        assert_eq!(s.goals[0].title, "run a marathon");
        assert_eq!(s.goals[0].category, GoalCategory::Health);
        assert_eq!(s.goals[0].obstacles, vec!["my knee hurts".to_string()]);
    }

    #[test]
    fn test_death_wish_is_not_a_goal() {
        let s = extractor().extract("I want to die", None);
        assert!(s.goals.is_empty());
        assert!(s.risk_flags.contains(&RiskFlag::SuicidalIdeation));
    }

    #[test]
    fn test_goal_progress_statuses() {
        let ex = extractor();
        let done = ex.extract("I finally finished my thesis!", None);
        assert_eq!(done.goal_progress[0].status, GoalStatus::Completed);
        assert_eq!(done.goal_progress[0].category, Some(GoalCategory::Education));
        let quit = ex.extract("I gave up on saving money.", None);
        assert_eq!(quit.goal_progress[0].status, GoalStatus::Abandoned);
    }

    #[test]
    fn test_life_event_detection() {
        let s = extractor().extract("I lost my job last week and I'm still dealing with it", None);
        assert_eq!(s.life_events.len(), 1);
        assert_eq!(s.life_events[0].event_type, LifeEventType::JobLoss);
        assert!(s.life_events[0].ongoing);
    }

    #[test]
    fn test_prior_sentiment_wins() {
        let s = extractor().extract("I feel happy", Some(-0.3));
        assert!((s.sentiment - -0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_features() {
        let s = extractor().extract("Maybe I should? I guess so!", None);
        assert_eq!(s.features.question_count, 1);
        assert_eq!(s.features.exclamation_count, 1);
        assert_eq!(s.features.hedge_count, 2);
        assert_eq!(s.features.word_count, 6);
    }
}
