//! Per-message signal record and the tag vocabularies it is built from.
//!
//! Every category the extractor knows about is a closed enum. Declaration order
//! matters: it is the tie-break order used by the extractor (emotion ranking)
//! and by the aggregator (frequency ties).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declare a snake_case-serialized tag enum with a stable label and an
/// ordered `ALL` table.
macro_rules! tag_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use tag_enum;

tag_enum! {
    pub enum Emotion {
        Joy => "joy",
        Sadness => "sadness",
        Anger => "anger",
        Fear => "fear",
        Anxiety => "anxiety",
        Shame => "shame",
        Guilt => "guilt",
        Loneliness => "loneliness",
        Love => "love",
        Gratitude => "gratitude",
        Hope => "hope",
        Frustration => "frustration",
        Overwhelm => "overwhelm",
    }
}

impl Emotion {
    /// Rough valence of the emotion family, used for trend computation.
    pub fn valence(&self) -> f32 {
        match self {
            Emotion::Joy | Emotion::Love | Emotion::Gratitude => 1.0,
            Emotion::Hope => 0.6,
            Emotion::Frustration | Emotion::Anxiety | Emotion::Overwhelm => -0.6,
            Emotion::Sadness
            | Emotion::Anger
            | Emotion::Fear
            | Emotion::Shame
            | Emotion::Guilt
            | Emotion::Loneliness => -0.8,
        }
    }
}

tag_enum! {
    pub enum Need {
        Validation => "validation",
        Reassurance => "reassurance",
        Connection => "connection",
        Autonomy => "autonomy",
        Safety => "safety",
        Rest => "rest",
        Recognition => "recognition",
        Understanding => "understanding",
        Purpose => "purpose",
    }
}

tag_enum! {
    pub enum DefenseMechanism {
        Denial => "denial",
        Minimization => "minimization",
        Intellectualization => "intellectualization",
        Projection => "projection",
        Rationalization => "rationalization",
        Avoidance => "avoidance",
        Humor => "humor",
        Displacement => "displacement",
    }
}

tag_enum! {
    pub enum CognitiveDistortion {
        Catastrophizing => "catastrophizing",
        AllOrNothing => "all_or_nothing",
        Overgeneralization => "overgeneralization",
        MindReading => "mind_reading",
        FortuneTelling => "fortune_telling",
        ShouldStatements => "should_statements",
        Personalization => "personalization",
        Labeling => "labeling",
        EmotionalReasoning => "emotional_reasoning",
        DisqualifyingPositive => "disqualifying_positive",
    }
}

tag_enum! {
    pub enum CoreValue {
        Family => "family",
        Achievement => "achievement",
        Honesty => "honesty",
        Freedom => "freedom",
        Security => "security",
        Growth => "growth",
        Faith => "faith",
        Health => "health",
        Creativity => "creativity",
        Connection => "connection",
        Service => "service",
    }
}

tag_enum! {
    pub enum RelationType {
        Spouse => "spouse",
        Partner => "partner",
        Parent => "parent",
        Child => "child",
        Sibling => "sibling",
        Friend => "friend",
        Coworker => "coworker",
        Manager => "manager",
        Ex => "ex",
        Therapist => "therapist",
        Relative => "relative",
    }
}

tag_enum! {
    pub enum GoalCategory {
        Career => "career",
        Health => "health",
        Relationships => "relationships",
        Financial => "financial",
        Education => "education",
        Emotional => "emotional",
        PersonalGrowth => "personal_growth",
    }
}

tag_enum! {
    pub enum Concern {
        Work => "work",
        Money => "money",
        Health => "health",
        Relationship => "relationship",
        Family => "family",
        Sleep => "sleep",
        Isolation => "isolation",
        Future => "future",
        SelfWorth => "self_worth",
    }
}

tag_enum! {
    pub enum RiskFlag {
        SuicidalIdeation => "suicidal_ideation",
        SelfHarm => "self_harm",
        Hopelessness => "hopelessness",
        SubstanceUse => "substance_use",
        Abuse => "abuse",
        DisorderedEating => "disordered_eating",
        Isolation => "isolation",
    }
}

tag_enum! {
    pub enum WellnessIndicator {
        Exercise => "exercise",
        Sleep => "sleep",
        Mindfulness => "mindfulness",
        SocialConnection => "social_connection",
        Gratitude => "gratitude",
        Nutrition => "nutrition",
        Therapy => "therapy",
        Journaling => "journaling",
    }
}

tag_enum! {
    pub enum LifeEventType {
        JobLoss => "job_loss",
        NewJob => "new_job",
        Breakup => "breakup",
        Divorce => "divorce",
        Marriage => "marriage",
        Bereavement => "bereavement",
        Birth => "birth",
        Relocation => "relocation",
        Graduation => "graduation",
        Illness => "illness",
        Retirement => "retirement",
    }
}

tag_enum! {
    pub enum EventImpact {
        Positive => "positive",
        Negative => "negative",
        Mixed => "mixed",
    }
}

tag_enum! {
    pub enum MotivationTrigger {
        Recognition => "recognition",
        Autonomy => "autonomy",
        Mastery => "mastery",
        Purpose => "purpose",
        Belonging => "belonging",
        Security => "security",
    }
}

tag_enum! {
    pub enum EnergyLevel {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

tag_enum! {
    pub enum GoalStatus {
        Active => "active",
        Completed => "completed",
        Abandoned => "abandoned",
    }
}

impl GoalStatus {
    pub fn parse_str(s: &str) -> Self {
        match s {
            "completed" => GoalStatus::Completed,
            "abandoned" => GoalStatus::Abandoned,
            _ => GoalStatus::Active,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, GoalStatus::Active)
    }
}

impl Default for EnergyLevel {
    fn default() -> Self {
        EnergyLevel::Medium
    }
}

// ============================================================================
// Structured sub-signals
// ============================================================================

/// A person mentioned in a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipMention {
    /// Resolved first name, if one followed the relation word.
    pub name: Option<String>,
    pub relation: RelationType,
}

/// A goal implied or stated in a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalSignal {
    pub title: String,
    pub category: GoalCategory,
    pub motivators: Vec<String>,
    pub obstacles: Vec<String>,
}

/// A report that a goal moved to a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalProgressSignal {
    pub status: GoalStatus,
    pub category: Option<GoalCategory>,
    pub note: String,
}

/// A detected life transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeEventSignal {
    pub event_type: LifeEventType,
    pub impact: EventImpact,
    pub ongoing: bool,
    pub confidence: f32,
}

/// Surface features of the message text, used for style voting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageFeatures {
    pub word_count: u32,
    pub question_count: u32,
    pub exclamation_count: u32,
    pub hedge_count: u32,
    pub analytic_count: u32,
    pub feeling_count: u32,
}

// ============================================================================
// MessageSignals
// ============================================================================

/// Everything the extractor pulls out of a single user message.
///
/// Created once per message and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageSignals {
    pub primary_emotion: Option<Emotion>,
    pub secondary_emotions: Vec<Emotion>,
    /// 1-10 for any non-blank message, 0 when nothing was analyzed.
    pub intensity: u8,
    pub needs: Vec<Need>,
    pub defenses: Vec<DefenseMechanism>,
    pub distortions: Vec<CognitiveDistortion>,
    pub values: Vec<CoreValue>,
    pub relationships: Vec<RelationshipMention>,
    pub goals: Vec<GoalSignal>,
    pub goal_progress: Vec<GoalProgressSignal>,
    pub concerns: Vec<Concern>,
    pub risk_flags: Vec<RiskFlag>,
    pub wellness: Vec<WellnessIndicator>,
    pub life_events: Vec<LifeEventSignal>,
    pub motivators: Vec<MotivationTrigger>,
    /// Sentiment in [-1.0, 1.0].
    pub sentiment: f32,
    pub energy: EnergyLevel,
    pub features: MessageFeatures,
}

impl MessageSignals {
    /// True when the extractor found nothing at all.
    pub fn is_empty(&self) -> bool {
        self.primary_emotion.is_none()
            && self.needs.is_empty()
            && self.defenses.is_empty()
            && self.distortions.is_empty()
            && self.values.is_empty()
            && self.relationships.is_empty()
            && self.goals.is_empty()
            && self.goal_progress.is_empty()
            && self.concerns.is_empty()
            && self.risk_flags.is_empty()
            && self.wellness.is_empty()
            && self.life_events.is_empty()
    }

    /// All emotions in rank order, primary first.
    pub fn emotions(&self) -> impl Iterator<Item = Emotion> + '_ {
        self.primary_emotion
            .into_iter()
            .chain(self.secondary_emotions.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_labels_round_trip_through_serde() {
        let json = serde_json::to_string(&CognitiveDistortion::AllOrNothing).unwrap();
        assert_eq!(json, "\"all_or_nothing\"");
        assert_eq!(CognitiveDistortion::AllOrNothing.as_str(), "all_or_nothing");
    }

    #[test]
    fn test_default_signals_are_empty() {
        let s = MessageSignals::default();
        assert!(s.is_empty());
        assert_eq!(s.intensity, 0);
        assert_eq!(s.emotions().count(), 0);
    }

    #[test]
    fn test_goal_status_parse() {
        assert_eq!(GoalStatus::parse_str("completed"), GoalStatus::Completed);
        assert_eq!(GoalStatus::parse_str("garbage"), GoalStatus::Active);
        assert!(GoalStatus::Abandoned.is_terminal());
    }
}
