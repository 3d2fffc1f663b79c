//! Persisted per-user entities that sit next to the insight ledger.

use serde::{Deserialize, Serialize};

use crate::signals::{
    Emotion, EnergyLevel, EventImpact, GoalCategory, GoalStatus, LifeEventType, MessageSignals,
    RelationType,
};

/// One row of the append-only insight ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredInsight {
    pub user_id: String,
    pub message_id: String,
    pub conversation_id: String,
    pub signals: MessageSignals,
    /// Unix timestamp
    pub created_at: i64,
}

/// A named person in the user's life.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: i64,
    pub user_id: String,
    /// First name, or the relation label when no name was given ("mom").
    pub name: String,
    pub relation: RelationType,
    /// Running average sentiment in [-1.0, 1.0].
    pub sentiment: f32,
    pub mention_count: u32,
    pub first_mentioned_at: i64,
    pub last_mentioned_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeEvent {
    pub id: i64,
    pub user_id: String,
    pub event_type: LifeEventType,
    pub impact: EventImpact,
    pub ongoing: bool,
    pub related_people: Vec<String>,
    pub confidence: f32,
    pub detected_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalSnapshot {
    pub id: i64,
    pub user_id: String,
    pub message_id: String,
    pub emotion: Emotion,
    pub intensity: u8,
    pub energy: EnergyLevel,
    pub triggers: Vec<String>,
    pub coping_style: CopingStyle,
    pub recorded_at: i64,
}

/// Coping style observed in a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopingStyle {
    ProblemFocused,
    EmotionFocused,
    SupportSeeking,
    Avoidant,
    Unobserved,
}

impl CopingStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopingStyle::ProblemFocused => "problem_focused",
            CopingStyle::EmotionFocused => "emotion_focused",
            CopingStyle::SupportSeeking => "support_seeking",
            CopingStyle::Avoidant => "avoidant",
            CopingStyle::Unobserved => "unobserved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserGoal {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub category: GoalCategory,
    pub status: GoalStatus,
    pub motivators: Vec<String>,
    pub obstacles: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Append-only record of a goal status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub id: i64,
    pub goal_id: i64,
    pub status: GoalStatus,
    pub note: String,
    pub recorded_at: i64,
}

/// A durable fact learned about the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFact {
    pub id: i64,
    pub user_id: String,
    /// "relationship", "goal", "life_event" or "value".
    pub category: String,
    pub content: String,
    pub created_at: i64,
}

// ============================================================================
// Probing state
// ============================================================================

/// How deep the self-reflection questions currently go.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ProbingDepth {
    #[default]
    Surface = 0,
    Personal = 1,
    Deep = 2,
    Reflective = 3,
}

impl ProbingDepth {
    pub fn level(&self) -> u8 {
        *self as u8
    }

    pub fn from_level(level: u8) -> Self {
        match level {
            0 => ProbingDepth::Surface,
            1 => ProbingDepth::Personal,
            2 => ProbingDepth::Deep,
            _ => ProbingDepth::Reflective,
        }
    }

    /// One level deeper, saturating at `Reflective`.
    pub fn next(&self) -> Self {
        Self::from_level(self.level().saturating_add(1))
    }

    /// One level shallower, saturating at `Surface`.
    pub fn previous(&self) -> Self {
        Self::from_level(self.level().saturating_sub(1))
    }
}

/// How much the user put into answering a probing question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engagement {
    #[default]
    Low,
    Medium,
    High,
}

impl Engagement {
    /// Answers needed at one depth before moving deeper.
    pub fn advance_threshold(&self) -> u32 {
        match self {
            Engagement::Low => 5,
            Engagement::Medium => 3,
            Engagement::High => 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbingState {
    pub user_id: String,
    pub last_asked_at: Option<i64>,
    pub current_depth: ProbingDepth,
    /// Question ids in the order they were asked.
    pub questions_asked: Vec<String>,
    /// Question categories already covered.
    pub topics_explored: Vec<String>,
    /// Question awaiting an answer in the user's next message.
    pub pending_question: Option<String>,
    pub answers_at_depth: u32,
    pub last_engagement: Engagement,
}

impl ProbingState {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_saturates() {
        assert_eq!(ProbingDepth::Reflective.next(), ProbingDepth::Reflective);
        assert_eq!(ProbingDepth::Surface.previous(), ProbingDepth::Surface);
        assert_eq!(ProbingDepth::Personal.next(), ProbingDepth::Deep);
    }

    #[test]
    fn test_engagement_thresholds() {
        assert_eq!(Engagement::Low.advance_threshold(), 5);
        assert_eq!(Engagement::Medium.advance_threshold(), 3);
        assert_eq!(Engagement::High.advance_threshold(), 2);
    }
}
