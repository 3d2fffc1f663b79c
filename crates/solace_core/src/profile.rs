//! Aggregate personality/behavior summary, recomputed wholesale from the ledger.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::signals::{
    tag_enum, CognitiveDistortion, CoreValue, DefenseMechanism, Emotion, Need,
};

tag_enum! {
    /// Declaration order is the majority-vote tie-break order.
    pub enum CommunicationStyle {
        Direct => "direct",
        Analytical => "analytical",
        Expressive => "expressive",
        Reflective => "reflective",
    }
}

tag_enum! {
    /// Declaration order is the majority-vote tie-break order.
    pub enum AttachmentStyle {
        Secure => "secure",
        Anxious => "anxious",
        Avoidant => "avoidant",
        Disorganized => "disorganized",
        Developing => "developing",
    }
}

tag_enum! {
    pub enum EmotionalTrend {
        Improving => "improving",
        Stable => "stable",
        Declining => "declining",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub communication_style: CommunicationStyle,
    pub attachment_style: AttachmentStyle,
    pub core_values: Vec<CoreValue>,
    pub strengths: Vec<String>,
    pub growth_areas: Vec<String>,
    pub primary_motivators: Vec<String>,
    pub dominant_emotions: Vec<Emotion>,
    pub common_needs: Vec<Need>,
    pub defense_patterns: Vec<DefenseMechanism>,
    pub distortion_patterns: Vec<CognitiveDistortion>,
    pub emotional_trend: EmotionalTrend,
    pub key_relationships: Vec<String>,
    /// Mean intensity over the aggregation window.
    pub average_intensity: f32,
    pub message_count: u64,
    pub context_fact_count: u64,
    /// Ancillary sources that could not be read during aggregation.
    pub degraded_sources: Vec<String>,
    /// 0-100
    pub confidence: u8,
    /// Timestamp of the newest ledger entry folded into this profile.
    pub as_of: i64,
}

impl UserProfile {
    /// Baseline profile for a user with no history.
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            communication_style: CommunicationStyle::Reflective,
            attachment_style: AttachmentStyle::Developing,
            core_values: Vec::new(),
            strengths: Vec::new(),
            growth_areas: Vec::new(),
            primary_motivators: Vec::new(),
            dominant_emotions: Vec::new(),
            common_needs: Vec::new(),
            defense_patterns: Vec::new(),
            distortion_patterns: Vec::new(),
            emotional_trend: EmotionalTrend::Stable,
            key_relationships: Vec::new(),
            average_intensity: 0.0,
            message_count: 0,
            context_fact_count: 0,
            degraded_sources: Vec::new(),
            confidence: 0,
            as_of: 0,
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded_sources.is_empty()
    }
}

/// `min(100, min(50, 2 × messages) + min(50, 5 × context facts))`
pub fn profile_confidence(message_count: u64, context_fact_count: u64) -> u8 {
    let from_messages = message_count.saturating_mul(2).min(50);
    let from_context = context_fact_count.saturating_mul(5).min(50);
    (from_messages + from_context).min(100) as u8
}
