//! Crisis Detector: priority-ordered keyword tiers plus a sentiment floor.

use std::sync::Arc;

use solace_core::{CrisisAssessment, CrisisResource, CrisisSeverity};
use tracing::debug;

use crate::rules::{RuleError, RuleSet};

/// Trigger recorded when only the sentiment score tripped the detector.
pub const NEGATIVE_SENTIMENT_TRIGGER: &str = "negative_sentiment";

pub const DEFAULT_SENTIMENT_THRESHOLD: f32 = -0.6;

/// The support lines surfaced to users, most urgent first.
pub fn default_resources() -> Vec<CrisisResource> {
    vec![
        CrisisResource::new(
            "988 Suicide & Crisis Lifeline",
            "Call or text 988",
            "Free, confidential support 24/7 in the US.",
        ),
        CrisisResource::new(
            "Crisis Text Line",
            "Text HOME to 741741",
            "Text with a trained crisis counselor any time.",
        ),
        CrisisResource::new(
            "Emergency Services",
            "Call 911",
            "If you or someone else is in immediate danger.",
        ),
        CrisisResource::new(
            "SAMHSA National Helpline",
            "1-800-662-4357",
            "Treatment referral and information, 24/7.",
        ),
    ]
}

#[derive(Debug, Clone)]
pub struct CrisisDetector {
    rules: Arc<RuleSet>,
    sentiment_threshold: f32,
    resources: Vec<CrisisResource>,
}

impl CrisisDetector {
    pub fn new(rules: Arc<RuleSet>, sentiment_threshold: f32) -> Self {
        Self {
            rules,
            sentiment_threshold,
            resources: default_resources(),
        }
    }

    pub fn english() -> Result<Self, RuleError> {
        Ok(Self::new(
            Arc::new(RuleSet::english()?),
            DEFAULT_SENTIMENT_THRESHOLD,
        ))
    }

    pub fn with_resources(mut self, resources: Vec<CrisisResource>) -> Self {
        self.resources = resources;
        self
    }

    pub fn resources(&self) -> &[CrisisResource] {
        &self.resources
    }

    pub fn sentiment_threshold(&self) -> f32 {
        self.sentiment_threshold
    }

    /// Classify one message. The first tier (most severe first) with any
    /// whole-word hit decides; lower tiers are never consulted.
    pub fn assess(&self, text: &str, sentiment: f32) -> CrisisAssessment {
        if text.trim().is_empty() {
            return CrisisAssessment::none();
        }
        let lower = text.to_lowercase();

        for tier in self.rules.crisis_tiers() {
            let triggers = tier.matcher().distinct(&lower);
            if !triggers.is_empty() {
                debug!(severity = %tier.tag, hits = triggers.len(), "Crisis tier matched");
                return CrisisAssessment::with_severity(tier.tag, triggers, &self.resources);
            }
        }

        if sentiment < self.sentiment_threshold {
            debug!(sentiment, "Sentiment below crisis threshold");
            return CrisisAssessment::with_severity(
                CrisisSeverity::Low,
                vec![NEGATIVE_SENTIMENT_TRIGGER.to_string()],
                &self.resources,
            );
        }

        CrisisAssessment::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solace_core::RecommendedAction;

    fn detector() -> CrisisDetector {
        CrisisDetector::english().unwrap()
    }

    #[test]
    fn test_critical_keyword() {
        let a = detector().assess("I want to kill myself", -0.9);
        assert_eq!(a.severity, CrisisSeverity::Critical);
        assert_eq!(a.recommended_action, RecommendedAction::ImmediateResources);
        assert_eq!(a.resources.len(), default_resources().len());
        assert!(a.resources.iter().any(|r| r.contact.contains("988")));
        assert_eq!(a.triggers, vec!["kill myself".to_string()]);
    }

    #[test]
    fn test_priority_short_circuits() {
        // "hopeless" (high) and "stressed" (low) lose to the critical hit
        let a = detector().assess("stressed and hopeless, I want to end my life", 0.0);
        assert_eq!(a.severity, CrisisSeverity::Critical);
        assert_eq!(a.triggers, vec!["end my life".to_string()]);
    }

    #[test]
    fn test_high_tier_gets_full_resources() {
        let a = detector().assess("I feel hopeless", 0.0);
        assert_eq!(a.severity, CrisisSeverity::High);
        assert_eq!(a.recommended_action, RecommendedAction::GentleRedirect);
        assert_eq!(a.resources.len(), default_resources().len());
    }

    #[test]
    fn test_moderate_tier_gets_two_resources() {
        let a = detector().assess("I had a panic attack at work", 0.0);
        assert_eq!(a.severity, CrisisSeverity::Moderate);
        assert_eq!(a.recommended_action, RecommendedAction::OfferResources);
        assert_eq!(a.resources.len(), 2);
    }

    #[test]
    fn test_low_tier_has_no_resources() {
        let a = detector().assess("Work has me stressed", 0.0);
        assert_eq!(a.severity, CrisisSeverity::Low);
        assert_eq!(a.recommended_action, RecommendedAction::Continue);
        assert!(a.resources.is_empty());
    }

    #[test]
    fn test_word_boundaries_at_every_tier() {
        let d = detector();
        assert_eq!(d.assess("We are recruiting new staff", 0.0).severity, CrisisSeverity::None);
        assert_eq!(d.assess("I bought a cuttingboard", 0.0).severity, CrisisSeverity::None);
        assert_eq!(d.assess("Flying to Madrid", 0.0).severity, CrisisSeverity::None);
    }

    #[test]
    fn test_sentiment_floor() {
        let d = detector();
        let a = d.assess("Everything is awful and terrible", -0.8);
        assert_eq!(a.severity, CrisisSeverity::Low);
        assert_eq!(a.triggers, vec![NEGATIVE_SENTIMENT_TRIGGER.to_string()]);
        assert_eq!(d.assess("Everything is awful and terrible", -0.5).severity, CrisisSeverity::None);
    }

    #[test]
    fn test_blank_is_none() {
        assert_eq!(detector().assess("  ", -1.0), CrisisAssessment::none());
    }
}
