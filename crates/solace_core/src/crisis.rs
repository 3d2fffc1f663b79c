//! Crisis verdict types. The classifier itself lives in `solace_signals`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::signals::tag_enum;

tag_enum! {
    /// Ordered from least to most severe.
    pub enum CrisisSeverity {
        None => "none",
        Low => "low",
        Moderate => "moderate",
        High => "high",
        Critical => "critical",
    }
}

tag_enum! {
    pub enum RecommendedAction {
        Continue => "continue",
        OfferResources => "offer_resources",
        GentleRedirect => "gentle_redirect",
        ImmediateResources => "immediate_resources",
    }
}

impl CrisisSeverity {
    pub fn recommended_action(&self) -> RecommendedAction {
        match self {
            CrisisSeverity::Critical => RecommendedAction::ImmediateResources,
            CrisisSeverity::High => RecommendedAction::GentleRedirect,
            CrisisSeverity::Moderate => RecommendedAction::OfferResources,
            CrisisSeverity::Low | CrisisSeverity::None => RecommendedAction::Continue,
        }
    }

    /// How many entries of the resource list this severity surfaces.
    /// `None` means the full list.
    pub fn resource_limit(&self) -> Option<usize> {
        match self {
            CrisisSeverity::Critical | CrisisSeverity::High => None,
            CrisisSeverity::Moderate => Some(2),
            CrisisSeverity::Low | CrisisSeverity::None => Some(0),
        }
    }
}

impl RecommendedAction {
    pub fn requires_resources(&self) -> bool {
        !matches!(self, RecommendedAction::Continue)
    }
}

/// A support line or service surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrisisResource {
    pub name: String,
    pub contact: String,
    pub description: String,
}

impl CrisisResource {
    pub fn new(name: &str, contact: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            contact: contact.to_string(),
            description: description.to_string(),
        }
    }
}

/// Per-message risk verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisAssessment {
    pub severity: CrisisSeverity,
    /// Keywords (or synthetic reasons) that produced the verdict.
    pub triggers: Vec<String>,
    pub recommended_action: RecommendedAction,
    pub resources: Vec<CrisisResource>,
}

impl CrisisAssessment {
    pub fn none() -> Self {
        Self {
            severity: CrisisSeverity::None,
            triggers: Vec::new(),
            recommended_action: RecommendedAction::Continue,
            resources: Vec::new(),
        }
    }

    /// Build a verdict whose action and resource slice follow from `severity`.
    pub fn with_severity(
        severity: CrisisSeverity,
        triggers: Vec<String>,
        full_resources: &[CrisisResource],
    ) -> Self {
        let resources = match severity.resource_limit() {
            None => full_resources.to_vec(),
            Some(n) => full_resources.iter().take(n).cloned().collect(),
        };
        Self {
            severity,
            triggers,
            recommended_action: severity.recommended_action(),
            resources,
        }
    }

    /// Fail-open: when analysis could not complete, never report less than `Low`.
    pub fn escalate_unknown(mut self, reason: &str) -> Self {
        if self.severity < CrisisSeverity::Low {
            self.severity = CrisisSeverity::Low;
            self.recommended_action = self.severity.recommended_action();
        }
        self.triggers.push(reason.to_string());
        self
    }

    pub fn is_crisis(&self) -> bool {
        self.severity >= CrisisSeverity::Moderate
    }
}

impl Default for CrisisAssessment {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resources() -> Vec<CrisisResource> {
        vec![
            CrisisResource::new("A", "1", "a"),
            CrisisResource::new("B", "2", "b"),
            CrisisResource::new("C", "3", "c"),
        ]
    }

    #[test]
    fn test_severity_ordering() {
        assert!(CrisisSeverity::Critical > CrisisSeverity::High);
        assert!(CrisisSeverity::Low > CrisisSeverity::None);
    }

    #[test]
    fn test_resource_slices() {
        let r = resources();
        assert_eq!(CrisisAssessment::with_severity(CrisisSeverity::Critical, vec![], &r).resources.len(), 3);
        assert_eq!(CrisisAssessment::with_severity(CrisisSeverity::High, vec![], &r).resources.len(), 3);
        assert_eq!(CrisisAssessment::with_severity(CrisisSeverity::Moderate, vec![], &r).resources.len(), 2);
        assert!(CrisisAssessment::with_severity(CrisisSeverity::Low, vec![], &r).resources.is_empty());
    }

    #[test]
    fn test_escalate_unknown_never_lowers() {
        let a = CrisisAssessment::none().escalate_unknown("analysis_unavailable");
        assert_eq!(a.severity, CrisisSeverity::Low);
        assert_eq!(a.triggers, vec!["analysis_unavailable".to_string()]);

        let r = resources();
        let high = CrisisAssessment::with_severity(CrisisSeverity::High, vec![], &r)
            .escalate_unknown("analysis_unavailable");
        assert_eq!(high.severity, CrisisSeverity::High);
        assert_eq!(high.recommended_action, RecommendedAction::GentleRedirect);
    }
}
