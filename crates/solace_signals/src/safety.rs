//! Safety Wrapper: frames a drafted reply with compassion, resources and an
//! optional exercise. It only ever prepends and appends; the draft itself is
//! carried through untouched.

use solace_core::{CrisisAssessment, CrisisSeverity};

use crate::exercises::Exercise;

/// Any of these in the draft means it already addresses the crisis.
const SELF_AWARE_MARKERS: &[&str] = &["crisis", "support", "988"];

const CRITICAL_PREFIXES: &[&str] = &[
    "I'm really glad you told me this, and I'm worried about your safety right now.",
    "What you're feeling sounds incredibly painful, and you deserve support right now.",
    "Thank you for trusting me with this. Your life matters, and help is available right now.",
];

const HIGH_PREFIXES: &[&str] = &[
    "That sounds really heavy, and I'm glad you said it out loud.",
    "It sounds like you're carrying a lot right now, and you don't have to carry it alone.",
];

const MODERATE_PREFIXES: &[&str] = &[
    "That sounds really hard.",
    "I hear how much you're going through.",
];

const RESOURCE_HEADER: &str = "If you need to talk to someone, these are available:";

const DISCLAIMER: &str = "I'm an AI companion and not a substitute for professional care. \
If you are in immediate danger, please call your local emergency number.";

#[derive(Debug, Clone, Default)]
pub struct SafetyWrapper;

impl SafetyWrapper {
    pub fn new() -> Self {
        Self
    }

    /// Compose the final reply around `draft`.
    pub fn wrap(
        &self,
        draft: &str,
        assessment: &CrisisAssessment,
        exercise: Option<&Exercise>,
    ) -> String {
        let mut sections: Vec<String> = Vec::new();

        if let Some(prefix) = compassion_prefix(draft, assessment.severity) {
            sections.push(prefix.to_string());
        }
        sections.push(draft.to_string());

        let mut resources_added = false;
        if assessment.recommended_action.requires_resources() && !assessment.resources.is_empty() {
            let mut block = RESOURCE_HEADER.to_string();
            for r in &assessment.resources {
                block.push_str(&format!("\n- {}: {}. {}", r.name, r.contact, r.description));
            }
            sections.push(block);
            resources_added = true;
        }

        if let Some(exercise) = exercise {
            sections.push(exercise.transcript());
        }

        if resources_added {
            sections.push(DISCLAIMER.to_string());
        }

        sections.join("\n\n")
    }
}

fn prefix_pool(severity: CrisisSeverity) -> &'static [&'static str] {
    match severity {
        CrisisSeverity::Critical => CRITICAL_PREFIXES,
        CrisisSeverity::High => HIGH_PREFIXES,
        CrisisSeverity::Moderate => MODERATE_PREFIXES,
        CrisisSeverity::Low | CrisisSeverity::None => &[],
    }
}

/// Deterministic pick keyed on the draft, so the same draft always gets the
/// same opening line.
fn compassion_prefix(draft: &str, severity: CrisisSeverity) -> Option<&'static str> {
    let pool = prefix_pool(severity);
    if pool.is_empty() {
        return None;
    }
    let lower = draft.to_lowercase();
    if SELF_AWARE_MARKERS.iter().any(|m| lower.contains(m)) {
        return None;
    }
    pool.get(draft.len() % pool.len()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crisis::default_resources;
    use crate::exercises::BOX_BREATHING;

    fn assessment(severity: CrisisSeverity) -> CrisisAssessment {
        CrisisAssessment::with_severity(severity, vec!["x".into()], &default_resources())
    }

    #[test]
    fn test_none_passes_draft_through() {
        let out = SafetyWrapper::new().wrap("Sounds like a nice day!", &CrisisAssessment::none(), None);
        assert_eq!(out, "Sounds like a nice day!");
    }

    #[test]
    fn test_critical_gets_prefix_resources_and_disclaimer() {
        let draft = "I'm here with you.";
        let out = SafetyWrapper::new().wrap(draft, &assessment(CrisisSeverity::Critical), None);
        assert!(out.contains(draft));
        assert!(CRITICAL_PREFIXES.iter().any(|p| out.starts_with(p)));
        assert!(out.contains("988"));
        assert!(out.contains("741741"));
        assert!(out.ends_with(DISCLAIMER));
    }

    #[test]
    fn test_no_prefix_when_draft_mentions_support() {
        let draft = "Please reach out for support, you matter.";
        let out = SafetyWrapper::new().wrap(draft, &assessment(CrisisSeverity::High), None);
        assert!(out.starts_with(draft));
        assert!(out.contains(RESOURCE_HEADER));
    }

    #[test]
    fn test_prefix_choice_is_deterministic() {
        let a = assessment(CrisisSeverity::Moderate);
        let w = SafetyWrapper::new();
        assert_eq!(w.wrap("hello there", &a, None), w.wrap("hello there", &a, None));
    }

    #[test]
    fn test_empty_resources_omit_block_and_disclaimer() {
        let a = CrisisAssessment::with_severity(CrisisSeverity::Moderate, vec![], &[]);
        let out = SafetyWrapper::new().wrap("ok", &a, Some(&BOX_BREATHING));
        assert!(!out.contains(RESOURCE_HEADER));
        assert!(!out.contains(DISCLAIMER));
        assert!(out.contains("Box breathing"));
        assert!(out.contains("ok"));
    }

    #[test]
    fn test_low_severity_is_untouched_without_exercise() {
        let out = SafetyWrapper::new().wrap("draft", &assessment(CrisisSeverity::Low), None);
        assert_eq!(out, "draft");
    }
}
