//! Property-based tests for solace_signals.
//!
//! Uses proptest to check the analyzers against arbitrary text rather than
//! hand-picked sentences.

use proptest::prelude::*;
use std::sync::OnceLock;

use solace_core::{CrisisAssessment, CrisisSeverity};
use solace_signals::{default_resources, CrisisDetector, SafetyWrapper, SignalExtractor};

fn extractor() -> &'static SignalExtractor {
    static EXTRACTOR: OnceLock<SignalExtractor> = OnceLock::new();
    EXTRACTOR.get_or_init(|| SignalExtractor::english().unwrap())
}

fn detector() -> &'static CrisisDetector {
    static DETECTOR: OnceLock<CrisisDetector> = OnceLock::new();
    DETECTOR.get_or_init(|| CrisisDetector::english().unwrap())
}

fn arb_severity() -> impl Strategy<Value = CrisisSeverity> {
    prop::sample::select(CrisisSeverity::ALL.to_vec())
}

/// Lowercase filler words that are in no tier of any pattern table.
fn arb_filler() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::sample::select(vec!["the", "weather", "table", "coffee", "blue sky", "walked", "river"]),
        0..8,
    )
    .prop_map(|w| w.join(" "))
}

proptest! {
    /// A critical phrase anywhere in the message always yields critical,
    /// whatever surrounds it and whatever the sentiment.
    #[test]
    fn critical_phrase_always_critical(
        before in arb_filler(),
        after in arb_filler(),
        phrase in prop::sample::select(vec!["kill myself", "want to die", "end my life", "suicidal"]),
        sentiment in -1.0f32..=1.0,
    ) {
        let text = format!("{before} I {phrase} {after}");
        let a = detector().assess(&text, sentiment);
        prop_assert_eq!(a.severity, CrisisSeverity::Critical);
        prop_assert!(a.resources.iter().any(|r| r.contact.contains("988")));
    }

    /// Keywords glued inside longer words never fire a tier.
    #[test]
    fn embedded_keywords_do_not_fire(
        prefix in "[a-z]{1,4}",
        word in prop::sample::select(vec!["cutting", "mad", "sad", "numb", "suicide"]),
    ) {
        let text = format!("the {prefix}{word}x report");
        let a = detector().assess(&text, 0.0);
        prop_assert_eq!(a.severity, CrisisSeverity::None);
    }

    /// Intensity stays in 1..=10 for any non-blank text, and extraction
    /// never panics.
    #[test]
    fn intensity_in_range(text in "\\PC{0,300}") {
        let s = extractor().extract(&text, None);
        if text.trim().is_empty() {
            prop_assert_eq!(s.intensity, 0);
        } else {
            prop_assert!((1..=10).contains(&s.intensity));
        }
        prop_assert!(s.secondary_emotions.len() <= 2);
        prop_assert!((-1.0..=1.0).contains(&s.sentiment));
    }

    /// The wrapped reply always contains the draft verbatim.
    #[test]
    fn wrapper_preserves_draft(
        draft in "\\PC{0,200}",
        severity in arb_severity(),
        with_resources in any::<bool>(),
    ) {
        let resources = if with_resources { default_resources() } else { Vec::new() };
        let a = CrisisAssessment::with_severity(severity, vec![], &resources);
        let out = SafetyWrapper::new().wrap(&draft, &a, None);
        prop_assert!(out.contains(&draft));
    }
}
