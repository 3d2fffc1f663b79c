//! Property-based tests for solace_core.
//!
//! Uses proptest to verify invariants that must hold for ALL possible inputs,
//! not just hand-picked examples.

use proptest::prelude::*;
use solace_core::audit::{self, AuditEntry, AuditEvent, GENESIS_HASH};
use solace_core::profile_confidence;
use solace_core::sentiment::analyze_sentiment;

proptest! {
    /// Confidence never decreases when either input grows.
    #[test]
    fn confidence_is_monotonic(
        messages in 0u64..10_000,
        facts in 0u64..10_000,
        more_messages in 0u64..500,
        more_facts in 0u64..500,
    ) {
        let before = profile_confidence(messages, facts);
        let after = profile_confidence(messages + more_messages, facts + more_facts);
        prop_assert!(after >= before);
        prop_assert!(after <= 100);
    }

    /// Sentiment stays in its documented range for arbitrary text.
    #[test]
    fn sentiment_is_bounded(text in ".{0,400}") {
        let (valence, intensity) = analyze_sentiment(&text);
        prop_assert!((-1.0..=1.0).contains(&valence));
        prop_assert!((0.1..=1.0).contains(&intensity));
    }

    /// Any chain built by folding `chain` verifies, and flipping any
    /// entry's timestamp breaks it at exactly that index.
    #[test]
    fn audit_chain_detects_edits(
        stamps in prop::collection::vec(0i64..1_000_000, 1..20),
        victim in any::<prop::sample::Index>(),
    ) {
        let mut prev = GENESIS_HASH.to_string();
        let mut rows = Vec::new();
        for ts in &stamps {
            let row = audit::chain(&prev, AuditEntry {
                user_id: "u".into(),
                event: AuditEvent::ProfileAggregated,
                detail: serde_json::json!({ "ts": ts }),
                created_at: *ts,
            });
            prev = row.hash.clone();
            rows.push(row);
        }
        prop_assert_eq!(audit::verify(&rows), Ok(()));

        let i = victim.index(rows.len());
        rows[i].entry.created_at += 1;
        prop_assert_eq!(audit::verify(&rows), Err(i));
    }
}
