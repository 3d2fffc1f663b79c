//! Property-based tests for the profile fold and the probing scheduler.

use chrono::Utc;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

use solace_core::config::ProbingConfig;
use solace_core::{
    CognitiveDistortion, CoreValue, Emotion, Engagement, MessageFeatures, MessageSignals,
    ProbingState, SolaceConfig, StoredInsight,
};
use solace_memory::{aggregate, Ancillary, ProbingScheduler, SqliteStore, WellnessPipeline, QUESTION_BANK};

const HOUR: i64 = 3600;

fn arb_signals() -> impl Strategy<Value = MessageSignals> {
    (
        prop::option::of(prop::sample::select(Emotion::ALL.to_vec())),
        0u8..=10,
        prop::collection::vec(prop::sample::select(CognitiveDistortion::ALL.to_vec()), 0..3),
        prop::collection::vec(prop::sample::select(CoreValue::ALL.to_vec()), 0..3),
        -1.0f32..=1.0,
        (0u32..60, 0u32..3, 0u32..3, 0u32..3),
    )
        .prop_map(|(emotion, intensity, distortions, values, sentiment, (words, hedges, analytic, feeling))| {
            MessageSignals {
                primary_emotion: emotion,
                intensity,
                distortions,
                values,
                sentiment,
                features: MessageFeatures {
                    word_count: words,
                    hedge_count: hedges,
                    analytic_count: analytic,
                    feeling_count: feeling,
                    ..Default::default()
                },
                ..Default::default()
            }
        })
}

fn ledger(signals: Vec<MessageSignals>) -> Vec<StoredInsight> {
    signals
        .into_iter()
        .enumerate()
        .map(|(i, signals)| StoredInsight {
            user_id: "u1".into(),
            message_id: format!("m{}", i),
            conversation_id: format!("c{}", i / 4),
            signals,
            created_at: 1_000 + i as i64,
        })
        .collect()
}

fn ancillary(facts: u64) -> Ancillary {
    Ancillary {
        relationships: Some(vec![]),
        life_events: Some(vec![]),
        snapshots: Some(vec![]),
        context_fact_count: Some(facts),
    }
}

/// The same messages in their generated order and in a shuffled order.
fn arb_orderings() -> impl Strategy<Value = (Vec<MessageSignals>, Vec<MessageSignals>)> {
    prop::collection::vec(arb_signals(), 1..25).prop_flat_map(|extra| {
        let shuffled = Just(extra.clone()).prop_shuffle();
        (Just(extra), shuffled)
    })
}

fn arb_engagement() -> impl Strategy<Value = Engagement> {
    prop::sample::select(vec![Engagement::Low, Engagement::Medium, Engagement::High])
}

proptest! {
    /// Folding the same ledger twice gives the same profile.
    #[test]
    fn aggregation_is_idempotent(signals in prop::collection::vec(arb_signals(), 0..30), facts in 0u64..20) {
        let window = ledger(signals);
        let a = aggregate("u1", window.len() as u64, &window, &ancillary(facts));
        let b = aggregate("u1", window.len() as u64, &window, &ancillary(facts));
        prop_assert_eq!(a, b);
    }

    /// Appending messages or facts never lowers confidence.
    #[test]
    fn confidence_never_drops_as_history_grows(
        signals in prop::collection::vec(arb_signals(), 1..40),
        facts in prop::collection::vec(0u64..2, 1..40),
    ) {
        let window = ledger(signals);
        let mut fact_total = 0u64;
        let mut last = 0u8;
        for n in 1..=window.len() {
            fact_total += facts[(n - 1) % facts.len()];
            let profile = aggregate("u1", n as u64, &window[..n], &ancillary(fact_total));
            prop_assert!(profile.confidence >= last);
            prop_assert!(profile.confidence <= 100);
            last = profile.confidence;
        }
    }

    /// Appending extra messages in any order never lowers confidence, and
    /// every order ends at the same value.
    #[test]
    fn confidence_never_drops_in_any_order(
        base in prop::collection::vec(arb_signals(), 0..10),
        (extra, shuffled) in arb_orderings(),
        facts in 0u64..12,
    ) {
        let before = aggregate("u1", base.len() as u64, &ledger(base.clone()), &ancillary(facts));
        let mut finals = Vec::new();
        for order in [extra, shuffled] {
            let mut all = base.clone();
            all.extend(order);
            let window = ledger(all);
            let mut last = before.confidence;
            for n in base.len() + 1..=window.len() {
                let profile = aggregate("u1", n as u64, &window[..n], &ancillary(facts));
                prop_assert!(profile.confidence >= last);
                last = profile.confidence;
            }
            finals.push(last);
        }
        prop_assert_eq!(finals[0], finals[1]);
    }

    /// Inside the cooldown nobody is eligible, whatever their history.
    #[test]
    fn cooldown_holds_for_any_conversation_count(
        count in 0u64..10_000,
        last in 0i64..2_000_000_000,
        elapsed in 0i64..48 * HOUR,
    ) {
        let scheduler = ProbingScheduler::new(ProbingConfig::default());
        let mut state = ProbingState::new("u1");
        state.last_asked_at = Some(last);
        prop_assert!(!scheduler.is_eligible(&state, count, last + elapsed));
        prop_assert_eq!(scheduler.is_eligible(&state, count, last + 48 * HOUR + elapsed), count >= 3);
    }

    /// Ranked lists hold no duplicates and intensity stays on its scale.
    #[test]
    fn profile_lists_are_distinct(signals in prop::collection::vec(arb_signals(), 0..30)) {
        let window = ledger(signals);
        let p = aggregate("u1", window.len() as u64, &window, &Ancillary::default());
        let distinct: BTreeSet<_> = p.dominant_emotions.iter().collect();
        prop_assert_eq!(distinct.len(), p.dominant_emotions.len());
        prop_assert!(p.dominant_emotions.len() <= 3);
        prop_assert!(p.average_intensity >= 0.0 && p.average_intensity <= 10.0);
        prop_assert_eq!(p.degraded_sources.len(), 4);
    }

    /// Depth only ever moves forward, whatever the answers look like.
    #[test]
    fn probing_depth_is_monotonic(answers in prop::collection::vec(arb_engagement(), 0..40)) {
        let scheduler = ProbingScheduler::new(ProbingConfig::default());
        let mut state = ProbingState::new("u1");
        let mut now = 0i64;
        for engagement in answers {
            let before = state.current_depth;
            let q = &QUESTION_BANK[(now as usize) % QUESTION_BANK.len()];
            scheduler.record_asked(&mut state, q, now);
            scheduler.record_answer(&mut state, engagement);
            prop_assert!(state.current_depth >= before);
            prop_assert!(state.current_depth.level() - before.level() <= 1);
            now += 1;
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// The drafted reply comes back untouched while the cooldown runs.
    #[test]
    fn draft_unchanged_within_cooldown(
        count in 0u64..500,
        hours_ago in 0i64..48,
        draft in "[A-Za-z ]{1,40}",
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let reply = rt.block_on(async {
            let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
            let mut state = ProbingState::new("u1");
            state.last_asked_at = Some(Utc::now().timestamp() - hours_ago * HOUR);
            store.save_probing_state(&state).await.unwrap();
            let pipeline = WellnessPipeline::new(SolaceConfig::default(), store).unwrap();
            pipeline
                .maybe_append_probing_question("u1", count, "work has been a lot this week", &draft)
                .await
        });
        prop_assert_eq!(reply, draft);
    }
}
