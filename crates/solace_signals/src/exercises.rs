//! Short guided exercises the safety wrapper can attach to a reply.

use serde::Serialize;

use solace_core::{CognitiveDistortion, CrisisAssessment, CrisisSeverity, Emotion, MessageSignals};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exercise {
    pub id: &'static str,
    pub name: &'static str,
    pub minutes: u8,
    pub steps: &'static [&'static str],
}

impl Exercise {
    /// Numbered, plain-text rendition for appending to a reply.
    pub fn transcript(&self) -> String {
        let mut out = format!("Try this: {} ({} min)", self.name, self.minutes);
        for (i, step) in self.steps.iter().enumerate() {
            out.push_str(&format!("\n{}. {}", i + 1, step));
        }
        out
    }
}

pub const BOX_BREATHING: Exercise = Exercise {
    id: "box_breathing",
    name: "Box breathing",
    minutes: 2,
    steps: &[
        "Breathe in slowly through your nose for a count of 4.",
        "Hold your breath for a count of 4.",
        "Breathe out gently for a count of 4.",
        "Hold again for a count of 4, then repeat three more times.",
    ],
};

pub const GROUNDING_54321: Exercise = Exercise {
    id: "grounding_54321",
    name: "5-4-3-2-1 grounding",
    minutes: 3,
    steps: &[
        "Name 5 things you can see.",
        "Name 4 things you can touch.",
        "Name 3 things you can hear.",
        "Name 2 things you can smell.",
        "Name 1 thing you can taste.",
    ],
};

pub const THOUGHT_RECORD: Exercise = Exercise {
    id: "thought_record",
    name: "Thought record",
    minutes: 5,
    steps: &[
        "Write down the situation in one sentence.",
        "Write the automatic thought that came up.",
        "List the evidence for and against that thought.",
        "Write a more balanced thought you can stand behind.",
    ],
};

pub const SELF_COMPASSION_BREAK: Exercise = Exercise {
    id: "self_compassion_break",
    name: "Self-compassion break",
    minutes: 2,
    steps: &[
        "Acknowledge it: \"This is a moment of difficulty.\"",
        "Remember you are not alone: \"Other people feel this way too.\"",
        "Place a hand on your chest and say: \"May I be kind to myself.\"",
    ],
};

pub const STOP_SKILL: Exercise = Exercise {
    id: "stop_skill",
    name: "STOP skill",
    minutes: 1,
    steps: &[
        "Stop. Don't react yet.",
        "Take a step back and breathe.",
        "Observe what you are feeling and thinking.",
        "Proceed mindfully, choosing what fits your goals.",
    ],
};

pub const VALUES_CHECK_IN: Exercise = Exercise {
    id: "values_check_in",
    name: "Values check-in",
    minutes: 3,
    steps: &[
        "Name one value that matters most to you right now.",
        "Rate from 1 to 10 how closely today matched it.",
        "Pick one small action for tomorrow that moves that number up.",
    ],
};

pub const LIBRARY: &[Exercise] = &[
    BOX_BREATHING,
    GROUNDING_54321,
    THOUGHT_RECORD,
    SELF_COMPASSION_BREAK,
    STOP_SKILL,
    VALUES_CHECK_IN,
];

pub fn find(id: &str) -> Option<&'static Exercise> {
    LIBRARY.iter().find(|e| e.id == id)
}

/// Pick at most one exercise for this turn. Nothing is offered once the
/// assessment reaches `High`; resources take precedence there.
pub fn select_exercise(
    signals: &MessageSignals,
    assessment: &CrisisAssessment,
) -> Option<&'static Exercise> {
    if assessment.severity >= CrisisSeverity::High {
        return None;
    }
    if assessment.severity == CrisisSeverity::Moderate {
        return Some(&GROUNDING_54321);
    }

    let primary = signals.primary_emotion?;
    let self_critical = signals.distortions.iter().any(|d| {
        matches!(
            d,
            CognitiveDistortion::Labeling | CognitiveDistortion::Personalization
        )
    });

    let exercise = match primary {
        Emotion::Anxiety | Emotion::Fear | Emotion::Overwhelm => &BOX_BREATHING,
        Emotion::Shame | Emotion::Guilt => &SELF_COMPASSION_BREAK,
        _ if self_critical => &SELF_COMPASSION_BREAK,
        _ if !signals.distortions.is_empty() => &THOUGHT_RECORD,
        Emotion::Anger | Emotion::Frustration => &STOP_SKILL,
        _ if !signals.values.is_empty() && signals.sentiment < 0.0 => &VALUES_CHECK_IN,
        _ => return None,
    };
    Some(exercise)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(primary: Emotion) -> MessageSignals {
        MessageSignals {
            primary_emotion: Some(primary),
            intensity: 6,
            ..Default::default()
        }
    }

    fn assessment(severity: CrisisSeverity) -> CrisisAssessment {
        CrisisAssessment::with_severity(severity, vec![], &[])
    }

    #[test]
    fn test_library_ids_are_unique() {
        for e in LIBRARY {
            assert_eq!(find(e.id), Some(e));
        }
        assert_eq!(LIBRARY[1].id, "grounding_54321");
    }

    #[test]
    fn test_anxiety_gets_breathing() {
        let picked = select_exercise(&signals(Emotion::Anxiety), &CrisisAssessment::none());
        assert_eq!(picked.map(|e| e.id), Some("box_breathing"));
    }

    #[test]
    fn test_moderate_gets_grounding() {
        let picked = select_exercise(&signals(Emotion::Joy), &assessment(CrisisSeverity::Moderate));
        assert_eq!(picked.map(|e| e.id), Some("grounding_54321"));
    }

    #[test]
    fn test_nothing_during_high_or_critical() {
        for severity in [CrisisSeverity::High, CrisisSeverity::Critical] {
            assert!(select_exercise(&signals(Emotion::Anxiety), &assessment(severity)).is_none());
        }
    }

    #[test]
    fn test_distortion_gets_thought_record() {
        let mut s = signals(Emotion::Sadness);
        s.distortions.push(CognitiveDistortion::Catastrophizing);
        assert_eq!(
            select_exercise(&s, &CrisisAssessment::none()).map(|e| e.id),
            Some("thought_record")
        );
    }

    #[test]
    fn test_transcript_numbers_steps() {
        let t = STOP_SKILL.transcript();
        assert!(t.starts_with("Try this: STOP skill (1 min)"));
        assert!(t.contains("\n4. Proceed mindfully"));
    }

    #[test]
    fn test_joy_gets_nothing() {
        assert!(select_exercise(&signals(Emotion::Joy), &CrisisAssessment::none()).is_none());
    }
}
