//! Coaching Plan Generator.
//!
//! Deterministic: the same profile and goals always produce the same plan.
//! Personalization lives in root causes, goals and approaches; the initial
//! step list is the same for everyone.

use solace_core::{
    AttachmentStyle, Cadence, CognitiveDistortion, CoachingPlan, DefenseMechanism, PlanPhase,
    PlanStatus, PlanStep, StepStatus, TherapeuticApproach, UserGoal, UserProfile,
};

/// Average intensity at or above which emotion-regulation skills are added.
pub const HIGH_INTENSITY: f32 = 7.0;

const DEFAULT_FOCUS: &str = "Building emotional awareness";
const NO_HISTORY_ROOT_CAUSE: &str = "Not enough history yet to identify patterns";

fn attachment_root_cause(style: AttachmentStyle) -> Option<&'static str> {
    match style {
        AttachmentStyle::Anxious => Some("Need for external validation"),
        AttachmentStyle::Avoidant => Some("Discomfort with emotional closeness"),
        AttachmentStyle::Disorganized => Some("Conflicting pulls toward and away from closeness"),
        AttachmentStyle::Secure | AttachmentStyle::Developing => None,
    }
}

fn distortion_root_cause(d: CognitiveDistortion) -> Option<&'static str> {
    match d {
        CognitiveDistortion::Catastrophizing | CognitiveDistortion::FortuneTelling => {
            Some("Tendency to anticipate the worst")
        }
        CognitiveDistortion::AllOrNothing => Some("Rigid all-or-nothing thinking"),
        CognitiveDistortion::ShouldStatements => Some("Harsh internal standards"),
        CognitiveDistortion::Labeling | CognitiveDistortion::Personalization => {
            Some("Harsh self-criticism")
        }
        CognitiveDistortion::MindReading => Some("Assuming others' judgments"),
        _ => None,
    }
}

fn defense_root_cause(d: DefenseMechanism) -> Option<&'static str> {
    match d {
        DefenseMechanism::Avoidance => Some("Avoiding painful topics"),
        DefenseMechanism::Denial | DefenseMechanism::Minimization => {
            Some("Downplaying difficult feelings")
        }
        _ => None,
    }
}

fn push_unique<T: PartialEq>(out: &mut Vec<T>, item: T) {
    if !out.contains(&item) {
        out.push(item);
    }
}

/// The three steps every new plan starts with.
pub fn initial_steps() -> Vec<PlanStep> {
    let step = |position: u32, title: &str, description: &str, cadence: Cadence| PlanStep {
        id: 0,
        position,
        title: title.to_string(),
        description: description.to_string(),
        cadence,
        status: StepStatus::Pending,
    };
    vec![
        step(
            1,
            "Daily check-in",
            "Take a minute each day to name how you feel and rate your energy.",
            Cadence::Daily,
        ),
        step(
            2,
            "Thought record",
            "When a strong feeling shows up, write down the situation, the thought and a more balanced alternative.",
            Cadence::AsNeeded,
        ),
        step(
            3,
            "Weekly reflection",
            "Once a week, look back at what helped, what was hard and what you want to try next.",
            Cadence::Weekly,
        ),
    ]
}

/// Build a fresh, active plan for `profile`. Ids are assigned on save.
pub fn generate_plan(profile: &UserProfile, active_goals: &[UserGoal], now: i64) -> CoachingPlan {
    let mut root_causes: Vec<String> = Vec::new();
    if let Some(cause) = attachment_root_cause(profile.attachment_style) {
        push_unique(&mut root_causes, cause.to_string());
    }
    for d in &profile.distortion_patterns {
        if let Some(cause) = distortion_root_cause(*d) {
            push_unique(&mut root_causes, cause.to_string());
        }
    }
    for d in &profile.defense_patterns {
        if let Some(cause) = defense_root_cause(*d) {
            push_unique(&mut root_causes, cause.to_string());
        }
    }
    if root_causes.is_empty() {
        root_causes.push(NO_HISTORY_ROOT_CAUSE.to_string());
    }

    let mut approaches = Vec::new();
    if !profile.distortion_patterns.is_empty() {
        approaches.push(TherapeuticApproach::Cbt);
    }
    if !profile.defense_patterns.is_empty() {
        approaches.push(TherapeuticApproach::Act);
    }
    if profile.average_intensity >= HIGH_INTENSITY {
        approaches.push(TherapeuticApproach::DbtSkills);
    }
    if matches!(
        profile.attachment_style,
        AttachmentStyle::Anxious | AttachmentStyle::Avoidant | AttachmentStyle::Disorganized
    ) {
        approaches.push(TherapeuticApproach::AttachmentFocused);
    }
    if profile.distortion_patterns.iter().any(|d| {
        matches!(
            d,
            CognitiveDistortion::Labeling | CognitiveDistortion::Personalization
        )
    }) {
        approaches.push(TherapeuticApproach::CompassionFocused);
    }
    if !active_goals.is_empty() {
        approaches.push(TherapeuticApproach::SolutionFocused);
    }
    if approaches.is_empty() {
        approaches.push(TherapeuticApproach::Mindfulness);
    }

    let focus_area = profile
        .growth_areas
        .first()
        .cloned()
        .or_else(|| {
            profile
                .dominant_emotions
                .first()
                .map(|e| format!("Working with {}", e))
        })
        .unwrap_or_else(|| DEFAULT_FOCUS.to_string());

    let mut short_term_goals: Vec<String> = profile
        .growth_areas
        .iter()
        .take(2)
        .map(|area| format!("Practice one small step toward: {}", area.to_lowercase()))
        .collect();
    if short_term_goals.is_empty() {
        short_term_goals.push("Check in with yourself daily for one week".to_string());
    }

    let mut long_term_goals: Vec<String> = active_goals.iter().map(|g| g.title.clone()).collect();
    for value in profile.core_values.iter().take(2) {
        push_unique(&mut long_term_goals, format!("Live more in line with {}", value));
    }
    if long_term_goals.is_empty() {
        long_term_goals.push("Understand your own patterns and needs".to_string());
    }

    CoachingPlan {
        id: 0,
        user_id: profile.user_id.clone(),
        focus_area,
        root_causes,
        short_term_goals,
        long_term_goals,
        approaches,
        phase: PlanPhase::Foundation,
        status: PlanStatus::Active,
        steps: initial_steps(),
        created_at: now,
        updated_at: now,
    }
}

/// Phase implied by how many steps are finished.
pub fn phase_for(plan: &CoachingPlan) -> PlanPhase {
    let done = plan.completion();
    if done >= 2.0 / 3.0 {
        PlanPhase::Integration
    } else if done >= 1.0 / 3.0 {
        PlanPhase::Exploration
    } else {
        PlanPhase::Foundation
    }
}

/// Whether a fresh aggregation differs enough from the previous profile to
/// replace the active plan (only consulted when auto-refresh is on).
pub fn needs_refresh(previous: &UserProfile, current: &UserProfile) -> bool {
    previous.attachment_style != current.attachment_style
        || previous.growth_areas.first() != current.growth_areas.first()
}

#[cfg(test)]
mod tests {
    use super::*;
    use solace_core::{CoreValue, GoalCategory, GoalStatus};

    #[test]
    fn test_anxious_catastrophizer() {
        let mut p = UserProfile::empty("u1");
        p.attachment_style = AttachmentStyle::Anxious;
        p.distortion_patterns = vec![CognitiveDistortion::Catastrophizing];
        p.growth_areas = vec!["Keeping perspective under stress".into()];

        let plan = generate_plan(&p, &[], 100);
        assert_eq!(plan.root_causes[0], "Need for external validation");
        assert!(plan.root_causes.contains(&"Tendency to anticipate the worst".to_string()));
        assert!(plan.approaches.contains(&TherapeuticApproach::Cbt));
        assert!(plan.approaches.contains(&TherapeuticApproach::AttachmentFocused));
        assert!(!plan.approaches.contains(&TherapeuticApproach::Mindfulness));
        assert_eq!(plan.focus_area, "Keeping perspective under stress");
        assert_eq!(plan.status, PlanStatus::Active);
    }

    #[test]
    fn test_empty_profile_gets_mindfulness() {
        let plan = generate_plan(&UserProfile::empty("u1"), &[], 100);
        assert_eq!(plan.approaches, vec![TherapeuticApproach::Mindfulness]);
        assert_eq!(plan.root_causes, vec![NO_HISTORY_ROOT_CAUSE.to_string()]);
        assert_eq!(plan.focus_area, DEFAULT_FOCUS);
    }

    #[test]
    fn test_steps_are_fixed() {
        let mut p = UserProfile::empty("u1");
        p.average_intensity = 8.5;
        p.core_values = vec![CoreValue::Family];
        let a = generate_plan(&p, &[], 1);
        let b = generate_plan(&UserProfile::empty("u2"), &[], 2);
        let titles = |plan: &CoachingPlan| plan.steps.iter().map(|s| s.title.clone()).collect::<Vec<_>>();
        assert_eq!(titles(&a), vec!["Daily check-in", "Thought record", "Weekly reflection"]);
        assert_eq!(titles(&a), titles(&b));
        assert!(a.approaches.contains(&TherapeuticApproach::DbtSkills));
        assert_eq!(a.long_term_goals, vec!["Live more in line with family".to_string()]);
    }

    #[test]
    fn test_active_goals_feed_long_term() {
        let goal = UserGoal {
            id: 1,
            user_id: "u1".into(),
            title: "run a marathon".into(),
            category: GoalCategory::Health,
            status: GoalStatus::Active,
            motivators: vec![],
            obstacles: vec![],
            created_at: 0,
            updated_at: 0,
        };
        let plan = generate_plan(&UserProfile::empty("u1"), &[goal], 1);
        assert_eq!(plan.long_term_goals, vec!["run a marathon".to_string()]);
        assert_eq!(plan.approaches, vec![TherapeuticApproach::SolutionFocused]);
    }

    #[test]
    fn test_phase_follows_completion() {
        let mut plan = generate_plan(&UserProfile::empty("u1"), &[], 1);
        assert_eq!(phase_for(&plan), PlanPhase::Foundation);
        plan.steps[0].status = StepStatus::Done;
        assert_eq!(phase_for(&plan), PlanPhase::Exploration);
        plan.steps[1].status = StepStatus::Skipped;
        assert_eq!(phase_for(&plan), PlanPhase::Integration);
    }

    #[test]
    fn test_needs_refresh() {
        let a = UserProfile::empty("u1");
        let mut b = a.clone();
        assert!(!needs_refresh(&a, &b));
        b.attachment_style = AttachmentStyle::Secure;
        assert!(needs_refresh(&a, &b));
    }
}
