//! Coaching plan model.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::signals::tag_enum;

tag_enum! {
    pub enum TherapeuticApproach {
        Cbt => "cbt",
        Act => "act",
        DbtSkills => "dbt_skills",
        AttachmentFocused => "attachment_focused",
        CompassionFocused => "compassion_focused",
        SolutionFocused => "solution_focused",
        Mindfulness => "mindfulness",
    }
}

impl TherapeuticApproach {
    pub fn label(&self) -> &'static str {
        match self {
            TherapeuticApproach::Cbt => "Cognitive Behavioral Therapy",
            TherapeuticApproach::Act => "Acceptance and Commitment Therapy",
            TherapeuticApproach::DbtSkills => "DBT emotion-regulation skills",
            TherapeuticApproach::AttachmentFocused => "Attachment-focused work",
            TherapeuticApproach::CompassionFocused => "Compassion-focused therapy",
            TherapeuticApproach::SolutionFocused => "Solution-focused coaching",
            TherapeuticApproach::Mindfulness => "Mindfulness-based practice",
        }
    }
}

tag_enum! {
    pub enum PlanPhase {
        Foundation => "foundation",
        Exploration => "exploration",
        Integration => "integration",
    }
}

tag_enum! {
    pub enum PlanStatus {
        Active => "active",
        Completed => "completed",
        Replaced => "replaced",
    }
}

impl PlanStatus {
    pub fn parse_str(s: &str) -> Self {
        match s {
            "completed" => PlanStatus::Completed,
            "replaced" => PlanStatus::Replaced,
            _ => PlanStatus::Active,
        }
    }
}

tag_enum! {
    pub enum StepStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Done => "done",
        Skipped => "skipped",
    }
}

impl StepStatus {
    pub fn parse_str(s: &str) -> Self {
        match s {
            "in_progress" => StepStatus::InProgress,
            "done" => StepStatus::Done,
            "skipped" => StepStatus::Skipped,
            _ => StepStatus::Pending,
        }
    }
}

tag_enum! {
    pub enum Cadence {
        Daily => "daily",
        AsNeeded => "as_needed",
        Weekly => "weekly",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: i64,
    pub position: u32,
    pub title: String,
    pub description: String,
    pub cadence: Cadence,
    pub status: StepStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachingPlan {
    pub id: i64,
    pub user_id: String,
    pub focus_area: String,
    pub root_causes: Vec<String>,
    pub short_term_goals: Vec<String>,
    pub long_term_goals: Vec<String>,
    pub approaches: Vec<TherapeuticApproach>,
    pub phase: PlanPhase,
    pub status: PlanStatus,
    pub steps: Vec<PlanStep>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl CoachingPlan {
    pub fn is_active(&self) -> bool {
        self.status == PlanStatus::Active
    }

    /// Fraction of steps done or skipped, 0.0-1.0.
    pub fn completion(&self) -> f32 {
        if self.steps.is_empty() {
            return 0.0;
        }
        let finished = self
            .steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Done | StepStatus::Skipped))
            .count();
        finished as f32 / self.steps.len() as f32
    }
}
