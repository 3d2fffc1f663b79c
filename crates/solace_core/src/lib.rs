pub mod audit;
pub mod config;
pub mod crisis;
pub mod entities;
pub mod error;
pub mod plan;
pub mod profile;
pub mod sentiment;
pub mod signals;

pub use config::SolaceConfig;
pub use crisis::{CrisisAssessment, CrisisResource, CrisisSeverity, RecommendedAction};
pub use entities::{
    ContextFact, CopingStyle, EmotionalSnapshot, Engagement, GoalProgress, LifeEvent,
    ProbingDepth, ProbingState, Relationship, StoredInsight, UserGoal,
};
pub use error::{SolaceError, SolaceResult};
pub use plan::{
    Cadence, CoachingPlan, PlanPhase, PlanStatus, PlanStep, StepStatus, TherapeuticApproach,
};
pub use profile::{
    profile_confidence, AttachmentStyle, CommunicationStyle, EmotionalTrend, UserProfile,
};
pub use signals::*;

use async_trait::async_trait;

/// What the reply drafter gets to see about the current turn.
#[derive(Debug, Clone)]
pub struct DraftContext<'a> {
    pub user_id: &'a str,
    pub message: &'a str,
    pub signals: &'a MessageSignals,
    pub assessment: &'a CrisisAssessment,
    pub profile: Option<&'a UserProfile>,
}

/// Produces the raw assistant reply. Natural-language generation lives
/// behind this seam; the pipeline only frames what comes out of it.
#[async_trait]
pub trait ReplyDrafter: Send + Sync {
    async fn draft(&self, ctx: DraftContext<'_>) -> anyhow::Result<String>;
}
