use thiserror::Error;

/// Errors surfaced by the pipeline to its caller.
#[derive(Debug, Error)]
pub enum SolaceError {
    #[error("no profile could be built for user {user_id}")]
    ProfileUnavailable { user_id: String },

    #[error("coaching plan {plan_id} not found for user {user_id}")]
    PlanNotFound { user_id: String, plan_id: i64 },

    #[error("plan step {step_id} not found")]
    StepNotFound { step_id: i64 },

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub type SolaceResult<T> = std::result::Result<T, SolaceError>;
