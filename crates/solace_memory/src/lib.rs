pub mod aggregator;
pub mod coaching;
pub mod goals;
pub mod pipeline;
pub mod probing;
pub mod sqlite;

pub use aggregator::{aggregate, Ancillary};
pub use coaching::{generate_plan, phase_for};
pub use goals::GoalManager;
pub use pipeline::{ChainStatus, TurnOutcome, WellnessPipeline, ANALYSIS_UNAVAILABLE};
pub use probing::{question, score_engagement, ProbingQuestion, ProbingScheduler, QUESTION_BANK};
pub use sqlite::SqliteStore;
