//! Stateless analyzers of the Solace pipeline.
//!
//! Everything here is synchronous and side-effect free; the same `RuleSet`
//! instance is shared by the extractor and the crisis detector.

pub mod crisis;
pub mod exercises;
pub mod extractor;
pub mod patterns;
pub mod rules;
pub mod safety;

pub use crisis::{default_resources, CrisisDetector};
pub use exercises::{select_exercise, Exercise};
pub use extractor::SignalExtractor;
pub use rules::{RuleError, RuleSet};
pub use safety::SafetyWrapper;
