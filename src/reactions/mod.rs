pub mod domain;
pub mod engine;

pub use domain::{Counts, ReactionOutcome, ReactionTarget, Stance, TargetKind};
pub use engine::{ReactionEngine, ReactionError, TargetDirectory};
