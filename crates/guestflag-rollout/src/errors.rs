use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RolloutError {
    #[error("feature {0} declares no variations")]
    NoVariations(String),
    #[error("duplicate variation {0}")]
    DuplicateVariation(String),
    #[error("unknown variation {0}")]
    UnknownVariation(String),
    #[error("launch {0} declares no groups")]
    NoGroups(String),
    #[error("duplicate launch group {0}")]
    DuplicateGroup(String),
    #[error("unknown launch group {0}")]
    UnknownGroup(String),
    #[error("launch {launch} targets feature {actual}, expected {expected}")]
    FeatureMismatch {
        launch: String,
        expected: String,
        actual: String,
    },
    #[error("split starting at {start} has weights summing to {total}, expected {expected}")]
    InvalidWeights {
        start: DateTime<Utc>,
        total: u64,
        expected: u32,
    },
    #[error("split start times must be strictly increasing (at {0})")]
    UnorderedSplits(DateTime<Utc>),
    #[error("invalid rollout plan: {0}")]
    InvalidPlan(String),
}

pub type RolloutResult<T> = Result<T, RolloutError>;
