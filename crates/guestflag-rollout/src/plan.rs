//! Staged rollout planning relative to provisioning completion.
//!
//! # Purpose
//! Turns a list of stages ("start with 10 %, go to 50 % an hour later") into
//! absolute scheduled splits anchored after the expected provisioning
//! completion time.
//!
//! # Key invariants
//! - The first stage starts at `expected_completion + lead`, lead > 0.
//! - Stage offsets are measured from the first stage and strictly increase,
//!   so the produced start times are strictly increasing.
//!
//! # Examples
//! ```rust
//! use chrono::{DateTime, Utc};
//! use guestflag_rollout::{RolloutPlan, standard};
//! use std::time::Duration;
//!
//! let completion = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
//! let splits = RolloutPlan::new()
//!     .boolean_stage(Duration::ZERO, 10_000)
//!     .boolean_stage(Duration::from_secs(3600), 50_000)
//!     .schedule(completion)
//!     .unwrap();
//! assert_eq!(splits[0].start_time.timestamp(), 1_700_000_180);
//! assert_eq!(splits[1].weight_of(standard::ENABLED_VARIATION), 50_000);
//! ```
use crate::{GroupWeight, RolloutError, RolloutResult, ScheduledSplit, standard};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Margin between expected provisioning completion and the first split.
pub const DEFAULT_LEAD: Duration = Duration::from_secs(180);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStage {
    pub after_first: Duration,
    pub group_weights: Vec<GroupWeight>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloutPlan {
    lead: Duration,
    stages: Vec<PlannedStage>,
}

impl Default for RolloutPlan {
    fn default() -> Self {
        Self::new()
    }
}

impl RolloutPlan {
    pub fn new() -> Self {
        Self {
            lead: DEFAULT_LEAD,
            stages: Vec::new(),
        }
    }

    pub fn with_lead(mut self, lead: Duration) -> Self {
        self.lead = lead;
        self
    }

    pub fn stage(mut self, after_first: Duration, group_weights: Vec<GroupWeight>) -> Self {
        self.stages.push(PlannedStage {
            after_first,
            group_weights,
        });
        self
    }

    /// Stage for the standard boolean feature.
    pub fn boolean_stage(self, after_first: Duration, enabled_weight: u32) -> Self {
        let split = standard::boolean_split(DateTime::<Utc>::MIN_UTC, enabled_weight);
        self.stage(after_first, split.group_weights)
    }

    pub fn lead(&self) -> Duration {
        self.lead
    }

    pub fn schedule(&self, expected_completion: DateTime<Utc>) -> RolloutResult<Vec<ScheduledSplit>> {
        if self.lead.is_zero() {
            return Err(RolloutError::InvalidPlan(
                "lead must be positive or the first split never activates".to_string(),
            ));
        }
        let Some(first) = self.stages.first() else {
            return Err(RolloutError::InvalidPlan("plan has no stages".to_string()));
        };
        if !first.after_first.is_zero() {
            return Err(RolloutError::InvalidPlan(
                "first stage must have a zero offset".to_string(),
            ));
        }

        let first_start = expected_completion + to_delta(self.lead)?;
        let mut previous: Option<Duration> = None;
        let mut splits = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            if let Some(previous) = previous
                && stage.after_first <= previous
            {
                return Err(RolloutError::InvalidPlan(format!(
                    "stage offsets must strictly increase ({:?} after {:?})",
                    stage.after_first, previous
                )));
            }
            previous = Some(stage.after_first);
            splits.push(ScheduledSplit::new(
                first_start + to_delta(stage.after_first)?,
                stage.group_weights.clone(),
            ));
        }
        Ok(splits)
    }
}

fn to_delta(duration: Duration) -> RolloutResult<chrono::Duration> {
    chrono::Duration::from_std(duration)
        .map_err(|err| RolloutError::InvalidPlan(format!("duration out of range: {err}")))
}
