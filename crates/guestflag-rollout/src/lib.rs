//! Rollout scheduling for guestflag features.
//!
//! # Purpose
//! Declares features with typed variations, launches that map variations onto
//! groups, and the time-ordered weighted splits that decide which variation is
//! served. Also plans staged rollouts relative to provisioning completion.
//!
//! # How it fits
//! The provisioner validates launches with [`Launch::validate`] before apply;
//! the feature evaluation endpoint calls [`assign`] with the launch's
//! provisioning timestamp and the current time.
//!
//! # Key invariants
//! - Split weights are integer units out of [`TOTAL_WEIGHT`] (100 000 = 100 %).
//! - The active split is the latest one with
//!   `provisioned_at < start_time <= now`; with none, the default is served.
//! - Assignment is deterministic for a `(feature, entity)` pair.
//!
//! # Common pitfalls
//! - A split that starts before provisioning completes never activates.
mod assign;
mod errors;
mod feature;
mod launch;
mod plan;
pub mod standard;

pub use assign::{Assignment, Reason, assign, bucket};
pub use errors::{RolloutError, RolloutResult};
pub use feature::{Feature, Variation, VariationValue};
pub use launch::{GroupWeight, Launch, LaunchGroup, ScheduledSplit, TOTAL_WEIGHT};
pub use plan::{DEFAULT_LEAD, PlannedStage, RolloutPlan};
