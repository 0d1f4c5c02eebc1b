//! Variation assignment for one entity at one point in time.
//!
//! # Purpose
//! Picks the variation a given entity receives for a feature: the active
//! split's weighted group when a split is live, otherwise the feature default.
//!
//! # Key invariants
//! - Assignment is deterministic per `(feature, entity)`: the bucket is
//!   derived from SHA-256 of `"{feature}/{entity}"`, never from randomness.
//! - Groups are walked in declaration order over cumulative weights, so a
//!   100 000 / 0 split always serves the first group.
use crate::{Feature, Launch, RolloutError, RolloutResult, TOTAL_WEIGHT, VariationValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
    LaunchRuleMatch,
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub variation: String,
    pub value: VariationValue,
    pub reason: Reason,
    pub launch: Option<String>,
}

/// Stable bucket in `0..TOTAL_WEIGHT` for an entity of a feature.
pub fn bucket(feature: &str, entity_id: &str) -> u32 {
    let digest = Sha256::digest(format!("{feature}/{entity_id}").as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % u64::from(TOTAL_WEIGHT)) as u32
}

/// Assign a variation of `feature` to `entity_id` at `now`.
///
/// `provisioned_at` is when the launch finished provisioning; splits that
/// start at or before it are ignored.
pub fn assign(
    feature: &Feature,
    launch: Option<&Launch>,
    entity_id: &str,
    provisioned_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> RolloutResult<Assignment> {
    if let Some(launch) = launch
        && let Some(split) = launch.active_split(provisioned_at, now)
    {
        let slot = bucket(&feature.name, entity_id);
        let mut cumulative = 0u32;
        for group in &launch.groups {
            cumulative = cumulative.saturating_add(split.weight_of(&group.name));
            if slot < cumulative {
                let variation = feature
                    .variation(&group.variation)
                    .ok_or_else(|| RolloutError::UnknownVariation(group.variation.clone()))?;
                return Ok(Assignment {
                    variation: variation.name.clone(),
                    value: variation.value.clone(),
                    reason: Reason::LaunchRuleMatch,
                    launch: Some(launch.name.clone()),
                });
            }
        }
    }

    let default = feature
        .default_variation()
        .ok_or_else(|| RolloutError::NoVariations(feature.name.clone()))?;
    Ok(Assignment {
        variation: default.name.clone(),
        value: default.value.clone(),
        reason: Reason::Default,
        launch: None,
    })
}
