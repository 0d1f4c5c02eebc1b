//! Launches: groups of variations plus a time-ordered schedule of splits.
//!
//! # Purpose
//! A launch maps feature variations onto named groups and declares when each
//! weighted split takes effect.
//!
//! # Key invariants
//! - Every split's weights sum to exactly [`TOTAL_WEIGHT`].
//! - Split start times are strictly increasing.
//! - A split only activates when it starts strictly after provisioning
//!   completed. Earlier splits are kept but never served.
//!
//! # Common pitfalls
//! - Scheduling the first split at "now" when the launch is provisioned: by
//!   the time provisioning completes the start is in the past and the launch
//!   keeps serving the default variation. Use [`crate::RolloutPlan`].
use crate::{Feature, RolloutError, RolloutResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Weight units that make up 100 % of traffic.
pub const TOTAL_WEIGHT: u32 = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchGroup {
    pub name: String,
    pub variation: String,
}

impl LaunchGroup {
    pub fn new(name: impl Into<String>, variation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variation: variation.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupWeight {
    pub group: String,
    pub weight: u32,
}

impl GroupWeight {
    pub fn new(group: impl Into<String>, weight: u32) -> Self {
        Self {
            group: group.into(),
            weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledSplit {
    pub start_time: DateTime<Utc>,
    pub group_weights: Vec<GroupWeight>,
}

impl ScheduledSplit {
    pub fn new(start_time: DateTime<Utc>, group_weights: Vec<GroupWeight>) -> Self {
        Self {
            start_time,
            group_weights,
        }
    }

    pub fn weight_of(&self, group: &str) -> u32 {
        self.group_weights
            .iter()
            .filter(|weight| weight.group == group)
            .map(|weight| weight.weight)
            .sum()
    }

    fn total(&self) -> u64 {
        self.group_weights
            .iter()
            .map(|weight| u64::from(weight.weight))
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Launch {
    pub name: String,
    pub feature: String,
    pub groups: Vec<LaunchGroup>,
    #[serde(default)]
    pub scheduled_splits: Vec<ScheduledSplit>,
}

impl Launch {
    pub fn group(&self, name: &str) -> Option<&LaunchGroup> {
        self.groups.iter().find(|group| group.name == name)
    }

    /// Validate the launch against its feature.
    ///
    /// When `provisioned_at` is known, splits that start at or before it are
    /// accepted but logged, since they will never activate.
    pub fn validate(
        &self,
        feature: &Feature,
        provisioned_at: Option<DateTime<Utc>>,
    ) -> RolloutResult<()> {
        if self.feature != feature.name {
            return Err(RolloutError::FeatureMismatch {
                launch: self.name.clone(),
                expected: feature.name.clone(),
                actual: self.feature.clone(),
            });
        }
        if self.groups.is_empty() {
            return Err(RolloutError::NoGroups(self.name.clone()));
        }
        let mut names = HashSet::new();
        for group in &self.groups {
            if !names.insert(group.name.as_str()) {
                return Err(RolloutError::DuplicateGroup(group.name.clone()));
            }
            if feature.variation(&group.variation).is_none() {
                return Err(RolloutError::UnknownVariation(group.variation.clone()));
            }
        }

        let mut previous: Option<DateTime<Utc>> = None;
        for split in &self.scheduled_splits {
            if let Some(previous) = previous
                && split.start_time <= previous
            {
                return Err(RolloutError::UnorderedSplits(split.start_time));
            }
            previous = Some(split.start_time);

            let mut seen = HashSet::new();
            for weight in &split.group_weights {
                if !names.contains(weight.group.as_str()) {
                    return Err(RolloutError::UnknownGroup(weight.group.clone()));
                }
                if !seen.insert(weight.group.as_str()) {
                    return Err(RolloutError::DuplicateGroup(weight.group.clone()));
                }
            }
            let total = split.total();
            if total != u64::from(TOTAL_WEIGHT) {
                return Err(RolloutError::InvalidWeights {
                    start: split.start_time,
                    total,
                    expected: TOTAL_WEIGHT,
                });
            }

            if let Some(provisioned_at) = provisioned_at
                && split.start_time <= provisioned_at
            {
                tracing::warn!(
                    launch = %self.name,
                    start_time = %split.start_time,
                    provisioned_at = %provisioned_at,
                    "scheduled split starts before provisioning completed and will never activate"
                );
            }
        }
        Ok(())
    }

    /// Latest split with `provisioned_at < start_time <= now`.
    pub fn active_split(
        &self,
        provisioned_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<&ScheduledSplit> {
        self.scheduled_splits
            .iter()
            .rev()
            .find(|split| split.start_time > provisioned_at && split.start_time <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Variation, VariationValue};
    use chrono::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + secs, 0).expect("timestamp")
    }

    fn feature() -> Feature {
        Feature::new(
            "TestFeature",
            vec![
                Variation::new("FeatureEnabled", VariationValue::Bool(true)),
                Variation::new("FeatureDisabled", VariationValue::Bool(false)),
            ],
        )
    }

    fn split(start: DateTime<Utc>, enabled: u32, disabled: u32) -> ScheduledSplit {
        ScheduledSplit::new(
            start,
            vec![
                GroupWeight::new("FeatureEnabled", enabled),
                GroupWeight::new("FeatureDisabled", disabled),
            ],
        )
    }

    fn launch(splits: Vec<ScheduledSplit>) -> Launch {
        Launch {
            name: "TestLaunch".to_string(),
            feature: "TestFeature".to_string(),
            groups: vec![
                LaunchGroup::new("FeatureEnabled", "FeatureEnabled"),
                LaunchGroup::new("FeatureDisabled", "FeatureDisabled"),
            ],
            scheduled_splits: splits,
        }
    }

    #[test]
    fn weights_must_sum_to_total() {
        launch(vec![split(at(180), 50_000, 50_000)])
            .validate(&feature(), Some(at(0)))
            .expect("valid");

        let err = launch(vec![split(at(180), 50_000, 49_999)])
            .validate(&feature(), None)
            .expect_err("short");
        assert_eq!(
            err,
            RolloutError::InvalidWeights {
                start: at(180),
                total: 99_999,
                expected: TOTAL_WEIGHT
            }
        );

        assert!(launch(vec![split(at(180), 100_000, 1)])
            .validate(&feature(), None)
            .is_err());
    }

    #[test]
    fn splits_must_be_strictly_increasing() {
        let err = launch(vec![
            split(at(180), 0, 100_000),
            split(at(180), 100_000, 0),
        ])
        .validate(&feature(), None)
        .expect_err("unordered");
        assert_eq!(err, RolloutError::UnorderedSplits(at(180)));
    }

    #[test]
    fn groups_must_map_to_known_variations() {
        let mut bad = launch(vec![]);
        bad.groups.push(LaunchGroup::new("Extra", "Missing"));
        assert!(matches!(
            bad.validate(&feature(), None),
            Err(RolloutError::UnknownVariation(_))
        ));

        let bad = launch(vec![ScheduledSplit::new(
            at(10),
            vec![GroupWeight::new("Nope", 100_000)],
        )]);
        assert!(matches!(
            bad.validate(&feature(), None),
            Err(RolloutError::UnknownGroup(_))
        ));

        let mut other = launch(vec![]);
        other.feature = "Other".to_string();
        assert!(matches!(
            other.validate(&feature(), None),
            Err(RolloutError::FeatureMismatch { .. })
        ));
    }

    #[test]
    fn early_split_validates_but_never_activates() {
        let provisioned = at(0);
        let early = launch(vec![split(provisioned - Duration::seconds(5), 100_000, 0)]);
        early
            .validate(&feature(), Some(provisioned))
            .expect("accepted");
        assert!(early.active_split(provisioned, at(3600)).is_none());

        let on_the_boundary = launch(vec![split(provisioned, 100_000, 0)]);
        assert!(on_the_boundary.active_split(provisioned, at(3600)).is_none());
    }

    #[test]
    fn latest_started_split_is_active() {
        let launch = launch(vec![
            split(at(-60), 100_000, 0),
            split(at(180), 10_000, 90_000),
            split(at(600), 50_000, 50_000),
        ]);
        let provisioned = at(0);
        assert!(launch.active_split(provisioned, at(179)).is_none());
        assert_eq!(
            launch.active_split(provisioned, at(180)).map(|s| s.start_time),
            Some(at(180))
        );
        assert_eq!(
            launch.active_split(provisioned, at(599)).map(|s| s.weight_of("FeatureEnabled")),
            Some(10_000)
        );
        assert_eq!(
            launch.active_split(provisioned, at(10_000)).map(|s| s.start_time),
            Some(at(600))
        );
    }
}
