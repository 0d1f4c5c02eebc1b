//! The boolean on/off feature shape used by the visitor flag.
use crate::{
    Feature, GroupWeight, Launch, LaunchGroup, ScheduledSplit, TOTAL_WEIGHT, Variation,
    VariationValue,
};
use chrono::{DateTime, Utc};

pub const ENABLED_VARIATION: &str = "FeatureEnabled";
pub const DISABLED_VARIATION: &str = "FeatureDisabled";

/// Two boolean variations. No default is declared, so the enabled variation
/// (listed first) is served until a split starts.
pub fn standard_feature(name: impl Into<String>) -> Feature {
    Feature::new(
        name,
        vec![
            Variation::new(ENABLED_VARIATION, VariationValue::Bool(true)),
            Variation::new(DISABLED_VARIATION, VariationValue::Bool(false)),
        ],
    )
}

/// Launch whose groups map 1:1 onto the standard variations.
pub fn standard_launch(
    name: impl Into<String>,
    feature: impl Into<String>,
    scheduled_splits: Vec<ScheduledSplit>,
) -> Launch {
    Launch {
        name: name.into(),
        feature: feature.into(),
        groups: vec![
            LaunchGroup::new(ENABLED_VARIATION, ENABLED_VARIATION),
            LaunchGroup::new(DISABLED_VARIATION, DISABLED_VARIATION),
        ],
        scheduled_splits,
    }
}

/// Split sending `enabled_weight` units to the enabled group and the rest to
/// the disabled group. Weights above the total saturate to all-enabled.
pub fn boolean_split(start_time: DateTime<Utc>, enabled_weight: u32) -> ScheduledSplit {
    let enabled = enabled_weight.min(TOTAL_WEIGHT);
    ScheduledSplit::new(
        start_time,
        vec![
            GroupWeight::new(ENABLED_VARIATION, enabled),
            GroupWeight::new(DISABLED_VARIATION, TOTAL_WEIGHT - enabled),
        ],
    )
}
