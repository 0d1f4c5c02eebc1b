use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "flags:EvaluateFeature")]
    EvaluateFeature,
    #[serde(rename = "sts:AssumeRoleWithWebIdentity")]
    AssumeRoleWithWebIdentity,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::EvaluateFeature => "flags:EvaluateFeature",
            Action::AssumeRoleWithWebIdentity => "sts:AssumeRoleWithWebIdentity",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = crate::AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "flags:EvaluateFeature" => Ok(Action::EvaluateFeature),
            "sts:AssumeRoleWithWebIdentity" => Ok(Action::AssumeRoleWithWebIdentity),
            _ => Err(crate::AuthzError::InvalidAction(value.to_string())),
        }
    }
}
