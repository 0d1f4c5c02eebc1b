//! Declarative stack templates.
//!
//! A template lists resources by logical id. Properties can reference other
//! resources with `{"Ref": "LogicalId"}` (primary identifier) or
//! `{"GetAtt": ["LogicalId", "Attribute"]}`; those references are the edges of
//! the resource graph.
use guestflag_authz::{Action, AuthenticationClass, Effect};
use guestflag_rollout::{ScheduledSplit, Variation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackTemplate {
    pub resources: Vec<ResourceSpec>,
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub logical_id: String,
    pub properties: ResourceProperties,
}

impl ResourceSpec {
    pub fn new(logical_id: impl Into<String>, properties: ResourceProperties) -> Self {
        Self {
            logical_id: logical_id.into(),
            properties,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub name: String,
    pub value: ValueRef,
}

/// A property value: a literal or a reference to another resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueRef {
    Ref {
        #[serde(rename = "Ref")]
        logical_id: String,
    },
    Attr {
        #[serde(rename = "GetAtt")]
        target: [String; 2],
    },
    Literal(String),
}

impl ValueRef {
    pub fn reference(logical_id: impl Into<String>) -> Self {
        ValueRef::Ref {
            logical_id: logical_id.into(),
        }
    }

    pub fn attr(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        ValueRef::Attr {
            target: [logical_id.into(), attribute.into()],
        }
    }

    /// Logical id this value depends on, if any.
    pub fn dependency(&self) -> Option<&str> {
        match self {
            ValueRef::Ref { logical_id } => Some(logical_id),
            ValueRef::Attr { target } => Some(&target[0]),
            ValueRef::Literal(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub provider_name: ValueRef,
    pub client_id: ValueRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementSpec {
    #[serde(default = "default_effect")]
    pub effect: Effect,
    pub actions: Vec<Action>,
    pub resources: Vec<ValueRef>,
}

fn default_effect() -> Effect {
    Effect::Allow
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchGroupSpec {
    pub group_name: String,
    pub feature: ValueRef,
    pub variation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResourceProperties {
    UserPool {},
    UserPoolClient {
        user_pool: ValueRef,
    },
    IdentityPool {
        allow_unauthenticated: bool,
        #[serde(default)]
        providers: Vec<ProviderSpec>,
    },
    Role {
        variant: AuthenticationClass,
        /// Identity pool id the trust condition requires as `aud`.
        audience: ValueRef,
        policy: Vec<StatementSpec>,
    },
    RoleAttachment {
        identity_pool: ValueRef,
        #[serde(default)]
        authenticated: Option<ValueRef>,
        #[serde(default)]
        unauthenticated: Option<ValueRef>,
    },
    Project {
        name: String,
    },
    Feature {
        project: ValueRef,
        name: String,
        variations: Vec<Variation>,
        #[serde(default)]
        default_variation: Option<String>,
    },
    Launch {
        project: ValueRef,
        name: String,
        groups: Vec<LaunchGroupSpec>,
        #[serde(default)]
        scheduled_splits: Vec<ScheduledSplit>,
    },
}

impl ResourceProperties {
    pub fn kind(&self) -> &'static str {
        match self {
            ResourceProperties::UserPool {} => "UserPool",
            ResourceProperties::UserPoolClient { .. } => "UserPoolClient",
            ResourceProperties::IdentityPool { .. } => "IdentityPool",
            ResourceProperties::Role { .. } => "Role",
            ResourceProperties::RoleAttachment { .. } => "RoleAttachment",
            ResourceProperties::Project { .. } => "Project",
            ResourceProperties::Feature { .. } => "Feature",
            ResourceProperties::Launch { .. } => "Launch",
        }
    }

    /// Every reference the properties contain, in property order.
    pub fn references(&self) -> Vec<&ValueRef> {
        match self {
            ResourceProperties::UserPool {} | ResourceProperties::Project { .. } => Vec::new(),
            ResourceProperties::UserPoolClient { user_pool } => vec![user_pool],
            ResourceProperties::IdentityPool { providers, .. } => providers
                .iter()
                .flat_map(|provider| [&provider.provider_name, &provider.client_id])
                .collect(),
            ResourceProperties::Role {
                audience, policy, ..
            } => std::iter::once(audience)
                .chain(policy.iter().flat_map(|statement| statement.resources.iter()))
                .collect(),
            ResourceProperties::RoleAttachment {
                identity_pool,
                authenticated,
                unauthenticated,
            } => std::iter::once(identity_pool)
                .chain(authenticated.iter())
                .chain(unauthenticated.iter())
                .collect(),
            ResourceProperties::Feature { project, .. } => vec![project],
            ResourceProperties::Launch {
                project, groups, ..
            } => std::iter::once(project)
                .chain(groups.iter().map(|group| &group.feature))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_refs_parse_from_template_json() {
        let literal: ValueRef = serde_json::from_str("\"TestProject\"").expect("literal");
        assert_eq!(literal, ValueRef::Literal("TestProject".to_string()));
        let reference: ValueRef = serde_json::from_str(r#"{"Ref":"IdentityPool"}"#).expect("ref");
        assert_eq!(reference.dependency(), Some("IdentityPool"));
        let attr: ValueRef =
            serde_json::from_str(r#"{"GetAtt":["EvidentlyFeature","Arn"]}"#).expect("attr");
        assert_eq!(attr, ValueRef::attr("EvidentlyFeature", "Arn"));
    }

    #[test]
    fn resources_parse_with_type_tag() {
        let spec: ResourceSpec = serde_json::from_value(serde_json::json!({
            "logical_id": "UnauthenticatedRole",
            "properties": {
                "type": "Role",
                "variant": "unauthenticated",
                "audience": { "Ref": "IdentityPool" },
                "policy": [{
                    "actions": ["flags:EvaluateFeature"],
                    "resources": [{ "GetAtt": ["EvidentlyProject", "Arn"] }]
                }]
            }
        }))
        .expect("role spec");
        assert_eq!(spec.properties.kind(), "Role");
        let deps: Vec<_> = spec
            .properties
            .references()
            .into_iter()
            .filter_map(ValueRef::dependency)
            .collect();
        assert_eq!(deps, vec!["IdentityPool", "EvidentlyProject"]);
    }
}
