//! Inline policy documents attached to federated roles.
//!
//! # Purpose
//! Models allow/deny statements over actions and resource patterns, evaluates
//! requests against them, and checks that a document stays within a
//! least-privilege scope.
//!
//! # How it fits
//! The provisioner builds one document per role and validates its scope before
//! apply; the feature evaluation handler calls [`PolicyDocument::allows`] for
//! every resource a request touches.
//!
//! # Key invariants
//! - An explicit deny always wins over an allow.
//! - A document with no matching allow denies by default.
//! - [`PolicyDocument::ensure_scoped_to`] accepts only exact resources drawn
//!   from the permitted set and only the permitted action.
//!
//! # Examples
//! ```rust
//! use guestflag_authz::{Action, PolicyDocument, PolicyStatement, ResourceName};
//!
//! let project = ResourceName::parse("grn:flags:local-1:000000000000:project/P").unwrap();
//! let doc = PolicyDocument::new(vec![PolicyStatement::allow(
//!     vec![Action::EvaluateFeature],
//!     vec![project.to_string()],
//! )]);
//! assert!(doc.ensure_scoped_to(Action::EvaluateFeature, &[project]).is_ok());
//! ```
use crate::{Action, AuthzError, AuthzResult, ResourceName, ResourcePattern};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const POLICY_VERSION: &str = "2024-06-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub effect: Effect,
    #[serde(rename = "Action")]
    pub actions: Vec<Action>,
    #[serde(rename = "Resource")]
    pub resources: Vec<ResourcePattern>,
}

impl PolicyStatement {
    pub fn allow(actions: Vec<Action>, resources: Vec<String>) -> Self {
        Self {
            effect: Effect::Allow,
            actions,
            resources: resources.into_iter().map(ResourcePattern::new).collect(),
        }
    }

    pub fn deny(actions: Vec<Action>, resources: Vec<String>) -> Self {
        Self {
            effect: Effect::Deny,
            actions,
            resources: resources.into_iter().map(ResourcePattern::new).collect(),
        }
    }

    fn covers(&self, action: Action, resource: &str) -> bool {
        self.actions.contains(&action)
            && self
                .resources
                .iter()
                .any(|pattern| pattern.matches(resource))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    #[serde(rename = "Statement")]
    pub statements: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn new(statements: Vec<PolicyStatement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statements,
        }
    }

    /// Evaluate a single `(action, resource)` request.
    pub fn allows(&self, action: Action, resource: &str) -> bool {
        let denied = self
            .statements
            .iter()
            .filter(|statement| statement.effect == Effect::Deny)
            .any(|statement| statement.covers(action, resource));
        if denied {
            return false;
        }
        self.statements
            .iter()
            .filter(|statement| statement.effect == Effect::Allow)
            .any(|statement| statement.covers(action, resource))
    }

    /// Every resource pattern granted for `action` by an allow statement.
    pub fn granted_resources(&self, action: Action) -> Vec<&ResourcePattern> {
        self.statements
            .iter()
            .filter(|statement| statement.effect == Effect::Allow && statement.actions.contains(&action))
            .flat_map(|statement| statement.resources.iter())
            .collect()
    }

    /// Check the document grants exactly `action` on exactly `permitted`.
    ///
    /// # Errors
    /// - [`AuthzError::InvalidPolicy`] for empty documents, extra actions, or
    ///   permitted resources left uncovered.
    /// - [`AuthzError::BroadResource`] for wildcard or foreign resources.
    pub fn ensure_scoped_to(&self, action: Action, permitted: &[ResourceName]) -> AuthzResult<()> {
        if self.statements.is_empty() {
            return Err(AuthzError::InvalidPolicy("policy has no statements".to_string()));
        }
        let permitted: BTreeSet<String> = permitted.iter().map(ToString::to_string).collect();
        let mut covered = BTreeSet::new();

        for statement in &self.statements {
            if statement.effect == Effect::Deny {
                continue;
            }
            if let Some(extra) = statement.actions.iter().find(|granted| **granted != action) {
                return Err(AuthzError::InvalidPolicy(format!(
                    "statement grants unexpected action {extra}"
                )));
            }
            if statement.resources.is_empty() {
                return Err(AuthzError::InvalidPolicy(
                    "allow statement has no resources".to_string(),
                ));
            }
            for resource in &statement.resources {
                if !resource.is_exact() || !permitted.contains(resource.as_str()) {
                    return Err(AuthzError::BroadResource(resource.to_string()));
                }
                covered.insert(resource.as_str().to_string());
            }
        }

        if let Some(missing) = permitted.difference(&covered).next() {
            return Err(AuthzError::InvalidPolicy(format!(
                "policy does not grant {action} on {missing}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT: &str = "grn:flags:local-1:000000000000:project/TestProject";
    const FEATURE: &str = "grn:flags:local-1:000000000000:project/TestProject/feature/TestFeature";

    fn permitted() -> Vec<ResourceName> {
        vec![
            ResourceName::parse(PROJECT).expect("project"),
            ResourceName::parse(FEATURE).expect("feature"),
        ]
    }

    fn least_privilege() -> PolicyDocument {
        PolicyDocument::new(vec![PolicyStatement::allow(
            vec![Action::EvaluateFeature],
            vec![PROJECT.to_string(), FEATURE.to_string()],
        )])
    }

    #[test]
    fn allows_exact_resources_only() {
        let doc = least_privilege();
        assert!(doc.allows(Action::EvaluateFeature, PROJECT));
        assert!(doc.allows(Action::EvaluateFeature, FEATURE));
        assert!(!doc.allows(
            Action::EvaluateFeature,
            "grn:flags:local-1:000000000000:project/TestProject/feature/Other"
        ));
        assert!(!doc.allows(Action::AssumeRoleWithWebIdentity, PROJECT));
    }

    #[test]
    fn deny_overrides_allow() {
        let mut doc = least_privilege();
        doc.statements.push(PolicyStatement::deny(
            vec![Action::EvaluateFeature],
            vec!["grn:flags:*".to_string()],
        ));
        assert!(!doc.allows(Action::EvaluateFeature, FEATURE));
    }

    #[test]
    fn least_privilege_document_is_in_scope() {
        least_privilege()
            .ensure_scoped_to(Action::EvaluateFeature, &permitted())
            .expect("in scope");
    }

    #[test]
    fn wildcard_resource_is_rejected() {
        let doc = PolicyDocument::new(vec![PolicyStatement::allow(
            vec![Action::EvaluateFeature],
            vec![
                "grn:flags:local-1:000000000000:project/TestProject*".to_string(),
                FEATURE.to_string(),
            ],
        )]);
        let err = doc
            .ensure_scoped_to(Action::EvaluateFeature, &permitted())
            .expect_err("broad");
        assert!(matches!(err, AuthzError::BroadResource(_)));
    }

    #[test]
    fn foreign_resource_is_rejected() {
        let doc = PolicyDocument::new(vec![PolicyStatement::allow(
            vec![Action::EvaluateFeature],
            vec![
                PROJECT.to_string(),
                FEATURE.to_string(),
                "grn:flags:local-1:000000000000:project/Other".to_string(),
            ],
        )]);
        assert!(matches!(
            doc.ensure_scoped_to(Action::EvaluateFeature, &permitted()),
            Err(AuthzError::BroadResource(_))
        ));
    }

    #[test]
    fn missing_resource_and_extra_action_are_rejected() {
        let partial = PolicyDocument::new(vec![PolicyStatement::allow(
            vec![Action::EvaluateFeature],
            vec![PROJECT.to_string()],
        )]);
        assert!(matches!(
            partial.ensure_scoped_to(Action::EvaluateFeature, &permitted()),
            Err(AuthzError::InvalidPolicy(_))
        ));

        let extra = PolicyDocument::new(vec![PolicyStatement::allow(
            vec![Action::EvaluateFeature, Action::AssumeRoleWithWebIdentity],
            vec![PROJECT.to_string(), FEATURE.to_string()],
        )]);
        assert!(matches!(
            extra.ensure_scoped_to(Action::EvaluateFeature, &permitted()),
            Err(AuthzError::InvalidPolicy(_))
        ));

        let empty = PolicyDocument::new(vec![]);
        assert!(empty.ensure_scoped_to(Action::EvaluateFeature, &permitted()).is_err());
    }

    #[test]
    fn granted_resources_lists_allow_patterns() {
        let doc = least_privilege();
        let granted = doc.granted_resources(Action::EvaluateFeature);
        assert_eq!(granted.len(), 2);
        assert!(doc.granted_resources(Action::AssumeRoleWithWebIdentity).is_empty());
    }

    #[test]
    fn document_serializes_in_statement_form() {
        let json = serde_json::to_value(least_privilege()).expect("serialize");
        assert_eq!(json["Version"], POLICY_VERSION);
        assert_eq!(json["Statement"][0]["Effect"], "Allow");
        assert_eq!(json["Statement"][0]["Action"][0], "flags:EvaluateFeature");
        assert_eq!(json["Statement"][0]["Resource"][1], FEATURE);
    }
}
