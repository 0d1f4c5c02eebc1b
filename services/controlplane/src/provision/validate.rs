//! Whole-stack validation run before anything is committed.
//!
//! Checks the trust graph (role trust conditions, attachment/variant
//! agreement, provider wiring), least-privilege policy scope, and the
//! feature/launch configuration. Project, feature and launch names are
//! limited to `[A-Za-z0-9._-]{1,127}` because they appear verbatim in
//! resource names and in signed request paths.
use super::ProvisionError;
use crate::model::{FederatedRole, IdentityPool, StackResources};
use guestflag_authz::{Action, AuthenticationClass, ResourceName};
use std::collections::HashSet;

const MAX_FLAG_NAME_LEN: usize = 127;

pub(super) fn validate_resources(resources: &StackResources) -> Result<(), ProvisionError> {
    check_flag_names(resources)?;
    check_local_duplicates(resources)?;

    let permitted: Vec<ResourceName> = resources
        .projects
        .iter()
        .map(|project| project.arn.clone())
        .chain(resources.features.iter().map(|feature| feature.arn.clone()))
        .collect();

    for role in &resources.roles {
        let resource = format!("role {}", role.name);
        role.trust.validate().map_err(|source| ProvisionError::Authz {
            resource: resource.clone(),
            source,
        })?;
        if !resources
            .identity_pools
            .iter()
            .any(|pool| pool.id == role.trust.condition.audience)
        {
            return Err(invalid(
                &resource,
                format!(
                    "trust audience {} is not an identity pool of this stack",
                    role.trust.condition.audience
                ),
            ));
        }
        role.policy
            .ensure_scoped_to(Action::EvaluateFeature, &permitted)
            .map_err(|source| ProvisionError::Authz { resource, source })?;
    }

    for pool in &resources.identity_pools {
        validate_pool(pool, resources)?;
    }

    for record in &resources.features {
        let resource = format!("feature {}/{}", record.project, record.feature.name);
        record
            .feature
            .validate()
            .map_err(|source| ProvisionError::Rollout {
                resource: resource.clone(),
                source,
            })?;
        if let Some(launch) = &record.launch {
            launch
                .validate(&record.feature, Some(record.provisioned_at))
                .map_err(|source| ProvisionError::Rollout {
                    resource: format!("launch {}", launch.name),
                    source,
                })?;
        }
    }
    Ok(())
}

fn validate_pool(pool: &IdentityPool, resources: &StackResources) -> Result<(), ProvisionError> {
    let resource = format!("identity pool {}", pool.id);
    for provider in &pool.providers {
        let Some(user_pool) = resources
            .user_pools
            .iter()
            .find(|user_pool| user_pool.provider_name == provider.provider_name)
        else {
            return Err(invalid(
                &resource,
                format!("provider {} is not a user pool of this stack", provider.provider_name),
            ));
        };
        let client_matches = resources
            .user_pool_clients
            .iter()
            .any(|client| client.id == provider.client_id && client.user_pool_id == user_pool.id);
        if !client_matches {
            return Err(invalid(
                &resource,
                format!("client {} does not belong to {}", provider.client_id, user_pool.id),
            ));
        }
    }

    if pool.allow_unauthenticated && pool.roles.unauthenticated.is_none() {
        return Err(invalid(
            &resource,
            "unauthenticated identities are allowed but no unauthenticated role is attached"
                .to_string(),
        ));
    }

    for class in [
        AuthenticationClass::Authenticated,
        AuthenticationClass::Unauthenticated,
    ] {
        let Some(arn) = pool.roles.for_class(class) else {
            continue;
        };
        let role = find_role(resources, arn).ok_or_else(|| {
            invalid(&resource, format!("{class} mapping {arn} is not a role of this stack"))
        })?;
        if role.variant != class {
            return Err(invalid(
                &resource,
                format!("{class} mapping points at the {} role {}", role.variant, role.name),
            ));
        }
        if role.trust.condition.audience != pool.id {
            return Err(invalid(
                &resource,
                format!("role {} trusts a different identity pool", role.name),
            ));
        }
    }
    Ok(())
}

fn find_role<'a>(resources: &'a StackResources, arn: &ResourceName) -> Option<&'a FederatedRole> {
    resources.roles.iter().find(|role| &role.arn == arn)
}

fn check_flag_names(resources: &StackResources) -> Result<(), ProvisionError> {
    for project in &resources.projects {
        check_flag_name("project", project.name.as_str())?;
    }
    for record in &resources.features {
        check_flag_name("feature", record.feature.name.as_str())?;
        if let Some(launch) = &record.launch {
            check_flag_name("launch", launch.name.as_str())?;
        }
    }
    Ok(())
}

fn check_flag_name(kind: &str, name: &str) -> Result<(), ProvisionError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_FLAG_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(invalid(
            &format!("{kind} {name}"),
            format!("name must match [A-Za-z0-9._-]{{1,{MAX_FLAG_NAME_LEN}}}"),
        ))
    }
}

fn check_local_duplicates(resources: &StackResources) -> Result<(), ProvisionError> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    let names = resources
        .roles
        .iter()
        .map(|role| format!("role {}", role.arn))
        .chain(
            resources
                .projects
                .iter()
                .map(|project| format!("project {}", project.name)),
        )
        .chain(
            resources
                .features
                .iter()
                .map(|feature| format!("feature {}/{}", feature.project, feature.feature.name)),
        );
    for name in names {
        if !seen.insert(name.clone()) {
            duplicates.push(name);
        }
    }
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(ProvisionError::NameCollision(duplicates))
    }
}

fn invalid(resource: &str, reason: String) -> ProvisionError {
    ProvisionError::InvalidResource {
        logical_id: resource.to_string(),
        reason,
    }
}
