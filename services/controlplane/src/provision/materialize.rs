//! Turns an ordered template into concrete resources.
//!
//! Resources are created in apply order, so every reference points at
//! something already materialized. Each resource exposes `Ref` (its primary
//! identifier) and, where it has one, `Arn`; user pools also expose
//! `ProviderName`.
use super::ProvisionError;
use super::template::{ResourceProperties, ResourceSpec, StackTemplate, ValueRef};
use crate::model::{
    FeatureRecord, FederatedRole, IdentityPool, IdentityProviderRef, Project, StackOutputs,
    StackResources, UserPool, UserPoolClient,
};
use chrono::{DateTime, Utc};
use guestflag_authz::resource::{feature_resource, project_resource, role_resource};
use guestflag_authz::{
    AccountId, FeatureName, FederatedTrust, IdentityPoolId, PolicyDocument, PolicyStatement,
    ProjectName, Region, ResourceName, RoleName, TrustCondition,
};
use guestflag_rollout::{Feature, Launch, LaunchGroup};
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::collections::{BTreeMap, HashMap};

const USER_POOL_SUFFIX_LEN: usize = 9;
const CLIENT_ID_LEN: usize = 26;

#[derive(Debug)]
pub(super) struct Materialized {
    pub resources: StackResources,
    pub outputs: StackOutputs,
}

/// What a logical id materialized into, by index into [`StackResources`].
#[derive(Debug, Clone, Copy)]
enum Node {
    UserPool(usize),
    UserPoolClient(usize),
    IdentityPool(usize),
    Role(usize),
    Attachment,
    Project(usize),
    Feature(usize),
    Launch,
}

struct Materializer<'a> {
    stack_name: &'a str,
    region: &'a Region,
    account_id: &'a AccountId,
    now: DateTime<Utc>,
    resources: StackResources,
    nodes: HashMap<String, Node>,
    attributes: HashMap<String, BTreeMap<&'static str, String>>,
}

pub(super) fn materialize(
    template: &StackTemplate,
    order: &[usize],
    stack_name: &str,
    region: &Region,
    account_id: &AccountId,
    now: DateTime<Utc>,
) -> Result<Materialized, ProvisionError> {
    let mut materializer = Materializer {
        stack_name,
        region,
        account_id,
        now,
        resources: StackResources::default(),
        nodes: HashMap::new(),
        attributes: HashMap::new(),
    };
    for position in order {
        let spec = &template.resources[*position];
        materializer.create(spec)?;
        tracing::debug!(
            stack = %stack_name,
            logical_id = %spec.logical_id,
            kind = spec.properties.kind(),
            "resource materialized"
        );
    }

    let mut outputs = StackOutputs::new();
    for output in &template.outputs {
        let value = materializer.resolve(&format!("output {}", output.name), &output.value)?;
        outputs.insert(output.name.clone(), value);
    }
    Ok(Materialized {
        resources: materializer.resources,
        outputs,
    })
}

impl Materializer<'_> {
    fn create(&mut self, spec: &ResourceSpec) -> Result<(), ProvisionError> {
        let id = spec.logical_id.as_str();
        let mut attributes = BTreeMap::new();
        let node = match &spec.properties {
            ResourceProperties::UserPool {} => {
                let pool_id = format!("{}_{}", self.region, random_token(USER_POOL_SUFFIX_LEN));
                let pool = UserPool {
                    provider_name: format!("identity.{}.guestflag/{pool_id}", self.region),
                    id: pool_id.clone(),
                };
                attributes.insert("ProviderName", pool.provider_name.clone());
                attributes.insert(
                    "Arn",
                    ResourceName::new(
                        "identity",
                        self.region.as_str(),
                        self.account_id.as_str(),
                        format!("userpool/{pool_id}"),
                    )
                    .to_string(),
                );
                attributes.insert("Ref", pool_id);
                self.resources.user_pools.push(pool);
                Node::UserPool(self.resources.user_pools.len() - 1)
            }
            ResourceProperties::UserPoolClient { user_pool } => {
                let user_pool_id = match self.node_of(user_pool) {
                    Some(Node::UserPool(index)) => self.resources.user_pools[index].id.clone(),
                    _ => return Err(invalid(id, "user_pool must reference a UserPool")),
                };
                let client = UserPoolClient {
                    id: random_token(CLIENT_ID_LEN).to_ascii_lowercase(),
                    user_pool_id,
                };
                attributes.insert("Ref", client.id.clone());
                self.resources.user_pool_clients.push(client);
                Node::UserPoolClient(self.resources.user_pool_clients.len() - 1)
            }
            ResourceProperties::IdentityPool {
                allow_unauthenticated,
                providers,
            } => {
                let mut resolved = Vec::with_capacity(providers.len());
                for provider in providers {
                    resolved.push(IdentityProviderRef {
                        provider_name: self.resolve(id, &provider.provider_name)?,
                        client_id: self.client_id(id, &provider.client_id)?,
                    });
                }
                let pool = IdentityPool {
                    id: IdentityPoolId::generate(self.region),
                    region: self.region.clone(),
                    allow_unauthenticated: *allow_unauthenticated,
                    providers: resolved,
                    roles: Default::default(),
                };
                attributes.insert("Ref", pool.id.to_string());
                self.resources.identity_pools.push(pool);
                Node::IdentityPool(self.resources.identity_pools.len() - 1)
            }
            ResourceProperties::Role {
                variant,
                audience,
                policy,
            } => {
                let audience = IdentityPoolId::new(self.resolve(id, audience)?);
                let mut statements = Vec::with_capacity(policy.len());
                for statement in policy {
                    let mut resources = Vec::with_capacity(statement.resources.len());
                    for resource in &statement.resources {
                        resources.push(self.resolve(id, resource)?);
                    }
                    let mut resolved = PolicyStatement::allow(statement.actions.clone(), resources);
                    resolved.effect = statement.effect;
                    statements.push(resolved);
                }
                let name = RoleName::new(format!("{}-{id}", self.stack_name));
                let role = FederatedRole {
                    arn: role_resource(self.account_id, &name),
                    name,
                    variant: *variant,
                    trust: FederatedTrust::web_identity(TrustCondition::new(audience, *variant)),
                    policy: PolicyDocument::new(statements),
                };
                attributes.insert("Ref", role.name.to_string());
                attributes.insert("Arn", role.arn.to_string());
                self.resources.roles.push(role);
                Node::Role(self.resources.roles.len() - 1)
            }
            ResourceProperties::RoleAttachment {
                identity_pool,
                authenticated,
                unauthenticated,
            } => {
                let pool_index = match self.node_of(identity_pool) {
                    Some(Node::IdentityPool(index)) => index,
                    _ => return Err(invalid(id, "identity_pool must reference an IdentityPool")),
                };
                let authenticated = authenticated
                    .as_ref()
                    .map(|value| self.role_arn(id, value))
                    .transpose()?;
                let unauthenticated = unauthenticated
                    .as_ref()
                    .map(|value| self.role_arn(id, value))
                    .transpose()?;
                let pool = &mut self.resources.identity_pools[pool_index];
                if pool.roles.authenticated.is_some() || pool.roles.unauthenticated.is_some() {
                    return Err(invalid(id, "identity pool already has a role attachment"));
                }
                pool.roles.authenticated = authenticated;
                pool.roles.unauthenticated = unauthenticated;
                attributes.insert("Ref", pool.id.to_string());
                Node::Attachment
            }
            ResourceProperties::Project { name } => {
                let name = ProjectName::new(name.as_str());
                let project = Project {
                    arn: project_resource(self.region, self.account_id, &name),
                    name,
                };
                attributes.insert("Ref", project.name.to_string());
                attributes.insert("Arn", project.arn.to_string());
                self.resources.projects.push(project);
                Node::Project(self.resources.projects.len() - 1)
            }
            ResourceProperties::Feature {
                project,
                name,
                variations,
                default_variation,
            } => {
                let project = self.project_name(id, project)?;
                let mut feature = Feature::new(name.as_str(), variations.clone());
                feature.default_variation = default_variation.clone();
                let record = FeatureRecord {
                    arn: feature_resource(
                        self.region,
                        self.account_id,
                        &project,
                        &FeatureName::new(name.as_str()),
                    ),
                    project,
                    feature,
                    launch: None,
                    provisioned_at: self.now,
                };
                attributes.insert("Ref", name.clone());
                attributes.insert("Arn", record.arn.to_string());
                self.resources.features.push(record);
                Node::Feature(self.resources.features.len() - 1)
            }
            ResourceProperties::Launch {
                project,
                name,
                groups,
                scheduled_splits,
            } => {
                let project = self.project_name(id, project)?;
                let mut target: Option<usize> = None;
                let mut launch_groups = Vec::with_capacity(groups.len());
                for group in groups {
                    let index = match self.node_of(&group.feature) {
                        Some(Node::Feature(index)) => index,
                        _ => {
                            return Err(invalid(
                                id,
                                &format!("group {} must reference a Feature", group.group_name),
                            ));
                        }
                    };
                    if target.is_some_and(|existing| existing != index) {
                        return Err(invalid(id, "all launch groups must target the same feature"));
                    }
                    target = Some(index);
                    launch_groups.push(LaunchGroup::new(
                        group.group_name.as_str(),
                        group.variation.as_str(),
                    ));
                }
                let Some(index) = target else {
                    return Err(invalid(id, "launch has no groups"));
                };
                let arn = ResourceName::new(
                    "flags",
                    self.region.as_str(),
                    self.account_id.as_str(),
                    format!("project/{project}/launch/{name}"),
                );
                let record = &mut self.resources.features[index];
                if record.project != project {
                    return Err(invalid(id, "launch project differs from the feature's project"));
                }
                if record.launch.is_some() {
                    return Err(invalid(id, "feature already has a launch"));
                }
                record.launch = Some(Launch {
                    name: name.clone(),
                    feature: record.feature.name.clone(),
                    groups: launch_groups,
                    scheduled_splits: scheduled_splits.clone(),
                });
                attributes.insert("Ref", name.clone());
                attributes.insert("Arn", arn.to_string());
                Node::Launch
            }
        };
        self.nodes.insert(id.to_string(), node);
        self.attributes.insert(id.to_string(), attributes);
        Ok(())
    }

    fn resolve(&self, from: &str, value: &ValueRef) -> Result<String, ProvisionError> {
        let (target, attribute) = match value {
            ValueRef::Literal(literal) => return Ok(literal.clone()),
            ValueRef::Ref { logical_id } => (logical_id.as_str(), "Ref"),
            ValueRef::Attr { target } => (target[0].as_str(), target[1].as_str()),
        };
        let Some(attributes) = self.attributes.get(target) else {
            return Err(ProvisionError::DanglingReference {
                from: from.to_string(),
                to: target.to_string(),
            });
        };
        attributes.get(attribute).cloned().ok_or_else(|| {
            invalid(from, &format!("{target} has no attribute {attribute}"))
        })
    }

    fn node_of(&self, value: &ValueRef) -> Option<Node> {
        value
            .dependency()
            .and_then(|target| self.nodes.get(target))
            .copied()
    }

    fn role_arn(&self, from: &str, value: &ValueRef) -> Result<ResourceName, ProvisionError> {
        match self.node_of(value) {
            Some(Node::Role(index)) => Ok(self.resources.roles[index].arn.clone()),
            Some(_) => Err(invalid(from, "role mapping must reference a Role")),
            None => ResourceName::parse(&self.resolve(from, value)?)
                .map_err(|err| invalid(from, &err.to_string())),
        }
    }

    fn client_id(&self, from: &str, value: &ValueRef) -> Result<String, ProvisionError> {
        match self.node_of(value) {
            Some(Node::UserPoolClient(index)) => {
                Ok(self.resources.user_pool_clients[index].id.clone())
            }
            Some(_) => Err(invalid(from, "client_id must reference a UserPoolClient")),
            None => self.resolve(from, value),
        }
    }

    fn project_name(&self, from: &str, value: &ValueRef) -> Result<ProjectName, ProvisionError> {
        let name = match self.node_of(value) {
            Some(Node::Project(index)) => self.resources.projects[index].name.clone(),
            Some(_) => return Err(invalid(from, "project must reference a Project")),
            None => ProjectName::new(self.resolve(from, value)?),
        };
        if self.resources.projects.iter().any(|project| project.name == name) {
            Ok(name)
        } else {
            Err(invalid(from, &format!("project {name} is not part of the stack")))
        }
    }
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn invalid(logical_id: &str, reason: &str) -> ProvisionError {
    ProvisionError::InvalidResource {
        logical_id: logical_id.to_string(),
        reason: reason.to_string(),
    }
}
