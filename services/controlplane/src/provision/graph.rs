//! Resource dependency graph and apply ordering.
//!
//! # Key invariants
//! - Logical ids are unique within a template.
//! - Every reference (including outputs) names a declared resource.
//! - Apply order is a topological sort; among resources that are ready at the
//!   same time, declaration order wins, so the order is deterministic.
use super::ProvisionError;
use super::template::StackTemplate;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug)]
pub struct ResourceGraph<'a> {
    template: &'a StackTemplate,
    /// `dependencies[i]` are the node indices resource `i` refers to.
    dependencies: Vec<BTreeSet<usize>>,
}

impl<'a> ResourceGraph<'a> {
    pub fn build(template: &'a StackTemplate) -> Result<Self, ProvisionError> {
        let mut index = HashMap::new();
        for (position, resource) in template.resources.iter().enumerate() {
            if resource.logical_id.is_empty() {
                return Err(ProvisionError::InvalidResource {
                    logical_id: String::new(),
                    reason: "logical id must not be empty".to_string(),
                });
            }
            if index.insert(resource.logical_id.as_str(), position).is_some() {
                return Err(ProvisionError::DuplicateLogicalId(
                    resource.logical_id.clone(),
                ));
            }
        }

        let mut dependencies = Vec::with_capacity(template.resources.len());
        for resource in &template.resources {
            let mut deps = BTreeSet::new();
            for target in resource
                .properties
                .references()
                .into_iter()
                .filter_map(|value| value.dependency())
            {
                let Some(position) = index.get(target) else {
                    return Err(ProvisionError::DanglingReference {
                        from: resource.logical_id.clone(),
                        to: target.to_string(),
                    });
                };
                deps.insert(*position);
            }
            dependencies.push(deps);
        }

        for output in &template.outputs {
            if let Some(target) = output.value.dependency()
                && !index.contains_key(target)
            {
                return Err(ProvisionError::DanglingReference {
                    from: format!("output {}", output.name),
                    to: target.to_string(),
                });
            }
        }

        Ok(Self {
            template,
            dependencies,
        })
    }

    /// Kahn's algorithm with a declaration-ordered ready set.
    pub fn apply_order(&self) -> Result<Vec<usize>, ProvisionError> {
        let count = self.dependencies.len();
        let mut remaining: Vec<usize> = self.dependencies.iter().map(BTreeSet::len).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (node, deps) in self.dependencies.iter().enumerate() {
            for dep in deps {
                dependents[*dep].push(node);
            }
        }

        let mut ready: BTreeSet<usize> = (0..count).filter(|node| remaining[*node] == 0).collect();
        let mut order = Vec::with_capacity(count);
        while let Some(node) = ready.pop_first() {
            order.push(node);
            for dependent in &dependents[node] {
                remaining[*dependent] -= 1;
                if remaining[*dependent] == 0 {
                    ready.insert(*dependent);
                }
            }
        }

        if order.len() < count {
            let cycle = (0..count)
                .filter(|node| remaining[*node] > 0)
                .map(|node| self.template.resources[node].logical_id.clone())
                .collect();
            return Err(ProvisionError::Cycle(cycle));
        }
        Ok(order)
    }
}
