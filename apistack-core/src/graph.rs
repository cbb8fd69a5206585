//! Resource dependency graph
//!
//! Edges come from `Ref`/`Fn::GetAtt`/`Fn::Sub` inside resource properties and
//! from explicit `DependsOn`. The orchestrator creates resources in
//! [`DependencyGraph::deploy_order`] and deletes them in
//! [`DependencyGraph::destroy_order`].

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

use crate::error::{ErrorCode, StackError};
use crate::intrinsic::referenced_ids;
use crate::template::Template;

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Resource ids in declaration order
    nodes: Vec<String>,
    /// id -> ids it depends on
    dependencies: BTreeMap<String, BTreeSet<String>>,
    /// Topological order, dependencies first
    order: Vec<String>,
}

impl DependencyGraph {
    pub fn from_template(template: &Template) -> Result<Self, StackError> {
        let nodes: Vec<String> = template.resources.keys().cloned().collect();
        let known: BTreeSet<&str> = nodes.iter().map(String::as_str).collect();

        let mut dependencies = BTreeMap::new();
        for (id, value) in &template.resources {
            let mut deps = referenced_ids(value.get("Properties").unwrap_or(&serde_json::Value::Null));
            if let Some(explicit) = value.get("DependsOn").and_then(|v| v.as_array()) {
                deps.extend(explicit.iter().filter_map(|d| d.as_str().map(str::to_string)));
            }

            if let Some(missing) = deps.iter().find(|d| !known.contains(d.as_str())) {
                return Err(StackError::new(
                    ErrorCode::DanglingReference,
                    format!("{id} references unknown resource {missing}"),
                )
                .with_resource(id.as_str()));
            }
            if deps.contains(id) {
                return Err(StackError::new(
                    ErrorCode::DependencyCycle,
                    format!("{id} references itself"),
                )
                .with_resource(id.as_str()));
            }
            dependencies.insert(id.clone(), deps);
        }

        for (name, output) in &template.outputs {
            if let Some(missing) = referenced_ids(output)
                .into_iter()
                .find(|d| !known.contains(d.as_str()))
            {
                return Err(StackError::new(
                    ErrorCode::DanglingReference,
                    format!("Output {name} references unknown resource {missing}"),
                ));
            }
        }

        let order = topological_order(&nodes, &dependencies)?;
        debug!(resources = nodes.len(), "Built dependency graph");

        Ok(Self {
            nodes,
            dependencies,
            order,
        })
    }

    /// Creation order: every resource after everything it depends on
    pub fn deploy_order(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Deletion order: every resource before everything it depends on
    pub fn destroy_order(&self) -> Vec<String> {
        self.order.iter().rev().cloned().collect()
    }

    /// Direct dependencies of a resource
    pub fn dependencies_of(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.dependencies.get(id)
    }

    /// Resources that directly depend on `id`
    pub fn dependents_of(&self, id: &str) -> BTreeSet<String> {
        self.dependencies
            .iter()
            .filter(|(_, deps)| deps.contains(id))
            .map(|(dependent, _)| dependent.clone())
            .collect()
    }

    /// True when `id` transitively depends on `target`
    pub fn depends_on(&self, id: &str, target: &str) -> bool {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            let Some(deps) = self.dependencies.get(current) else {
                continue;
            };
            for dep in deps {
                if dep == target {
                    return true;
                }
                if seen.insert(dep.as_str()) {
                    queue.push_back(dep.as_str());
                }
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Kahn's algorithm; ties are broken by declaration order so output is stable
fn topological_order(
    nodes: &[String],
    dependencies: &BTreeMap<String, BTreeSet<String>>,
) -> Result<Vec<String>, StackError> {
    let mut remaining: BTreeMap<&str, usize> = nodes
        .iter()
        .map(|n| (n.as_str(), dependencies.get(n).map_or(0, BTreeSet::len)))
        .collect();
    let mut order = Vec::with_capacity(nodes.len());

    while order.len() < nodes.len() {
        let Some(next) = nodes
            .iter()
            .find(|n| remaining.get(n.as_str()) == Some(&0))
        else {
            let stuck: Vec<&str> = remaining.keys().copied().collect();
            return Err(StackError::new(
                ErrorCode::DependencyCycle,
                format!("Dependency cycle between: {}", stuck.join(", ")),
            ));
        };

        remaining.remove(next.as_str());
        for (dependent, deps) in dependencies {
            if deps.contains(next) {
                if let Some(count) = remaining.get_mut(dependent.as_str()) {
                    *count -= 1;
                }
            }
        }
        order.push(next.clone());
    }

    Ok(order)
}
