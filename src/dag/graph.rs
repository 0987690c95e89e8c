// src/dag/graph.rs

use std::collections::HashMap;

use crate::engine::TaskName;
use crate::pipeline::CompiledPipeline;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    /// Direct dependencies: tasks that must finish before this one can run.
    deps: Vec<TaskName>,
    /// Direct dependents: tasks that depend on this one.
    dependents: Vec<TaskName>,
}

/// Adjacency view of a compiled pipeline keyed by task name.
///
/// Acyclicity and name resolution are checked during compilation, so this
/// only keeps what the scheduler needs to walk the graph.
#[derive(Debug, Clone)]
pub struct DagGraph {
    nodes: HashMap<TaskName, DagNode>,
    /// Topological order, used for stable iteration.
    order: Vec<TaskName>,
}

impl DagGraph {
    pub fn from_pipeline(compiled: &CompiledPipeline) -> Self {
        let mut nodes: HashMap<TaskName, DagNode> = compiled
            .order()
            .iter()
            .map(|name| {
                (
                    name.clone(),
                    DagNode {
                        deps: compiled.dependencies_of(name).to_vec(),
                        dependents: Vec::new(),
                    },
                )
            })
            .collect();

        for name in compiled.order() {
            for dep in compiled.dependencies_of(name) {
                if let Some(dep_node) = nodes.get_mut(dep) {
                    dep_node.dependents.push(name.clone());
                }
            }
        }

        Self {
            nodes,
            order: compiled.order().to_vec(),
        }
    }

    /// All task names in topological order.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }
}
