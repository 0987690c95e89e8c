// src/pipeline/compile.rs

//! Lowering a [`Pipeline`] tree to a task dependency graph.
//!
//! Every node is wired against the *exits* of what precedes it:
//!
//! - a leaf depends on the incoming exits and is its own exit;
//! - in a series, each child receives the previous child's exits;
//! - in a parallel group, every child receives the same incoming exits and
//!   the group's exits are the union of the children's.
//!
//! A failed task therefore blocks everything after it in its series, while
//! parallel siblings are unaffected.

use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::engine::TaskName;
use crate::errors::{Result, SitepipeError};
use crate::pipeline::Pipeline;
use crate::tasks::{self, TaskDef};

/// A validated pipeline together with its dependency graph.
#[derive(Debug, Clone)]
pub struct CompiledPipeline {
    name: String,
    pipeline: Pipeline,
    /// Leaf tasks in a valid execution order.
    order: Vec<TaskName>,
    deps: HashMap<TaskName, Vec<TaskName>>,
    defs: HashMap<TaskName, &'static TaskDef>,
    /// Transforms outside the composition that only run when a watch
    /// binding fires.
    watch_only: Vec<TaskName>,
}

impl CompiledPipeline {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Tasks in topological order.
    pub fn order(&self) -> &[TaskName] {
        &self.order
    }

    pub fn dependencies_of(&self, task: &str) -> &[TaskName] {
        self.deps.get(task).map(|d| d.as_slice()).unwrap_or(&[])
    }

    pub fn def(&self, task: &str) -> Option<&'static TaskDef> {
        self.defs.get(task).copied()
    }

    /// Tasks without dependencies; triggering these starts the pipeline.
    pub fn roots(&self) -> Vec<TaskName> {
        self.order
            .iter()
            .filter(|t| self.dependencies_of(t).is_empty() && !self.watch_only.contains(t))
            .cloned()
            .collect()
    }

    pub fn watch_only(&self) -> &[TaskName] {
        &self.watch_only
    }

    /// Make the transforms named by watch bindings schedulable.
    ///
    /// When the pipeline runs the watcher, every bound task missing from the
    /// composition is added as a node without dependencies. It is never a
    /// root, so it only runs when its binding fires. Pipelines without the
    /// watcher are returned unchanged.
    pub fn with_watch_targets<'t>(
        mut self,
        targets: impl IntoIterator<Item = &'t str>,
    ) -> Result<Self> {
        if !self.defs.contains_key(tasks::WATCH_TASK) {
            return Ok(self);
        }

        for task in targets {
            if self.defs.contains_key(task) {
                continue;
            }
            let def = tasks::lookup(task).ok_or_else(|| {
                SitepipeError::TaskNotFound(format!("'{task}' (named by a watch binding)"))
            })?;
            self.defs.insert(task.to_string(), def);
            self.deps.insert(task.to_string(), Vec::new());
            self.order.push(task.to_string());
            self.watch_only.push(task.to_string());
        }
        Ok(self)
    }
}

/// Validate `pipeline` and build its dependency graph.
pub fn compile(name: &str, pipeline: &Pipeline) -> Result<CompiledPipeline> {
    let mut defs = HashMap::new();
    for leaf in pipeline.leaves() {
        let def = tasks::lookup(leaf).ok_or_else(|| {
            SitepipeError::TaskNotFound(format!("'{leaf}' (used in pipeline '{name}')"))
        })?;
        if defs.insert(leaf.to_string(), def).is_some() {
            return Err(SitepipeError::PipelineError(format!(
                "task '{leaf}' appears more than once in pipeline '{name}'"
            )));
        }
    }

    let mut deps: HashMap<TaskName, Vec<TaskName>> = HashMap::new();
    wire(name, pipeline, &[], &mut deps)?;

    let order = topological_order(name, pipeline, &deps)?;

    Ok(CompiledPipeline {
        name: name.to_string(),
        pipeline: pipeline.clone(),
        order,
        deps,
        defs,
        watch_only: Vec::new(),
    })
}

/// Record dependencies for `node` given the exits feeding into it and return
/// the node's own exits.
fn wire(
    name: &str,
    node: &Pipeline,
    incoming: &[TaskName],
    deps: &mut HashMap<TaskName, Vec<TaskName>>,
) -> Result<Vec<TaskName>> {
    match node {
        Pipeline::Task(task) => {
            deps.insert(task.clone(), incoming.to_vec());
            Ok(vec![task.clone()])
        }
        Pipeline::Series(children) => {
            if children.is_empty() {
                return Err(empty_group(name, "series"));
            }
            let mut current = incoming.to_vec();
            for child in children {
                current = wire(name, child, &current, deps)?;
            }
            Ok(current)
        }
        Pipeline::Parallel(children) => {
            if children.is_empty() {
                return Err(empty_group(name, "parallel"));
            }
            let mut exits = Vec::new();
            for child in children {
                exits.extend(wire(name, child, incoming, deps)?);
            }
            Ok(exits)
        }
    }
}

fn empty_group(name: &str, kind: &str) -> SitepipeError {
    SitepipeError::PipelineError(format!("pipeline '{name}' contains an empty {kind} group"))
}

fn topological_order(
    name: &str,
    pipeline: &Pipeline,
    deps: &HashMap<TaskName, Vec<TaskName>>,
) -> Result<Vec<TaskName>> {
    let mut graph: DiGraph<TaskName, ()> = DiGraph::new();
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();

    for leaf in pipeline.leaves() {
        index.insert(leaf, graph.add_node(leaf.to_string()));
    }

    let mut seen = HashSet::new();
    for leaf in pipeline.leaves() {
        for dep in deps.get(leaf).into_iter().flatten() {
            if seen.insert((dep.clone(), leaf)) {
                graph.add_edge(index[dep.as_str()], index[leaf], ());
            }
        }
    }

    let sorted = toposort(&graph, None).map_err(|cycle| {
        SitepipeError::PipelineError(format!(
            "pipeline '{name}' has a dependency cycle through '{}'",
            graph[cycle.node_id()]
        ))
    })?;

    Ok(sorted.into_iter().map(|idx| graph[idx].clone()).collect())
}
