// Copyright (c) 2026 Drydock Systems
// SPDX-License-Identifier: AGPL-3.0
//! Task Graph Domain Model
//!
//! This module defines the compiled workflow description: typed task
//! nodes, their edges, and the `WorkflowSpec` graph with its Start
//! sentinel and lookup queries.
//!
//! # Invariants
//!
//! 1. Every spec has exactly one Start sentinel, created at construction
//! 2. Edges are deduplicated; `inputs`/`outputs` mirror each other
//! 3. A Join node blocks until all its predecessors complete
//! 4. Every produced graph reaches at least one task from Start

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::resource::ResourceIndex;

/// Index of a task within its owning spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub usize);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// A provider-generated unit of work.
    Operation,
    /// Fan-in synchronization point; waits for all predecessors.
    Join,
    /// Placeholder with no work, used to keep graphs non-empty.
    Noop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskTag {
    Root,
    Final,
    Create,
    Delete,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskProperties {
    /// Seconds; advisory only, consumed by progress estimation.
    pub estimated_duration: u64,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub task_tags: BTreeSet<TaskTag>,
}

/// What a task operates on; drives `find_task_specs` filtering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskDefines {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceIndex>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub id: TaskId,
    pub name: String,
    pub kind: TaskKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub call_args: Vec<serde_json::Value>,
    #[serde(default)]
    pub properties: TaskProperties,
    #[serde(default)]
    pub defines: TaskDefines,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<TaskId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<TaskId>,
}

impl TaskSpec {
    pub fn has_tag(&self, tag: TaskTag) -> bool {
        self.properties.task_tags.contains(&tag)
    }
}

/// Query filters for [`WorkflowSpec::find_task_specs`]. All supplied
/// filters must match.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub resource: Option<ResourceIndex>,
    pub provider: Option<String>,
    pub relation: Option<String>,
    pub tag: Option<TaskTag>,
}

/// A named task graph. Built once, then frozen; runtime state lives on
/// `domain::workflow::Workflow`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub name: String,
    tasks: Vec<TaskSpec>,
    start: TaskId,
}

impl WorkflowSpec {
    /// Create a spec with its Start sentinel.
    pub fn new(name: impl Into<String>) -> Self {
        let mut spec = Self {
            name: name.into(),
            tasks: Vec::new(),
            start: TaskId(0),
        };
        let start = spec.add_task_with("Start", TaskKind::Operation);
        spec.task_mut(start).properties.task_tags.insert(TaskTag::Root);
        spec.start = start;
        spec
    }

    pub fn start(&self) -> TaskId {
        self.start
    }

    pub fn add_task(&mut self, name: impl Into<String>) -> TaskId {
        self.add_task_with(name, TaskKind::Operation)
    }

    pub fn add_task_with(&mut self, name: impl Into<String>, kind: TaskKind) -> TaskId {
        let id = TaskId(self.tasks.len());
        self.tasks.push(TaskSpec {
            id,
            name: name.into(),
            kind,
            call_args: Vec::new(),
            properties: TaskProperties::default(),
            defines: TaskDefines::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        });
        id
    }

    pub fn task(&self, id: TaskId) -> &TaskSpec {
        &self.tasks[id.0]
    }

    pub fn task_mut(&mut self, id: TaskId) -> &mut TaskSpec {
        &mut self.tasks[id.0]
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskSpec> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Add an edge, deduplicating repeats.
    pub fn connect(&mut self, from: TaskId, to: TaskId) {
        if from == to {
            return;
        }
        if !self.tasks[from.0].outputs.contains(&to) {
            self.tasks[from.0].outputs.push(to);
        }
        if !self.tasks[to.0].inputs.contains(&from) {
            self.tasks[to.0].inputs.push(from);
        }
    }

    fn disconnect(&mut self, from: TaskId, to: TaskId) {
        self.tasks[from.0].outputs.retain(|t| *t != to);
        self.tasks[to.0].inputs.retain(|t| *t != from);
    }

    /// Fan-in primitive: make `task` wait on every entry in `wait_list`.
    ///
    /// - Empty wait list: `task` is returned unchanged.
    /// - `task` is already a Join: the predecessors become extra inputs.
    /// - `task` has existing inputs: they migrate into the combined wait
    ///   list, reusing a pre-existing Join input rather than duplicating.
    /// - One combined predecessor wires a direct edge; more than one
    ///   creates (or reuses) a Join feeding `task`.
    pub fn wait_for(&mut self, task: TaskId, wait_list: &[TaskId]) -> TaskId {
        if wait_list.is_empty() {
            return task;
        }
        if self.task(task).kind == TaskKind::Join {
            for pred in wait_list {
                self.connect(*pred, task);
            }
            return task;
        }

        let existing = self.task(task).inputs.clone();
        if let Some(join) = existing
            .iter()
            .copied()
            .find(|t| self.task(*t).kind == TaskKind::Join)
        {
            // Reuse the existing Join: everything funnels through it.
            for pred in existing.iter().copied().filter(|t| *t != join) {
                self.disconnect(pred, task);
                self.connect(pred, join);
            }
            for pred in wait_list.iter().copied().filter(|t| *t != join) {
                self.connect(pred, join);
            }
            return task;
        }

        let mut combined = existing.clone();
        for pred in wait_list {
            if !combined.contains(pred) {
                combined.push(*pred);
            }
        }
        if combined.len() == 1 {
            self.connect(combined[0], task);
            return task;
        }

        let join = self.add_task_with(
            format!("Join before {}", self.task(task).name),
            TaskKind::Join,
        );
        for pred in existing {
            self.disconnect(pred, task);
        }
        for pred in combined {
            self.connect(pred, join);
        }
        self.connect(join, task);
        task
    }

    /// Tasks matching all supplied filters.
    ///
    /// A task whose `defines` carries a relation is excluded from any
    /// filter set that omits `relation`; relation-scoped tasks must not
    /// leak into unscoped queries.
    pub fn find_task_specs(&self, filter: &TaskFilter) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|t| {
                if t.defines.relation.is_some() && filter.relation.is_none() {
                    return false;
                }
                if let Some(resource) = &filter.resource {
                    if t.defines.resource.as_ref() != Some(resource) {
                        return false;
                    }
                }
                if let Some(provider) = &filter.provider {
                    if t.defines.provider.as_deref() != Some(provider.as_str()) {
                        return false;
                    }
                }
                if let Some(relation) = &filter.relation {
                    if t.defines.relation.as_deref() != Some(relation.as_str()) {
                        return false;
                    }
                }
                if let Some(tag) = filter.tag {
                    if !t.has_tag(tag) {
                        return false;
                    }
                }
                true
            })
            .map(|t| t.id)
            .collect()
    }

    pub fn has_edges_from_start(&self) -> bool {
        !self.task(self.start).outputs.is_empty()
    }
}
