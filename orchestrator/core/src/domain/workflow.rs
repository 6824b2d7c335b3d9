// Copyright (c) 2026 Drydock Systems
// SPDX-License-Identifier: AGPL-3.0
//! Workflow Runtime Model
//!
//! A `Workflow` pairs a frozen [`WorkflowSpec`] with per-task runtime
//! state and an attribute store. The attribute store carries the keys
//! exchanged with external callers: `id`, `deploymentId`, `subworkflows`
//! (task id -> current reset sub-workflow id) and `subworkflows-history`
//! (task id -> superseded sub-workflow ids).
//!
//! Task execution itself happens in an external engine; this model only
//! records the state that engine persists and the exception-handler
//! chain consumes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::TaskFailure;
use crate::domain::task::{TaskId, TaskTag, WorkflowSpec};

pub const ATTR_ID: &str = "id";
pub const ATTR_DEPLOYMENT_ID: &str = "deploymentId";
pub const ATTR_SUBWORKFLOWS: &str = "subworkflows";
pub const ATTR_SUBWORKFLOWS_HISTORY: &str = "subworkflows-history";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub Uuid);

impl WorkflowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execution state of one task, as persisted by the external engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    #[default]
    Future,
    Waiting,
    Ready,
    Completed,
    Failed,
}

/// The `task_state` document exchanged with the persistence driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedTaskState {
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

/// Mutable runtime data for one task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRuntime {
    pub state_info: Option<String>,
    pub traceback: Option<String>,
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<TaskFailure>,
    /// Remaining automatic resets; only ever decreases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_retry_count: Option<u32>,
    /// Explicit reset-task-tree invocations seen so far.
    #[serde(default)]
    pub task_retry_count: u32,
    state: TaskState,
}

impl TaskRuntime {
    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn persisted(&self) -> PersistedTaskState {
        PersistedTaskState {
            state: self.state,
            info: self.state_info.clone(),
            traceback: self.traceback.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub spec: WorkflowSpec,
    pub attributes: serde_json::Map<String, serde_json::Value>,
    tasks: Vec<TaskRuntime>,
}

impl Workflow {
    pub fn new(spec: WorkflowSpec, deployment_id: &str) -> Self {
        let id = WorkflowId::new();
        let tasks = (0..spec.len()).map(|_| TaskRuntime::default()).collect();
        let mut attributes = serde_json::Map::new();
        attributes.insert(ATTR_ID.into(), serde_json::json!(id.to_string()));
        attributes.insert(ATTR_DEPLOYMENT_ID.into(), serde_json::json!(deployment_id));
        Self {
            id,
            spec,
            attributes,
            tasks,
        }
    }

    pub fn deployment_id(&self) -> Option<&str> {
        self.attributes.get(ATTR_DEPLOYMENT_ID)?.as_str()
    }

    pub fn task_runtime(&self, id: TaskId) -> &TaskRuntime {
        &self.tasks[id.0]
    }

    pub fn task_runtime_mut(&mut self, id: TaskId) -> &mut TaskRuntime {
        &mut self.tasks[id.0]
    }

    pub fn set_task_state(&mut self, id: TaskId, state: TaskState) {
        self.tasks[id.0].state = state;
    }

    /// Mark a task failed with its structured failure descriptor.
    pub fn fail_task(&mut self, id: TaskId, failure: TaskFailure) {
        let runtime = &mut self.tasks[id.0];
        runtime.state = TaskState::Failed;
        runtime.state_info = Some(failure.message.clone());
        runtime.failure = Some(failure);
    }

    pub fn is_complete(&self) -> bool {
        self.tasks.iter().all(|t| t.state == TaskState::Completed)
    }

    pub fn failed_tasks(&self) -> impl Iterator<Item = (TaskId, &TaskRuntime)> {
        self.tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.state == TaskState::Failed)
            .map(|(i, t)| (TaskId(i), t))
    }

    /// Current reset sub-workflow linked to a task, if any.
    pub fn subworkflow_for(&self, task: TaskId) -> Option<WorkflowId> {
        let raw = self
            .attributes
            .get(ATTR_SUBWORKFLOWS)?
            .get(task.to_string())?
            .as_str()?;
        raw.parse::<Uuid>().ok().map(WorkflowId)
    }

    /// Link a new reset sub-workflow to a task, moving any prior link into
    /// the history list.
    pub fn link_subworkflow(&mut self, task: TaskId, workflow: WorkflowId) {
        let key = task.to_string();
        if let Some(prior) = self.subworkflow_for(task) {
            let history = self
                .attributes
                .entry(ATTR_SUBWORKFLOWS_HISTORY)
                .or_insert_with(|| serde_json::json!({}));
            if let Some(map) = history.as_object_mut() {
                let list = map.entry(key.clone()).or_insert_with(|| serde_json::json!([]));
                if let Some(items) = list.as_array_mut() {
                    items.push(serde_json::json!(prior.to_string()));
                }
            }
        }
        let links = self
            .attributes
            .entry(ATTR_SUBWORKFLOWS)
            .or_insert_with(|| serde_json::json!({}));
        if let Some(map) = links.as_object_mut() {
            map.insert(key, serde_json::json!(workflow.to_string()));
        }
    }

    /// Superseded sub-workflow ids for a task, oldest first.
    pub fn subworkflow_history(&self, task: TaskId) -> Vec<WorkflowId> {
        self.attributes
            .get(ATTR_SUBWORKFLOWS_HISTORY)
            .and_then(|h| h.get(task.to_string()))
            .and_then(|l| l.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .filter_map(|s| s.parse::<Uuid>().ok())
                    .map(WorkflowId)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ancestors of a task up to, but excluding, the nearest ancestor
    /// tagged `root` along each input chain.
    pub fn ancestors_below_root(&self, task: TaskId) -> Vec<TaskId> {
        let mut seen = vec![false; self.spec.len()];
        let mut stack = vec![task];
        let mut out = Vec::new();
        seen[task.0] = true;
        while let Some(current) = stack.pop() {
            for input in &self.spec.task(current).inputs {
                if seen[input.0] || self.spec.task(*input).has_tag(TaskTag::Root) {
                    continue;
                }
                seen[input.0] = true;
                out.push(*input);
                stack.push(*input);
            }
        }
        out
    }

    /// Reset a task subtree: clear cached completion and result data on
    /// the task and its ancestors up to (excluding) the nearest
    /// root-tagged ancestor, marking them eligible for re-execution.
    pub fn reset_task_tree(&mut self, task: TaskId) {
        let mut targets = self.ancestors_below_root(task);
        targets.push(task);
        for id in targets {
            let runtime = &mut self.tasks[id.0];
            runtime.state = TaskState::Future;
            runtime.state_info = None;
            runtime.traceback = None;
            runtime.result = None;
            runtime.failure = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::TaskKind;

    fn chain_workflow() -> (Workflow, Vec<TaskId>) {
        // Start -> a -> b -> c, with d hanging off Start separately.
        let mut spec = WorkflowSpec::new("test");
        let a = spec.add_task("a");
        let b = spec.add_task("b");
        let c = spec.add_task("c");
        let d = spec.add_task("d");
        let start = spec.start();
        spec.connect(start, a);
        spec.connect(a, b);
        spec.connect(b, c);
        spec.connect(start, d);
        (Workflow::new(spec, "dep-1"), vec![a, b, c, d])
    }

    #[test]
    fn new_workflow_records_id_and_deployment_attributes() {
        let (workflow, _) = chain_workflow();
        assert_eq!(workflow.deployment_id(), Some("dep-1"));
        assert_eq!(
            workflow.attributes[ATTR_ID].as_str().unwrap(),
            workflow.id.to_string()
        );
    }

    #[test]
    fn link_supersedes_and_keeps_history() {
        let (mut workflow, ids) = chain_workflow();
        let first = WorkflowId::new();
        let second = WorkflowId::new();
        workflow.link_subworkflow(ids[0], first);
        workflow.link_subworkflow(ids[0], second);
        assert_eq!(workflow.subworkflow_for(ids[0]), Some(second));
        assert_eq!(workflow.subworkflow_history(ids[0]), vec![first]);
    }

    #[test]
    fn reset_task_tree_stops_below_root_and_spares_siblings() {
        let (mut workflow, ids) = chain_workflow();
        let [a, b, c, d] = [ids[0], ids[1], ids[2], ids[3]];
        for id in [a, b, c, d] {
            workflow.set_task_state(id, TaskState::Completed);
            workflow.task_runtime_mut(id).result = Some(serde_json::json!("done"));
        }
        workflow.reset_task_tree(c);

        for id in [a, b, c] {
            assert_eq!(workflow.task_runtime(id).state(), TaskState::Future);
            assert!(workflow.task_runtime(id).result.is_none());
        }
        // The sibling branch and the root sentinel are untouched.
        assert_eq!(workflow.task_runtime(d).state(), TaskState::Completed);
        assert!(workflow.task_runtime(d).result.is_some());
    }

    #[test]
    fn reset_clears_join_ancestors_too() {
        let mut spec = WorkflowSpec::new("test");
        let a = spec.add_task("a");
        let b = spec.add_task("b");
        let c = spec.add_task("c");
        let start = spec.start();
        spec.connect(start, a);
        spec.connect(start, b);
        spec.wait_for(c, &[a, b]);
        let join = spec
            .tasks()
            .find(|t| t.kind == TaskKind::Join)
            .map(|t| t.id)
            .unwrap();

        let mut workflow = Workflow::new(spec, "dep-1");
        for id in [a, b, c, join] {
            workflow.set_task_state(id, TaskState::Completed);
        }
        workflow.reset_task_tree(c);
        for id in [a, b, c, join] {
            assert_eq!(workflow.task_runtime(id).state(), TaskState::Future);
        }
    }
}
