// Copyright (c) 2026 Drydock Systems
// SPDX-License-Identifier: AGPL-3.0
//! In-Memory Drivers
//!
//! Development and test implementations of the persistence and catalog
//! contracts. Production deployments plug database-backed drivers in
//! through the same traits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::component::{Component, ComponentCriteria};
use crate::domain::environment::ComponentCatalog;
use crate::domain::repository::{StoreError, WorkflowStore};
use crate::domain::task::TaskId;
use crate::domain::workflow::{PersistedTaskState, Workflow, WorkflowId};

/// Catalog over a fixed component list, preserving insertion order.
#[derive(Clone, Default)]
pub struct StaticCatalog {
    components: Vec<Component>,
}

impl StaticCatalog {
    pub fn new(components: Vec<Component>) -> Self {
        Self { components }
    }
}

impl ComponentCatalog for StaticCatalog {
    fn find_components(&self, criteria: &ComponentCriteria) -> Vec<Component> {
        self.components
            .iter()
            .filter(|c| c.matches(criteria))
            .cloned()
            .collect()
    }
}

/// In-memory workflow store.
#[derive(Clone, Default)]
pub struct InMemoryWorkflowStore {
    workflows: Arc<Mutex<HashMap<WorkflowId, Workflow>>>,
    task_states: Arc<Mutex<HashMap<(WorkflowId, TaskId), PersistedTaskState>>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn save_workflow(&self, workflow: &Workflow) -> Result<(), StoreError> {
        let mut workflows = self
            .workflows
            .lock()
            .map_err(|_| StoreError::Storage("mutex poisoned".into()))?;
        workflows.insert(workflow.id, workflow.clone());
        Ok(())
    }

    async fn load_workflow(&self, id: WorkflowId) -> Result<Option<Workflow>, StoreError> {
        let workflows = self
            .workflows
            .lock()
            .map_err(|_| StoreError::Storage("mutex poisoned".into()))?;
        Ok(workflows.get(&id).cloned())
    }

    async fn save_task_state(
        &self,
        workflow: WorkflowId,
        task: TaskId,
        state: &PersistedTaskState,
    ) -> Result<(), StoreError> {
        let mut task_states = self
            .task_states
            .lock()
            .map_err(|_| StoreError::Storage("mutex poisoned".into()))?;
        task_states.insert((workflow, task), state.clone());
        Ok(())
    }

    async fn load_task_state(
        &self,
        workflow: WorkflowId,
        task: TaskId,
    ) -> Result<Option<PersistedTaskState>, StoreError> {
        let task_states = self
            .task_states
            .lock()
            .map_err(|_| StoreError::Storage("mutex poisoned".into()))?;
        Ok(task_states.get(&(workflow, task)).cloned())
    }
}
