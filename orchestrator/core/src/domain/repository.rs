// Copyright (c) 2026 Drydock Systems
// SPDX-License-Identifier: AGPL-3.0
//! # Workflow Persistence Contract
//!
//! Persistence is a capability this core calls through, never a store it
//! owns: the interface is defined here in the domain layer and
//! implemented in `crate::infrastructure` (in-memory) or by external
//! drivers (database-backed, out of scope).
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `WorkflowStore` | `Workflow` | `InMemoryWorkflowStore` |

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::task::TaskId;
use crate::domain::workflow::{PersistedTaskState, Workflow, WorkflowId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("workflow {0} not found")]
    NotFound(WorkflowId),

    #[error("storage failure: {0}")]
    Storage(String),
}

/// Repository for workflow documents and their per-task state.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Save a workflow (create or update).
    async fn save_workflow(&self, workflow: &Workflow) -> Result<(), StoreError>;

    /// Load a workflow by id.
    async fn load_workflow(&self, id: WorkflowId) -> Result<Option<Workflow>, StoreError>;

    /// Persist the `task_state` document for one task.
    async fn save_task_state(
        &self,
        workflow: WorkflowId,
        task: TaskId,
        state: &PersistedTaskState,
    ) -> Result<(), StoreError>;

    /// Load the `task_state` document for one task.
    async fn load_task_state(
        &self,
        workflow: WorkflowId,
        task: TaskId,
    ) -> Result<Option<PersistedTaskState>, StoreError>;
}
