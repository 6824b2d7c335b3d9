// Copyright (c) 2026 Drydock Systems
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::resource::ResourceIndex;
use crate::domain::task::TaskId;
use crate::domain::workflow::WorkflowId;

/// Deployment lifecycle events published on the event bus.
///
/// These mark the milestones of the plan -> compile -> remediate pipeline
/// and exist for observers (CLI streaming, audit trails); nothing in the
/// core branches on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeploymentEvent {
    PlanCompleted {
        deployment_id: String,
        resource_count: usize,
        connection_count: usize,
        completed_at: DateTime<Utc>,
    },
    SpecBuilt {
        deployment_id: String,
        workflow_name: String,
        task_count: usize,
        built_at: DateTime<Utc>,
    },
    SubWorkflowLinked {
        deployment_id: String,
        parent: WorkflowId,
        task: TaskId,
        subworkflow: WorkflowId,
        linked_at: DateTime<Utc>,
    },
    RetriesExhausted {
        deployment_id: String,
        parent: WorkflowId,
        task: TaskId,
        exhausted_at: DateTime<Utc>,
    },
    ResourceReset {
        deployment_id: String,
        resource: ResourceIndex,
        reset_at: DateTime<Utc>,
    },
}
