// Copyright (c) 2026 Drydock Systems
// SPDX-License-Identifier: AGPL-3.0
//! Exception Handler Chain
//!
//! Bounded automatic remediation of failed tasks. Given a failed task and
//! its owning workflow, an ordered list of handlers is consulted; the
//! first whose `can_handle` predicate accepts the failure performs the
//! remediation, usually by compiling a reset sub-workflow for the failed
//! resource and linking it to the task.
//!
//! # Invariants
//!
//! - At most one active reset sub-workflow per task: before creating a
//!   new one, an already-linked incomplete sub-workflow short-circuits
//!   the handler to a no-op.
//! - Retry counters only decrease (or, for the explicit reset signal,
//!   only count up toward a fixed ceiling); on exhaustion the stored
//!   message is rewritten to say so and no sub-workflow is created.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use crate::application::spec_builder::WorkflowSpecBuilder;
use crate::domain::errors::{FailureKind, TaskFailure};
use crate::domain::events::DeploymentEvent;
use crate::domain::repository::WorkflowStore;
use crate::domain::resolution::Resolution;
use crate::domain::task::TaskId;
use crate::domain::workflow::{Workflow, WorkflowId};
use crate::infrastructure::event_bus::EventBus;

/// Ceiling for explicit reset-task-tree requests per task.
pub const MAX_TASK_RETRIES: u32 = 3;

const EXHAUSTED_MESSAGE: &str =
    "maximum retries reached; automatic resets are exhausted and the task will not be retried";

/// Everything a handler needs to remediate one failed task.
pub struct HandlerContext<'a> {
    pub workflow: &'a mut Workflow,
    pub task: TaskId,
    pub resolution: &'a Resolution,
    pub builder: &'a WorkflowSpecBuilder,
    pub store: Arc<dyn WorkflowStore>,
    pub deployment_id: String,
}

#[async_trait]
pub trait ExceptionHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Static predicate deciding whether this handler applies.
    fn can_handle(&self, failure: &TaskFailure) -> bool;

    /// Perform remediation, returning the new sub-workflow id if one was
    /// created.
    async fn handle(&self, ctx: &mut HandlerContext<'_>)
        -> anyhow::Result<Option<WorkflowId>>;
}

/// Remediates transient failures flagged resettable, bounded by the
/// task's remaining `auto_retry_count`.
pub struct AutomaticResetAndRetryHandler;

#[async_trait]
impl ExceptionHandler for AutomaticResetAndRetryHandler {
    fn name(&self) -> &'static str {
        "automatic-reset-and-retry"
    }

    fn can_handle(&self, failure: &TaskFailure) -> bool {
        failure.is_resettable()
    }

    async fn handle(
        &self,
        ctx: &mut HandlerContext<'_>,
    ) -> anyhow::Result<Option<WorkflowId>> {
        let remaining = ctx
            .workflow
            .task_runtime(ctx.task)
            .auto_retry_count
            .unwrap_or(0);
        if remaining == 0 {
            exhaust(ctx).await?;
            return Ok(None);
        }

        if has_outstanding_reset(ctx).await? {
            info!(task = %ctx.task, "reset sub-workflow still running; skipping");
            return Ok(None);
        }

        let Some(subworkflow) = build_and_link_reset(ctx).await? else {
            return Ok(None);
        };
        let runtime = ctx.workflow.task_runtime_mut(ctx.task);
        runtime.auto_retry_count = Some(remaining - 1);
        ctx.store.save_workflow(ctx.workflow).await?;
        Ok(Some(subworkflow))
    }
}

/// Handles the explicit reset-task-tree signal, bounded by a fixed
/// per-task ceiling.
pub struct ResetTaskTreeExceptionHandler;

#[async_trait]
impl ExceptionHandler for ResetTaskTreeExceptionHandler {
    fn name(&self) -> &'static str {
        "reset-task-tree"
    }

    fn can_handle(&self, failure: &TaskFailure) -> bool {
        failure.kind == FailureKind::ResetTaskTree
    }

    async fn handle(
        &self,
        ctx: &mut HandlerContext<'_>,
    ) -> anyhow::Result<Option<WorkflowId>> {
        let retries = ctx.workflow.task_runtime(ctx.task).task_retry_count;
        if retries >= MAX_TASK_RETRIES {
            warn!(
                task = %ctx.task,
                retries,
                "task tree reset ceiling reached; giving up"
            );
            return Ok(None);
        }

        if has_outstanding_reset(ctx).await? {
            info!(task = %ctx.task, "reset sub-workflow still running; skipping");
            return Ok(None);
        }

        let Some(subworkflow) = build_and_link_reset(ctx).await? else {
            return Ok(None);
        };
        ctx.workflow.task_runtime_mut(ctx.task).task_retry_count = retries + 1;
        ctx.store.save_workflow(ctx.workflow).await?;
        Ok(Some(subworkflow))
    }
}

/// Rewrite the stored exception to a terminal exhausted-retries message.
async fn exhaust(ctx: &mut HandlerContext<'_>) -> anyhow::Result<()> {
    let runtime = ctx.workflow.task_runtime_mut(ctx.task);
    runtime.state_info = Some(EXHAUSTED_MESSAGE.to_string());
    if let Some(failure) = &mut runtime.failure {
        failure.message = EXHAUSTED_MESSAGE.to_string();
        failure.friendly_message = Some(EXHAUSTED_MESSAGE.to_string());
    }
    let persisted = ctx.workflow.task_runtime(ctx.task).persisted();
    ctx.store
        .save_task_state(ctx.workflow.id, ctx.task, &persisted)
        .await?;
    ctx.store.save_workflow(ctx.workflow).await?;
    warn!(task = %ctx.task, "automatic retries exhausted");
    Ok(())
}

/// Whether an already-linked reset sub-workflow for this task is still
/// outstanding. Guards the at-most-one-active-reset-per-task invariant.
async fn has_outstanding_reset(ctx: &HandlerContext<'_>) -> anyhow::Result<bool> {
    let Some(linked) = ctx.workflow.subworkflow_for(ctx.task) else {
        return Ok(false);
    };
    match ctx.store.load_workflow(linked).await? {
        Some(sub) => Ok(!sub.is_complete()),
        None => Ok(false),
    }
}

/// Compile the delete-and-recreate sub-workflow for the failed task's
/// resource, link it (superseding any prior link), and reset the task's
/// subtree in the parent for re-execution.
async fn build_and_link_reset(
    ctx: &mut HandlerContext<'_>,
) -> anyhow::Result<Option<WorkflowId>> {
    let Some(resource) = ctx.workflow.spec.task(ctx.task).defines.resource.clone() else {
        warn!(task = %ctx.task, "failed task defines no resource; cannot reset");
        return Ok(None);
    };

    let sub_spec =
        ctx.builder
            .create_reset_failed_resource_spec(ctx.resolution, &resource, &ctx.deployment_id)?;
    let sub_workflow = Workflow::new(sub_spec, &ctx.deployment_id);
    let sub_id = sub_workflow.id;
    ctx.store.save_workflow(&sub_workflow).await?;

    ctx.workflow.link_subworkflow(ctx.task, sub_id);
    ctx.workflow.reset_task_tree(ctx.task);
    info!(
        task = %ctx.task,
        resource = %resource,
        subworkflow = %sub_id,
        "linked reset sub-workflow"
    );
    Ok(Some(sub_id))
}

fn is_exhausted(ctx: &HandlerContext<'_>) -> bool {
    ctx.workflow
        .task_runtime(ctx.task)
        .state_info
        .as_deref()
        == Some(EXHAUSTED_MESSAGE)
}

/// Fixed, ordered handler list. The first applicable handler wins;
/// unclassified failures fall through untouched and surface through
/// status aggregation.
pub struct ExceptionHandlerChain {
    handlers: Vec<Box<dyn ExceptionHandler>>,
    events: Option<EventBus>,
}

impl Default for ExceptionHandlerChain {
    fn default() -> Self {
        Self {
            handlers: vec![
                Box::new(AutomaticResetAndRetryHandler),
                Box::new(ResetTaskTreeExceptionHandler),
            ],
            events: None,
        }
    }
}

impl ExceptionHandlerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Remediate one failed task, returning the new sub-workflow id if a
    /// reset was started.
    pub async fn handle(
        &self,
        ctx: &mut HandlerContext<'_>,
    ) -> anyhow::Result<Option<WorkflowId>> {
        let Some(failure) = ctx.workflow.task_runtime(ctx.task).failure.clone() else {
            return Ok(None);
        };
        for handler in &self.handlers {
            if !handler.can_handle(&failure) {
                continue;
            }
            info!(task = %ctx.task, handler = handler.name(), "handling failed task");
            let outcome = handler.handle(ctx).await?;
            if let Some(events) = &self.events {
                match outcome {
                    Some(subworkflow) => events.publish(DeploymentEvent::SubWorkflowLinked {
                        deployment_id: ctx.deployment_id.clone(),
                        parent: ctx.workflow.id,
                        task: ctx.task,
                        subworkflow,
                        linked_at: Utc::now(),
                    }),
                    None if is_exhausted(ctx) => {
                        events.publish(DeploymentEvent::RetriesExhausted {
                            deployment_id: ctx.deployment_id.clone(),
                            parent: ctx.workflow.id,
                            task: ctx.task,
                            exhausted_at: Utc::now(),
                        })
                    }
                    None => {}
                }
            }
            return Ok(outcome);
        }
        Ok(None)
    }
}
