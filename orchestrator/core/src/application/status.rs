// Copyright (c) 2026 Drydock Systems
// SPDX-License-Identifier: AGPL-3.0
//! Status Aggregation
//!
//! Workflow-runtime errors are recorded on the failing task rather than
//! raised through the graph, so sibling branches keep progressing. This
//! module scans a workflow's failed tasks into a deduplicated,
//! user-presentable summary.

use crate::domain::errors::TaskFailure;
use crate::domain::workflow::Workflow;

const GENERIC_MESSAGE: &str =
    "Multiple errors occurred. Please contact support for assistance.";

/// All distinct failures across a workflow's failed tasks, deduplicated
/// by (message, friendly message) pair in task order.
pub fn aggregate_failures(workflow: &Workflow) -> Vec<TaskFailure> {
    let mut seen: Vec<(String, Option<String>)> = Vec::new();
    let mut failures = Vec::new();
    for (_, runtime) in workflow.failed_tasks() {
        let Some(failure) = &runtime.failure else {
            continue;
        };
        let key = (failure.message.clone(), failure.friendly_message.clone());
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        failures.push(failure.clone());
    }
    failures
}

/// User-facing summary of a set of failures. Falls back to a generic
/// contact-support message when any failure lacks a friendly message.
pub fn friendly_summary(failures: &[TaskFailure]) -> Option<String> {
    if failures.is_empty() {
        return None;
    }
    let friendly: Vec<&str> = failures
        .iter()
        .filter_map(|f| f.friendly_message.as_deref())
        .collect();
    if friendly.len() != failures.len() {
        return Some(GENERIC_MESSAGE.to_string());
    }
    Some(friendly.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::WorkflowSpec;
    use crate::domain::workflow::Workflow;

    fn workflow_with_failures(failures: Vec<TaskFailure>) -> Workflow {
        let mut spec = WorkflowSpec::new("test");
        let ids: Vec<_> = (0..failures.len())
            .map(|i| spec.add_task(format!("t{i}")))
            .collect();
        let mut workflow = Workflow::new(spec, "dep-1");
        for (id, failure) in ids.into_iter().zip(failures) {
            workflow.fail_task(id, failure);
        }
        workflow
    }

    #[test]
    fn identical_failures_deduplicate() {
        let failure = TaskFailure::unclassified("boom").with_friendly("It broke");
        let workflow = workflow_with_failures(vec![failure.clone(), failure.clone()]);
        assert_eq!(aggregate_failures(&workflow).len(), 1);
    }

    #[test]
    fn summary_joins_friendly_messages() {
        let workflow = workflow_with_failures(vec![
            TaskFailure::unclassified("a").with_friendly("First problem"),
            TaskFailure::unclassified("b").with_friendly("Second problem"),
        ]);
        let summary = friendly_summary(&aggregate_failures(&workflow)).unwrap();
        assert_eq!(summary, "First problem\nSecond problem");
    }

    #[test]
    fn missing_friendly_message_falls_back_to_generic() {
        let workflow = workflow_with_failures(vec![
            TaskFailure::unclassified("a").with_friendly("First problem"),
            TaskFailure::unclassified("b"),
        ]);
        let summary = friendly_summary(&aggregate_failures(&workflow)).unwrap();
        assert_eq!(summary, GENERIC_MESSAGE);
    }

    #[test]
    fn no_failures_means_no_summary() {
        let workflow = workflow_with_failures(vec![]);
        assert!(friendly_summary(&aggregate_failures(&workflow)).is_none());
    }
}
