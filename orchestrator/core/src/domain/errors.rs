// Copyright (c) 2026 Drydock Systems
// SPDX-License-Identifier: AGPL-3.0
//! Error Taxonomy
//!
//! Three families of failure cross this core:
//!
//! - [`ValidationError`] — bad or missing blueprint input. Always fatal,
//!   surfaced immediately, never retried.
//! - [`UserError`] — operational misconfiguration discovered during planning.
//!   Fatal, carries a remediation-oriented message and a structured
//!   [`ReasonCode`].
//! - [`TaskFailure`] — a transient runtime task failure, persisted as a
//!   structured, serializable descriptor (kind + fields, never executable
//!   text) and consumed by the exception-handler chain.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bad or missing blueprint input. Never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no component in the environment matches criteria {0}")]
    UnresolvedComponent(String),

    #[error("relation on service '{service}' targets unknown service '{target}'")]
    UnknownService { service: String, target: String },

    #[error("blueprint schema violation: {0}")]
    SchemaViolation(String),

    #[error("static resource '{0}' failed validation: {1}")]
    InvalidStaticResource(String, String),

    #[error("manifest parse error: {0}")]
    ManifestParse(String),
}

/// Structured reason codes attached to every [`UserError`] so callers can
/// branch without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasonCode {
    UnresolvedRequirement,
    HostConflict,
    DependencyCycle,
    MissingProvision,
    InvalidTransition,
    AlreadyPlanned,
    UnknownResource,
}

/// Operational misconfiguration. Fatal, with a friendly message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct UserError {
    pub code: ReasonCode,
    pub message: String,
}

impl UserError {
    pub fn new(code: ReasonCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Top-level planning error: either family aborts the whole `plan()` call.
#[derive(Debug, Clone, Error)]
pub enum PlanError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    User(#[from] UserError),
}

/// Classifies a persisted task failure for the exception-handler chain.
///
/// This replaces reconstructing exceptions from stored text: the descriptor
/// is plain data and round-trips through the workflow store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// Transient runtime failure; flags drive automatic remediation.
    Transient { resumable: bool, resettable: bool },
    /// Explicit request to reset the failed task's subtree.
    ResetTaskTree,
    /// Unclassified; not auto-handled, surfaces via status aggregation.
    Unclassified,
}

/// Persisted descriptor of one failed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    #[serde(flatten)]
    pub kind: FailureKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_message: Option<String>,
}

impl TaskFailure {
    pub fn transient(message: impl Into<String>, resumable: bool, resettable: bool) -> Self {
        Self {
            kind: FailureKind::Transient {
                resumable,
                resettable,
            },
            message: message.into(),
            friendly_message: None,
        }
    }

    pub fn reset_task_tree(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::ResetTaskTree,
            message: message.into(),
            friendly_message: None,
        }
    }

    pub fn unclassified(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Unclassified,
            message: message.into(),
            friendly_message: None,
        }
    }

    pub fn with_friendly(mut self, friendly: impl Into<String>) -> Self {
        self.friendly_message = Some(friendly.into());
        self
    }

    pub fn is_resettable(&self) -> bool {
        matches!(
            self.kind,
            FailureKind::Transient {
                resettable: true,
                ..
            }
        )
    }

    pub fn is_resumable(&self) -> bool {
        matches!(
            self.kind,
            FailureKind::Transient {
                resumable: true,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_descriptor_round_trips_as_data() {
        let failure = TaskFailure::transient("compute node timed out", true, true)
            .with_friendly("The server did not come online in time");
        let json = serde_json::to_string(&failure).unwrap();
        let back: TaskFailure = serde_json::from_str(&json).unwrap();
        assert_eq!(back, failure);
        assert!(back.is_resettable());
    }

    #[test]
    fn unclassified_failures_are_not_resettable() {
        let failure = TaskFailure::unclassified("unknown");
        assert!(!failure.is_resettable());
        assert!(!failure.is_resumable());
    }
}
