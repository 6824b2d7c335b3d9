// Copyright (c) 2026 Drydock Systems
// SPDX-License-Identifier: AGPL-3.0
//! Resource Domain Model
//!
//! A Resource is the concrete, indexed instantiation of a resolved
//! component. Resources live in an arena-style table keyed by sequential
//! digit-string indices (see `domain::resolution::Resources`); hosting
//! back-references are index references, never owned pointers.
//!
//! # Lifecycle
//!
//! Resources are created `Planned` and only their status field is mutated
//! afterwards, through the transition table below.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::connection::ResourceRelation;
use crate::domain::errors::{ReasonCode, UserError};

/// Unique sequential digit-string key of a resource within one resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceIndex(pub String);

impl ResourceIndex {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<usize> for ResourceIndex {
    fn from(value: usize) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for ResourceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resource lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceStatus {
    Planned,
    New,
    Build,
    Configure,
    Active,
    Deleting,
    Deleted,
    Error,
}

impl ResourceStatus {
    /// Legal transition table.
    pub fn can_transition_to(self, next: ResourceStatus) -> bool {
        use ResourceStatus::*;
        matches!(
            (self, next),
            (Planned, New | Active | Deleting)
                | (New, Build | Active | Deleting | Error)
                | (Build, Configure | Active | Deleting | Error)
                | (Configure, Active | Deleting | Error)
                | (Active, Deleting | Error)
                | (Deleting, Deleted | Error)
                | (Error, New | Build | Configure | Active | Deleting)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == ResourceStatus::Deleted
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Planned => "PLANNED",
            Self::New => "NEW",
            Self::Build => "BUILD",
            Self::Configure => "CONFIGURE",
            Self::Active => "ACTIVE",
            Self::Deleting => "DELETING",
            Self::Deleted => "DELETED",
            Self::Error => "ERROR",
        };
        write!(f, "{s}")
    }
}

/// Concrete instantiation of a resolved component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub index: ResourceIndex,
    pub resource_type: String,
    /// Provider key; statically declared resources have none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Owning service; statically declared resources have none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Component id this resource was materialized from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    pub status: ResourceStatus,
    /// Index of the resource hosting this one, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hosted_on: Option<ResourceIndex>,
    /// Indices of resources this one hosts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<ResourceIndex>,
    /// Relation entries keyed by `"{name}-{target}"`, or `"host"`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relations: BTreeMap<String, ResourceRelation>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub desired_state: serde_json::Value,
}

impl Resource {
    pub fn new(
        index: ResourceIndex,
        resource_type: impl Into<String>,
        provider: Option<String>,
        service: Option<String>,
        component: Option<String>,
    ) -> Self {
        Self {
            index,
            resource_type: resource_type.into(),
            provider,
            service,
            component,
            status: ResourceStatus::Planned,
            hosted_on: None,
            hosts: Vec::new(),
            relations: BTreeMap::new(),
            desired_state: serde_json::Value::Null,
        }
    }

    /// Apply a lifecycle transition, rejecting moves outside the table.
    pub fn transition(&mut self, next: ResourceStatus) -> Result<(), UserError> {
        if self.status == next {
            return Ok(());
        }
        if !self.status.can_transition_to(next) {
            return Err(UserError::new(
                ReasonCode::InvalidTransition,
                format!(
                    "resource {} cannot move from {} to {}",
                    self.index, self.status, next
                ),
            ));
        }
        self.status = next;
        Ok(())
    }

    /// Compatibility variant: applies an illegal transition anyway, with a
    /// warning. Exists for drain paths that must converge on DELETING.
    pub fn force_transition(&mut self, next: ResourceStatus) {
        if self.status != next && !self.status.can_transition_to(next) {
            warn!(
                resource = %self.index,
                from = %self.status,
                to = %next,
                "forcing transition outside the lifecycle table"
            );
        }
        self.status = next;
    }

    /// Record the hosting edge on the hosted side. Reassignment to a
    /// different host is a hard error; re-setting the same host is a no-op.
    pub fn set_hosted_on(&mut self, host: ResourceIndex) -> Result<(), UserError> {
        match &self.hosted_on {
            Some(existing) if *existing == host => Ok(()),
            Some(existing) => Err(UserError::new(
                ReasonCode::HostConflict,
                format!(
                    "resource {} is already hosted on {} and cannot move to {}",
                    self.index, existing, host
                ),
            )),
            None => {
                self.hosted_on = Some(host);
                Ok(())
            }
        }
    }

    /// Record the hosting edge on the host side.
    pub fn add_hosted(&mut self, hosted: ResourceIndex) {
        if !self.hosts.contains(&hosted) {
            self.hosts.push(hosted);
        }
    }

    /// Insert a relation entry under its deterministic key, deduplicating
    /// identical entries.
    pub fn add_relation(&mut self, relation: ResourceRelation) {
        self.relations.entry(relation.key()).or_insert(relation);
    }

    pub fn is_new_or_planned(&self) -> bool {
        matches!(self.status, ResourceStatus::Planned | ResourceStatus::New)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(index: usize) -> Resource {
        Resource::new(
            index.into(),
            "compute",
            Some("nova".into()),
            Some("web".into()),
            Some("linux-server".into()),
        )
    }

    #[test]
    fn happy_path_lifecycle() {
        let mut r = resource(0);
        for next in [
            ResourceStatus::New,
            ResourceStatus::Build,
            ResourceStatus::Configure,
            ResourceStatus::Active,
            ResourceStatus::Deleting,
            ResourceStatus::Deleted,
        ] {
            r.transition(next).unwrap();
        }
        assert!(r.status.is_terminal());
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let mut r = resource(0);
        let err = r.transition(ResourceStatus::Configure).unwrap_err();
        assert_eq!(err.code, ReasonCode::InvalidTransition);
        assert_eq!(r.status, ResourceStatus::Planned);
    }

    #[test]
    fn error_state_allows_recovery() {
        let mut r = resource(0);
        r.transition(ResourceStatus::New).unwrap();
        r.transition(ResourceStatus::Error).unwrap();
        r.transition(ResourceStatus::Build).unwrap();
        assert_eq!(r.status, ResourceStatus::Build);
    }

    #[test]
    fn deleted_is_terminal() {
        let mut r = resource(0);
        r.transition(ResourceStatus::Deleting).unwrap();
        r.transition(ResourceStatus::Deleted).unwrap();
        assert!(r.transition(ResourceStatus::New).is_err());
    }

    #[test]
    fn force_transition_applies_anyway() {
        let mut r = resource(0);
        r.force_transition(ResourceStatus::Configure);
        assert_eq!(r.status, ResourceStatus::Configure);
    }

    #[test]
    fn host_reassignment_is_rejected_but_same_host_is_noop() {
        let mut r = resource(1);
        r.set_hosted_on(0usize.into()).unwrap();
        r.set_hosted_on(0usize.into()).unwrap();
        let err = r.set_hosted_on(2usize.into()).unwrap_err();
        assert_eq!(err.code, ReasonCode::HostConflict);
        assert_eq!(r.hosted_on, Some(0usize.into()));
    }
}
