// Copyright (c) 2026 Drydock Systems
// SPDX-License-Identifier: AGPL-3.0
//! Environment & Provider Capability Interfaces
//!
//! An Environment names the providers available to a deployment. Each
//! provider exposes two capability interfaces, looked up through an
//! explicit registry owned by the Environment:
//!
//! - [`ComponentCatalog`] — searchable set of components
//! - [`TaskFactory`] — task-generation hooks consumed by the
//!   `WorkflowSpecBuilder`
//!
//! Concrete provider implementations (cloud APIs, configuration
//! management, DNS) live outside this crate; the core only drives these
//! interfaces.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::component::{Component, ComponentCriteria};
use crate::domain::connection::ResourceRelation;
use crate::domain::resource::Resource;
use crate::domain::task::{TaskId, WorkflowSpec};

/// Failure raised by a provider capability hook.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider '{provider}' failed in {hook}: {message}")]
    Hook {
        provider: String,
        hook: String,
        message: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Non-fatal finding from capacity or permission verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanWarning {
    pub provider: String,
    pub message: String,
}

/// Root and final task of a subgraph a hook added to the spec. Hooks
/// inserting a single task report it as both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandles {
    pub root: TaskId,
    pub final_task: TaskId,
}

impl TaskHandles {
    pub fn single(task: TaskId) -> Self {
        Self {
            root: task,
            final_task: task,
        }
    }
}

/// Per-provider searchable component catalog.
pub trait ComponentCatalog: Send + Sync {
    /// All components matching the criteria, in catalog order.
    fn find_components(&self, criteria: &ComponentCriteria) -> Vec<Component>;
}

/// Per-provider task-generation hooks.
///
/// Graph-building hooks are synchronous: they splice tasks into the spec
/// with no suspension points. Only the verification calls are async, as
/// they may reach out to the provider's control plane.
#[async_trait]
pub trait TaskFactory: Send + Sync {
    /// One-time environment preparation tasks (keys, networks).
    fn prep_environment(
        &self,
        _spec: &mut WorkflowSpec,
        _deployment_id: &str,
    ) -> Result<Option<TaskHandles>, ProviderError> {
        Ok(None)
    }

    /// Tasks that create and configure one resource.
    fn add_resource_tasks(
        &self,
        spec: &mut WorkflowSpec,
        resource: &Resource,
        deployment_id: &str,
    ) -> Result<TaskHandles, ProviderError>;

    /// Tasks wiring one relation between two resources. The "host"
    /// relation makes the hosted resource's tasks wait on its host.
    fn add_connection_tasks(
        &self,
        _spec: &mut WorkflowSpec,
        _source: &Resource,
        _target: &Resource,
        _relation: &ResourceRelation,
        _deployment_id: &str,
    ) -> Result<Option<TaskHandles>, ProviderError> {
        Ok(None)
    }

    /// Tasks that tear one resource down.
    fn delete_resource_tasks(
        &self,
        spec: &mut WorkflowSpec,
        resource: &Resource,
        deployment_id: &str,
    ) -> Result<TaskHandles, ProviderError>;

    fn disable_connection_tasks(
        &self,
        _spec: &mut WorkflowSpec,
        _source: &Resource,
        _target: &Resource,
        _relation: &ResourceRelation,
        _deployment_id: &str,
    ) -> Result<Option<TaskHandles>, ProviderError> {
        Ok(None)
    }

    fn enable_connection_tasks(
        &self,
        _spec: &mut WorkflowSpec,
        _source: &Resource,
        _target: &Resource,
        _relation: &ResourceRelation,
        _deployment_id: &str,
    ) -> Result<Option<TaskHandles>, ProviderError> {
        Ok(None)
    }

    /// Final cleanup tasks, run after everything else for this provider.
    fn cleanup_environment(
        &self,
        _spec: &mut WorkflowSpec,
        _deployment_id: &str,
    ) -> Result<Option<TaskHandles>, ProviderError> {
        Ok(None)
    }

    fn cleanup_temp_files(
        &self,
        _spec: &mut WorkflowSpec,
        _deployment_id: &str,
    ) -> Result<Option<TaskHandles>, ProviderError> {
        Ok(None)
    }

    /// Capacity check against the resources planned for this provider.
    async fn verify_limits(&self, _resources: &[Resource]) -> Result<Vec<PlanWarning>, ProviderError> {
        Ok(Vec::new())
    }

    /// Permission check against the caller's credentials.
    async fn verify_access(&self) -> Result<Vec<PlanWarning>, ProviderError> {
        Ok(Vec::new())
    }
}

/// Both capability interfaces of one registered provider.
#[derive(Clone)]
pub struct ProviderEntry {
    pub catalog: Arc<dyn ComponentCatalog>,
    pub tasks: Arc<dyn TaskFactory>,
}

/// Explicit provider registry owned by the Environment.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, ProviderEntry>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        key: impl Into<String>,
        catalog: Arc<dyn ComponentCatalog>,
        tasks: Arc<dyn TaskFactory>,
    ) {
        self.providers
            .insert(key.into(), ProviderEntry { catalog, tasks });
    }

    pub fn get(&self, key: &str) -> Option<&ProviderEntry> {
        self.providers.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.providers.keys()
    }
}

/// A named set of providers a blueprint is planned against.
#[derive(Clone)]
pub struct Environment {
    pub name: String,
    registry: ProviderRegistry,
}

impl Environment {
    pub fn new(name: impl Into<String>, registry: ProviderRegistry) -> Self {
        Self {
            name: name.into(),
            registry,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn provider(&self, key: &str) -> Option<&ProviderEntry> {
        self.registry.get(key)
    }

    pub fn task_factory(&self, key: &str) -> Option<Arc<dyn TaskFactory>> {
        self.registry.get(key).map(|e| e.tasks.clone())
    }

    /// Query every provider's catalog, preserving registry order.
    pub fn find_components(&self, criteria: &ComponentCriteria) -> Vec<Component> {
        self.registry
            .providers
            .values()
            .flat_map(|entry| entry.catalog.find_components(criteria))
            .collect()
    }
}
