// Copyright (c) 2026 Drydock Systems
// SPDX-License-Identifier: AGPL-3.0

//! Shared fixtures for the integration tests: a minimal provider with a
//! three-component catalog (application, database, compute host) and a
//! deterministic task factory.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use drydock_core::domain::blueprint::{Blueprint, RelationDecl, ServiceConstraints, ServiceSpec};
use drydock_core::domain::component::{Component, ComponentCriteria, Provision, Requirement};
use drydock_core::domain::connection::{RelationKind, ResourceRelation};
use drydock_core::domain::environment::{
    Environment, PlanWarning, ProviderError, ProviderRegistry, TaskFactory, TaskHandles,
};
use drydock_core::domain::resource::Resource;
use drydock_core::domain::task::{TaskTag, WorkflowSpec};
use drydock_core::infrastructure::memory::StaticCatalog;

pub const PROVIDER: &str = "metal";

/// Route planner and builder logs through the per-test capture writer.
/// The first caller installs the subscriber; later calls are no-ops.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Deterministic task factory: two tasks per created resource, one per
/// deleted resource, one per wired/toggled connection.
#[derive(Default)]
pub struct TestFactory {
    pub limit_warning: Option<String>,
    pub with_cleanup: bool,
}

#[async_trait]
impl TaskFactory for TestFactory {
    fn add_resource_tasks(
        &self,
        spec: &mut WorkflowSpec,
        resource: &Resource,
        _deployment_id: &str,
    ) -> Result<TaskHandles, ProviderError> {
        let create = spec.add_task(format!(
            "Create {} {}",
            resource.resource_type, resource.index
        ));
        {
            let task = spec.task_mut(create);
            task.properties.task_tags.insert(TaskTag::Create);
            task.defines.resource = Some(resource.index.clone());
            task.defines.provider = resource.provider.clone();
        }
        let configure = spec.add_task(format!(
            "Configure {} {}",
            resource.resource_type, resource.index
        ));
        {
            let task = spec.task_mut(configure);
            task.defines.resource = Some(resource.index.clone());
            task.defines.provider = resource.provider.clone();
        }
        spec.connect(create, configure);
        Ok(TaskHandles {
            root: create,
            final_task: configure,
        })
    }

    fn delete_resource_tasks(
        &self,
        spec: &mut WorkflowSpec,
        resource: &Resource,
        _deployment_id: &str,
    ) -> Result<TaskHandles, ProviderError> {
        let delete = spec.add_task(format!(
            "Delete {} {}",
            resource.resource_type, resource.index
        ));
        let task = spec.task_mut(delete);
        task.properties.task_tags.insert(TaskTag::Delete);
        task.defines.resource = Some(resource.index.clone());
        task.defines.provider = resource.provider.clone();
        Ok(TaskHandles::single(delete))
    }

    fn add_connection_tasks(
        &self,
        spec: &mut WorkflowSpec,
        source: &Resource,
        target: &Resource,
        relation: &ResourceRelation,
        _deployment_id: &str,
    ) -> Result<Option<TaskHandles>, ProviderError> {
        let connect = spec.add_task(format!(
            "Connect {} {}->{}",
            relation.name, source.index, target.index
        ));
        let task = spec.task_mut(connect);
        task.defines.resource = Some(source.index.clone());
        task.defines.provider = source.provider.clone();
        task.defines.relation = Some(relation.name.clone());
        Ok(Some(TaskHandles::single(connect)))
    }

    fn disable_connection_tasks(
        &self,
        spec: &mut WorkflowSpec,
        source: &Resource,
        target: &Resource,
        relation: &ResourceRelation,
        _deployment_id: &str,
    ) -> Result<Option<TaskHandles>, ProviderError> {
        let disable = spec.add_task(format!(
            "Disable {} {}->{}",
            relation.name, source.index, target.index
        ));
        let task = spec.task_mut(disable);
        task.defines.resource = Some(source.index.clone());
        task.defines.provider = source.provider.clone();
        task.defines.relation = Some(relation.name.clone());
        Ok(Some(TaskHandles::single(disable)))
    }

    fn enable_connection_tasks(
        &self,
        spec: &mut WorkflowSpec,
        source: &Resource,
        target: &Resource,
        relation: &ResourceRelation,
        _deployment_id: &str,
    ) -> Result<Option<TaskHandles>, ProviderError> {
        let enable = spec.add_task(format!(
            "Enable {} {}->{}",
            relation.name, source.index, target.index
        ));
        let task = spec.task_mut(enable);
        task.defines.resource = Some(source.index.clone());
        task.defines.provider = source.provider.clone();
        task.defines.relation = Some(relation.name.clone());
        Ok(Some(TaskHandles::single(enable)))
    }

    fn cleanup_temp_files(
        &self,
        spec: &mut WorkflowSpec,
        _deployment_id: &str,
    ) -> Result<Option<TaskHandles>, ProviderError> {
        if !self.with_cleanup {
            return Ok(None);
        }
        let cleanup = spec.add_task(format!("Cleanup {PROVIDER} temp files"));
        spec.task_mut(cleanup).defines.provider = Some(PROVIDER.into());
        Ok(Some(TaskHandles::single(cleanup)))
    }

    async fn verify_limits(
        &self,
        _resources: &[Resource],
    ) -> Result<Vec<PlanWarning>, ProviderError> {
        Ok(self
            .limit_warning
            .iter()
            .map(|message| PlanWarning {
                provider: PROVIDER.into(),
                message: message.clone(),
            })
            .collect())
    }
}

fn provision(resource_type: &str, interface: &str) -> Provision {
    Provision {
        resource_type: resource_type.into(),
        interface: interface.into(),
    }
}

fn requirement(resource_type: &str, interface: &str, relation: RelationKind) -> Requirement {
    Requirement {
        resource_type: Some(resource_type.into()),
        interface: interface.into(),
        relation,
    }
}

pub fn catalog_components() -> Vec<Component> {
    vec![
        Component {
            id: "linux-host".into(),
            provider: PROVIDER.into(),
            resource_type: "compute".into(),
            provides: vec![provision("compute", "linux")],
            requires: BTreeMap::new(),
        },
        Component {
            id: "mysql-server".into(),
            provider: PROVIDER.into(),
            resource_type: "database".into(),
            provides: vec![provision("database", "mysql")],
            requires: BTreeMap::from([(
                "server".into(),
                requirement("compute", "linux", RelationKind::Host),
            )]),
        },
        Component {
            id: "wordpress".into(),
            provider: PROVIDER.into(),
            resource_type: "application".into(),
            provides: vec![provision("application", "http")],
            requires: BTreeMap::from([
                (
                    "db".into(),
                    requirement("database", "mysql", RelationKind::Reference),
                ),
                (
                    "server".into(),
                    requirement("compute", "linux", RelationKind::Host),
                ),
            ]),
        },
    ]
}

pub fn environment_with(factory: TestFactory) -> Arc<Environment> {
    init_tracing();
    let mut registry = ProviderRegistry::new();
    registry.register(
        PROVIDER,
        Arc::new(StaticCatalog::new(catalog_components())),
        Arc::new(factory),
    );
    Arc::new(Environment::new("integration", registry))
}

pub fn test_environment() -> Arc<Environment> {
    environment_with(TestFactory::default())
}

/// Two-service blueprint: an application wired to a database, each of
/// which pulls in its own compute host through requirements.
pub fn wordpress_blueprint() -> Blueprint {
    Blueprint {
        name: "wordpress".into(),
        services: BTreeMap::from([
            (
                "app".into(),
                ServiceSpec {
                    component: ComponentCriteria::ByType("application".into()),
                    relations: vec![RelationDecl::Service {
                        target: "db".into(),
                        interface: "mysql".into(),
                    }],
                    constraints: ServiceConstraints::default(),
                },
            ),
            (
                "db".into(),
                ServiceSpec {
                    component: ComponentCriteria::ByInterface("mysql".into()),
                    relations: Vec::new(),
                    constraints: ServiceConstraints::default(),
                },
            ),
        ]),
        options: BTreeMap::new(),
        resources: BTreeMap::new(),
    }
}
