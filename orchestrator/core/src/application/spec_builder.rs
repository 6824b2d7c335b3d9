// Copyright (c) 2026 Drydock Systems
// SPDX-License-Identifier: AGPL-3.0
//! WorkflowSpec Builder Application Service
//!
//! Compiles a [`Resolution`] into an executable task DAG by driving each
//! provider's task-generation hooks, in hosting-dependency order, and
//! wiring fan-in synchronization where branches converge.
//!
//! # Design
//!
//! The builder itself never creates provider work: every operation task
//! comes out of a [`TaskFactory`] hook. The builder owns ordering (hosts
//! before hosted, both endpoints before a connection), attachment to the
//! Start sentinel, and the non-empty-graph invariant.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::connection::{Direction, RelationKind, ResourceRelation};
use crate::domain::environment::{Environment, ProviderError, TaskFactory, TaskHandles};
use crate::domain::errors::UserError;
use crate::domain::events::DeploymentEvent;
use crate::domain::resolution::Resolution;
use crate::domain::resource::{Resource, ResourceIndex};
use crate::domain::task::{TaskId, TaskKind, WorkflowSpec};
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no provider registered under key '{0}'")]
    MissingProvider(String),

    #[error("hosting cycle detected at resource {0}")]
    HostingCycle(ResourceIndex),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    User(#[from] UserError),
}

/// Compiles resolutions into named task graphs.
pub struct WorkflowSpecBuilder {
    environment: Arc<Environment>,
    events: Option<EventBus>,
}

impl WorkflowSpecBuilder {
    pub fn new(environment: Arc<Environment>) -> Self {
        Self {
            environment,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Compile the full build workflow for a resolution.
    pub fn create_build_spec(
        &self,
        resolution: &Resolution,
        deployment_id: &str,
    ) -> Result<WorkflowSpec, BuildError> {
        let mut spec = WorkflowSpec::new(format!("deploy-{deployment_id}"));
        let start = spec.start();

        // Provider preparation runs before any resource work.
        let mut prep_finals: BTreeMap<String, TaskHandles> = BTreeMap::new();
        for provider in resolution.resources.providers() {
            let factory = self.factory(&provider)?;
            if let Some(handles) = factory.prep_environment(&mut spec, deployment_id)? {
                if spec.task(handles.root).inputs.is_empty() {
                    spec.connect(start, handles.root);
                }
                prep_finals.insert(provider.clone(), handles);
            }
        }

        // Hosts are created before what they host.
        let order = hosting_order(resolution)?;
        let mut resource_handles: BTreeMap<ResourceIndex, TaskHandles> = BTreeMap::new();
        // Connection-task finals per provider; cleanup waits on these too.
        let mut connection_finals: BTreeMap<String, Vec<TaskId>> = BTreeMap::new();
        for index in &order {
            let resource = resolution.resources.get(index)?;
            let Some(provider) = resource.provider.clone() else {
                // Statically declared resources carry no provider tasks.
                continue;
            };
            if !resource.is_new_or_planned() {
                continue;
            }
            let factory = self.factory(&provider)?;
            let handles = factory.add_resource_tasks(&mut spec, resource, deployment_id)?;
            debug!(resource = %index, provider = %provider, "added resource tasks");

            let mut waits = Vec::new();
            if let Some(prep) = prep_finals.get(&provider) {
                waits.push(prep.final_task);
            }
            if let Some(host) = &resource.hosted_on {
                if let Some(host_handles) = resource_handles.get(host).copied() {
                    let host_resource = resolution.resources.get(host)?;
                    let relation = resource
                        .relations
                        .get("host")
                        .cloned()
                        .unwrap_or_else(|| host_relation_stub(resource, host));
                    // The hosted resource's tasks wait on its host through
                    // the provider's "host" connection tasks.
                    if let Some(conn) = factory.add_connection_tasks(
                        &mut spec,
                        resource,
                        host_resource,
                        &relation,
                        deployment_id,
                    )? {
                        spec.wait_for(conn.root, &[host_handles.final_task]);
                        waits.push(conn.final_task);
                        connection_finals
                            .entry(provider.clone())
                            .or_default()
                            .push(conn.final_task);
                    } else {
                        waits.push(host_handles.final_task);
                    }
                }
            }
            if waits.is_empty() {
                waits.push(start);
            }
            spec.wait_for(handles.root, &waits);
            resource_handles.insert(index.clone(), handles);
        }

        // Peer connections between resources that are both new-or-planned.
        self.add_reference_connections(
            &mut spec,
            resolution,
            &resource_handles,
            &mut connection_finals,
            deployment_id,
        )?;

        // Per-provider cleanup trails everything that provider created,
        // connection tasks included.
        for provider in resolution.resources.providers() {
            let factory = self.factory(&provider)?;
            if let Some(handles) = factory.cleanup_temp_files(&mut spec, deployment_id)? {
                let mut finals: Vec<_> = resolution
                    .resources
                    .iter()
                    .filter(|r| r.provider.as_deref() == Some(provider.as_str()))
                    .filter_map(|r| resource_handles.get(&r.index))
                    .map(|h| h.final_task)
                    .collect();
                if let Some(conns) = connection_finals.get(provider.as_str()) {
                    finals.extend(conns.iter().copied());
                }
                spec.wait_for(handles.root, &finals);
                if spec.task(handles.root).inputs.is_empty() {
                    spec.connect(start, handles.root);
                }
            }
        }

        self.finalize(&mut spec, deployment_id);
        Ok(spec)
    }

    /// Compile a teardown workflow: hosted resources are deleted before
    /// their hosts, then each provider's environment cleanup runs.
    pub fn create_delete_spec(
        &self,
        resolution: &Resolution,
        deployment_id: &str,
    ) -> Result<WorkflowSpec, BuildError> {
        let mut spec = WorkflowSpec::new(format!("delete-{deployment_id}"));
        let start = spec.start();

        let mut order = hosting_order(resolution)?;
        order.reverse();
        let mut handles_by_resource: BTreeMap<ResourceIndex, TaskHandles> = BTreeMap::new();
        for index in &order {
            let resource = resolution.resources.get(index)?;
            let Some(provider) = resource.provider.clone() else {
                continue;
            };
            let factory = self.factory(&provider)?;
            let handles = factory.delete_resource_tasks(&mut spec, resource, deployment_id)?;
            // A host waits for everything it hosts to be gone.
            let waits: Vec<_> = resource
                .hosts
                .iter()
                .filter_map(|hosted| handles_by_resource.get(hosted))
                .map(|h| h.final_task)
                .collect();
            if waits.is_empty() {
                spec.connect(start, handles.root);
            } else {
                spec.wait_for(handles.root, &waits);
            }
            handles_by_resource.insert(index.clone(), handles);
        }

        for provider in resolution.resources.providers() {
            let factory = self.factory(&provider)?;
            if let Some(handles) = factory.cleanup_environment(&mut spec, deployment_id)? {
                let finals: Vec<_> = handles_by_resource.values().map(|h| h.final_task).collect();
                spec.wait_for(handles.root, &finals);
                if spec.task(handles.root).inputs.is_empty() {
                    spec.connect(start, handles.root);
                }
            }
        }

        self.finalize(&mut spec, deployment_id);
        Ok(spec)
    }

    /// Compile a scale-down workflow deleting the given victim resources,
    /// disabling their peer connections first.
    pub fn create_scale_down_spec(
        &self,
        resolution: &Resolution,
        victims: &[ResourceIndex],
        deployment_id: &str,
    ) -> Result<WorkflowSpec, BuildError> {
        let mut spec = WorkflowSpec::new(format!("scale-down-{deployment_id}"));
        let start = spec.start();

        for index in victims {
            let resource = resolution.resources.get(index)?;
            let Some(provider) = resource.provider.clone() else {
                continue;
            };
            let factory = self.factory(&provider)?;

            let mut disable_finals = Vec::new();
            for relation in resource.relations.values() {
                if relation.kind != RelationKind::Reference {
                    continue;
                }
                if victims.contains(&relation.target) {
                    continue;
                }
                let peer = resolution.resources.get(&relation.target)?;
                if let Some(handles) = factory.disable_connection_tasks(
                    &mut spec,
                    resource,
                    peer,
                    relation,
                    deployment_id,
                )? {
                    if spec.task(handles.root).inputs.is_empty() {
                        spec.connect(start, handles.root);
                    }
                    disable_finals.push(handles.final_task);
                }
            }

            let handles = factory.delete_resource_tasks(&mut spec, resource, deployment_id)?;
            if disable_finals.is_empty() {
                spec.connect(start, handles.root);
            } else {
                spec.wait_for(handles.root, &disable_finals);
            }
        }

        self.finalize(&mut spec, deployment_id);
        Ok(spec)
    }

    /// Compile the delete-and-recreate workflow for one failed resource.
    /// Used by the exception handlers to remediate resettable failures.
    pub fn create_reset_failed_resource_spec(
        &self,
        resolution: &Resolution,
        failed: &ResourceIndex,
        deployment_id: &str,
    ) -> Result<WorkflowSpec, BuildError> {
        let mut spec = WorkflowSpec::new(format!("reset-{failed}-{deployment_id}"));
        let start = spec.start();

        let resource = resolution.resources.get(failed)?;
        let provider = resource.provider.clone().ok_or_else(|| {
            BuildError::MissingProvider(format!("resource {failed} has no provider"))
        })?;
        let factory = self.factory(&provider)?;

        let delete = factory.delete_resource_tasks(&mut spec, resource, deployment_id)?;
        spec.connect(start, delete.root);
        let create = factory.add_resource_tasks(&mut spec, resource, deployment_id)?;
        spec.wait_for(create.root, &[delete.final_task]);

        // Re-wire the hosting dependency so the rebuilt resource lands on
        // its original host.
        if let Some(host) = &resource.hosted_on {
            let host_resource = resolution.resources.get(host)?;
            let relation = resource
                .relations
                .get("host")
                .cloned()
                .unwrap_or_else(|| host_relation_stub(resource, host));
            if let Some(conn) = factory.add_connection_tasks(
                &mut spec,
                resource,
                host_resource,
                &relation,
                deployment_id,
            )? {
                spec.wait_for(conn.root, &[create.final_task]);
            }
        }

        self.finalize(&mut spec, deployment_id);
        Ok(spec)
    }

    /// Compile a workflow disabling every connection touching a service,
    /// whichever end of it the service holds.
    pub fn create_take_offline_spec(
        &self,
        resolution: &Resolution,
        service: &str,
        deployment_id: &str,
    ) -> Result<WorkflowSpec, BuildError> {
        self.toggle_connections_spec(resolution, service, deployment_id, false)
    }

    /// Compile a workflow re-enabling every connection touching a service.
    pub fn create_bring_online_spec(
        &self,
        resolution: &Resolution,
        service: &str,
        deployment_id: &str,
    ) -> Result<WorkflowSpec, BuildError> {
        self.toggle_connections_spec(resolution, service, deployment_id, true)
    }

    fn toggle_connections_spec(
        &self,
        resolution: &Resolution,
        service: &str,
        deployment_id: &str,
        enable: bool,
    ) -> Result<WorkflowSpec, BuildError> {
        let verb = if enable { "online" } else { "offline" };
        let mut spec = WorkflowSpec::new(format!("{verb}-{service}-{deployment_id}"));
        let start = spec.start();

        for resource in resolution.resources.iter() {
            if resource.service.as_deref() != Some(service) {
                continue;
            }
            let Some(provider) = resource.provider.clone() else {
                continue;
            };
            let factory = self.factory(&provider)?;
            for relation in resource.relations.values() {
                if relation.kind != RelationKind::Reference {
                    continue;
                }
                let peer = resolution.resources.get(&relation.target)?;
                // A connection inside the service shows up on both of its
                // endpoints; the outbound entry covers it.
                if relation.direction == Direction::Inbound
                    && peer.service.as_deref() == Some(service)
                {
                    continue;
                }
                let handles = if enable {
                    factory.enable_connection_tasks(
                        &mut spec,
                        resource,
                        peer,
                        relation,
                        deployment_id,
                    )?
                } else {
                    factory.disable_connection_tasks(
                        &mut spec,
                        resource,
                        peer,
                        relation,
                        deployment_id,
                    )?
                };
                if let Some(handles) = handles {
                    if spec.task(handles.root).inputs.is_empty() {
                        spec.connect(start, handles.root);
                    }
                }
            }
        }

        self.finalize(&mut spec, deployment_id);
        Ok(spec)
    }

    fn add_reference_connections(
        &self,
        spec: &mut WorkflowSpec,
        resolution: &Resolution,
        resource_handles: &BTreeMap<ResourceIndex, TaskHandles>,
        connection_finals: &mut BTreeMap<String, Vec<TaskId>>,
        deployment_id: &str,
    ) -> Result<(), BuildError> {
        for resource in resolution.resources.iter() {
            let Some(provider) = resource.provider.clone() else {
                continue;
            };
            if !resource.is_new_or_planned() {
                continue;
            }
            for relation in resource.relations.values() {
                if relation.kind != RelationKind::Reference
                    || relation.direction != Direction::Outbound
                {
                    continue;
                }
                let target = resolution.resources.get(&relation.target)?;
                if !target.is_new_or_planned() {
                    continue;
                }
                let (Some(source_handles), Some(target_handles)) = (
                    resource_handles.get(&resource.index),
                    resource_handles.get(&target.index),
                ) else {
                    continue;
                };
                let factory = self.factory(&provider)?;
                if let Some(conn) = factory.add_connection_tasks(
                    spec,
                    resource,
                    target,
                    relation,
                    deployment_id,
                )? {
                    // A connection needs both endpoints built.
                    spec.wait_for(
                        conn.root,
                        &[source_handles.final_task, target_handles.final_task],
                    );
                    connection_finals
                        .entry(provider.clone())
                        .or_default()
                        .push(conn.final_task);
                }
            }
        }
        Ok(())
    }

    /// Non-empty-graph invariant plus the build-complete event.
    fn finalize(&self, spec: &mut WorkflowSpec, deployment_id: &str) {
        if !spec.has_edges_from_start() {
            let noop = spec.add_task_with("Finalize", TaskKind::Noop);
            let start = spec.start();
            spec.connect(start, noop);
        }
        if let Some(events) = &self.events {
            events.publish(DeploymentEvent::SpecBuilt {
                deployment_id: deployment_id.to_string(),
                workflow_name: spec.name.clone(),
                task_count: spec.len(),
                built_at: Utc::now(),
            });
        }
        info!(workflow = %spec.name, tasks = spec.len(), "workflow spec built");
    }

    fn factory(&self, provider: &str) -> Result<Arc<dyn TaskFactory>, BuildError> {
        self.environment
            .task_factory(provider)
            .ok_or_else(|| BuildError::MissingProvider(provider.to_string()))
    }
}

/// Depth-first hosting order: every host precedes the resources it
/// hosts. A cycle in the hosting chain is fatal.
pub fn hosting_order(resolution: &Resolution) -> Result<Vec<ResourceIndex>, BuildError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let mut marks: BTreeMap<ResourceIndex, Mark> = resolution
        .resources
        .iter()
        .map(|r| (r.index.clone(), Mark::Unvisited))
        .collect();
    let mut order = Vec::new();

    fn visit(
        index: &ResourceIndex,
        resolution: &Resolution,
        marks: &mut BTreeMap<ResourceIndex, Mark>,
        order: &mut Vec<ResourceIndex>,
    ) -> Result<(), BuildError> {
        match marks.get(index).copied() {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => return Err(BuildError::HostingCycle(index.clone())),
            _ => {}
        }
        marks.insert(index.clone(), Mark::InProgress);
        if let Some(host) = resolution
            .resources
            .get(index)
            .ok()
            .and_then(|r| r.hosted_on.clone())
        {
            visit(&host, resolution, marks, order)?;
        }
        marks.insert(index.clone(), Mark::Done);
        order.push(index.clone());
        Ok(())
    }

    let indices: Vec<ResourceIndex> = resolution
        .resources
        .iter()
        .map(|r| r.index.clone())
        .collect();
    for index in indices {
        visit(&index, resolution, &mut marks, &mut order)?;
    }
    Ok(order)
}

fn host_relation_stub(resource: &Resource, host: &ResourceIndex) -> ResourceRelation {
    ResourceRelation {
        name: format!("host:{}", resource.resource_type),
        interface: resource.resource_type.clone(),
        kind: RelationKind::Host,
        direction: Direction::Outbound,
        target: host.clone(),
        requires_key: None,
        provides_key: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resolution::Resources;
    use crate::domain::resource::Resource;

    fn resolution_with_hosting() -> Resolution {
        let mut resources = Resources::new();
        let host = resources.allocate(|i| {
            Resource::new(i, "compute", Some("nova".into()), Some("web".into()), None)
        });
        let hosted = resources.allocate(|i| {
            Resource::new(i, "application", Some("chef".into()), Some("web".into()), None)
        });
        resources.link_host(&hosted, &host).unwrap();
        Resolution {
            resources,
            ..Resolution::new()
        }
    }

    #[test]
    fn hosts_come_before_hosted() {
        let resolution = resolution_with_hosting();
        let order = hosting_order(&resolution).unwrap();
        let host_pos = order.iter().position(|i| i.as_str() == "0").unwrap();
        let hosted_pos = order.iter().position(|i| i.as_str() == "1").unwrap();
        assert!(host_pos < hosted_pos);
    }

    #[test]
    fn hosting_cycle_is_fatal() {
        let mut resolution = resolution_with_hosting();
        // Force a cycle directly on the raw fields.
        resolution
            .resources
            .get_mut(&ResourceIndex("0".into()))
            .unwrap()
            .hosted_on = Some(ResourceIndex("1".into()));
        assert!(matches!(
            hosting_order(&resolution),
            Err(BuildError::HostingCycle(_))
        ));
    }
}
