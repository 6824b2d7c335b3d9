// Copyright (c) 2026 Drydock Systems
// SPDX-License-Identifier: AGPL-3.0
//! Planner Application Service
//!
//! Resolves a Blueprint against an Environment into a [`Resolution`]:
//! primary components per service, requirement satisfaction, concrete
//! resources and the connections between them.
//!
//! # Pipeline
//!
//! `plan()` runs an ordered, non-reentrant pipeline over one instance:
//!
//! ```text
//! evaluate_defaults
//!   -> resolve_components
//!   -> resolve_relations
//!   -> resolve_remaining_requirements
//!   -> resolve_recursive_requirements
//!   -> add_resources
//!   -> connect_resources
//!   -> add_static_resources
//! ```
//!
//! Any unresolved requirement or component, relation cycle, unknown
//! target service, or conflicting host assignment aborts the whole call;
//! no partial resolution is usable. Two legacy fallbacks (reusing an
//! already-satisfied requirement; defaulting a missing relation's
//! service) degrade to warnings instead.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::domain::blueprint::{Blueprint, OptionDefault, RelationDecl};
use crate::domain::component::Component;
use crate::domain::connection::{
    relation_name, ConnectionInfo, ConnectionPoint, Direction, PeerComponent, RelationKind,
    ResourceRelation,
};
use crate::domain::environment::{Environment, PlanWarning, ProviderError};
use crate::domain::errors::{PlanError, ReasonCode, UserError, ValidationError};
use crate::domain::events::DeploymentEvent;
use crate::domain::resolution::{ComponentDefinition, Resolution, ResolvedService, SatisfiedBy};
use crate::domain::resource::{Resource, ResourceIndex};
use crate::infrastructure::event_bus::EventBus;

/// A declared relation after shorthand normalization.
#[derive(Debug, Clone)]
struct NormalizedRelation {
    name: String,
    source: String,
    target: String,
    interface: String,
    kind: RelationKind,
    outbound_from: Option<String>,
}

/// Turns a Blueprint + Environment into a Resolution. One instance plans
/// one deployment; it must not be driven concurrently by two callers.
pub struct Planner {
    blueprint: Blueprint,
    environment: Arc<Environment>,
    deployment_id: String,
    /// Evaluated option values; deferred generators resolve exactly once.
    options: BTreeMap<String, serde_json::Value>,
    resolution: Resolution,
    /// (service, component-id) pairs seen during requirement resolution.
    history: HashSet<(String, String)>,
    planned: bool,
    events: Option<EventBus>,
}

impl Planner {
    pub fn new(
        blueprint: Blueprint,
        environment: Arc<Environment>,
        deployment_id: impl Into<String>,
    ) -> Self {
        Self {
            blueprint,
            environment,
            deployment_id: deployment_id.into(),
            options: BTreeMap::new(),
            resolution: Resolution::new(),
            history: HashSet::new(),
            planned: false,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    pub fn options(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.options
    }

    /// Run the full planning pipeline.
    pub fn plan(&mut self) -> Result<&Resolution, PlanError> {
        if self.planned {
            return Err(UserError::new(
                ReasonCode::AlreadyPlanned,
                format!("deployment {} is already planned", self.deployment_id),
            )
            .into());
        }
        info!(deployment = %self.deployment_id, "planning deployment");

        self.evaluate_defaults();
        self.resolve_components()?;
        self.resolve_relations()?;
        let new_extras = self.resolve_remaining_requirements()?;
        self.resolve_recursive_requirements(new_extras)?;
        self.add_resources()?;
        self.connect_resources()?;
        self.add_static_resources()?;

        self.planned = true;
        if let Some(events) = &self.events {
            events.publish(DeploymentEvent::PlanCompleted {
                deployment_id: self.deployment_id.clone(),
                resource_count: self.resolution.resources.len(),
                connection_count: self.resolution.connections.len(),
                completed_at: Utc::now(),
            });
        }
        info!(
            deployment = %self.deployment_id,
            resources = self.resolution.resources.len(),
            "planning complete"
        );
        Ok(&self.resolution)
    }

    /// Resolve deferred option defaults to concrete values exactly once.
    /// Already-concrete defaults are copied through untouched.
    fn evaluate_defaults(&mut self) {
        for (key, option) in &self.blueprint.options {
            let Some(default) = &option.default else {
                continue;
            };
            self.options
                .entry(key.clone())
                .or_insert_with(|| match default {
                    OptionDefault::Value(value) => value.clone(),
                    OptionDefault::Generate(generator) => {
                        debug!(option = %key, "evaluating deferred default");
                        generator.evaluate()
                    }
                });
        }
    }

    /// Bind one primary component per service.
    fn resolve_components(&mut self) -> Result<(), PlanError> {
        let selections: Vec<(String, crate::domain::component::ComponentCriteria)> = self
            .blueprint
            .services
            .iter()
            .map(|(name, spec)| (name.clone(), spec.component.clone()))
            .collect();
        for (name, criteria) in selections {
            let component = self.find_one_component(&criteria)?;
            debug!(service = %name, component = %component.id, "resolved primary component");
            self.history.insert((name.clone(), component.id.clone()));
            self.resolution
                .services
                .insert(name.clone(), ResolvedService::new(name, component));
        }
        Ok(())
    }

    /// Normalize declared relations and satisfy the requirements they name.
    fn resolve_relations(&mut self) -> Result<(), PlanError> {
        let mut normalized = Vec::new();
        for (source, spec) in &self.blueprint.services {
            for declaration in &spec.relations {
                if let Some(relation) = self.normalize_relation(source, declaration)? {
                    normalized.push(relation);
                }
            }
        }
        for relation in normalized {
            self.satisfy_relation(&relation)?;
        }
        Ok(())
    }

    fn normalize_relation(
        &self,
        source: &str,
        declaration: &RelationDecl,
    ) -> Result<Option<NormalizedRelation>, PlanError> {
        match declaration {
            RelationDecl::Service { target, interface } => Ok(Some(NormalizedRelation {
                name: relation_name(source, target, interface, RelationKind::Reference, None),
                source: source.to_string(),
                target: target.clone(),
                interface: interface.clone(),
                kind: RelationKind::Reference,
                outbound_from: None,
            })),
            // The `host:` shorthand names a hosting requirement on the
            // declaring component itself, not a peer service; the
            // satisfying component is located from that requirement's
            // criteria in the remaining-requirements pass.
            RelationDecl::Host { interface } => {
                self.expect_host_requirement(source, interface)?;
                Ok(None)
            }
            RelationDecl::Explicit {
                key,
                service,
                interface,
                relation,
                connect_from,
            } => {
                let target = match service {
                    Some(service) => service.clone(),
                    None => {
                        // Legacy fallback: a relation without a service
                        // targets the declaring service.
                        warn!(
                            service = %source,
                            interface = %interface,
                            "relation omits a target service; defaulting to the declaring service"
                        );
                        source.to_string()
                    }
                };
                Ok(Some(NormalizedRelation {
                    name: relation_name(source, &target, interface, *relation, key.as_deref()),
                    source: source.to_string(),
                    target,
                    interface: interface.clone(),
                    kind: *relation,
                    outbound_from: connect_from.clone(),
                }))
            }
        }
    }

    /// Check that a `host:` shorthand matches a hosting requirement on
    /// the declaring service's bound component.
    fn expect_host_requirement(&self, service: &str, interface: &str) -> Result<(), PlanError> {
        let definition = &self.resolution.services[service].component;
        let declares = definition
            .component
            .requires
            .values()
            .any(|r| r.relation == RelationKind::Host && r.interface == interface);
        if declares {
            return Ok(());
        }
        Err(UserError::new(
            ReasonCode::UnresolvedRequirement,
            format!(
                "service '{service}' declares a host relation on interface '{interface}' but \
                 its component '{}' has no matching hosting requirement",
                definition.component.id
            ),
        )
        .into())
    }

    /// Satisfy one normalized relation: find a free requirement on the
    /// source, a matching provision on the target, and record both sides.
    fn satisfy_relation(&mut self, relation: &NormalizedRelation) -> Result<(), PlanError> {
        if !self.resolution.services.contains_key(&relation.target) {
            return Err(ValidationError::UnknownService {
                service: relation.source.clone(),
                target: relation.target.clone(),
            }
            .into());
        }

        let source_def = &self.resolution.services[&relation.source].component;
        let requirement_key = self
            .find_requirement_key(source_def, &relation.interface)
            .ok_or_else(|| {
                UserError::new(
                    ReasonCode::UnresolvedRequirement,
                    format!(
                        "service '{}' declares relation '{}' but its component '{}' has no \
                         requirement for interface '{}'",
                        relation.source, relation.name, source_def.component.id, relation.interface
                    ),
                )
            })?;

        let target_def = &self.resolution.services[&relation.target].component;
        let provision = target_def
            .component
            .provision_for(&relation.interface)
            .ok_or_else(|| {
                UserError::new(
                    ReasonCode::MissingProvision,
                    format!(
                        "service '{}' does not provide interface '{}' required by relation '{}'",
                        relation.target, relation.interface, relation.name
                    ),
                )
            })?;
        let provides_key = provision.key();
        let target_component_id = target_def.component.id.clone();

        let satisfied_by = SatisfiedBy {
            service: relation.target.clone(),
            component_id: target_component_id,
            provides_key: provides_key.clone(),
            name: relation.name.clone(),
        };

        // Outbound on the requiring side.
        let source_service = self
            .resolution
            .services
            .get_mut(&relation.source)
            .expect("source service exists");
        source_service
            .component
            .satisfied_requirements
            .insert(requirement_key.clone(), satisfied_by);
        source_service.component.connections.push(ConnectionPoint {
            name: relation.name.clone(),
            interface: relation.interface.clone(),
            kind: relation.kind,
            direction: Direction::Outbound,
            peer_service: relation.target.clone(),
            peer_component: PeerComponent::Primary,
            requires_key: Some(requirement_key.clone()),
            provides_key: Some(provides_key.clone()),
            outbound_from: relation.outbound_from.clone(),
        });

        // Inbound on the providing side.
        let target_service = self
            .resolution
            .services
            .get_mut(&relation.target)
            .expect("target service exists");
        target_service.component.connections.push(ConnectionPoint {
            name: relation.name.clone(),
            interface: relation.interface.clone(),
            kind: relation.kind,
            direction: Direction::Inbound,
            peer_service: relation.source.clone(),
            peer_component: PeerComponent::Primary,
            requires_key: Some(requirement_key),
            provides_key: Some(provides_key),
            outbound_from: None,
        });

        self.resolution.connections.insert(
            relation.name.clone(),
            ConnectionInfo {
                interface: relation.interface.clone(),
            },
        );
        Ok(())
    }

    /// Prefer an unsatisfied requirement matching the interface; fall
    /// back, with a warning, to an already-satisfied one.
    fn find_requirement_key(
        &self,
        definition: &ComponentDefinition,
        interface: &str,
    ) -> Option<String> {
        let matching: Vec<&String> = definition
            .component
            .requires
            .iter()
            .filter(|(_, r)| r.interface == interface)
            .map(|(k, _)| k)
            .collect();
        if let Some(key) = matching
            .iter()
            .find(|key| !definition.is_satisfied(key.as_str()))
        {
            return Some((*key).clone());
        }
        matching.first().map(|key| {
            // Legacy fallback: re-binding a satisfied requirement.
            warn!(
                component = %definition.component.id,
                requirement = %key,
                "requirement already satisfied; reusing it for another relation"
            );
            (*key).clone()
        })
    }

    /// Satisfy every requirement not covered by an explicit relation by
    /// pulling in an extra component per requirement key.
    fn resolve_remaining_requirements(&mut self) -> Result<Vec<(String, String)>, PlanError> {
        let mut added = Vec::new();
        let service_names: Vec<String> = self.resolution.services.keys().cloned().collect();
        for service in service_names {
            added.extend(self.resolve_definition_requirements(&service, &PeerComponent::Primary)?);
        }
        Ok(added)
    }

    /// Repeat requirement resolution over newly added extra components
    /// until none remain. A repeated (service, component-id) pair in the
    /// accumulated history is a dependency cycle.
    fn resolve_recursive_requirements(
        &mut self,
        mut pending: Vec<(String, String)>,
    ) -> Result<(), PlanError> {
        while let Some((service, extra_key)) = pending.pop() {
            pending.extend(
                self.resolve_definition_requirements(
                    &service,
                    &PeerComponent::Extra(extra_key),
                )?,
            );
        }
        Ok(())
    }

    /// Resolve the unsatisfied requirements of one component definition,
    /// returning the (service, extra-key) pairs added.
    fn resolve_definition_requirements(
        &mut self,
        service_name: &str,
        peer: &PeerComponent,
    ) -> Result<Vec<(String, String)>, PlanError> {
        let definition = self
            .resolution
            .services
            .get(service_name)
            .and_then(|s| s.definition(peer))
            .expect("definition exists");
        let unsatisfied: Vec<(String, crate::domain::component::Requirement)> = definition
            .component
            .requires
            .iter()
            .filter(|(key, _)| !definition.is_satisfied(key))
            .map(|(k, r)| (k.clone(), r.clone()))
            .collect();

        let mut added = Vec::new();
        for (requirement_key, requirement) in unsatisfied {
            let component = self.find_one_component(&requirement.criteria())?;
            let history_key = (service_name.to_string(), component.id.clone());
            if !self.history.insert(history_key) {
                return Err(UserError::new(
                    ReasonCode::DependencyCycle,
                    format!(
                        "cyclic dependency: component '{}' was already resolved for service '{}'",
                        component.id, service_name
                    ),
                )
                .into());
            }

            let provides_key = component
                .provision_for(&requirement.interface)
                .map(|p| p.key())
                .ok_or_else(|| {
                    UserError::new(
                        ReasonCode::MissingProvision,
                        format!(
                            "component '{}' matched requirement '{}' but does not provide \
                             interface '{}'",
                            component.id, requirement_key, requirement.interface
                        ),
                    )
                })?;
            let name = relation_name(
                service_name,
                service_name,
                &requirement.interface,
                requirement.relation,
                (requirement.relation == RelationKind::Reference)
                    .then(|| format!("{service_name}-{requirement_key}"))
                    .as_deref(),
            );
            debug!(
                service = %service_name,
                requirement = %requirement_key,
                component = %component.id,
                "resolved requirement to extra component"
            );

            let satisfied_by = SatisfiedBy {
                service: service_name.to_string(),
                component_id: component.id.clone(),
                provides_key: provides_key.clone(),
                name: name.clone(),
            };
            let outbound = ConnectionPoint {
                name: name.clone(),
                interface: requirement.interface.clone(),
                kind: requirement.relation,
                direction: Direction::Outbound,
                peer_service: service_name.to_string(),
                peer_component: PeerComponent::Extra(requirement_key.clone()),
                requires_key: Some(requirement_key.clone()),
                provides_key: Some(provides_key.clone()),
                outbound_from: None,
            };
            let inbound = ConnectionPoint {
                name: name.clone(),
                interface: requirement.interface.clone(),
                kind: requirement.relation,
                direction: Direction::Inbound,
                peer_service: service_name.to_string(),
                peer_component: peer.clone(),
                requires_key: Some(requirement_key.clone()),
                provides_key: Some(provides_key.clone()),
                outbound_from: None,
            };

            let service = self
                .resolution
                .services
                .get_mut(service_name)
                .expect("service exists");
            let mut extra = ComponentDefinition::new(component);
            extra.connections.push(inbound);
            service
                .extra_components
                .entry(requirement_key.clone())
                .or_insert(extra);
            if requirement.relation == RelationKind::Host {
                service.host_keys.push(requirement_key.clone());
            }
            let definition = service.definition_mut(peer).expect("definition exists");
            definition
                .satisfied_requirements
                .insert(requirement_key.clone(), satisfied_by);
            definition.connections.push(outbound);

            self.resolution.connections.insert(
                name,
                ConnectionInfo {
                    interface: requirement.interface,
                },
            );
            added.push((service_name.to_string(), requirement_key));
        }
        Ok(added)
    }

    /// Materialize resources for every component definition, assigning
    /// fresh sequential indices.
    fn add_resources(&mut self) -> Result<(), PlanError> {
        let Resolution {
            services,
            resources,
            ..
        } = &mut self.resolution;
        for (name, service) in services.iter_mut() {
            let count = self
                .blueprint
                .services
                .get(name)
                .and_then(|s| s.constraints.count)
                .unwrap_or(1);
            let definitions = std::iter::once(&mut service.component)
                .chain(service.extra_components.values_mut());
            for definition in definitions {
                for _ in 0..count {
                    let component = &definition.component;
                    let index = resources.allocate(|index| {
                        Resource::new(
                            index,
                            component.resource_type.clone(),
                            Some(component.provider.clone()),
                            Some(name.clone()),
                            Some(component.id.clone()),
                        )
                    });
                    definition.instances.push(index);
                }
            }
        }
        Ok(())
    }

    /// Replay component-level connection metadata into resource-level
    /// relation entries and hosting back-references.
    fn connect_resources(&mut self) -> Result<(), PlanError> {
        struct Job {
            point: ConnectionPoint,
            sources: Vec<ResourceIndex>,
            targets: Vec<ResourceIndex>,
        }

        let mut jobs = Vec::new();
        for service in self.resolution.services.values() {
            for (_, definition) in service.definitions() {
                for point in &definition.connections {
                    if point.direction != Direction::Outbound {
                        continue;
                    }
                    let sources = match &point.outbound_from {
                        Some(key) => service
                            .extra_components
                            .get(key)
                            .map(|d| d.instances.clone())
                            .unwrap_or_else(|| definition.instances.clone()),
                        None => definition.instances.clone(),
                    };
                    let Some(peer_service) = self.resolution.services.get(&point.peer_service)
                    else {
                        continue;
                    };
                    let Some(peer_def) = peer_service.definition(&point.peer_component) else {
                        continue;
                    };
                    // An outbound point recorded on the peer itself would
                    // self-connect; skip degenerate pairs.
                    if std::ptr::eq(peer_def, definition) {
                        continue;
                    }
                    jobs.push(Job {
                        point: point.clone(),
                        sources,
                        targets: peer_def.instances.clone(),
                    });
                }
            }
        }

        let resources = &mut self.resolution.resources;
        for job in jobs {
            if job.targets.is_empty() {
                continue;
            }
            match job.point.kind {
                RelationKind::Host => {
                    for (i, source) in job.sources.iter().enumerate() {
                        let host = &job.targets[i % job.targets.len()];
                        resources.link_host(source, host)?;
                        resources.get_mut(source)?.add_relation(ResourceRelation {
                            name: job.point.name.clone(),
                            interface: job.point.interface.clone(),
                            kind: RelationKind::Host,
                            direction: Direction::Outbound,
                            target: host.clone(),
                            requires_key: job.point.requires_key.clone(),
                            provides_key: job.point.provides_key.clone(),
                        });
                    }
                }
                RelationKind::Reference => {
                    for source in &job.sources {
                        for target in &job.targets {
                            if source == target {
                                continue;
                            }
                            resources.get_mut(source)?.add_relation(ResourceRelation {
                                name: job.point.name.clone(),
                                interface: job.point.interface.clone(),
                                kind: RelationKind::Reference,
                                direction: Direction::Outbound,
                                target: target.clone(),
                                requires_key: job.point.requires_key.clone(),
                                provides_key: job.point.provides_key.clone(),
                            });
                            resources.get_mut(target)?.add_relation(ResourceRelation {
                                name: job.point.name.clone(),
                                interface: job.point.interface.clone(),
                                kind: RelationKind::Reference,
                                direction: Direction::Inbound,
                                target: source.clone(),
                                requires_key: job.point.requires_key.clone(),
                                provides_key: job.point.provides_key.clone(),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Materialize blueprint-declared resources with no backing provider
    /// component.
    fn add_static_resources(&mut self) -> Result<(), PlanError> {
        for (key, spec) in &self.blueprint.resources {
            let desired_state = spec.materialize(key)?;
            self.resolution.resources.allocate(|index| {
                let mut resource =
                    Resource::new(index, spec.resource_type(), None, None, None);
                resource.desired_state = desired_state;
                resource
            });
        }
        Ok(())
    }

    /// Incremental scale-out: add more instances of a service's primary
    /// component without re-resolving components, and re-wire connections
    /// for the new instances.
    pub fn plan_additional_nodes(
        &mut self,
        service_name: &str,
        count: usize,
    ) -> Result<Vec<ResourceIndex>, PlanError> {
        if !self.planned {
            return Err(UserError::new(
                ReasonCode::AlreadyPlanned,
                "plan() must complete before adding nodes",
            )
            .into());
        }
        let Resolution {
            services,
            resources,
            ..
        } = &mut self.resolution;
        let service = services.get_mut(service_name).ok_or_else(|| {
            ValidationError::UnknownService {
                service: service_name.to_string(),
                target: service_name.to_string(),
            }
        })?;
        let mut added = Vec::new();
        for _ in 0..count {
            let component = &service.component.component;
            let index = resources.allocate(|index| {
                Resource::new(
                    index,
                    component.resource_type.clone(),
                    Some(component.provider.clone()),
                    Some(service_name.to_string()),
                    Some(component.id.clone()),
                )
            });
            service.component.instances.push(index.clone());
            added.push(index);
        }
        // Relation entries deduplicate, so replaying the whole table only
        // adds edges for the new instances.
        self.connect_resources()?;
        Ok(added)
    }

    /// Fan out one capacity check per distinct provider and join on all
    /// results.
    pub async fn verify_limits(&self) -> Result<Vec<PlanWarning>, ProviderError> {
        let mut checks = Vec::new();
        for provider in self.resolution.resources.providers() {
            let Some(factory) = self.environment.task_factory(&provider) else {
                continue;
            };
            let resources: Vec<Resource> = self
                .resolution
                .resources
                .iter()
                .filter(|r| r.provider.as_deref() == Some(provider.as_str()))
                .cloned()
                .collect();
            checks.push(async move { factory.verify_limits(&resources).await });
        }
        let mut warnings = Vec::new();
        for result in join_all(checks).await {
            warnings.extend(result?);
        }
        Ok(warnings)
    }

    /// Fan out one permission check per distinct provider and join on all
    /// results.
    pub async fn verify_access(&self) -> Result<Vec<PlanWarning>, ProviderError> {
        let mut checks = Vec::new();
        for provider in self.resolution.resources.providers() {
            let Some(factory) = self.environment.task_factory(&provider) else {
                continue;
            };
            checks.push(async move { factory.verify_access().await });
        }
        let mut warnings = Vec::new();
        for result in join_all(checks).await {
            warnings.extend(result?);
        }
        Ok(warnings)
    }

    /// First matching component across all catalogs; ambiguity resolves
    /// to the first candidate with a warning.
    fn find_one_component(
        &self,
        criteria: &crate::domain::component::ComponentCriteria,
    ) -> Result<Component, ValidationError> {
        let mut candidates = self.environment.find_components(criteria);
        if candidates.is_empty() {
            return Err(ValidationError::UnresolvedComponent(criteria.to_string()));
        }
        if candidates.len() > 1 {
            warn!(
                criteria = %criteria,
                discarded = candidates.len() - 1,
                "criteria matched multiple components; taking the first"
            );
        }
        Ok(candidates.swap_remove(0))
    }
}
