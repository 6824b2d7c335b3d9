// Copyright (c) 2026 Drydock Systems
// SPDX-License-Identifier: AGPL-3.0
//! Resolution Aggregate
//!
//! A Resolution is the output of planning: resolved services with their
//! component bindings, an arena of concrete resources, and the named
//! connections between them. It is built fresh per `plan()` call and
//! mutated in place only during planning.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::component::Component;
use crate::domain::connection::{ConnectionInfo, ConnectionPoint, PeerComponent};
use crate::domain::errors::{ReasonCode, UserError};
use crate::domain::resource::{Resource, ResourceIndex};

/// Records which peer satisfied one requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SatisfiedBy {
    /// Service owning the satisfying component.
    pub service: String,
    /// Id of the satisfying component.
    pub component_id: String,
    /// Provides-key on the satisfying component.
    pub provides_key: String,
    /// Relation name this satisfaction was recorded under.
    pub name: String,
}

/// A component bound into a service, with its requirement-satisfaction
/// map, connection points and materialized instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    pub component: Component,
    /// Requirement key -> satisfaction record. A requirement, once
    /// satisfied, is never re-resolved.
    #[serde(default)]
    pub satisfied_requirements: BTreeMap<String, SatisfiedBy>,
    /// Connection metadata written during relation resolution and replayed
    /// per instance by `connect_resources`.
    #[serde(default)]
    pub connections: Vec<ConnectionPoint>,
    /// Indices of the resources materialized from this definition.
    #[serde(default)]
    pub instances: Vec<ResourceIndex>,
}

impl ComponentDefinition {
    pub fn new(component: Component) -> Self {
        Self {
            component,
            satisfied_requirements: BTreeMap::new(),
            connections: Vec::new(),
            instances: Vec::new(),
        }
    }

    pub fn is_satisfied(&self, requirement_key: &str) -> bool {
        self.satisfied_requirements.contains_key(requirement_key)
    }
}

/// A named service role resolved to one primary component plus zero or
/// more extra components pulled in by requirement resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedService {
    pub name: String,
    pub component: ComponentDefinition,
    /// Requirement key -> component resolved without an explicit relation.
    #[serde(default)]
    pub extra_components: BTreeMap<String, ComponentDefinition>,
    /// Requirement keys whose relation is "host".
    #[serde(default)]
    pub host_keys: Vec<String>,
}

impl ResolvedService {
    pub fn new(name: impl Into<String>, component: Component) -> Self {
        Self {
            name: name.into(),
            component: ComponentDefinition::new(component),
            extra_components: BTreeMap::new(),
            host_keys: Vec::new(),
        }
    }

    pub fn definition(&self, peer: &PeerComponent) -> Option<&ComponentDefinition> {
        match peer {
            PeerComponent::Primary => Some(&self.component),
            PeerComponent::Extra(key) => self.extra_components.get(key),
        }
    }

    pub fn definition_mut(&mut self, peer: &PeerComponent) -> Option<&mut ComponentDefinition> {
        match peer {
            PeerComponent::Primary => Some(&mut self.component),
            PeerComponent::Extra(key) => self.extra_components.get_mut(key),
        }
    }

    /// All definitions, primary first, each with its address.
    pub fn definitions(&self) -> impl Iterator<Item = (PeerComponent, &ComponentDefinition)> {
        std::iter::once((PeerComponent::Primary, &self.component)).chain(
            self.extra_components
                .iter()
                .map(|(k, d)| (PeerComponent::Extra(k.clone()), d)),
        )
    }
}

/// Arena-style indexed table of resources. Indices are sequential
/// digit strings starting at "0" and unique per resolution; hosting and
/// relation edges reference indices rather than owning resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    items: Vec<Resource>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next index and insert the resource built for it.
    pub fn allocate(&mut self, build: impl FnOnce(ResourceIndex) -> Resource) -> ResourceIndex {
        let index = ResourceIndex::from(self.items.len());
        let resource = build(index.clone());
        debug_assert_eq!(resource.index, index);
        self.items.push(resource);
        index
    }

    pub fn get(&self, index: &ResourceIndex) -> Result<&Resource, UserError> {
        self.lookup(index)
            .map(|i| &self.items[i])
            .ok_or_else(|| unknown(index))
    }

    pub fn get_mut(&mut self, index: &ResourceIndex) -> Result<&mut Resource, UserError> {
        match self.lookup(index) {
            Some(i) => Ok(&mut self.items[i]),
            None => Err(unknown(index)),
        }
    }

    /// Record a hosting edge on both sides. Conflicting reassignment on
    /// the hosted side is a hard error.
    pub fn link_host(
        &mut self,
        hosted: &ResourceIndex,
        host: &ResourceIndex,
    ) -> Result<(), UserError> {
        self.get_mut(hosted)?.set_hosted_on(host.clone())?;
        self.get_mut(host)?.add_hosted(hosted.clone());
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Distinct provider keys across all resources, in stable order.
    pub fn providers(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .items
            .iter()
            .filter_map(|r| r.provider.clone())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    fn lookup(&self, index: &ResourceIndex) -> Option<usize> {
        let i: usize = index.as_str().parse().ok()?;
        (i < self.items.len()).then_some(i)
    }
}

fn unknown(index: &ResourceIndex) -> UserError {
    UserError::new(
        ReasonCode::UnknownResource,
        format!("no resource with index {index}"),
    )
}

/// Aggregate output of one `plan()` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    #[serde(default)]
    pub services: BTreeMap<String, ResolvedService>,
    #[serde(default)]
    pub resources: Resources,
    /// Relation name -> interface metadata.
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionInfo>,
}

impl Resolution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn service(&self, name: &str) -> Option<&ResolvedService> {
        self.services.get(name)
    }

    pub fn service_mut(&mut self, name: &str) -> Option<&mut ResolvedService> {
        self.services.get_mut(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(resources: &mut Resources) -> ResourceIndex {
        resources.allocate(|index| {
            Resource::new(index, "compute", Some("nova".into()), None, None)
        })
    }

    #[test]
    fn indices_are_sequential_digit_strings() {
        let mut resources = Resources::new();
        assert_eq!(push(&mut resources).as_str(), "0");
        assert_eq!(push(&mut resources).as_str(), "1");
        assert_eq!(push(&mut resources).as_str(), "2");
    }

    #[test]
    fn unknown_index_is_a_user_error() {
        let resources = Resources::new();
        let err = resources.get(&ResourceIndex("7".into())).unwrap_err();
        assert_eq!(err.code, ReasonCode::UnknownResource);
    }

    #[test]
    fn link_host_writes_both_sides() {
        let mut resources = Resources::new();
        let host = push(&mut resources);
        let hosted = push(&mut resources);
        resources.link_host(&hosted, &host).unwrap();
        assert_eq!(resources.get(&hosted).unwrap().hosted_on, Some(host.clone()));
        assert_eq!(resources.get(&host).unwrap().hosts, vec![hosted]);
    }

    #[test]
    fn providers_are_distinct_and_sorted() {
        let mut resources = Resources::new();
        push(&mut resources);
        push(&mut resources);
        resources.allocate(|index| {
            Resource::new(index, "dns", Some("designate".into()), None, None)
        });
        assert_eq!(resources.providers(), vec!["designate", "nova"]);
    }
}
