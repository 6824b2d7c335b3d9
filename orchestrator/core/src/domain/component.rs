// Copyright (c) 2026 Drydock Systems
// SPDX-License-Identifier: AGPL-3.0
//! Component Domain Model
//!
//! A Component is a provider-supplied capability unit: something a catalog
//! can instantiate, declaring which interfaces it provides and which it
//! requires from others.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::connection::RelationKind;

/// Selection criteria a blueprint (or a requirement) uses to pick a
/// component out of the environment's catalogs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentCriteria {
    ById(String),
    ByType(String),
    ByInterface(String),
    ByTypeAndInterface {
        resource_type: String,
        interface: String,
    },
}

impl std::fmt::Display for ComponentCriteria {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ById(id) => write!(f, "id={id}"),
            Self::ByType(t) => write!(f, "type={t}"),
            Self::ByInterface(i) => write!(f, "interface={i}"),
            Self::ByTypeAndInterface {
                resource_type,
                interface,
            } => write!(f, "type={resource_type}, interface={interface}"),
        }
    }
}

/// One `provides` entry: an interface this component offers on a resource
/// type, addressable by a stable provides-key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provision {
    pub resource_type: String,
    pub interface: String,
}

impl Provision {
    /// Stable key used by requirement satisfaction records.
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource_type, self.interface)
    }
}

/// One `requires` entry: an interface this component needs another
/// component to supply, either as a peer reference or as its host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    pub interface: String,
    pub relation: RelationKind,
}

impl Requirement {
    /// Criteria used to locate a satisfying component when the blueprint
    /// declares no explicit relation for this requirement.
    pub fn criteria(&self) -> ComponentCriteria {
        match &self.resource_type {
            Some(resource_type) => ComponentCriteria::ByTypeAndInterface {
                resource_type: resource_type.clone(),
                interface: self.interface.clone(),
            },
            None => ComponentCriteria::ByInterface(self.interface.clone()),
        }
    }
}

/// Provider-supplied capability unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    /// Key of the provider whose catalog owns this component.
    pub provider: String,
    /// Resource type materialized when this component is instantiated.
    pub resource_type: String,
    #[serde(default)]
    pub provides: Vec<Provision>,
    #[serde(default)]
    pub requires: BTreeMap<String, Requirement>,
}

impl Component {
    /// Whether this component matches the given selection criteria.
    pub fn matches(&self, criteria: &ComponentCriteria) -> bool {
        match criteria {
            ComponentCriteria::ById(id) => self.id == *id,
            ComponentCriteria::ByType(t) => self.resource_type == *t,
            ComponentCriteria::ByInterface(interface) => {
                self.provides.iter().any(|p| p.interface == *interface)
            }
            ComponentCriteria::ByTypeAndInterface {
                resource_type,
                interface,
            } => {
                self.resource_type == *resource_type
                    && self.provides.iter().any(|p| p.interface == *interface)
            }
        }
    }

    /// Find the provides entry matching an interface, if any.
    pub fn provision_for(&self, interface: &str) -> Option<&Provision> {
        self.provides.iter().find(|p| p.interface == interface)
    }
}
