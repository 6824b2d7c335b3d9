// Copyright (c) 2026 Drydock Systems
// SPDX-License-Identifier: AGPL-3.0
//! Connection Value Objects
//!
//! Connections are the concrete, directioned edges between resolved
//! resources. Planning first records *connection points* on component
//! definitions (see `domain::resolution`), then replays them into
//! resource-level relation entries.

use serde::{Deserialize, Serialize};

use crate::domain::resource::ResourceIndex;

/// How two components relate: a peer reference, or a hosting dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Reference,
    Host,
}

/// Which side of a connection a record sits on. The requiring side is
/// outbound, the providing side inbound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// One endpoint's view of a component-level connection, written during
/// relation resolution and replayed per resource instance later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionPoint {
    /// Deterministic relation name (see [`relation_name`]).
    pub name: String,
    pub interface: String,
    pub kind: RelationKind,
    pub direction: Direction,
    /// Service owning the peer component.
    pub peer_service: String,
    /// Which component definition on the peer service this connects to.
    pub peer_component: PeerComponent,
    /// Requirement key on the requiring side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_key: Option<String>,
    /// Provides key on the providing side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provides_key: Option<String>,
    /// Pins the outbound side to a named extra component; used for
    /// fan-out interfaces such as load-balancer front-ends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbound_from: Option<String>,
}

/// Address of a component definition within a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerComponent {
    Primary,
    Extra(String),
}

/// A concrete resource-level relation entry, keyed on the owning resource
/// by `"{name}-{target}"`, or `"host"` for the hosting edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRelation {
    pub name: String,
    pub interface: String,
    pub kind: RelationKind,
    pub direction: Direction,
    pub target: ResourceIndex,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provides_key: Option<String>,
}

impl ResourceRelation {
    /// Deduplication key for this entry on its owning resource.
    pub fn key(&self) -> String {
        match self.kind {
            RelationKind::Host => "host".to_string(),
            RelationKind::Reference => format!("{}-{}", self.name, self.target),
        }
    }
}

/// Interface metadata recorded under the resolution's named connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub interface: String,
}

/// Deterministic relation naming:
/// - implicit service-to-service relations are `"{source}-{target}"`
/// - explicitly keyed relations keep their key
/// - host relations are `"host:{interface}"`
pub fn relation_name(
    source: &str,
    target: &str,
    interface: &str,
    kind: RelationKind,
    explicit_key: Option<&str>,
) -> String {
    if let Some(key) = explicit_key {
        return key.to_string();
    }
    match kind {
        RelationKind::Host => format!("host:{interface}"),
        RelationKind::Reference => format!("{source}-{target}"),
    }
}
