// Copyright (c) 2026 Drydock Systems
// SPDX-License-Identifier: AGPL-3.0
//! Blueprint YAML Parser
//!
//! This module provides infrastructure for parsing blueprint YAML
//! manifests into domain objects.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Parse external YAML → Domain objects
//! - **Anti-Corruption:** Translates YAML schema to domain model
//!
//! # Manifest Format
//!
//! ```yaml
//! apiVersion: drydock.io/v1
//! kind: Blueprint
//! metadata:
//!   name: wordpress
//! spec:
//!   services:
//!     app:
//!       component:
//!         type: application
//!         interface: http
//!       relations:
//!         - db: mysql
//!     db:
//!       component:
//!         interface: mysql
//!   options:
//!     db-password:
//!       label: Database password
//!       default:
//!         generate: password
//!         length: 12
//!   resources:
//!     admin-user:
//!       type: user
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::blueprint::{
    Blueprint, BlueprintOption, GeneratedDefault, OptionDefault, RelationDecl, ServiceConstraints,
    ServiceSpec, StaticResourceSpec,
};
use crate::domain::component::ComponentCriteria;
use crate::domain::connection::RelationKind;
use crate::domain::errors::ValidationError;

const API_VERSION: &str = "drydock.io/v1";
const MANIFEST_KIND: &str = "Blueprint";

// ============================================================================
// YAML Schema (External Representation)
// ============================================================================

/// External YAML representation of a blueprint manifest.
///
/// This struct matches the YAML schema exactly. It is then converted to
/// the domain `Blueprint` with validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlueprintManifest {
    pub api_version: String,
    pub kind: String,
    pub metadata: BlueprintMetadataYaml,
    pub spec: BlueprintSpecYaml,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintMetadataYaml {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintSpecYaml {
    #[serde(default)]
    pub services: BTreeMap<String, ServiceYaml>,
    #[serde(default)]
    pub options: BTreeMap<String, OptionYaml>,
    #[serde(default)]
    pub resources: BTreeMap<String, StaticResourceSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceYaml {
    pub component: CriteriaYaml,
    #[serde(default)]
    pub relations: Vec<RelationYaml>,
    #[serde(default)]
    pub constraints: Option<ConstraintsYaml>,
}

/// Component selection, either a bare component id or a type/interface
/// query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CriteriaYaml {
    Id(String),
    Query {
        #[serde(rename = "type")]
        resource_type: Option<String>,
        interface: Option<String>,
    },
}

/// A declared relation. The single-entry map form is shorthand for
/// `target-service: interface` (with the reserved key `host` selecting
/// a hosting relation); the explicit form spells every field out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationYaml {
    Explicit {
        #[serde(default)]
        key: Option<String>,
        #[serde(default)]
        service: Option<String>,
        interface: String,
        #[serde(default)]
        relation: Option<RelationKind>,
        #[serde(default, rename = "connect-from")]
        connect_from: Option<String>,
    },
    Shorthand(BTreeMap<String, String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintsYaml {
    #[serde(default)]
    pub count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionYaml {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub default: Option<DefaultYaml>,
}

/// An option default, either a deferred generator or a concrete value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultYaml {
    Generate {
        generate: GeneratorKindYaml,
        #[serde(default)]
        length: Option<usize>,
    },
    Value(serde_json::Value),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKindYaml {
    Password,
    Uuid,
}

const DEFAULT_GENERATED_PASSWORD_LENGTH: usize = 12;

// ============================================================================
// Parser
// ============================================================================

/// Blueprint parser (Infrastructure service)
pub struct BlueprintParser;

impl BlueprintParser {
    /// Parse a blueprint manifest from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Blueprint, ValidationError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            ValidationError::ManifestParse(format!(
                "reading {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::parse_yaml(&content)
    }

    /// Parse a blueprint manifest from a YAML string.
    pub fn parse_yaml(yaml: &str) -> Result<Blueprint, ValidationError> {
        let manifest: BlueprintManifest =
            serde_yaml::from_str(yaml).map_err(|e| ValidationError::ManifestParse(e.to_string()))?;
        Self::validate_and_convert(manifest)
    }

    /// Validate manifest and convert to the domain object.
    fn validate_and_convert(manifest: BlueprintManifest) -> Result<Blueprint, ValidationError> {
        if manifest.api_version != API_VERSION {
            return Err(ValidationError::SchemaViolation(format!(
                "unsupported apiVersion '{}', expected '{API_VERSION}'",
                manifest.api_version
            )));
        }
        if manifest.kind != MANIFEST_KIND {
            return Err(ValidationError::SchemaViolation(format!(
                "unsupported kind '{}', expected '{MANIFEST_KIND}'",
                manifest.kind
            )));
        }

        let mut services = BTreeMap::new();
        for (name, service) in manifest.spec.services {
            services.insert(name.clone(), Self::convert_service(&name, service)?);
        }

        let options = manifest
            .spec
            .options
            .into_iter()
            .map(|(name, option)| (name, Self::convert_option(option)))
            .collect();

        Ok(Blueprint {
            name: manifest.metadata.name,
            services,
            options,
            resources: manifest.spec.resources,
        })
    }

    fn convert_service(name: &str, yaml: ServiceYaml) -> Result<ServiceSpec, ValidationError> {
        let component = Self::convert_criteria(name, yaml.component)?;
        let relations = yaml
            .relations
            .into_iter()
            .map(|r| Self::convert_relation(name, r))
            .collect::<Result<Vec<_>, _>>()?;
        let constraints = ServiceConstraints {
            count: yaml.constraints.and_then(|c| c.count),
        };
        Ok(ServiceSpec {
            component,
            relations,
            constraints,
        })
    }

    fn convert_criteria(
        service: &str,
        yaml: CriteriaYaml,
    ) -> Result<ComponentCriteria, ValidationError> {
        match yaml {
            CriteriaYaml::Id(id) => Ok(ComponentCriteria::ById(id)),
            CriteriaYaml::Query {
                resource_type: Some(resource_type),
                interface: Some(interface),
            } => Ok(ComponentCriteria::ByTypeAndInterface {
                resource_type,
                interface,
            }),
            CriteriaYaml::Query {
                resource_type: Some(resource_type),
                interface: None,
            } => Ok(ComponentCriteria::ByType(resource_type)),
            CriteriaYaml::Query {
                resource_type: None,
                interface: Some(interface),
            } => Ok(ComponentCriteria::ByInterface(interface)),
            CriteriaYaml::Query {
                resource_type: None,
                interface: None,
            } => Err(ValidationError::SchemaViolation(format!(
                "service '{service}': component selector needs a type or an interface"
            ))),
        }
    }

    fn convert_relation(
        service: &str,
        yaml: RelationYaml,
    ) -> Result<RelationDecl, ValidationError> {
        match yaml {
            RelationYaml::Shorthand(map) => {
                if map.len() != 1 {
                    return Err(ValidationError::SchemaViolation(format!(
                        "service '{service}': relation shorthand must have exactly one entry"
                    )));
                }
                let (target, interface) = map.into_iter().next().ok_or_else(|| {
                    ValidationError::SchemaViolation(format!(
                        "service '{service}': empty relation shorthand"
                    ))
                })?;
                if target == "host" {
                    Ok(RelationDecl::Host { interface })
                } else {
                    Ok(RelationDecl::Service { target, interface })
                }
            }
            RelationYaml::Explicit {
                key,
                service: target,
                interface,
                relation,
                connect_from,
            } => Ok(RelationDecl::Explicit {
                key,
                service: target,
                interface,
                relation: relation.unwrap_or(RelationKind::Reference),
                connect_from,
            }),
        }
    }

    fn convert_option(yaml: OptionYaml) -> BlueprintOption {
        let default = yaml.default.map(|d| match d {
            DefaultYaml::Generate {
                generate: GeneratorKindYaml::Password,
                length,
            } => OptionDefault::Generate(GeneratedDefault::Password {
                length: length.unwrap_or(DEFAULT_GENERATED_PASSWORD_LENGTH),
            }),
            DefaultYaml::Generate {
                generate: GeneratorKindYaml::Uuid,
                ..
            } => OptionDefault::Generate(GeneratedDefault::Uuid),
            DefaultYaml::Value(value) => OptionDefault::Value(value),
        });
        BlueprintOption {
            label: yaml.label,
            default,
        }
    }
}
