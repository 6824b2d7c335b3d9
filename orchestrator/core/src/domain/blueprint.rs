// Copyright (c) 2026 Drydock Systems
// SPDX-License-Identifier: AGPL-3.0
//! Blueprint Domain Model
//!
//! A Blueprint is the declarative input to planning: desired services with
//! component-selection criteria, the relations between them, deployment
//! options (including deferred-default generators) and statically declared
//! resources.
//!
//! Blueprints are read-only once constructed; the planner never mutates
//! them.

use std::collections::BTreeMap;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::component::ComponentCriteria;
use crate::domain::connection::RelationKind;
use crate::domain::errors::ValidationError;

/// Declarative deployment specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub name: String,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceSpec>,
    #[serde(default)]
    pub options: BTreeMap<String, BlueprintOption>,
    /// Statically declared resources with no backing provider component.
    #[serde(default)]
    pub resources: BTreeMap<String, StaticResourceSpec>,
}

/// One desired service: how to pick its component, how it relates to
/// other services, and its deployment constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub component: ComponentCriteria,
    #[serde(default)]
    pub relations: Vec<RelationDecl>,
    #[serde(default)]
    pub constraints: ServiceConstraints,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConstraints {
    /// Replica count for every component materialized under this service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

/// A declared relation, before normalization. Blueprints accept two
/// shorthands and one explicit form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationDecl {
    /// `"service: interface"` shorthand.
    Service { target: String, interface: String },
    /// `"host: interface"` shorthand.
    Host { interface: String },
    /// Explicit map form.
    Explicit {
        #[serde(skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        /// Target service; a missing value degrades to the declaring
        /// service with a warning (compatibility behavior).
        #[serde(skip_serializing_if = "Option::is_none")]
        service: Option<String>,
        interface: String,
        relation: RelationKind,
        /// Pins the outbound side to a named extra component, used for
        /// fan-out interfaces such as load-balancer front-ends.
        #[serde(skip_serializing_if = "Option::is_none")]
        connect_from: Option<String>,
    },
}

/// A blueprint option. Defaults are either concrete values or deferred
/// generators evaluated exactly once at the start of planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintOption {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<OptionDefault>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionDefault {
    /// Already-concrete default; evaluation leaves it untouched.
    Value(serde_json::Value),
    /// Deferred generator, resolved to a concrete value exactly once.
    Generate(GeneratedDefault),
}

/// Tagged default-generator variants. This replaces string-prefix
/// dispatch on expressions like `"generate password"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratedDefault {
    Password { length: usize },
    Uuid,
}

impl GeneratedDefault {
    pub fn evaluate(&self) -> serde_json::Value {
        match self {
            Self::Password { length } => serde_json::Value::String(generate_password(*length)),
            Self::Uuid => serde_json::Value::String(Uuid::new_v4().to_string()),
        }
    }
}

pub fn generate_password(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

const MIN_PASSWORD_LENGTH: usize = 8;
const GENERATED_PASSWORD_LENGTH: usize = 12;
const GENERATED_KEY_BYTES: usize = 32;

/// Statically declared resources materialized without a provider
/// component: validated-or-generated user credentials, and a
/// generated-or-supplied key pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StaticResourceSpec {
    User {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
    KeyPair {
        #[serde(skip_serializing_if = "Option::is_none")]
        private_key: Option<String>,
    },
}

impl StaticResourceSpec {
    pub fn resource_type(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::KeyPair { .. } => "key-pair",
        }
    }

    /// Validate supplied fields and generate missing ones, producing the
    /// desired-state document for the materialized resource.
    pub fn materialize(&self, key: &str) -> Result<serde_json::Value, ValidationError> {
        match self {
            Self::User { name, password } => {
                if let Some(password) = password {
                    if password.len() < MIN_PASSWORD_LENGTH {
                        return Err(ValidationError::InvalidStaticResource(
                            key.to_string(),
                            format!("password must be at least {MIN_PASSWORD_LENGTH} characters"),
                        ));
                    }
                }
                let name = name.clone().unwrap_or_else(|| key.to_string());
                let password = password
                    .clone()
                    .unwrap_or_else(|| generate_password(GENERATED_PASSWORD_LENGTH));
                Ok(serde_json::json!({ "name": name, "password": password }))
            }
            Self::KeyPair { private_key } => {
                let private_key = private_key.clone().unwrap_or_else(|| {
                    let bytes: Vec<u8> = rand::thread_rng()
                        .sample_iter(rand::distributions::Standard)
                        .take(GENERATED_KEY_BYTES)
                        .collect();
                    bytes.iter().map(|b| format!("{b:02x}")).collect()
                });
                Ok(serde_json::json!({ "private_key": private_key }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_password_has_requested_length() {
        let value = GeneratedDefault::Password { length: 12 }.evaluate();
        assert_eq!(value.as_str().unwrap().len(), 12);
    }

    #[test]
    fn generated_uuid_parses() {
        let value = GeneratedDefault::Uuid.evaluate();
        assert!(Uuid::parse_str(value.as_str().unwrap()).is_ok());
    }

    #[test]
    fn short_user_password_is_rejected() {
        let spec = StaticResourceSpec::User {
            name: Some("admin".into()),
            password: Some("short".into()),
        };
        assert!(matches!(
            spec.materialize("admin-user"),
            Err(ValidationError::InvalidStaticResource(_, _))
        ));
    }

    #[test]
    fn missing_user_credentials_are_generated() {
        let spec = StaticResourceSpec::User {
            name: None,
            password: None,
        };
        let state = spec.materialize("admin-user").unwrap();
        assert_eq!(state["name"], "admin-user");
        assert!(state["password"].as_str().unwrap().len() >= MIN_PASSWORD_LENGTH);
    }

    #[test]
    fn supplied_private_key_is_kept() {
        let spec = StaticResourceSpec::KeyPair {
            private_key: Some("supplied".into()),
        };
        let state = spec.materialize("deploy-key").unwrap();
        assert_eq!(state["private_key"], "supplied");
    }
}
