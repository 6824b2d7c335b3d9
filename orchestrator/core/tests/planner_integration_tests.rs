// Copyright (c) 2026 Drydock Systems
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the planning pipeline: component binding,
//! relation satisfaction, requirement recursion, resource
//! materialization and connection wiring.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use drydock_core::application::planner::Planner;
use drydock_core::domain::blueprint::{
    Blueprint, RelationDecl, ServiceConstraints, ServiceSpec, StaticResourceSpec,
};
use drydock_core::domain::component::{Component, ComponentCriteria, Provision, Requirement};
use drydock_core::domain::connection::RelationKind;
use drydock_core::domain::environment::{Environment, ProviderRegistry};
use drydock_core::domain::errors::{PlanError, ReasonCode, ValidationError};
use drydock_core::infrastructure::memory::StaticCatalog;

use common::{environment_with, test_environment, wordpress_blueprint, TestFactory, PROVIDER};

#[test]
fn plan_binds_components_and_satisfies_declared_relations() {
    let mut planner = Planner::new(wordpress_blueprint(), test_environment(), "dep-1");
    let resolution = planner.plan().unwrap();

    let app = resolution.service("app").unwrap();
    assert_eq!(app.component.component.id, "wordpress");
    let satisfied = &app.component.satisfied_requirements["db"];
    assert_eq!(satisfied.service, "db");
    assert_eq!(satisfied.component_id, "mysql-server");
    assert_eq!(satisfied.provides_key, "database:mysql");
    assert_eq!(satisfied.name, "app-db");

    assert!(resolution.connections.contains_key("app-db"));
    assert!(resolution.connections.contains_key("host:linux"));
    assert_eq!(resolution.connections["app-db"].interface, "mysql");
}

#[test]
fn requirements_pull_in_host_components_and_resources() {
    let mut planner = Planner::new(wordpress_blueprint(), test_environment(), "dep-1");
    let resolution = planner.plan().unwrap();

    // app + its host, db + its host.
    assert_eq!(resolution.resources.len(), 4);
    let indices: Vec<&str> = resolution
        .resources
        .iter()
        .map(|r| r.index.as_str())
        .collect();
    assert_eq!(indices, vec!["0", "1", "2", "3"]);

    let app = resolution.service("app").unwrap();
    assert_eq!(app.extra_components["server"].component.id, "linux-host");
    assert_eq!(app.host_keys, vec!["server"]);

    // Hosting back-references point both ways.
    let app_resource = &resolution.resources.get(&0usize.into()).unwrap();
    let app_host = &resolution.resources.get(&1usize.into()).unwrap();
    assert_eq!(app_resource.hosted_on, Some(1usize.into()));
    assert!(app_host.hosts.contains(&0usize.into()));
    assert!(app_resource.relations.contains_key("host"));

    // The reference relation lands on both endpoints.
    let db_resource = &resolution.resources.get(&2usize.into()).unwrap();
    assert!(app_resource
        .relations
        .values()
        .any(|r| r.name == "app-db" && r.target == 2usize.into()));
    assert!(db_resource
        .relations
        .values()
        .any(|r| r.name == "app-db" && r.target == 0usize.into()));
}

#[test]
fn service_count_scales_instances_and_spreads_hosts() {
    let mut blueprint = wordpress_blueprint();
    blueprint.services.get_mut("app").unwrap().constraints = ServiceConstraints {
        count: Some(2),
    };
    let mut planner = Planner::new(blueprint, test_environment(), "dep-1");
    let resolution = planner.plan().unwrap();

    let app = resolution.service("app").unwrap();
    assert_eq!(app.component.instances.len(), 2);
    assert_eq!(app.extra_components["server"].instances.len(), 2);

    // Each application instance lands on its own host.
    let hosts: Vec<_> = app
        .component
        .instances
        .iter()
        .map(|i| resolution.resources.get(i).unwrap().hosted_on.clone())
        .collect();
    assert_eq!(hosts.len(), 2);
    assert_ne!(hosts[0], hosts[1]);
}

#[test]
fn host_shorthand_plans_through_the_component_requirement() {
    let mut blueprint = wordpress_blueprint();
    blueprint
        .services
        .get_mut("app")
        .unwrap()
        .relations
        .push(RelationDecl::Host {
            interface: "linux".into(),
        });
    let mut planner = Planner::new(blueprint, test_environment(), "dep-1");
    let resolution = planner.plan().unwrap();

    // The shorthand resolves through the component's own hosting
    // requirement, exactly as if the relation had been left implicit.
    let app = resolution.service("app").unwrap();
    assert_eq!(app.extra_components["server"].component.id, "linux-host");
    assert!(resolution.connections.contains_key("host:linux"));
    let app_resource = resolution.resources.get(&0usize.into()).unwrap();
    assert_eq!(app_resource.hosted_on, Some(1usize.into()));
}

#[test]
fn host_shorthand_without_a_matching_requirement_is_rejected() {
    let mut blueprint = wordpress_blueprint();
    blueprint
        .services
        .get_mut("db")
        .unwrap()
        .relations
        .push(RelationDecl::Host {
            interface: "windows".into(),
        });
    let mut planner = Planner::new(blueprint, test_environment(), "dep-1");
    match planner.plan() {
        Err(PlanError::User(err)) => assert_eq!(err.code, ReasonCode::UnresolvedRequirement),
        other => panic!("expected unresolved-requirement error, got {other:?}"),
    }
}

#[test]
fn relation_to_unknown_service_is_rejected() {
    let mut blueprint = wordpress_blueprint();
    blueprint
        .services
        .get_mut("app")
        .unwrap()
        .relations
        .push(RelationDecl::Service {
            target: "cache".into(),
            interface: "redis".into(),
        });
    let mut planner = Planner::new(blueprint, test_environment(), "dep-1");
    match planner.plan() {
        Err(PlanError::Validation(ValidationError::UnknownService { service, target })) => {
            assert_eq!(service, "app");
            assert_eq!(target, "cache");
        }
        other => panic!("expected unknown-service error, got {other:?}"),
    }
}

#[test]
fn unmatched_criteria_is_rejected() {
    let mut blueprint = wordpress_blueprint();
    blueprint.services.get_mut("db").unwrap().component =
        ComponentCriteria::ByInterface("postgres".into());
    let mut planner = Planner::new(blueprint, test_environment(), "dep-1");
    assert!(matches!(
        planner.plan(),
        Err(PlanError::Validation(ValidationError::UnresolvedComponent(_)))
    ));
}

#[test]
fn planning_twice_is_rejected() {
    let mut planner = Planner::new(wordpress_blueprint(), test_environment(), "dep-1");
    planner.plan().unwrap();
    match planner.plan() {
        Err(PlanError::User(err)) => assert_eq!(err.code, ReasonCode::AlreadyPlanned),
        other => panic!("expected already-planned error, got {other:?}"),
    }
}

#[test]
fn mutually_requiring_components_are_a_dependency_cycle() {
    let frontend = Component {
        id: "frontend".into(),
        provider: PROVIDER.into(),
        resource_type: "application".into(),
        provides: vec![Provision {
            resource_type: "application".into(),
            interface: "http".into(),
        }],
        requires: BTreeMap::from([(
            "backend".into(),
            Requirement {
                resource_type: None,
                interface: "backend".into(),
                relation: RelationKind::Reference,
            },
        )]),
    };
    let backend = Component {
        id: "backend".into(),
        provider: PROVIDER.into(),
        resource_type: "service".into(),
        provides: vec![Provision {
            resource_type: "service".into(),
            interface: "backend".into(),
        }],
        requires: BTreeMap::from([(
            "front".into(),
            Requirement {
                resource_type: None,
                interface: "http".into(),
                relation: RelationKind::Reference,
            },
        )]),
    };
    let mut registry = ProviderRegistry::new();
    registry.register(
        PROVIDER,
        Arc::new(StaticCatalog::new(vec![frontend, backend])),
        Arc::new(TestFactory::default()),
    );
    let environment = Arc::new(Environment::new("cyclic", registry));

    let blueprint = Blueprint {
        name: "cyclic".into(),
        services: BTreeMap::from([(
            "svc".into(),
            ServiceSpec {
                component: ComponentCriteria::ById("frontend".into()),
                relations: Vec::new(),
                constraints: ServiceConstraints::default(),
            },
        )]),
        options: BTreeMap::new(),
        resources: BTreeMap::new(),
    };
    let mut planner = Planner::new(blueprint, environment, "dep-1");
    match planner.plan() {
        Err(PlanError::User(err)) => assert_eq!(err.code, ReasonCode::DependencyCycle),
        other => panic!("expected dependency-cycle error, got {other:?}"),
    }
}

#[test]
fn relation_without_a_service_defaults_to_the_declaring_service() {
    // etcd peers with itself over its own "peer" interface.
    let etcd = Component {
        id: "etcd".into(),
        provider: PROVIDER.into(),
        resource_type: "coordination".into(),
        provides: vec![Provision {
            resource_type: "coordination".into(),
            interface: "peer".into(),
        }],
        requires: BTreeMap::from([(
            "peer".into(),
            Requirement {
                resource_type: None,
                interface: "peer".into(),
                relation: RelationKind::Reference,
            },
        )]),
    };
    let mut registry = ProviderRegistry::new();
    registry.register(
        PROVIDER,
        Arc::new(StaticCatalog::new(vec![etcd])),
        Arc::new(TestFactory::default()),
    );
    let environment = Arc::new(Environment::new("cluster", registry));

    let blueprint = Blueprint {
        name: "cluster".into(),
        services: BTreeMap::from([(
            "kv".into(),
            ServiceSpec {
                component: ComponentCriteria::ById("etcd".into()),
                relations: vec![RelationDecl::Explicit {
                    key: None,
                    service: None,
                    interface: "peer".into(),
                    relation: RelationKind::Reference,
                    connect_from: None,
                }],
                constraints: ServiceConstraints::default(),
            },
        )]),
        options: BTreeMap::new(),
        resources: BTreeMap::new(),
    };
    let mut planner = Planner::new(blueprint, environment, "dep-1");
    let resolution = planner.plan().unwrap();

    // The omitted target falls back, with a warning, to the declaring
    // service itself.
    let kv = resolution.service("kv").unwrap();
    assert_eq!(kv.component.satisfied_requirements["peer"].service, "kv");
    assert!(resolution.connections.contains_key("kv-kv"));
}

#[test]
fn extra_relation_rebinds_an_already_satisfied_requirement() {
    let mut blueprint = wordpress_blueprint();
    blueprint.services.insert(
        "db2".into(),
        ServiceSpec {
            component: ComponentCriteria::ByInterface("mysql".into()),
            relations: Vec::new(),
            constraints: ServiceConstraints::default(),
        },
    );
    blueprint
        .services
        .get_mut("app")
        .unwrap()
        .relations
        .push(RelationDecl::Service {
            target: "db2".into(),
            interface: "mysql".into(),
        });
    let mut planner = Planner::new(blueprint, test_environment(), "dep-1");
    let resolution = planner.plan().unwrap();

    // wordpress carries a single "db" requirement; the second relation
    // reuses it with a warning, and the later binding wins. Both
    // connections are still recorded.
    let app = resolution.service("app").unwrap();
    assert_eq!(app.component.satisfied_requirements["db"].service, "db2");
    assert!(resolution.connections.contains_key("app-db"));
    assert!(resolution.connections.contains_key("app-db2"));
}

#[test]
fn static_resources_are_materialized_without_a_provider() {
    let mut blueprint = wordpress_blueprint();
    blueprint.resources.insert(
        "admin-user".into(),
        StaticResourceSpec::User {
            name: Some("admin".into()),
            password: None,
        },
    );
    let mut planner = Planner::new(blueprint, test_environment(), "dep-1");
    let resolution = planner.plan().unwrap();

    let user = resolution
        .resources
        .iter()
        .find(|r| r.resource_type == "user")
        .unwrap();
    assert!(user.provider.is_none());
    assert_eq!(user.desired_state["name"], "admin");
    assert!(user.desired_state["password"].as_str().unwrap().len() >= 8);
}

#[test]
fn scale_out_reuses_the_bound_component_and_rewires() {
    let mut planner = Planner::new(wordpress_blueprint(), test_environment(), "dep-1");
    planner.plan().unwrap();

    let added = planner.plan_additional_nodes("app", 1).unwrap();
    assert_eq!(added.len(), 1);
    let resolution = planner.resolution();
    let new_resource = resolution.resources.get(&added[0]).unwrap();
    assert_eq!(new_resource.component.as_deref(), Some("wordpress"));
    // The new instance picks up the database reference like its siblings.
    assert!(new_resource
        .relations
        .values()
        .any(|r| r.name == "app-db"));
}

#[tokio::test]
async fn verify_limits_collects_provider_warnings() {
    let environment = environment_with(TestFactory {
        limit_warning: Some("compute quota nearly exhausted".into()),
        ..TestFactory::default()
    });
    let mut planner = Planner::new(wordpress_blueprint(), environment, "dep-1");
    planner.plan().unwrap();

    let warnings = planner.verify_limits().await.unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].provider, PROVIDER);

    let access = planner.verify_access().await.unwrap();
    assert!(access.is_empty());
}
