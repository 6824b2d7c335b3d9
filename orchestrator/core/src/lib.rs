// Copyright (c) 2026 Drydock Systems
// SPDX-License-Identifier: AGPL-3.0
//! Drydock Orchestrator Core
//!
//! Turns a declarative deployment blueprint into a concrete resource graph,
//! compiles that graph into an executable task DAG, and repairs failed tasks
//! with bounded reset sub-workflows.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Pipeline:** `Planner::plan` -> `Resolution` ->
//!   `WorkflowSpecBuilder::create_build_spec` -> `WorkflowSpec` ->
//!   (external execution engine) -> `ExceptionHandlerChain::handle`

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
