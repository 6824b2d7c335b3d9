// Copyright (c) 2026 Drydock Systems
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Pure deployment model: blueprints, components, resources, resolutions,
//! task graphs and workflow runtime state, plus the capability and
//! persistence contracts the outer layers implement. No I/O happens here.

pub mod blueprint;
pub mod component;
pub mod connection;
pub mod environment;
pub mod errors;
pub mod events;
pub mod repository;
pub mod resolution;
pub mod resource;
pub mod task;
pub mod workflow;
