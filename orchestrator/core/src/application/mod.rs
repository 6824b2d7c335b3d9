// Copyright (c) 2026 Drydock Systems
// SPDX-License-Identifier: AGPL-3.0

pub mod exceptions;
pub mod planner;
pub mod spec_builder;
pub mod status;
