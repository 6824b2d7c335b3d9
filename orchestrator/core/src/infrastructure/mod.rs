// Copyright (c) 2026 Drydock Systems
// SPDX-License-Identifier: AGPL-3.0

pub mod blueprint_parser;
pub mod event_bus;
pub mod memory;
