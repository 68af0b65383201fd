// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use legion_bus::EventBus;
use legion_channels::ChannelService;
use legion_persona::PersonaEngine;

/// Shared state handed to every axum handler. Cheap to clone — every field
/// is already an `Arc` or internally reference-counted.
#[derive(Clone)]
pub struct GatewayState {
    pub channels: Arc<ChannelService>,
    pub personas: Arc<PersonaEngine>,
    pub bus: EventBus,
}

impl GatewayState {
    pub fn new(channels: Arc<ChannelService>, personas: Arc<PersonaEngine>, bus: EventBus) -> Self {
        Self { channels, personas, bus }
    }
}
