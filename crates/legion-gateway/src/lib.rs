// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
mod error;
mod http;
mod router;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use legion_bus::EventBus;
use legion_channels::ChannelService;
use legion_persona::PersonaEngine;
use tracing::info;

pub use error::ApiError;
pub use router::build_router;
pub use state::GatewayState;

/// Bind and serve the HTTP REST + WebSocket edge until the process is
/// signalled to stop. Blocks the calling task.
pub async fn serve(
    bind: SocketAddr,
    channels: Arc<ChannelService>,
    personas: Arc<PersonaEngine>,
    bus: EventBus,
) -> anyhow::Result<()> {
    let state = GatewayState::new(channels, personas, bus);
    let app = build_router(state);

    info!(%bind, "starting gateway HTTP server");
    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
