// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
mod channel;
mod poster;
mod service;

pub use channel::{Channel, ChannelSpec, ChannelType, Message, MessageKind, SenderKind};
pub use poster::ServiceChannelPoster;
pub use service::ChannelService;
