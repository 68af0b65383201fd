// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
mod send_channel_message;

pub use send_channel_message::{ChannelPoster, SendChannelMessageTool};
