// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::{CompletionRequest, ResponseEvent};

pub type ResponseStream = Pin<Box<dyn Stream<Item = anyhow::Result<ResponseEvent>> + Send>>;

/// The opaque LLM vendor seam. The Agent Runtime depends only on this
/// trait; concrete vendor adapters (HTTP, mock) live outside the
/// coordination plane per the runtime's non-goals.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model_name(&self) -> &str;
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream>;
}
