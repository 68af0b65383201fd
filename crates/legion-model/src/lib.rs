// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
mod mock;
mod openai_compat;
mod provider;
mod types;

pub use mock::{MockProvider, ScriptedMockProvider};
pub use openai_compat::OpenAiCompatProvider;
pub use provider::{ModelProvider, ResponseStream};
pub use types::*;

use anyhow::bail;
use legion_config::ModelConfig;

/// Construct a boxed [`ModelProvider`] from configuration. Only two
/// drivers are recognized: `mock` (in-process, no network) and
/// `openai-compat`, which speaks the `/chat/completions` SSE format
/// used by OpenAI itself and most self-hosted gateways. The vendor SDK
/// integration that selects between dozens of branded providers is
/// explicitly out of scope for the coordination plane.
pub fn from_config(cfg: &ModelConfig) -> anyhow::Result<Box<dyn ModelProvider>> {
    match cfg.provider.as_str() {
        "mock" => Ok(Box::new(MockProvider)),
        "openai-compat" | "openai" => {
            let key = cfg.api_key.clone().or_else(|| {
                cfg.api_key_env
                    .as_ref()
                    .and_then(|env| std::env::var(env).ok())
            });
            let base_url = cfg
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
            Ok(Box::new(OpenAiCompatProvider::new(
                cfg.name.clone(),
                key,
                &base_url,
                cfg.max_tokens,
                cfg.temperature,
            )))
        }
        other => bail!("unknown model provider: {other:?} (expected \"mock\" or \"openai-compat\")"),
    }
}
