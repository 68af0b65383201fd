// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
mod orchestrator;
mod selection;

pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use selection::{select_responders, Candidate};
