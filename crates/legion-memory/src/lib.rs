// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
mod engine;
mod types;

pub use engine::MemoryEngine;
pub use types::{estimate_salience, EpisodicEntry, SemanticAssertion, TurnRecord, WorkingEntry};
