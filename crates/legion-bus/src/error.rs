// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Closed error taxonomy surfaced by the runtime core.
/// `ConcurrencyConflict` and `ModelTransient` are locally recovered by
/// their respective callers (Session Store / Agent Runtime); everything
/// else propagates to the caller unchanged.
#[derive(Debug, Error)]
pub enum LegionError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("not authorized: {0}")]
    NotAuthorized(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("concurrency conflict on {0}")]
    ConcurrencyConflict(String),

    #[error("transient model error: {0}")]
    ModelTransient(String),

    #[error("fatal model error: {0}")]
    ModelFatal(String),

    #[error("tool failed: {0}")]
    ToolFailed(String),

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl LegionError {
    /// Whether this error kind is recovered locally rather
    /// than surfaced to the caller.
    pub fn is_locally_recoverable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict(_) | Self::ModelTransient(_))
    }
}
