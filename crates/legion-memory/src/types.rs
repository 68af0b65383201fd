// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Distilled facts about one completed turn, the input to `observe_turn`.
/// `salience` is expected in `[0, 1]`; callers that have no better signal
/// can derive one with [`estimate_salience`].
#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub agent_id: String,
    pub channel_id: String,
    pub content: String,
    pub salience: f32,
}

/// Cheap length/keyword heuristic for callers that don't compute their
/// own salience score. Longer turns and turns mentioning a decision or
/// request are treated as more worth remembering.
pub fn estimate_salience(content: &str) -> f32 {
    let length_component = (content.len() as f32 / 400.0).min(1.0);
    let keyword_component = if ["decide", "remember", "important", "promise", "always", "never"]
        .iter()
        .any(|kw| content.to_lowercase().contains(kw))
    {
        0.3
    } else {
        0.0
    };
    (length_component + keyword_component).min(1.0)
}

/// One entry in working memory: the bounded recent-observation ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingEntry {
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// One append-only episodic entry: a salient turn summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodicEntry {
    pub content: String,
    pub context: String,
    pub timestamp: DateTime<Utc>,
    pub salience: f32,
}

/// One semantic assertion: a deduplicated concept → claim pair with a
/// confidence score, produced by consolidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticAssertion {
    pub concept: String,
    pub assertion: String,
    pub confidence: f32,
    pub last_reinforced: DateTime<Utc>,
}
