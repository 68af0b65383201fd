// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

/// An agent eligible to be considered as a responder.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub agent_id: String,
    /// Display name used for `@name` addressing, lowercased for matching.
    pub name: String,
}

/// Pure responder-selection logic. Given the channel's
/// agent membership (minus the sender, already applied by the caller),
/// the message text, and each agent's recent-consecutive-turn count in
/// this channel, return the ordered set of agents that should respond.
/// Deterministic and side-effect free — callers decide how to dispatch.
pub fn select_responders(
    candidates: &[Candidate],
    message_text: &str,
    consecutive_turns: &HashMap<String, u32>,
    max_consecutive_agent_turns: u32,
    max_responders_per_message: usize,
) -> Vec<String> {
    let addressed = addressed_agents(candidates, message_text);
    let pool: Vec<&Candidate> = if addressed.is_empty() {
        candidates.iter().collect()
    } else {
        candidates.iter().filter(|c| addressed.contains(&c.agent_id)).collect()
    };

    let mut selected: Vec<String> = pool
        .into_iter()
        .filter(|c| consecutive_turns.get(&c.agent_id).copied().unwrap_or(0) < max_consecutive_agent_turns)
        .map(|c| c.agent_id.clone())
        .collect();

    selected.truncate(max_responders_per_message);
    selected
}

/// Explicit `@name` references in `message_text` matching a candidate's
/// name, case-insensitively. Returns an empty set when nothing is
/// addressed, signalling "no addressing filter applies" to the caller.
fn addressed_agents(candidates: &[Candidate], message_text: &str) -> Vec<String> {
    let lower = message_text.to_lowercase();
    candidates
        .iter()
        .filter(|c| lower.contains(&format!("@{}", c.name.to_lowercase())))
        .map(|c| c.agent_id.clone())
        .collect()
}
