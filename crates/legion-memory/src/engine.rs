// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;

use crate::types::{EpisodicEntry, SemanticAssertion, TurnRecord, WorkingEntry};

struct AgentMemory {
    working: VecDeque<WorkingEntry>,
    episodic: Vec<EpisodicEntry>,
    semantic: HashMap<String, SemanticAssertion>,
    inserts_since_consolidation: usize,
}

impl AgentMemory {
    fn new() -> Self {
        Self {
            working: VecDeque::new(),
            episodic: Vec::new(),
            semantic: HashMap::new(),
            inserts_since_consolidation: 0,
        }
    }
}

/// Owns all three memory layers exclusively, keyed by `agent_id`. Each
/// agent's memory sits behind its own async lock, the same sharded-registry
/// shape used by `legion_sessions::SessionStore` and
/// `legion_persona::PersonaEngine`.
pub struct MemoryEngine {
    agents: std::sync::Mutex<HashMap<String, Arc<AsyncMutex<AgentMemory>>>>,
    working_memory_size: usize,
    episodic_salience_threshold: f32,
    consolidation_interval: usize,
}

impl MemoryEngine {
    pub fn new(working_memory_size: usize, episodic_salience_threshold: f32, consolidation_interval: usize) -> Self {
        Self {
            agents: std::sync::Mutex::new(HashMap::new()),
            working_memory_size,
            episodic_salience_threshold,
            consolidation_interval,
        }
    }

    pub fn from_config(cfg: &legion_config::MemoryConfig) -> Self {
        Self::new(cfg.working_memory_size, cfg.episodic_salience_threshold, cfg.consolidation_interval)
    }

    fn entry(&self, agent_id: &str) -> Arc<AsyncMutex<AgentMemory>> {
        self.agents
            .lock()
            .unwrap()
            .entry(agent_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(AgentMemory::new())))
            .clone()
    }

    /// Insert a completed turn into working memory, promote it to
    /// episodic if salient enough, and opportunistically consolidate into
    /// semantic memory every `consolidation_interval` episodic inserts
    ///.
    pub async fn observe_turn(&self, record: TurnRecord) {
        let cell = self.entry(&record.agent_id);
        let mut mem = cell.lock().await;

        mem.working.push_back(WorkingEntry { content: record.content.clone(), timestamp: Utc::now() });
        while mem.working.len() > self.working_memory_size {
            mem.working.pop_front();
        }

        if record.salience >= self.episodic_salience_threshold {
            mem.episodic.push(EpisodicEntry {
                content: record.content,
                context: record.channel_id,
                timestamp: Utc::now(),
                salience: record.salience,
            });
            mem.inserts_since_consolidation += 1;

            if mem.inserts_since_consolidation >= self.consolidation_interval {
                consolidate(&mut mem);
                mem.inserts_since_consolidation = 0;
            }
        }
    }

    /// Concatenate the last `n` of `latest_messages` plus up to `k`
    /// retrieved episodic/semantic items ranked by salience × recency.
    /// Never mutates state.
    pub async fn compose_history_cue(&self, agent_id: &str, latest_messages: &[String], n: usize, k: usize) -> String {
        let cell = self.entry(agent_id);
        let mem = cell.lock().await;

        let recent: Vec<&String> = latest_messages.iter().rev().take(n).collect();
        let mut lines: Vec<String> = recent.into_iter().rev().map(|m| format!("- {m}")).collect();

        let now = Utc::now();
        let mut ranked: Vec<(f32, String)> = mem
            .episodic
            .iter()
            .map(|e| {
                let age_seconds = (now - e.timestamp).num_seconds().max(0) as f32;
                let recency = 1.0 / (1.0 + age_seconds / 3600.0);
                (e.salience * recency, format!("recall: {}", e.content))
            })
            .chain(mem.semantic.values().map(|a| {
                let age_seconds = (now - a.last_reinforced).num_seconds().max(0) as f32;
                let recency = 1.0 / (1.0 + age_seconds / 3600.0);
                (a.confidence * recency, format!("known: {} — {}", a.concept, a.assertion))
            }))
            .collect();
        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        for (_, line) in ranked.into_iter().take(k) {
            lines.push(line);
        }

        lines.join("\n")
    }
}

/// Pure summarization pass: merge recent episodic entries into semantic
/// assertions keyed by their leading word, deduplicating and averaging
/// confidence on repeat reinforcement.
fn consolidate(mem: &mut AgentMemory) {
    for entry in &mem.episodic {
        let concept = entry
            .content
            .split_whitespace()
            .next()
            .unwrap_or("misc")
            .to_lowercase();
        mem.semantic
            .entry(concept.clone())
            .and_modify(|a| {
                a.confidence = (a.confidence + entry.salience) / 2.0;
                a.last_reinforced = Utc::now();
            })
            .or_insert_with(|| SemanticAssertion {
                concept,
                assertion: entry.content.clone(),
                confidence: entry.salience,
                last_reinforced: Utc::now(),
            });
    }
}
