// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn clamp(v: f32, lo: f32, hi: f32) -> f32 {
    v.max(lo).min(hi)
}

/// Six-scalar mood vector. `valence` ranges `[-1, 1]`; the
/// rest range `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mood {
    pub valence: f32,
    pub arousal: f32,
    pub dominance: f32,
    pub curiosity: f32,
    pub creativity: f32,
    pub sociability: f32,
}

impl Default for Mood {
    fn default() -> Self {
        Self {
            valence: 0.0,
            arousal: 0.5,
            dominance: 0.5,
            curiosity: 0.5,
            creativity: 0.5,
            sociability: 0.5,
        }
    }
}

impl Mood {
    fn clamp(&mut self) {
        self.valence = clamp(self.valence, -1.0, 1.0);
        self.arousal = clamp(self.arousal, 0.0, 1.0);
        self.dominance = clamp(self.dominance, 0.0, 1.0);
        self.curiosity = clamp(self.curiosity, 0.0, 1.0);
        self.creativity = clamp(self.creativity, 0.0, 1.0);
        self.sociability = clamp(self.sociability, 0.0, 1.0);
    }
}

/// Relationship an agent holds toward another entity.
/// `trust`/`respect`/`affection` range `[-100, 100]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpinionScore {
    pub trust: f32,
    pub respect: f32,
    pub affection: f32,
    pub interaction_count: u32,
    pub last_interaction: DateTime<Utc>,
    pub notable_events: Vec<String>,
}

impl OpinionScore {
    pub fn neutral() -> Self {
        Self {
            trust: 0.0,
            respect: 0.0,
            affection: 0.0,
            interaction_count: 0,
            last_interaction: Utc::now(),
            notable_events: Vec::new(),
        }
    }

    /// Upgrade a legacy single-scalar opinion value into the structured
    /// form. The legacy value is assumed to
    /// be in `[-1, 1]`; it is clamped first, then scaled equally into all
    /// three components.
    pub fn from_legacy_numeric(value: f32) -> Self {
        let scaled = clamp(value, -1.0, 1.0) * 100.0;
        Self {
            trust: scaled,
            respect: scaled,
            affection: scaled,
            interaction_count: 1,
            last_interaction: Utc::now(),
            notable_events: Vec::new(),
        }
    }

    fn clamp(&mut self) {
        self.trust = clamp(self.trust, -100.0, 100.0);
        self.respect = clamp(self.respect, -100.0, 100.0);
        self.affection = clamp(self.affection, -100.0, 100.0);
    }
}

/// Per-entity opinion deltas produced by appraising a completed turn.
#[derive(Debug, Clone, Default)]
pub struct OpinionDelta {
    pub trust: f32,
    pub respect: f32,
    pub affection: f32,
}

/// Inputs distilled from a completed turn, used to compute bounded
/// emotional deltas (`observe_turn`).
#[derive(Debug, Clone, Default)]
pub struct Appraisal {
    pub valence_delta: f32,
    pub arousal_delta: f32,
    pub opinion_deltas: HashMap<String, OpinionDelta>,
}

/// Mutable per-agent emotional state. Invariant: every
/// field stays within its declared interval after any update; `version`
/// strictly increases on write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionalState {
    pub mood: Mood,
    pub energy: f32,
    pub stress: f32,
    pub opinions: HashMap<String, OpinionScore>,
    pub version: u64,
    pub last_updated: DateTime<Utc>,
}

impl EmotionalState {
    /// Initial state on spawn: neutral mood, energy 0.7, stress 0.1, no
    /// opinions.
    pub fn initial() -> Self {
        Self {
            mood: Mood::default(),
            energy: 0.7,
            stress: 0.1,
            opinions: HashMap::new(),
            version: 0,
            last_updated: Utc::now(),
        }
    }

    /// Apply a bounded-delta update from a completed turn. Deltas are
    /// clamped to `±mood_delta_cap` / `±opinion_delta_cap` before being
    /// added, then the result is clamped to the field's own interval.
    /// Always increments `version`, even when the appraisal is empty —
    /// the system's own elapsed-time drift (mild stress decay) still
    /// counts as an update.
    pub fn observe_turn(&mut self, appraisal: &Appraisal, mood_delta_cap: f32, opinion_delta_cap: f32) {
        let valence_delta = clamp(appraisal.valence_delta, -mood_delta_cap, mood_delta_cap);
        let arousal_delta = clamp(appraisal.arousal_delta, -mood_delta_cap, mood_delta_cap);
        self.mood.valence += valence_delta;
        self.mood.arousal += arousal_delta;
        self.mood.clamp();

        // Mild stress decay toward baseline every turn, bounded by the same cap.
        let stress_decay = clamp(0.02, -mood_delta_cap, mood_delta_cap);
        self.stress = clamp(self.stress - stress_decay, 0.0, 1.0);

        for (entity_id, delta) in &appraisal.opinion_deltas {
            let opinion = self
                .opinions
                .entry(entity_id.clone())
                .or_insert_with(OpinionScore::neutral);
            opinion.trust += clamp(delta.trust, -opinion_delta_cap, opinion_delta_cap);
            opinion.respect += clamp(delta.respect, -opinion_delta_cap, opinion_delta_cap);
            opinion.affection += clamp(delta.affection, -opinion_delta_cap, opinion_delta_cap);
            opinion.clamp();
            opinion.interaction_count += 1;
            opinion.last_interaction = Utc::now();
        }

        self.version += 1;
        self.last_updated = Utc::now();
    }

    /// One-to-three-sentence deterministic rendering of the current
    /// state, optionally informed by the opinion held of `addressee`.
    /// Idempotent; does not mutate state.
    pub fn compose_cue(&self, addressee: Option<&str>) -> String {
        let mood_word = if self.mood.valence > 0.3 {
            "upbeat"
        } else if self.mood.valence < -0.3 {
            "irritable"
        } else {
            "even-keeled"
        };
        let energy_word = if self.energy > 0.6 {
            "energetic"
        } else if self.energy < 0.3 {
            "tired"
        } else {
            "steady"
        };
        let mut cue = format!("You are feeling {mood_word} and {energy_word}.");

        if self.stress > 0.6 {
            cue.push_str(" You are under noticeable stress.");
        }

        if let Some(addressee) = addressee {
            if let Some(opinion) = self.opinions.get(addressee) {
                let disposition = if opinion.trust > 30.0 {
                    "trust"
                } else if opinion.trust < -30.0 {
                    "distrust"
                } else {
                    "are neutral toward"
                };
                cue.push_str(&format!(" You {disposition} {addressee}."));
            }
        }

        cue
    }
}
