// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0

/// Fill the `{{emotional_cue}}` / `{{history_cue}}` slots in a persona's
/// base instruction text. Purely textual and side-effect free: identical
/// inputs always yield identical prompt bytes.
pub fn render_instruction(base_instruction: &str, emotional_cue: &str, history_cue: &str) -> String {
    base_instruction
        .replace("{{emotional_cue}}", emotional_cue)
        .replace("{{history_cue}}", history_cue)
}
