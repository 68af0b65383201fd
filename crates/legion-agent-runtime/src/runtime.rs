// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use legion_model::{CompletionRequest, FunctionCall, Message, ModelProvider, ResponseEvent, ToolSchema};
use legion_sessions::{SessionKey, SessionStore, TurnEntry};
use legion_tools::{ToolCall, ToolOutput, ToolRegistry};
use tokio::sync::{mpsc, oneshot, Semaphore};

use crate::event::TurnEvent;
use crate::retry::retry_with_backoff;
use crate::template::render_instruction;

/// Everything a single `invoke` needs beyond the (agent_id, conversation_id,
/// new_message) triple. Grouped into one struct because the per-call
/// context is too large to pass as separate arguments.
pub struct InvokeRequest {
    pub agent_id: String,
    pub conversation_id: String,
    pub new_message: String,
    pub base_instruction: String,
    pub emotional_cue: String,
    pub history_cue: String,
    pub model: Arc<dyn ModelProvider>,
    pub tools: Arc<ToolRegistry>,
    pub allowed_tools: Vec<String>,
}

/// Drives the per-turn model ↔ tool loop.
/// Holds the process-wide LLM concurrency semaphore and the Session
/// Store; both are shared across all agents, never per-agent, since the
/// bound and the per-key lock are process-wide resources.
pub struct AgentRuntime {
    sessions: Arc<SessionStore>,
    semaphore: Arc<Semaphore>,
    max_tool_depth: u32,
    llm_timeout: Duration,
    tool_timeout: Duration,
}

impl AgentRuntime {
    pub fn new(
        sessions: Arc<SessionStore>,
        max_concurrent_invocations: usize,
        max_tool_depth: u32,
        llm_timeout: Duration,
        tool_timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            semaphore: Arc::new(Semaphore::new(max_concurrent_invocations)),
            max_tool_depth,
            llm_timeout,
            tool_timeout,
        }
    }

    /// `Idle → Preparing → Calling → (ToolPending ⇄ Calling)* → Finalizing
    /// → Done|Failed|Cancelled`. Returns a stream of
    /// `TurnEvent`; the caller drains it to drive the turn to completion.
    /// `cancel` resolving at any point aborts the in-flight LLM/tool call
    /// and releases the session lock without committing state changes.
    pub fn invoke(&self, req: InvokeRequest, cancel: oneshot::Receiver<()>) -> Pin<Box<dyn Stream<Item = TurnEvent> + Send>> {
        let sessions = self.sessions.clone();
        let semaphore = self.semaphore.clone();
        let max_tool_depth = self.max_tool_depth;
        let llm_timeout = self.llm_timeout;
        let tool_timeout = self.tool_timeout;

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            run_turn(req, cancel, sessions, semaphore, max_tool_depth, llm_timeout, tool_timeout, tx).await;
        });
        Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx))
    }
}

async fn run_turn(
    req: InvokeRequest,
    mut cancel: oneshot::Receiver<()>,
    sessions: Arc<SessionStore>,
    semaphore: Arc<Semaphore>,
    max_tool_depth: u32,
    llm_timeout: Duration,
    tool_timeout: Duration,
    tx: mpsc::Sender<TurnEvent>,
) {
    let permit = tokio::select! {
        permit = semaphore.acquire_owned() => match permit {
            Ok(p) => p,
            Err(_) => { let _ = tx.send(TurnEvent::Failed("runtime shutting down".into())).await; return; }
        },
        _ = &mut cancel => {
            let _ = tx.send(TurnEvent::Failed("Cancelled".into())).await;
            return;
        }
    };

    // Holding this guard for the entire turn — not just the final commit —
    // is what actually serializes invocations for the same (agent,
    // conversation): a second turn for the same key blocks here until this
    // one finishes, matching the intended "per-key mutex held for the
    // duration of a turn" policy.
    let key = SessionKey::new(req.agent_id.clone(), req.conversation_id.clone());
    let cell = sessions.cell(&key);
    let mut session = tokio::select! {
        guard = cell.lock_owned() => guard,
        _ = &mut cancel => {
            let _ = tx.send(TurnEvent::Failed("Cancelled".into())).await;
            drop(permit);
            return;
        }
    };

    let instruction = render_instruction(&req.base_instruction, &req.emotional_cue, &req.history_cue);
    let mut messages: Vec<Message> = vec![Message::system(instruction)];
    for entry in &session.history {
        if entry.role == "assistant" {
            messages.push(Message::assistant(entry.parts.clone()));
        } else {
            messages.push(Message::user(entry.parts.clone()));
        }
    }
    messages.push(Message::user(req.new_message.clone()));

    let schemas: Vec<ToolSchema> = req
        .tools
        .schemas_for(&req.allowed_tools)
        .into_iter()
        .map(|s| ToolSchema { name: s.name, description: s.description, parameters: s.parameters })
        .collect();

    let mut depth = 0u32;
    let final_text;
    loop {
        let request = CompletionRequest {
            messages: messages.clone(),
            tools: schemas.clone(),
            stream: true,
            system_dynamic_suffix: None,
        };

        let model = req.model.clone();
        let call = retry_with_backoff(|| {
            let model = model.clone();
            let request = request.clone();
            async move { tokio::time::timeout(llm_timeout, model.complete(request)).await.map_err(|_| anyhow::anyhow!("ModelTransient: llm call timed out"))? }
        });

        let stream_result = tokio::select! {
            result = call => result,
            _ = &mut cancel => {
                let _ = tx.send(TurnEvent::Failed("Cancelled".into())).await;
                drop(permit);
                return;
            }
        };

        let mut stream = match stream_result {
            Ok(s) => s,
            Err(e) => {
                let _ = tx.send(TurnEvent::Failed(e.to_string())).await;
                drop(permit);
                return;
            }
        };

        let mut text = String::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        let mut fatal: Option<String> = None;

        loop {
            let next = tokio::select! {
                item = stream.next() => item,
                _ = &mut cancel => {
                    let _ = tx.send(TurnEvent::Failed("Cancelled".into())).await;
                    drop(permit);
                    return;
                }
            };
            let Some(event) = next else { break };
            match event {
                Ok(ResponseEvent::TextDelta(delta)) => {
                    text.push_str(&delta);
                    let _ = tx.send(TurnEvent::PartialText(delta)).await;
                }
                Ok(ResponseEvent::ToolCall { id, name, arguments, .. }) => {
                    let args = serde_json::from_str(&arguments).unwrap_or(serde_json::Value::Null);
                    tool_calls.push(ToolCall { id, name, args });
                }
                Ok(ResponseEvent::Usage { .. }) | Ok(ResponseEvent::Done) => {}
                Ok(ResponseEvent::Error(msg)) => fatal = Some(msg),
                Err(e) => fatal = Some(e.to_string()),
            }
        }

        if let Some(reason) = fatal {
            let _ = tx.send(TurnEvent::Failed(reason)).await;
            drop(permit);
            return;
        }

        if tool_calls.is_empty() {
            final_text = text;
            break;
        }

        if depth >= max_tool_depth {
            let _ = tx.send(TurnEvent::Failed("max tool depth exceeded".into())).await;
            drop(permit);
            return;
        }
        depth += 1;

        if !text.is_empty() {
            messages.push(Message::assistant(text));
        }
        for call in &tool_calls {
            let _ = tx
                .send(TurnEvent::ToolCallRequested { id: call.id.clone(), name: call.name.clone(), arguments: call.args.clone() })
                .await;
            messages.push(Message::tool_call(
                call.id.clone(),
                FunctionCall { name: call.name.clone(), arguments: call.args.to_string() },
            ));

            let output: ToolOutput = if !req.allowed_tools.iter().any(|t| t == &call.name) {
                ToolOutput::err(&call.id, format!("tool not allowed for this agent: {}", call.name))
            } else {
                match tokio::time::timeout(tool_timeout, req.tools.execute(call)).await {
                    Ok(out) => out,
                    Err(_) => ToolOutput::err(&call.id, "tool execution timed out"),
                }
            };
            let _ = tx
                .send(TurnEvent::ToolResult { id: output.call_id.clone(), content: output.content.clone(), is_error: output.is_error })
                .await;
            messages.push(Message::tool_result(output.call_id.clone(), output.content.clone()));
        }
    }

    drop(permit);

    if !final_text.is_empty() {
        let entries = vec![TurnEntry::new("user", req.new_message.clone()), TurnEntry::new("assistant", final_text.clone())];
        session.append_history(entries, sessions.max_history());
        session.version += 1;
    }
    drop(session);

    let _ = tx.send(TurnEvent::FinalText(final_text)).await;
}
