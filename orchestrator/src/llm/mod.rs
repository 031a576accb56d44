//! Model provider boundary.
//!
//! The pipeline only needs two things from a provider: plain text completion,
//! and a single conversational turn that may request tool calls. The
//! tool-calling loop on top of that is shared by every provider.

pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ModelError, PipelineError};
use crate::models::Message;
use crate::tools::{ActionDescriptor, ActionSet};

pub use gemini::{GeminiClient, GeminiClientConfig};
pub use mock::ScriptedModel;

#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generates text for a prompt with no tools bound.
    async fn complete(&self, prompt: &Prompt) -> Result<String, ModelError>;

    /// Produces the next assistant message for `conversation`. The reply may
    /// carry tool calls against `tools`.
    async fn respond(
        &self,
        system: &str,
        conversation: &[Message],
        tools: &[ActionDescriptor],
    ) -> Result<Message, ModelError>;

    /// Runs a tool-calling conversation to completion and returns every
    /// message exchanged, starting with the user prompt.
    ///
    /// Tool calls are executed one at a time in the order the model emits
    /// them. Non-fatal action errors are reported back to the model as tool
    /// output; fatal ones end the conversation.
    async fn complete_with_actions(
        &self,
        prompt: &Prompt,
        actions: &ActionSet,
        max_steps: usize,
    ) -> Result<Vec<Message>, PipelineError> {
        let tools = actions.descriptors();
        let mut messages = vec![Message::User {
            content: prompt.user.clone(),
        }];

        for step in 0..max_steps {
            let reply = self.respond(&prompt.system, &messages, &tools).await?;
            let calls = match &reply {
                Message::Assistant { tool_calls, .. } => tool_calls.clone(),
                _ => Vec::new(),
            };
            debug!(step, tool_calls = calls.len(), "model turn");
            messages.push(reply);

            if calls.is_empty() {
                return Ok(messages);
            }

            for call in calls {
                let output = match actions.invoke(&call.name, call.args).await {
                    Ok(output) => output,
                    Err(err) if err.is_fatal() => return Err(err.into()),
                    Err(err) => json!({ "error": format!("Error: {err}") }),
                };
                messages.push(Message::Tool {
                    call_id: call.id,
                    name: call.name,
                    content: tool_output_text(&output),
                });
            }
        }

        Err(ModelError::StepLimit(max_steps).into())
    }
}

fn tool_output_text(output: &Value) -> String {
    match output {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={}]", char_count));
    preview
}
