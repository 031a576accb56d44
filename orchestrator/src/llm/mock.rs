use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{LanguageModel, Prompt};
use crate::error::ModelError;
use crate::models::{Message, ToolCall};
use crate::tools::ActionDescriptor;

/// Scripted provider for tests and offline demos.
///
/// Completions and conversational turns are queued separately and handed out
/// in order. Every request is recorded so callers can assert on what the
/// model was shown.
#[derive(Default)]
pub struct ScriptedModel {
    completions: Mutex<VecDeque<String>>,
    turns: Mutex<VecDeque<Message>>,
    prompts: Mutex<Vec<Prompt>>,
    conversations: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the text returned by the next `complete` call.
    pub fn with_completion(self, text: impl Into<String>) -> Self {
        lock(&self.completions).push_back(text.into());
        self
    }

    /// Queues an assistant turn that requests the given tool calls.
    pub fn with_tool_calls<'a>(self, calls: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        let turn_index = lock(&self.turns).len();
        let tool_calls = calls
            .into_iter()
            .enumerate()
            .map(|(i, (name, args))| ToolCall {
                id: format!("call_{turn_index}_{i}"),
                name: name.to_string(),
                args,
                extra: Default::default(),
            })
            .collect();
        lock(&self.turns).push_back(Message::Assistant {
            content: String::new(),
            tool_calls,
        });
        self
    }

    /// Queues a final assistant turn with plain text.
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        lock(&self.turns).push_back(Message::Assistant {
            content: text.into(),
            tool_calls: Vec::new(),
        });
        self
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        lock(&self.prompts).clone()
    }

    pub fn completion_calls(&self) -> usize {
        lock(&self.prompts).len()
    }

    pub fn conversations(&self) -> Vec<Vec<Message>> {
        lock(&self.conversations).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &Prompt) -> Result<String, ModelError> {
        lock(&self.prompts).push(prompt.clone());
        lock(&self.completions)
            .pop_front()
            .ok_or_else(|| ModelError::Response("scripted model ran out of completions".into()))
    }

    async fn respond(
        &self,
        _system: &str,
        conversation: &[Message],
        _tools: &[ActionDescriptor],
    ) -> Result<Message, ModelError> {
        lock(&self.conversations).push(conversation.to_vec());
        lock(&self.turns)
            .pop_front()
            .ok_or_else(|| ModelError::Response("scripted model ran out of turns".into()))
    }
}
