// Executor Agent: Runs a plan through a tool-calling model bound to the action set

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::llm::{truncate_for_log, LanguageModel, Prompt};
use crate::models::{Message, Plan};
use crate::tools::ActionSet;

pub const DEFAULT_MAX_STEPS: usize = 25;

pub const FALLBACK_HEADING: &str = "Tool execution results:";
pub const NO_RESULTS: &str = "No results available from tool execution.";

const SYSTEM_PROMPT: &str = "You are an Executor agent that executes plans using available tools.\n\
You will receive a JSON string representing an execution plan.\n\
Rules:\n\
- Execute steps strictly in order\n\
- Use ONLY the provided tools\n\
- Do NOT invent tools or inputs\n\
- Return the raw tool outputs";

const MESSAGE_PREVIEW_CHARS: usize = 200;

pub struct ExecutorAgent {
    model: Arc<dyn LanguageModel>,
    actions: Arc<ActionSet>,
    max_steps: usize,
}

impl ExecutorAgent {
    pub fn new(model: Arc<dyn LanguageModel>, actions: Arc<ActionSet>) -> Self {
        Self {
            model,
            actions,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub async fn execute(&self, plan: &Plan) -> Result<String, PipelineError> {
        let plan_text = plan.to_pretty_json();
        info!(steps = plan.steps.len(), "Executor: Invoking executor agent with tools");
        debug!("Plan to execute:\n{}", plan_text);

        let prompt = Prompt::new(SYSTEM_PROMPT, plan_text);
        let messages = self
            .model
            .complete_with_actions(&prompt, &self.actions, self.max_steps)
            .await?;

        info!(messages = messages.len(), "Received messages from executor");
        for (i, message) in messages.iter().enumerate() {
            debug!(
                index = i + 1,
                kind = message.kind(),
                content = %truncate_for_log(message.content(), MESSAGE_PREVIEW_CHARS),
                "executor message"
            );
        }

        Ok(summarize_execution(&messages))
    }
}

/// Picks the execution summary from a finished tool-calling conversation.
///
/// The final message's text wins. If it is blank, the raw tool results are
/// joined under a heading; with no tool results either, a fixed sentinel is
/// returned.
pub fn summarize_execution(messages: &[Message]) -> String {
    let output = messages.last().map(Message::content).unwrap_or_default();
    if !output.trim().is_empty() {
        return output.to_string();
    }

    warn!("Executor returned empty content. Using tool results as fallback.");
    let tool_results: Vec<&str> = messages
        .iter()
        .filter_map(|message| match message {
            Message::Tool { content, .. } => Some(content.as_str()),
            _ => None,
        })
        .collect();

    if tool_results.is_empty() {
        NO_RESULTS.to_string()
    } else {
        format!("{}\n\n{}", FALLBACK_HEADING, tool_results.join("\n\n"))
    }
}
