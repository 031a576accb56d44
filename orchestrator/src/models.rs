use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// An execution plan as produced by the planner.
///
/// `raw` is kept verbatim because it is what the executor model sees; `steps`
/// is the ordered view used for logging and validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub raw: Value,
    pub steps: Vec<PlanStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub action: String,
    pub args: Map<String, Value>,
}

const STEP_LIST_KEYS: [&str; 4] = ["steps", "plan", "actions", "tasks"];
const STEP_NAME_KEYS: [&str; 4] = ["action", "tool", "tool_name", "name"];
const STEP_ARG_KEYS: [&str; 5] = ["args", "arguments", "input", "params", "parameters"];

impl Plan {
    pub fn from_value(raw: Value) -> Self {
        let steps = extract_steps(&raw);
        Self { raw, steps }
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.raw).unwrap_or_else(|_| self.raw.to_string())
    }
}

fn extract_steps(raw: &Value) -> Vec<PlanStep> {
    let items = match raw {
        Value::Array(items) => items,
        Value::Object(map) => match STEP_LIST_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
        {
            Some(items) => items,
            // A bare single-step object.
            None => return step_from_value(raw).into_iter().collect(),
        },
        _ => return Vec::new(),
    };
    items.iter().filter_map(step_from_value).collect()
}

fn step_from_value(value: &Value) -> Option<PlanStep> {
    let map = value.as_object()?;
    let action = STEP_NAME_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))?
        .to_string();
    let args = STEP_ARG_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_object))
        .cloned()
        .unwrap_or_default();
    Some(PlanStep { action, args })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: Value,
    /// Provider fields that must travel back with the call on the next turn,
    /// such as Gemini thought signatures.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// One entry of a tool-calling conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default)]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        call_id: String,
        name: String,
        content: String,
    },
}

impl Message {
    pub fn content(&self) -> &str {
        match self {
            Message::User { content }
            | Message::Assistant { content, .. }
            | Message::Tool { content, .. } => content,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }
}

/// State threaded through the pipeline. Each optional field is written once,
/// by the stage that owns it.
#[derive(Debug, Clone, Serialize)]
pub struct RunState {
    pub run_id: Uuid,
    pub task: String,
    pub plan: Option<Plan>,
    pub execution_result: Option<String>,
    pub final_output: Option<String>,
}

impl RunState {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            task: task.into(),
            plan: None,
            execution_result: None,
            final_output: None,
        }
    }
}

// API Request/Response models
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub task: String,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub run_id: Uuid,
    pub task: String,
    pub plan: Option<Value>,
    pub execution_result: Option<String>,
    pub final_output: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl From<RunState> for RunResponse {
    fn from(state: RunState) -> Self {
        Self {
            run_id: state.run_id,
            task: state.task,
            plan: state.plan.map(|plan| plan.raw),
            execution_result: state.execution_result,
            final_output: state.final_output,
            completed_at: Utc::now(),
        }
    }
}
