//! Gemini client over the `generateContent` REST endpoint, including
//! function calling for the executor's tool loop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::{truncate_for_log, LanguageModel, Prompt};
use crate::config::Config;
use crate::error::ModelError;
use crate::models::{Message, ToolCall};
use crate::tools::ActionDescriptor;

const MAX_LLM_OUTPUT_LOG_CHARS: usize = 2_000;

/// Schema keywords Gemini accepts in function declarations.
const SCHEMA_KEYS: [&str; 7] = ["type", "format", "description", "nullable", "enum", "required", "items"];

#[derive(Debug, Clone)]
pub struct GeminiClientConfig {
    pub api_key: String,
    /// Model name (e.g., "gemini-2.5-flash-lite").
    pub model: String,
    pub endpoint: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for GeminiClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.5-flash-lite".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: 0.1,
            max_output_tokens: 1000,
            timeout_secs: 60,
        }
    }
}

impl From<&Config> for GeminiClientConfig {
    fn from(config: &Config) -> Self {
        Self {
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
            endpoint: config.gemini_endpoint.clone(),
            temperature: config.model_temperature,
            max_output_tokens: config.model_max_output_tokens,
            timeout_secs: config.model_timeout_secs,
        }
    }
}

pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiClientConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiClientConfig) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ModelError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn build_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    fn request(&self, system: &str, contents: Vec<Content>, tools: &[ActionDescriptor]) -> GeminiRequest {
        let tools = if tools.is_empty() {
            Vec::new()
        } else {
            vec![Tool {
                function_declarations: tools
                    .iter()
                    .map(|tool| FunctionDeclaration {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: gemini_schema(&tool.input_schema),
                    })
                    .collect(),
            }]
        };
        GeminiRequest {
            contents,
            system_instruction: (!system.is_empty()).then(|| Content {
                role: None,
                parts: vec![Part::text(system)],
            }),
            tools,
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
        }
    }

    async fn generate(&self, body: &GeminiRequest) -> Result<Content, ModelError> {
        info!(
            model = %self.config.model,
            contents = body.contents.len(),
            tools = body.tools.first().map_or(0, |t| t.function_declarations.len()),
            "gemini request prepared"
        );

        // The key travels as a header so it never shows up in URL-bearing errors.
        let response = self
            .client
            .post(self.build_url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ModelError::Http(e.without_url().to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ModelError::Response(format!("HTTP {}: {}", status, text)));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ModelError::Http(e.without_url().to_string()))?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                llm_output = %truncate_for_log(&text, MAX_LLM_OUTPUT_LOG_CHARS),
                "gemini raw response"
            );
        }

        let parsed: GeminiResponse =
            serde_json::from_str(&text).map_err(|e| ModelError::Serialization(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(ModelError::Response(format!(
                "Gemini API error: {}",
                error.message
            )));
        }
        if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ModelError::Response(format!("prompt blocked: {reason}")));
        }

        Ok(parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .unwrap_or_default())
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String, ModelError> {
        let body = self.request(
            &prompt.system,
            vec![Content::user(vec![Part::text(&prompt.user)])],
            &[],
        );
        Ok(self.generate(&body).await?.text())
    }

    async fn respond(
        &self,
        system: &str,
        conversation: &[Message],
        tools: &[ActionDescriptor],
    ) -> Result<Message, ModelError> {
        let body = self.request(system, to_contents(conversation), tools);
        let content = self.generate(&body).await?;
        Ok(to_assistant_message(content, conversation.len()))
    }
}

/// Maps the conversation onto Gemini turns. Consecutive tool results are
/// grouped into one turn, matching the calls of the preceding model turn.
fn to_contents(conversation: &[Message]) -> Vec<Content> {
    let mut contents: Vec<Content> = Vec::new();
    for message in conversation {
        match message {
            Message::User { content } => contents.push(Content::user(vec![Part::text(content)])),
            Message::Assistant { content, tool_calls } => {
                let mut parts = Vec::new();
                if !content.is_empty() {
                    parts.push(Part::text(content));
                }
                parts.extend(tool_calls.iter().map(|call| Part {
                    function_call: Some(FunctionCall {
                        name: call.name.clone(),
                        args: call.args.clone(),
                    }),
                    extra: call.extra.clone(),
                    ..Part::default()
                }));
                contents.push(Content {
                    role: Some("model".to_string()),
                    parts,
                });
            }
            Message::Tool { name, content, .. } => {
                let part = Part {
                    function_response: Some(FunctionResponse {
                        name: name.clone(),
                        response: response_object(content),
                    }),
                    ..Part::default()
                };
                match contents.last_mut() {
                    Some(last) if last.is_function_responses() => last.parts.push(part),
                    _ => contents.push(Content::user(vec![part])),
                }
            }
        }
    }
    contents
}

fn to_assistant_message(content: Content, turn: usize) -> Message {
    let text = content.text();
    let tool_calls = content
        .parts
        .into_iter()
        .filter_map(|part| {
            let Part { function_call, extra, .. } = part;
            function_call.map(|call| (call, extra))
        })
        .enumerate()
        .map(|(i, (call, extra))| ToolCall {
            id: format!("call_{turn}_{i}"),
            name: call.name,
            args: if call.args.is_null() { json!({}) } else { call.args },
            extra,
        })
        .collect();
    Message::Assistant {
        content: text,
        tool_calls,
    }
}

/// Function responses must be JSON objects.
fn response_object(content: &str) -> Value {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(other) => json!({ "result": other }),
        Err(_) => json!({ "result": content }),
    }
}

/// Reduces a JSON schema to the subset Gemini accepts.
fn gemini_schema(schema: &Value) -> Value {
    let Some(map) = schema.as_object() else {
        return json!({ "type": "object", "properties": {} });
    };
    let mut out = Map::new();
    for key in SCHEMA_KEYS {
        if let Some(value) = map.get(key) {
            let value = if key == "items" { gemini_schema(value) } else { value.clone() };
            out.insert(key.to_string(), value);
        }
    }
    if let Some(properties) = map.get("properties").and_then(Value::as_object) {
        let properties = properties
            .iter()
            .map(|(name, prop)| (name.clone(), gemini_schema(prop)))
            .collect();
        out.insert("properties".to_string(), Value::Object(properties));
    }
    Value::Object(out)
}

// Gemini API request/response structures

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts,
        }
    }

    fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }

    fn is_function_responses(&self) -> bool {
        !self.parts.is_empty() && self.parts.iter().all(|p| p.function_response.is_some())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
    /// Fields this client does not model (e.g. `thoughtSignature`), kept so
    /// they can be sent back unchanged.
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}
