// Planner Agent: Converts a free-text task into a JSON execution plan

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::error::{PipelineError, PlanError};
use crate::llm::{LanguageModel, Prompt};
use crate::models::Plan;
use crate::tools::ActionSet;

pub struct PlannerAgent {
    model: Arc<dyn LanguageModel>,
    system_prompt: String,
}

impl PlannerAgent {
    pub fn new(model: Arc<dyn LanguageModel>, actions: &ActionSet) -> Self {
        Self {
            model,
            system_prompt: build_system_prompt(actions),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub async fn plan(&self, task: &str) -> Result<Plan, PipelineError> {
        info!("Planner: Decomposing task: {}", task);

        let prompt = Prompt::new(self.system_prompt.clone(), task);
        let response = self.model.complete(&prompt).await?;

        match parse_plan(&response) {
            Ok(plan) => {
                info!(step_count = plan.steps.len(), "planner parsed plan");
                Ok(plan)
            }
            Err(e) => {
                warn!("JSON Parsing failed. Raw Output: {}", response);
                Err(e.into())
            }
        }
    }
}

fn build_system_prompt(actions: &ActionSet) -> String {
    let tool_descriptions = actions
        .descriptors()
        .iter()
        .map(|d| format!("- {}: {}", d.name, d.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a Planner agent.\n\
         Convert the user request into a JSON execution plan.\n\
         Available Tools:\n{tool_descriptions}\n\n\
         Rules:\n\
         - Output ONLY valid JSON\n\
         - Do NOT execute tools\n\
         - Use tool names exactly as specified\n\
         - Use the shape {{\"steps\": [{{\"tool\": \"<tool name>\", \"args\": {{...}}}}]}}, \
         listing steps in execution order"
    )
}

/// Removes a surrounding markdown fence, preferring a `json`-tagged one.
/// Text outside the first fenced block is dropped.
pub fn strip_code_fence(response: &str) -> &str {
    let cleaned = response.trim();
    let inner = if let Some((_, rest)) = cleaned.split_once("```json") {
        rest.split("```").next().unwrap_or(rest)
    } else if cleaned.contains("```") {
        cleaned.split("```").nth(1).unwrap_or(cleaned)
    } else {
        cleaned
    };
    inner.trim()
}

pub fn parse_plan(response: &str) -> Result<Plan, PlanError> {
    let cleaned = strip_code_fence(response);
    let raw: Value = serde_json::from_str(cleaned).map_err(|source| PlanError::Parse {
        source,
        raw: response.to_string(),
    })?;

    let kind = match &raw {
        Value::Object(_) | Value::Array(_) => return Ok(Plan::from_value(raw)),
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
    };
    Err(PlanError::NotStructured {
        kind,
        raw: response.to_string(),
    })
}

/// Checks every step against the registry before anything runs: the action
/// must exist and each argument its schema marks as required must be present.
pub fn validate_plan(plan: &Plan, actions: &ActionSet) -> Result<(), PlanError> {
    if plan.steps.is_empty() {
        return Err(PlanError::Validation("plan contains no recognizable steps".into()));
    }
    for (index, step) in plan.steps.iter().enumerate() {
        let action = actions.get(&step.action).ok_or_else(|| {
            PlanError::Validation(format!("step {} uses unknown action `{}`", index + 1, step.action))
        })?;
        let missing: Vec<&str> = action
            .descriptor()
            .required_args()
            .into_iter()
            .filter(|name| !step.args.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            return Err(PlanError::Validation(format!(
                "step {} (`{}`) is missing required argument(s): {}",
                index + 1,
                step.action,
                missing.join(", ")
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::llm::ScriptedModel;
    use serde_json::json;

    const PLAN: &str = r#"{"steps": [{"tool": "get_weather", "args": {"city": "Paris"}}]}"#;

    fn standard_actions() -> ActionSet {
        let config = Config::from_lookup(|key| (key == "GEMINI_API_KEY").then(|| "k".to_string())).unwrap();
        ActionSet::standard(&config, reqwest::Client::new())
    }

    #[test]
    fn fence_variants_parse_to_the_same_plan() {
        let bare = parse_plan(PLAN).unwrap();
        let tagged = parse_plan(&format!("```json\n{PLAN}\n```")).unwrap();
        let untagged = parse_plan(&format!("```\n{PLAN}\n```")).unwrap();
        let with_prose = parse_plan(&format!("Here is the plan:\n```json\n{PLAN}\n```\nDone.")).unwrap();
        assert_eq!(bare, tagged);
        assert_eq!(bare, untagged);
        assert_eq!(bare, with_prose);
        assert_eq!(bare.steps[0].action, "get_weather");
    }

    #[test]
    fn tagged_fence_wins_over_an_earlier_untagged_one() {
        let text = format!("```\nnot json\n```\n```json\n{PLAN}\n```");
        assert_eq!(strip_code_fence(&text), PLAN);
    }

    #[test]
    fn unterminated_fence_keeps_the_rest() {
        assert_eq!(strip_code_fence(&format!("```json\n{PLAN}")), PLAN);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = parse_plan("```json\n{\"steps\": [\n```").unwrap_err();
        match err {
            PlanError::Parse { raw, .. } => assert!(raw.contains("steps")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn scalar_json_is_rejected() {
        let err = parse_plan("\"just a string\"").unwrap_err();
        assert!(matches!(err, PlanError::NotStructured { kind: "a string", .. }));
    }

    #[test]
    fn system_prompt_lists_every_action() {
        let actions = standard_actions();
        let planner = PlannerAgent::new(Arc::new(ScriptedModel::new()), &actions);
        for descriptor in actions.descriptors() {
            assert!(planner.system_prompt().contains(&format!("- {}: ", descriptor.name)));
        }
        assert!(planner.system_prompt().contains("Output ONLY valid JSON"));
    }

    #[tokio::test]
    async fn plan_sends_task_as_user_prompt() {
        let model = Arc::new(ScriptedModel::new().with_completion(format!("```json\n{PLAN}\n```")));
        let planner = PlannerAgent::new(model.clone(), &standard_actions());
        let plan = planner.plan("What is the weather in Paris?").await.unwrap();
        assert_eq!(plan.steps[0].args["city"], "Paris");
        assert_eq!(model.prompts()[0].user, "What is the weather in Paris?");
    }

    #[tokio::test]
    async fn unparseable_output_propagates() {
        let model = Arc::new(ScriptedModel::new().with_completion("I cannot help with that."));
        let planner = PlannerAgent::new(model, &standard_actions());
        let err = planner.plan("anything").await.unwrap_err();
        assert!(matches!(err, PipelineError::Plan(PlanError::Parse { .. })));
    }

    #[test]
    fn validation_accepts_known_actions_with_required_args() {
        let plan = Plan::from_value(json!({"steps": [
            {"tool": "get_weather", "args": {"city": "Paris"}},
            {"tool": "get_exchange_rate", "args": {"base": "USD", "target": "EUR"}}
        ]}));
        assert!(validate_plan(&plan, &standard_actions()).is_ok());
    }

    #[test]
    fn validation_rejects_unknown_action() {
        let plan = Plan::from_value(json!([{"tool": "get_wether", "args": {"city": "Paris"}}]));
        let err = validate_plan(&plan, &standard_actions()).unwrap_err();
        assert!(err.to_string().contains("get_wether"));
    }

    #[test]
    fn validation_rejects_missing_argument() {
        let plan = Plan::from_value(json!([{"tool": "get_exchange_rate", "args": {"from": "USD"}}]));
        let err = validate_plan(&plan, &standard_actions()).unwrap_err();
        assert!(err.to_string().contains("base, target"));
    }
}
