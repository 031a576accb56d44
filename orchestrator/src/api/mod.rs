use std::sync::Arc;

use warp::{Filter, Rejection, Reply};

use crate::pipeline::Pipeline;

mod actions;
mod run;

pub fn routes(
    pipeline: Arc<Pipeline>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let api = warp::path("api").and(warp::path("v1"));

    let run_route = api
        .and(warp::path("run"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(64 * 1024))
        .and(warp::body::json())
        .and(with_pipeline(pipeline.clone()))
        .and_then(run::handle_run);

    let actions_route = api
        .and(warp::path("actions"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_pipeline(pipeline))
        .and_then(actions::handle_list_actions);

    run_route.or(actions_route)
}

fn with_pipeline(
    pipeline: Arc<Pipeline>,
) -> impl Filter<Extract = (Arc<Pipeline>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || pipeline.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::handle_rejection;
    use crate::llm::ScriptedModel;
    use crate::tools::{Action, ActionDescriptor, ActionSet};
    use crate::error::ActionError;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Define(ActionDescriptor);

    #[async_trait]
    impl Action for Define {
        fn descriptor(&self) -> &ActionDescriptor {
            &self.0
        }

        async fn invoke(&self, args: Value) -> Result<Value, ActionError> {
            Ok(json!({ "word": args["word"], "definitions": [{"definition": "a star"}] }))
        }
    }

    fn pipeline(model: ScriptedModel) -> Arc<Pipeline> {
        let actions = ActionSet::new().with(Arc::new(Define(ActionDescriptor::new(
            "dictionary_lookup",
            "Fetch dictionary definitions for a word",
            json!({"type": "object", "required": ["word"]}),
        ))));
        Arc::new(Pipeline::new(Arc::new(model), Arc::new(actions)))
    }

    #[tokio::test]
    async fn run_returns_the_final_state() {
        let model = ScriptedModel::new()
            .with_completion(r#"{"steps": [{"tool": "dictionary_lookup", "args": {"word": "sun"}}]}"#)
            .with_tool_calls(vec![("dictionary_lookup", json!({"word": "sun"}))])
            .with_reply("sun: a star")
            .with_completion("The sun is a star.");
        let filter = routes(pipeline(model)).recover(handle_rejection);

        let response = warp::test::request()
            .method("POST")
            .path("/api/v1/run")
            .json(&json!({"task": "Define sun"}))
            .reply(&filter)
            .await;

        assert_eq!(response.status(), 200);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["task"], "Define sun");
        assert_eq!(body["execution_result"], "sun: a star");
        assert_eq!(body["final_output"], "The sun is a star.");
        assert_eq!(body["plan"]["steps"][0]["tool"], "dictionary_lookup");
    }

    #[tokio::test]
    async fn task_reaches_the_planner_unchanged() {
        let model = Arc::new(
            ScriptedModel::new()
                .with_completion(r#"[{"tool": "dictionary_lookup", "args": {"word": "sun"}}]"#)
                .with_reply("sun: a star")
                .with_completion("The sun is a star."),
        );
        let actions = ActionSet::new();
        let filter = routes(Arc::new(Pipeline::new(model.clone(), Arc::new(actions))))
            .recover(handle_rejection);

        let response = warp::test::request()
            .method("POST")
            .path("/api/v1/run")
            .json(&json!({"task": "  Define sun\n"}))
            .reply(&filter)
            .await;

        assert_eq!(response.status(), 200);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["task"], "  Define sun\n");
        assert_eq!(model.prompts()[0].user, "  Define sun\n");
    }

    #[tokio::test]
    async fn blank_task_is_a_bad_request() {
        let filter = routes(pipeline(ScriptedModel::new())).recover(handle_rejection);
        let response = warp::test::request()
            .method("POST")
            .path("/api/v1/run")
            .json(&json!({"task": "   "}))
            .reply(&filter)
            .await;
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn plan_failure_is_unprocessable() {
        let model = ScriptedModel::new().with_completion("no plan here");
        let filter = routes(pipeline(model)).recover(handle_rejection);
        let response = warp::test::request()
            .method("POST")
            .path("/api/v1/run")
            .json(&json!({"task": "Define sun"}))
            .reply(&filter)
            .await;
        assert_eq!(response.status(), 422);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert!(body["details"].as_str().unwrap().contains("not valid JSON"));
    }

    #[tokio::test]
    async fn lists_registered_actions() {
        let filter = routes(pipeline(ScriptedModel::new()));
        let response = warp::test::request()
            .method("GET")
            .path("/api/v1/actions")
            .reply(&filter)
            .await;
        assert_eq!(response.status(), 200);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body[0]["name"], "dictionary_lookup");
    }
}
