use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use warp::Filter;

use orchestrator::tools::Weather;
use orchestrator::{ActionError, ActionSet, Message, Pipeline, PipelineError, ScriptedModel};

async fn serve_weather(hits: Arc<Mutex<Vec<String>>>) -> String {
    let route = warp::path!("v1" / "current.json")
        .and(warp::query::<HashMap<String, String>>())
        .map(move |query: HashMap<String, String>| {
            let city = query.get("q").cloned().unwrap_or_default();
            hits.lock().unwrap().push(city.clone());
            warp::reply::json(&json!({
                "location": {"name": city, "country": "France"},
                "current": {
                    "temp_c": 21.0,
                    "feelslike_c": 21.0,
                    "humidity": 52,
                    "condition": {"text": "Partly cloudy"},
                    "wind_kph": 11.2
                }
            }))
        });
    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    format!("http://{addr}/v1/current.json")
}

fn dead_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/v1/current.json")
}

fn http() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

#[tokio::test]
async fn weather_question_flows_through_all_three_stages() {
    let hits = Arc::new(Mutex::new(Vec::new()));
    let url = serve_weather(hits.clone()).await;
    let actions = ActionSet::new().with(Arc::new(Weather::new(http(), &url, Some("key".into()))));

    // The executor model ends without a summary, so the raw tool output is used.
    let model = Arc::new(
        ScriptedModel::new()
            .with_completion(
                "```json\n{\"steps\": [{\"tool\": \"get_weather\", \"args\": {\"city\": \"Paris\"}}]}\n```",
            )
            .with_tool_calls(vec![("get_weather", json!({"city": "Paris"}))])
            .with_reply("")
            .with_completion("It is partly cloudy in Paris, France, at 21°C."),
    );
    let pipeline = Pipeline::new(model.clone(), Arc::new(actions));

    let state = pipeline.run("What is the weather in Paris?").await.unwrap();

    let plan = state.plan.expect("plan written by planner");
    assert_eq!(plan.steps.len(), 1);
    assert_eq!(plan.steps[0].action, "get_weather");
    assert_eq!(plan.steps[0].args["city"], "Paris");

    assert_eq!(*hits.lock().unwrap(), vec!["Paris"]);

    let summary = state.execution_result.expect("summary written by executor");
    assert!(summary.starts_with("Tool execution results:\n\n"));
    assert!(summary.contains("Partly cloudy"));

    let answer = state.final_output.expect("answer written by verifier");
    assert!(answer.contains("Paris"));
    assert_eq!(model.prompts().last().unwrap().user, summary);

    let conversation = &model.conversations()[1];
    assert!(matches!(&conversation[2], Message::Tool { name, .. } if name == "get_weather"));
}

#[tokio::test]
async fn missing_weather_key_aborts_the_run() {
    let url = serve_weather(Arc::new(Mutex::new(Vec::new()))).await;
    let actions = ActionSet::new().with(Arc::new(Weather::new(http(), &url, None)));
    let model = Arc::new(
        ScriptedModel::new()
            .with_completion(r#"{"steps": [{"tool": "get_weather", "args": {"city": "Paris"}}]}"#)
            .with_tool_calls(vec![("get_weather", json!({"city": "Paris"}))])
            .with_reply("never reached"),
    );
    let pipeline = Pipeline::new(model.clone(), Arc::new(actions));

    let err = pipeline.run("What is the weather in Paris?").await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Action(ActionError::MissingConfig("WEATHER_API_KEY"))
    ));
    // planner only; the verifier never ran
    assert_eq!(model.completion_calls(), 1);
}

#[tokio::test]
async fn transport_failure_does_not_abort_the_run() {
    let actions = ActionSet::new().with(Arc::new(Weather::new(
        http(),
        &dead_url(),
        Some("key".into()),
    )));
    let model = Arc::new(
        ScriptedModel::new()
            .with_completion(r#"[{"tool": "get_weather", "args": {"city": "Paris"}}]"#)
            .with_tool_calls(vec![("get_weather", json!({"city": "Paris"}))])
            .with_reply("")
            .with_completion("The weather service is unreachable right now."),
    );
    let pipeline = Pipeline::new(model, Arc::new(actions));

    let state = pipeline.run("What is the weather in Paris?").await.unwrap();
    let summary = state.execution_result.unwrap();
    assert!(summary.contains("\"error\""));
    assert!(summary.contains("\"city\":\"Paris\""));
    assert_eq!(
        state.final_output.as_deref(),
        Some("The weather service is unreachable right now.")
    );
}
