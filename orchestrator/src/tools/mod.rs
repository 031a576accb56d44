// Action Set: named lookups the executor model can call

pub mod dictionary;
pub mod exchange_rate;
pub mod weather;
pub mod wikipedia;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::ActionError;
use crate::metrics;

pub use dictionary::DictionaryLookup;
pub use exchange_rate::ExchangeRate;
pub use weather::Weather;
pub use wikipedia::WikipediaSearch;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
}

impl ActionDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    pub fn required_args(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// A single outbound lookup.
///
/// Implementations catch their own transport and lookup failures and report
/// them as a payload carrying an `error` field. `Err` is reserved for
/// conditions that should stop the run.
#[async_trait]
pub trait Action: Send + Sync {
    fn descriptor(&self) -> &ActionDescriptor;
    async fn invoke(&self, args: Value) -> Result<Value, ActionError>;
}

/// Immutable registry of actions, in registration order.
#[derive(Clone, Default)]
pub struct ActionSet {
    actions: Vec<Arc<dyn Action>>,
}

impl ActionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, action: Arc<dyn Action>) -> Self {
        let name = action.descriptor().name.clone();
        self.actions.retain(|existing| existing.descriptor().name != name);
        self.actions.push(action);
        self
    }

    /// The four lookups shipped with the orchestrator.
    pub fn standard(config: &Config, client: reqwest::Client) -> Self {
        Self::new()
            .with(Arc::new(Weather::new(
                client.clone(),
                &config.weather_api_url,
                config.weather_api_key.clone(),
            )))
            .with(Arc::new(WikipediaSearch::new(client.clone(), &config.wikipedia_url)))
            .with(Arc::new(ExchangeRate::new(
                client.clone(),
                &config.exchange_rate_api_url,
                config.exchange_rate_api_key.clone(),
            )))
            .with(Arc::new(DictionaryLookup::new(client, &config.dictionary_api_url)))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Action>> {
        self.actions.iter().find(|action| action.descriptor().name == name)
    }

    pub fn descriptors(&self) -> Vec<ActionDescriptor> {
        self.actions.iter().map(|action| action.descriptor().clone()).collect()
    }

    pub async fn invoke(&self, name: &str, args: Value) -> Result<Value, ActionError> {
        let action = self
            .get(name)
            .ok_or_else(|| ActionError::UnknownAction(name.to_string()))?;

        info!(action = name, args = %args, "invoking action");
        let result = action.invoke(args).await;
        let outcome = match &result {
            Ok(payload) if payload.get("error").is_some() => {
                warn!(action = name, error = %payload["error"], "action returned an error payload");
                "error_payload"
            }
            Ok(_) => "ok",
            Err(err) => {
                warn!(action = name, error = %err, "action failed");
                "failed"
            }
        };
        metrics::ACTION_INVOCATIONS
            .with_label_values(&[name, outcome])
            .inc();
        result
    }
}

pub fn http_client(config: &Config) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()?;
    Ok(client)
}

pub(crate) fn parse_args<T: DeserializeOwned>(action: &str, args: Value) -> Result<T, ActionError> {
    serde_json::from_value(args).map_err(|e| ActionError::InvalidArguments {
        action: action.to_string(),
        reason: e.to_string(),
    })
}

/// Error text for a failed request, without the URL (it may carry an API key).
pub(crate) fn transport_error(err: reqwest::Error) -> String {
    let timed_out = err.is_timeout();
    let err = err.without_url();
    if timed_out {
        format!("request timed out ({err})")
    } else {
        err.to_string()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use warp::{Filter, Rejection, Reply};

    /// Serves `routes` on an ephemeral local port and returns its base URL.
    pub async fn serve<F>(routes: F) -> String
    where
        F: Filter<Error = Rejection> + Clone + Send + Sync + 'static,
        F::Extract: Reply,
    {
        let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        format!("http://{}", addr)
    }

    pub fn client(timeout: Duration) -> reqwest::Client {
        reqwest::Client::builder().timeout(timeout).build().unwrap()
    }

    /// A base URL nothing listens on.
    pub fn dead_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }
}
