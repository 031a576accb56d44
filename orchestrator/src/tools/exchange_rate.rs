use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_args, transport_error, Action, ActionDescriptor};
use crate::error::ActionError;

pub const NAME: &str = "get_exchange_rate";

/// Latest conversion rate from ExchangeRate-API.
pub struct ExchangeRate {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    descriptor: ActionDescriptor,
}

#[derive(Deserialize)]
struct Args {
    base: String,
    target: String,
}

impl ExchangeRate {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: Option<String>) -> Self {
        let descriptor = ActionDescriptor::new(
            NAME,
            "Fetch exchange rate from base currency to target currency using ExchangeRate-API \
             (latest endpoint). Args: base (str): Base currency (e.g., USD); \
             target (str): Target currency (e.g., INR). Returns exchange rate info or error.",
            json!({
                "type": "object",
                "properties": {
                    "base": { "type": "string", "description": "Base currency (e.g., USD)" },
                    "target": { "type": "string", "description": "Target currency (e.g., INR)" }
                },
                "required": ["base", "target"]
            }),
        );
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            descriptor,
        }
    }

    async fn fetch(&self, api_key: &str, base: &str) -> Result<Value, reqwest::Error> {
        self.client
            .get(format!("{}/{}/latest/{}", self.base_url, api_key, base.to_uppercase()))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl Action for ExchangeRate {
    fn descriptor(&self) -> &ActionDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, args: Value) -> Result<Value, ActionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ActionError::MissingConfig("EXCHANGE_RATE_API_KEY"))?;
        let Args { base, target } = parse_args(NAME, args)?;

        let data = match self.fetch(api_key, &base).await {
            Ok(data) => data,
            Err(e) => {
                return Ok(json!({
                    "base": base,
                    "target": target,
                    "error": transport_error(e),
                }))
            }
        };

        if data.get("result").and_then(Value::as_str) != Some("success") {
            let error = data
                .get("error-type")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            return Ok(json!({ "base": base, "target": target, "error": error }));
        }

        let (base, target) = (base.to_uppercase(), target.to_uppercase());
        match data["conversion_rates"].get(&target) {
            Some(rate) if !rate.is_null() => Ok(json!({
                "base": base,
                "target": target,
                "rate": rate,
                "last_updated": data["time_last_update_utc"],
            })),
            _ => Ok(json!({
                "base": base,
                "target": target,
                "error": "Target currency not found",
            })),
        }
    }
}
