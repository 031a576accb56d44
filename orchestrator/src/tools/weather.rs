use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_args, transport_error, Action, ActionDescriptor};
use crate::error::ActionError;

pub const NAME: &str = "get_weather";

/// Current conditions from WeatherAPI.com.
pub struct Weather {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    descriptor: ActionDescriptor,
}

#[derive(Deserialize)]
struct Args {
    city: String,
}

#[derive(Deserialize)]
struct CurrentResponse {
    location: Location,
    current: Current,
}

#[derive(Deserialize)]
struct Location {
    name: String,
    country: String,
}

#[derive(Deserialize)]
struct Current {
    temp_c: f64,
    feelslike_c: f64,
    humidity: Value,
    condition: Condition,
    wind_kph: f64,
}

#[derive(Deserialize)]
struct Condition {
    text: String,
}

impl Weather {
    pub fn new(client: reqwest::Client, url: &str, api_key: Option<String>) -> Self {
        let descriptor = ActionDescriptor::new(
            NAME,
            "Fetch current weather for a given city using WeatherAPI.com. \
             Args: city (str): City name (e.g., \"Mumbai\"). \
             Returns temperature, feels-like temperature, humidity, condition text and wind speed.",
            json!({
                "type": "object",
                "properties": {
                    "city": { "type": "string", "description": "City name (e.g., \"Mumbai\")" }
                },
                "required": ["city"]
            }),
        );
        Self {
            client,
            url: url.to_string(),
            api_key,
            descriptor,
        }
    }

    async fn fetch(&self, api_key: &str, city: &str) -> Result<CurrentResponse, reqwest::Error> {
        self.client
            .get(&self.url)
            .query(&[("key", api_key), ("q", city), ("aqi", "no")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl Action for Weather {
    fn descriptor(&self) -> &ActionDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, args: Value) -> Result<Value, ActionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ActionError::MissingConfig("WEATHER_API_KEY"))?;
        let Args { city } = parse_args(NAME, args)?;

        let data = match self.fetch(api_key, &city).await {
            Ok(data) => data,
            Err(e) => {
                return Ok(json!({
                    "city": city,
                    "error": transport_error(e),
                }))
            }
        };

        Ok(json!({
            "city": data.location.name,
            "country": data.location.country,
            "temperature_celsius": data.current.temp_c,
            "feels_like_celsius": data.current.feelslike_c,
            "humidity": data.current.humidity,
            "condition": data.current.condition.text,
            "wind_kph": data.current.wind_kph,
        }))
    }
}
