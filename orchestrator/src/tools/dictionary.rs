use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_args, transport_error, Action, ActionDescriptor};
use crate::error::ActionError;

pub const NAME: &str = "dictionary_lookup";

const NOT_FOUND: &str = "No definition found";

/// English definitions from dictionaryapi.dev.
pub struct DictionaryLookup {
    client: reqwest::Client,
    base_url: String,
    descriptor: ActionDescriptor,
}

#[derive(Deserialize)]
struct Args {
    word: String,
}

impl DictionaryLookup {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        let descriptor = ActionDescriptor::new(
            NAME,
            "Fetch dictionary definitions for a word using dictionaryapi.dev. \
             Args: word (str): The English word to look up. \
             Returns word definitions and related info, or error info.",
            json!({
                "type": "object",
                "properties": {
                    "word": { "type": "string", "description": "The English word to look up" }
                },
                "required": ["word"]
            }),
        );
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            descriptor,
        }
    }

    /// The API answers unknown words with a 404 carrying a `{title, message}`
    /// object, so that status is read as a body rather than a failure.
    async fn fetch(&self, word: &str) -> Result<Value, reqwest::Error> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, word))
            .send()
            .await?;
        let response = if response.status() == StatusCode::NOT_FOUND {
            response
        } else {
            response.error_for_status()?
        };
        response.json().await
    }
}

#[async_trait]
impl Action for DictionaryLookup {
    fn descriptor(&self) -> &ActionDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, args: Value) -> Result<Value, ActionError> {
        let Args { word } = parse_args(NAME, args)?;

        let data = match self.fetch(&word).await {
            Ok(data) => data,
            Err(e) => return Ok(json!({ "word": word, "error": transport_error(e) })),
        };
        Ok(shape_entry(&word, &data))
    }
}

fn shape_entry(word: &str, data: &Value) -> Value {
    if data.get("title").is_some_and(|title| !title.is_null()) {
        let message = data
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(NOT_FOUND);
        return json!({ "word": word, "error": message });
    }

    let Some(entry) = data.as_array().and_then(|entries| entries.first()) else {
        return json!({ "word": word, "error": NOT_FOUND });
    };

    let mut definitions = Vec::new();
    for meaning in entry["meanings"].as_array().into_iter().flatten() {
        let part_of_speech = meaning["partOfSpeech"].as_str().unwrap_or("");
        for item in meaning["definitions"].as_array().into_iter().flatten() {
            definitions.push(json!({
                "part_of_speech": part_of_speech,
                "definition": item["definition"],
                "example": item["example"],
                "synonyms": item.get("synonyms").cloned().unwrap_or_else(|| json!([])),
                "antonyms": item.get("antonyms").cloned().unwrap_or_else(|| json!([])),
            }));
        }
    }

    json!({
        "word": entry["word"],
        "phonetic": entry["phonetic"],
        "definitions": definitions,
        "source_urls": entry.get("sourceUrls").cloned().unwrap_or_else(|| json!([])),
    })
}
